//! Blocking MySQL provider built on `mysql_async`.
//!
//! Each provider owns a current-thread tokio runtime; every driver call is a
//! `block_on` on that runtime, so no task outlives the call that started it.
//! Do not call into these types from inside another tokio runtime.

use std::sync::Arc;

use mysql_async::prelude::Queryable;
use resql_core::{ConnectionConfig, ConnectionId, Error, ErrorKind, Params, Result, Row};
use resql_executor::{Connection, ConnectionProvider};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::classify::{classify_error, CR_CONN_HOST_ERROR};
use crate::convert::{params_to_driver, row_from_driver};

/// Opens [`MySqlConnection`]s.
#[derive(Clone)]
pub struct MySqlProvider {
    runtime: Arc<Runtime>,
}

impl MySqlProvider {
    /// Create a provider with its own runtime.
    ///
    /// # Errors
    /// Returns `Error::Io` if the runtime cannot be built.
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

fn driver_opts(config: &ConnectionConfig) -> mysql_async::Opts {
    mysql_async::OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port)
        .user(Some(config.user.clone()))
        .pass(Some(config.password.clone()))
        .db_name(config.database.clone())
        .setup(vec![format!("SET NAMES {}", config.charset)])
        .into()
}

impl ConnectionProvider for MySqlProvider {
    type Connection = MySqlConnection;

    fn connect(&self, config: &ConnectionConfig) -> Result<MySqlConnection> {
        let opts = driver_opts(config);
        let timeout = config.connect_timeout();

        let conn = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, mysql_async::Conn::new(opts)).await })
            .map_err(|_| {
                Error::driver(
                    ErrorKind::Transient,
                    CR_CONN_HOST_ERROR,
                    format!(
                        "connect to {} timed out after {:?}",
                        config.display_target(),
                        timeout
                    ),
                )
            })?
            .map_err(|e| classify_error(&e).error)?;

        let id = ConnectionId::new();
        debug!(
            target: "resql::mysql",
            connection = %id.short(),
            server_version = ?conn.server_version(),
            "Opened MySQL connection"
        );
        Ok(MySqlConnection {
            id,
            conn: Some(conn),
            runtime: Arc::clone(&self.runtime),
        })
    }
}

/// One MySQL session.
///
/// There is no driver-level open flag, so the handle counts as open until it
/// is closed or a call fails with a connection-level error.
pub struct MySqlConnection {
    id: ConnectionId,
    conn: Option<mysql_async::Conn>,
    runtime: Arc<Runtime>,
}

impl MySqlConnection {
    /// Drop the session without a disconnect handshake
    fn mark_closed(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _guard = self.runtime.enter();
            drop(conn);
            debug!(
                target: "resql::mysql",
                connection = %self.id.short(),
                "MySQL connection marked closed"
            );
        }
    }
}

impl Connection for MySqlConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let conn = self.conn.as_mut().ok_or(Error::ConnectionClosed)?;
        let driver_params = params_to_driver(params)?;

        let result = self.runtime.block_on(async {
            if params.is_empty() {
                conn.query::<mysql_async::Row, _>(sql).await
            } else {
                conn.exec::<mysql_async::Row, _, _>(sql, driver_params).await
            }
        });

        match result {
            Ok(rows) => Ok(rows.iter().map(row_from_driver).collect()),
            Err(e) => {
                let failure = classify_error(&e);
                if failure.connection_lost {
                    self.mark_closed();
                }
                Err(failure.error)
            }
        }
    }

    fn ping(&mut self) -> Result<()> {
        let conn = self.conn.as_mut().ok_or(Error::ConnectionClosed)?;
        match self.runtime.block_on(conn.ping()) {
            Ok(()) => Ok(()),
            Err(e) => {
                let failure = classify_error(&e);
                if failure.connection_lost {
                    self.mark_closed();
                }
                Err(failure.error)
            }
        }
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.disconnect()) {
                debug!(
                    target: "resql::mysql",
                    connection = %self.id.short(),
                    error = %e,
                    "Disconnect handshake failed"
                );
            }
        }
    }
}

impl Drop for MySqlConnection {
    fn drop(&mut self) {
        self.close();
    }
}
