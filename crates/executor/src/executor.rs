//! The resilient executor: bounded retry with backoff and reconnect-on-failure.
//!
//! Every call to [`ResilientExecutor::execute`] runs an explicit attempt loop.
//! Each attempt is mapped into an [`AttemptOutcome`] and the loop branches on
//! that tag:
//!
//! ```text
//!            ┌──────────── Transient, attempts left ───────────┐
//!            ▼                                                  │
//!   ┌──────────────┐  Success   ┌───────────┐                   │
//!   │  attempting  │ ─────────► │ succeeded │            ┌─────────────┐
//!   └──────────────┘            └───────────┘            │ backing-off │
//!            │  Terminal, or Transient on the last attempt └─────────────┘
//!            ▼                                                  ▲
//!   ┌───────────────────┐                                       │
//!   │ terminally-failed │        Transient, attempts left ──────┘
//!   └───────────────────┘
//! ```
//!
//! While backing off, a handle that reports itself closed (or fails a ping
//! under [`LivenessCheck::Ping`]) is discarded; the next attempt opens a new
//! one before issuing the statement. A statement is never sent on a handle
//! that reports closed.

use resql_core::{
    ConnectionConfig, ConnectionId, Error, LivenessCheck, Params, ResqlConfig, Result,
    RetryPolicy, Row,
};
use tracing::{debug, error, info, warn};

use crate::backoff::{Sleeper, ThreadSleeper};
use crate::connection::{Connection, ConnectionProvider};

/// Result of a single attempt, classified for the retry loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The statement ran; these are all of its rows
    Success(Vec<Row>),
    /// Failed in a way a retry may fix
    Transient(Error),
    /// Failed in a way no retry can fix
    Terminal(Error),
}

impl AttemptOutcome {
    /// Classify a raw attempt result
    pub fn from_result(result: Result<Vec<Row>>) -> Self {
        match result {
            Ok(rows) => AttemptOutcome::Success(rows),
            Err(e) => Self::from_error(e),
        }
    }

    /// Classify an error by its [`resql_core::ErrorKind`]
    pub fn from_error(e: Error) -> Self {
        if e.is_transient() {
            AttemptOutcome::Transient(e)
        } else {
            AttemptOutcome::Terminal(e)
        }
    }
}

/// Cumulative counters for one executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Calls to `execute` that passed input validation
    pub executions: u64,
    /// Attempts across all executions
    pub attempts: u64,
    /// Backoff sleeps taken
    pub retries: u64,
    /// Calls into the provider's `connect`
    pub connects: u64,
    /// `connect` calls that replaced an earlier handle
    pub reconnects: u64,
    /// Executions that ended in an error
    pub failures: u64,
}

/// Executes statements over one exclusively owned connection, masking
/// transient failures up to the policy bound.
///
/// `execute` takes `&mut self`: one executor serves one caller at a time.
/// Workers that need concurrency should each own an executor.
///
/// # Example
///
/// ```ignore
/// use resql_executor::ResilientExecutor;
/// use resql_core::{ConnectionConfig, Params, RetryPolicy};
///
/// let mut executor = ResilientExecutor::connect(provider, config, RetryPolicy::default())?;
/// let rows = executor.execute("SELECT COUNT(*) AS count FROM orders", &Params::Empty)?;
/// ```
pub struct ResilientExecutor<P: ConnectionProvider, S: Sleeper = ThreadSleeper> {
    provider: P,
    config: ConnectionConfig,
    policy: RetryPolicy,
    liveness: LivenessCheck,
    sleeper: S,
    conn: Option<P::Connection>,
    ever_connected: bool,
    stats: ExecutorStats,
}

impl<P: ConnectionProvider> ResilientExecutor<P, ThreadSleeper> {
    /// Create an executor that opens its connection on first use.
    ///
    /// # Errors
    /// Returns `Error::Config` if the policy is invalid.
    pub fn lazy(provider: P, config: ConnectionConfig, policy: RetryPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            provider,
            config,
            policy,
            liveness: LivenessCheck::default(),
            sleeper: ThreadSleeper,
            conn: None,
            ever_connected: false,
            stats: ExecutorStats::default(),
        })
    }

    /// Create an executor and open its connection immediately.
    ///
    /// # Errors
    /// Returns `Error::Config` for an invalid policy, or the provider's error
    /// if the first connect fails. The first connect is not retried.
    pub fn connect(provider: P, config: ConnectionConfig, policy: RetryPolicy) -> Result<Self> {
        let mut executor = Self::lazy(provider, config, policy)?;
        executor.ensure_connection()?;
        Ok(executor)
    }

    /// Create a lazy executor from a loaded [`ResqlConfig`].
    pub fn from_config(provider: P, config: &ResqlConfig) -> Result<Self> {
        config.connection.validate()?;
        Ok(Self::lazy(provider, config.connection.clone(), config.retry_policy()?)?
            .with_liveness(config.liveness))
    }
}

impl<P: ConnectionProvider, S: Sleeper> ResilientExecutor<P, S> {
    /// Replace the sleeper used between attempts
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> ResilientExecutor<P, S2> {
        ResilientExecutor {
            provider: self.provider,
            config: self.config,
            policy: self.policy,
            liveness: self.liveness,
            sleeper,
            conn: self.conn,
            ever_connected: self.ever_connected,
            stats: self.stats,
        }
    }

    /// Set how a handle is checked before reuse after a failure
    pub fn with_liveness(mut self, liveness: LivenessCheck) -> Self {
        self.liveness = liveness;
        self
    }

    /// The retry policy this executor was built with
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Connection parameters used for every (re)connect
    pub fn connection_config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Counters since construction
    pub fn stats(&self) -> ExecutorStats {
        self.stats
    }

    /// Whether a handle is held and reports open
    pub fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| c.is_open())
    }

    /// Identity of the current handle, if one is held
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.conn.as_ref().map(|c| c.id())
    }

    /// Close and drop the current handle.
    ///
    /// The executor stays usable; the next `execute` opens a new handle.
    pub fn close(&mut self) {
        self.discard_connection("closed by caller");
    }

    /// Run a statement without parameters
    pub fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.execute(sql, &Params::Empty)
    }

    /// Run a statement and return only its first row
    pub fn execute_first(&mut self, sql: &str, params: &Params) -> Result<Option<Row>> {
        Ok(self.execute(sql, params)?.into_iter().next())
    }

    /// Run a statement, retrying transient failures.
    ///
    /// # Returns
    /// * `Ok(rows)` - every row of the first successful attempt
    /// * `Err(Error::InvalidInput)` - `sql` is empty; nothing was attempted
    /// * `Err(e)` - a terminal error from any attempt, returned unmodified
    /// * `Err(Error::Exhausted)` - every attempt failed transiently; wraps the last cause
    pub fn execute(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        if sql.trim().is_empty() {
            return Err(Error::invalid_input("query must not be empty"));
        }
        self.stats.executions += 1;

        let max_attempts = self.policy.max_attempts;
        let mut attempt: u32 = 0;

        loop {
            self.stats.attempts += 1;
            debug!(
                target: "resql::executor",
                attempt = attempt + 1,
                max_attempts,
                "Executing statement"
            );

            match self.run_attempt(sql, params) {
                AttemptOutcome::Success(rows) => {
                    debug_assert!(self.is_connected());
                    return Ok(rows);
                }
                AttemptOutcome::Terminal(e) => {
                    self.stats.failures += 1;
                    debug!(
                        target: "resql::executor",
                        attempt = attempt + 1,
                        error = %e,
                        "Statement failed with a terminal error"
                    );
                    return Err(e);
                }
                AttemptOutcome::Transient(e) => {
                    if attempt + 1 >= max_attempts {
                        self.stats.failures += 1;
                        error!(
                            target: "resql::executor",
                            attempts = attempt + 1,
                            error = %e,
                            "Giving up after transient failures"
                        );
                        return Err(Error::Exhausted {
                            attempts: attempt + 1,
                            last: Box::new(e),
                        });
                    }

                    self.check_liveness();
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        target: "resql::executor",
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Transient failure, retrying"
                    );
                    self.sleeper.sleep(delay);
                    self.stats.retries += 1;
                    attempt += 1;
                }
            }
        }
    }

    fn run_attempt(&mut self, sql: &str, params: &Params) -> AttemptOutcome {
        let conn = match self.ensure_connection() {
            Ok(conn) => conn,
            Err(e) => return AttemptOutcome::from_error(e),
        };
        AttemptOutcome::from_result(conn.query(sql, params))
    }

    /// Return an open handle, replacing a closed or missing one.
    fn ensure_connection(&mut self) -> Result<&mut P::Connection> {
        let conn = match self.conn.take() {
            Some(conn) if conn.is_open() => conn,
            stale => {
                if let Some(mut old) = stale {
                    old.close();
                }
                self.open_connection()?
            }
        };
        Ok(self.conn.insert(conn))
    }

    fn open_connection(&mut self) -> Result<P::Connection> {
        let replacing = self.ever_connected;
        self.stats.connects += 1;
        if replacing {
            self.stats.reconnects += 1;
        }

        let conn = self.provider.connect(&self.config).map_err(|e| {
            warn!(
                target: "resql::executor",
                target_db = %self.config.display_target(),
                error = %e,
                "Connect failed"
            );
            e
        })?;
        self.ever_connected = true;

        if replacing {
            info!(
                target: "resql::executor",
                connection = %conn.id().short(),
                target_db = %self.config.display_target(),
                "Reconnected"
            );
        } else {
            debug!(
                target: "resql::executor",
                connection = %conn.id().short(),
                target_db = %self.config.display_target(),
                "Connected"
            );
        }
        Ok(conn)
    }

    /// After a transient failure: drop the handle unless it is still usable.
    fn check_liveness(&mut self) {
        let reusable = match self.conn.as_mut() {
            None => return,
            Some(conn) if !conn.is_open() => false,
            Some(conn) => match self.liveness {
                LivenessCheck::Flag => true,
                LivenessCheck::Ping => match conn.ping() {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(
                            target: "resql::executor",
                            connection = %conn.id().short(),
                            error = %e,
                            "Ping failed"
                        );
                        false
                    }
                },
            },
        };
        if !reusable {
            self.discard_connection("connection no longer open");
        }
    }

    fn discard_connection(&mut self, reason: &str) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
            info!(
                target: "resql::executor",
                connection = %conn.id().short(),
                reason,
                "Discarded connection"
            );
        }
    }
}
