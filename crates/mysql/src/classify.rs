//! Transient/terminal classification of MySQL failures.
//!
//! Server and client error codes follow the MySQL reference manual
//! (`ER_*` server codes, `CR_*` client codes).

use resql_core::{Error, ErrorKind};

/// ER_CON_COUNT_ERROR: too many connections
pub const ER_CON_COUNT: u16 = 1040;
/// ER_SERVER_SHUTDOWN
pub const ER_SERVER_SHUTDOWN: u16 = 1053;
/// ER_LOCK_WAIT_TIMEOUT
pub const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// ER_LOCK_DEADLOCK
pub const ER_LOCK_DEADLOCK: u16 = 1213;
/// ER_QUERY_INTERRUPTED
pub const ER_QUERY_INTERRUPTED: u16 = 1317;
/// ER_CONNECTION_KILLED
pub const ER_CONNECTION_KILLED: u16 = 1927;
/// CR_CONNECTION_ERROR: can't connect through the local socket
pub const CR_CONNECTION_ERROR: u16 = 2002;
/// CR_CONN_HOST_ERROR: can't connect to the host
pub const CR_CONN_HOST_ERROR: u16 = 2003;
/// CR_SERVER_GONE_ERROR
pub const CR_SERVER_GONE: u16 = 2006;
/// CR_SERVER_LOST
pub const CR_SERVER_LOST: u16 = 2013;
/// CR_SERVER_LOST_EXTENDED
pub const CR_SERVER_LOST_EXTENDED: u16 = 2055;

/// Retry classification for a server or client error code.
///
/// Only codes known to clear up on their own are transient. Syntax errors
/// (1064), unknown tables (1146) or columns (1054), constraint violations
/// (1062, 1451, 1452) and authentication failures (1045) are terminal along
/// with every other code.
pub fn classify_server_code(code: u16) -> ErrorKind {
    match code {
        ER_CON_COUNT
        | ER_SERVER_SHUTDOWN
        | ER_LOCK_WAIT_TIMEOUT
        | ER_LOCK_DEADLOCK
        | ER_QUERY_INTERRUPTED
        | ER_CONNECTION_KILLED
        | CR_CONNECTION_ERROR
        | CR_CONN_HOST_ERROR
        | CR_SERVER_GONE
        | CR_SERVER_LOST
        | CR_SERVER_LOST_EXTENDED => ErrorKind::Transient,
        _ => ErrorKind::Terminal,
    }
}

/// Whether a code means the link itself is unusable, not just the statement.
pub fn is_connection_lost_code(code: u16) -> bool {
    matches!(
        code,
        ER_SERVER_SHUTDOWN | ER_CONNECTION_KILLED | CR_SERVER_GONE | CR_SERVER_LOST | CR_SERVER_LOST_EXTENDED
    )
}

/// A classified driver failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// The error to hand to the executor
    pub error: Error,
    /// The handle must be treated as closed
    pub connection_lost: bool,
}

impl Failure {
    fn lost(message: String) -> Self {
        Failure {
            error: Error::transient(message),
            connection_lost: true,
        }
    }

    fn terminal(message: String) -> Self {
        Failure {
            error: Error::terminal(message),
            connection_lost: false,
        }
    }
}

/// Classify an error returned by `mysql_async`.
pub fn classify_error(err: &mysql_async::Error) -> Failure {
    use mysql_async::DriverError;

    match err {
        mysql_async::Error::Server(server) => Failure {
            error: Error::driver(
                classify_server_code(server.code),
                server.code,
                server.message.clone(),
            ),
            connection_lost: is_connection_lost_code(server.code),
        },
        mysql_async::Error::Io(io) => Failure::lost(format!("I/O error: {}", io)),
        mysql_async::Error::Driver(driver) => match driver {
            DriverError::ConnectionClosed
            | DriverError::PacketOutOfOrder
            | DriverError::UnexpectedPacket { .. }
            | DriverError::PoolDisconnected => Failure::lost(driver.to_string()),
            _ => Failure::terminal(driver.to_string()),
        },
        other => Failure::terminal(other.to_string()),
    }
}
