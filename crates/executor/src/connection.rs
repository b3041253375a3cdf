//! Connection seams the executor drives but does not implement.
//!
//! A [`ConnectionProvider`] opens handles from a [`ConnectionConfig`]; a
//! [`Connection`] runs statements and reports whether it is still usable.
//! Drivers classify their own failures into transient/terminal
//! [`resql_core::Error`]s before returning them.

use resql_core::{ConnectionConfig, ConnectionId, Params, Result, Row};

/// A live link to a database server.
///
/// Handles are exclusively owned; nothing here is required to be `Sync`.
pub trait Connection {
    /// Identity of this handle, fixed for its lifetime
    fn id(&self) -> ConnectionId;

    /// Whether the handle can still carry statements.
    ///
    /// Implementations must return `false` once they have observed a
    /// connection-level failure or after [`Connection::close`].
    fn is_open(&self) -> bool;

    /// Run one statement and materialize every row it returns.
    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>>;

    /// Round-trip to the server without running a statement.
    fn ping(&mut self) -> Result<()>;

    /// Close the handle. Closing twice is a no-op.
    fn close(&mut self);
}

/// Opens connections.
pub trait ConnectionProvider {
    /// Handle type produced by this provider
    type Connection: Connection;

    /// Open a new handle
    fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection>;
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for &P {
    type Connection = P::Connection;

    fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection> {
        (**self).connect(config)
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn id(&self) -> ConnectionId {
        (**self).id()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn ping(&mut self) -> Result<()> {
        (**self).ping()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
