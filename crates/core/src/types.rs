//! Identity types
//!
//! - ConnectionId: identity of one physical connection handle

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a connection handle
///
/// A ConnectionId is a wrapper around a UUID v4, assigned when a provider
/// opens a connection. A reconnect always yields a new id, which is how
/// callers (and tests) observe that a handle was replaced rather than reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new random ConnectionId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a ConnectionId from a string representation
    ///
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Short form for log lines: the first 8 hex digits
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_connection_id_roundtrip_string() {
        let id = ConnectionId::new();
        let parsed = ConnectionId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(ConnectionId::from_string("not-a-uuid").is_none());
    }

    #[test]
    fn test_short_form() {
        let id = ConnectionId::new();
        assert_eq!(id.short().len(), 8);
        assert!(id.to_string().replace('-', "").starts_with(&id.short()));
    }
}
