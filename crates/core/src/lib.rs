//! Core types for resql
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: a single SQL cell or bind value
//! - Row / Params: result rows and bind parameters
//! - ConnectionId: identity of a connection handle
//! - Error / ErrorKind: error taxonomy with transient/terminal classification
//! - RetryPolicy / ConnectionConfig / ResqlConfig: configuration values

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod row;
pub mod types;
pub mod value;

pub use config::{
    ConnectionConfig, LivenessCheck, ResqlConfig, RetryPolicy, RetrySettings, CONFIG_FILE_NAME,
};
pub use error::{Error, ErrorKind, Result};
pub use row::{Params, Row};
pub use types::ConnectionId;
pub use value::Value;
