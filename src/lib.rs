//! resql - retrying, reconnecting statement execution for MySQL
//!
//! Wraps a single database connection in a [`ResilientExecutor`] that retries
//! transient failures with exponential backoff and replaces dropped
//! connections between attempts. Terminal errors surface immediately.
//!
//! # Quick Start
//!
//! ```ignore
//! use resql::{Params, ResqlConfig};
//!
//! let config = ResqlConfig::from_file("resql.toml".as_ref())?;
//! let mut executor = resql::mysql::executor(&config)?;
//!
//! let rows = executor.execute(
//!     "SELECT id, total FROM orders WHERE customer_id = ?",
//!     &Params::Positional(vec![42i64.into()]),
//! )?;
//! ```
//!
//! # Crates
//!
//! - `resql-core`: values, rows, errors, retry policy and config
//! - `resql-executor`: the retry loop and the provider/connection seam
//! - `resql-mysql`: the MySQL provider (feature `mysql`, on by default)

pub use resql_core::*;
pub use resql_executor::{
    AttemptOutcome, Connection, ConnectionProvider, ExecutorStats, ResilientExecutor, Sleeper,
    ThreadSleeper,
};

/// MySQL provider
#[cfg(feature = "mysql")]
pub use resql_mysql as mysql;
