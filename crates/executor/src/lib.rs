//! # resql executor
//!
//! Runs SQL over a possibly flaky connection, hiding transient failures from
//! the caller up to a bound and surfacing exactly one terminal error when the
//! bound is reached.
//!
//! - [`ResilientExecutor`] - the retry/reconnect loop
//! - [`Connection`] / [`ConnectionProvider`] - the seams a driver implements
//! - [`Sleeper`] - how the loop waits between attempts
//!
//! ## Quick Start
//!
//! ```text
//! use resql_executor::ResilientExecutor;
//! use resql_core::{ConnectionConfig, RetryPolicy};
//!
//! let mut executor = ResilientExecutor::lazy(provider, ConnectionConfig::default(), RetryPolicy::default())?;
//! let rows = executor.query("SELECT 1 AS ok")?;
//! ```

#![warn(missing_docs)]

mod backoff;
mod connection;
mod executor;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backoff::{Sleeper, ThreadSleeper};
pub use connection::{Connection, ConnectionProvider};
pub use executor::{AttemptOutcome, ExecutorStats, ResilientExecutor};
