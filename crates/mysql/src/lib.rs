//! MySQL connection provider for resql
//!
//! - [`MySqlProvider`] / [`MySqlConnection`]: blocking handles over `mysql_async`
//! - [`classify`]: which server/client error codes are worth retrying
//! - [`convert`]: value and parameter conversion in both directions

#![warn(missing_docs)]

pub mod classify;
pub mod convert;
mod provider;

pub use classify::{classify_server_code, is_connection_lost_code};
pub use provider::{MySqlConnection, MySqlProvider};

use resql_core::{ResqlConfig, Result};
use resql_executor::ResilientExecutor;

/// A resilient executor over MySQL, built from a loaded config.
///
/// The connection is opened on first use.
pub fn executor(config: &ResqlConfig) -> Result<ResilientExecutor<MySqlProvider>> {
    ResilientExecutor::from_config(MySqlProvider::new()?, config)
}
