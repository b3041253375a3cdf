//! ArgMatches → CliAction conversion.

use std::path::PathBuf;

use clap::ArgMatches;
use resql_core::Value;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    /// Connectivity smoke test
    Ping,
    /// List base tables
    Tables,
    /// Describe one table
    Describe { table: String },
    /// Run a statement
    Query { sql: String, params: Vec<Value> },
    /// Write the default config file
    InitConfig { path: PathBuf },
}

/// Convert parsed clap matches into a [`CliAction`].
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    match matches.subcommand() {
        Some(("ping", _)) => Ok(CliAction::Ping),
        Some(("tables", _)) => Ok(CliAction::Tables),
        Some(("describe", sub)) => {
            let table = required(sub, "table")?;
            if table.trim().is_empty() {
                return Err("table name must not be empty".to_string());
            }
            Ok(CliAction::Describe { table })
        }
        Some(("query", sub)) => Ok(CliAction::Query {
            sql: required(sub, "sql")?,
            params: sub
                .get_many::<String>("param")
                .map(|values| values.map(|v| parse_param(v)).collect())
                .unwrap_or_default(),
        }),
        Some(("init-config", sub)) => Ok(CliAction::InitConfig {
            path: PathBuf::from(required(sub, "path")?),
        }),
        Some((other, _)) => Err(format!("unknown command '{}'", other)),
        None => Err("no command given".to_string()),
    }
}

fn required(matches: &ArgMatches, name: &str) -> Result<String, String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .ok_or_else(|| format!("missing argument <{}>", name))
}

/// Parse a bind value: integers and floats become numbers, `NULL` becomes
/// SQL NULL, anything else is a string.
pub fn parse_param(raw: &str) -> Value {
    if raw == "NULL" {
        Value::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            Value::Float(f)
        } else {
            Value::String(raw.to_string())
        }
    } else {
        Value::String(raw.to_string())
    }
}
