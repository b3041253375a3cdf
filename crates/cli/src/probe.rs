//! Schema probes run through the resilient executor.

use resql_core::{Error, Params, Result, Row, Value};
use resql_executor::{ConnectionProvider, ResilientExecutor, Sleeper};

use crate::parse::CliAction;

pub(crate) const PING_SQL: &str = "SELECT 1 AS ok, VERSION() AS version, DATABASE() AS db";

pub(crate) const TABLES_SQL: &str = "SELECT table_name AS name, table_rows AS approx_rows, engine \
     FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

pub(crate) const DESCRIBE_SQL: &str = "SELECT column_name AS name, column_type AS type, \
     is_nullable AS nullable, column_key AS `key`, column_default AS `default` \
     FROM information_schema.columns \
     WHERE table_schema = DATABASE() AND table_name = ? \
     ORDER BY ordinal_position";

/// Run a database-backed action and return its rows.
///
/// `InitConfig` does not touch the database and is rejected here.
pub fn run<P, S>(executor: &mut ResilientExecutor<P, S>, action: &CliAction) -> Result<Vec<Row>>
where
    P: ConnectionProvider,
    S: Sleeper,
{
    match action {
        CliAction::Ping => ping(executor).map(|row| vec![row]),
        CliAction::Tables => executor.query(TABLES_SQL),
        CliAction::Describe { table } => describe(executor, table),
        CliAction::Query { sql, params } => {
            executor.execute(sql, &Params::from(params.clone()))
        }
        CliAction::InitConfig { .. } => Err(Error::invalid_input(
            "init-config does not run against the database",
        )),
    }
}

fn ping<P: ConnectionProvider, S: Sleeper>(executor: &mut ResilientExecutor<P, S>) -> Result<Row> {
    executor
        .execute_first(PING_SQL, &Params::Empty)?
        .ok_or_else(|| Error::terminal("ping returned no rows"))
}

fn describe<P: ConnectionProvider, S: Sleeper>(
    executor: &mut ResilientExecutor<P, S>,
    table: &str,
) -> Result<Vec<Row>> {
    if table.trim().is_empty() {
        return Err(Error::invalid_input("table name must not be empty"));
    }
    let rows = executor.execute(DESCRIBE_SQL, &Params::Positional(vec![Value::from(table)]))?;
    if rows.is_empty() {
        return Err(Error::invalid_input(format!(
            "table '{}' not found in the current database",
            table
        )));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resql_core::{ConnectionConfig, RetryPolicy};
    use resql_executor::testing::{RecordingSleeper, ScriptedProvider, Step};
    use std::time::Duration;

    fn executor(
        provider: &ScriptedProvider,
    ) -> (ResilientExecutor<ScriptedProvider, RecordingSleeper>, RecordingSleeper) {
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(10));
        let executor = ResilientExecutor::lazy(provider.clone(), ConnectionConfig::default(), policy)
            .unwrap()
            .with_sleeper(sleeper.clone());
        (executor, sleeper)
    }

    #[test]
    fn test_ping_survives_a_dropped_connection() {
        let provider = ScriptedProvider::new();
        provider.push(Step::dropped("server has gone away"));
        provider.push(Step::rows(vec![Row::new()
            .with("ok", 1i64)
            .with("version", "8.0.36")
            .with("db", "analytics")]));
        let (mut exec, sleeper) = executor(&provider);

        let rows = run(&mut exec, &CliAction::Ping).unwrap();
        assert_eq!(rows[0].get("version"), Some(&Value::from("8.0.36")));
        assert_eq!(provider.connect_calls(), 2);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(10)]);
    }

    #[test]
    fn test_ping_without_rows_is_error() {
        let provider = ScriptedProvider::new();
        provider.push(Step::rows(vec![]));
        let (mut exec, _) = executor(&provider);
        assert!(run(&mut exec, &CliAction::Ping).is_err());
    }

    #[test]
    fn test_describe_binds_table_name() {
        let provider = ScriptedProvider::new();
        provider.push(Step::rows(vec![Row::new().with("name", "id").with("type", "int")]));
        let (mut exec, _) = executor(&provider);

        let action = CliAction::Describe {
            table: "orders".to_string(),
        };
        assert_eq!(run(&mut exec, &action).unwrap().len(), 1);

        let statements = provider.statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].sql, DESCRIBE_SQL);
        assert_eq!(
            statements[0].params,
            Params::Positional(vec![Value::from("orders")])
        );
    }

    #[test]
    fn test_describe_unknown_table() {
        let provider = ScriptedProvider::new();
        provider.push(Step::rows(vec![]));
        let (mut exec, _) = executor(&provider);
        let err = run(
            &mut exec,
            &CliAction::Describe {
                table: "missing".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn test_describe_empty_name_never_reaches_server() {
        let provider = ScriptedProvider::new();
        let (mut exec, _) = executor(&provider);
        let action = CliAction::Describe {
            table: "  ".to_string(),
        };
        assert!(run(&mut exec, &action).is_err());
        assert_eq!(provider.connect_calls(), 0);
    }

    #[test]
    fn test_query_passes_params_through() {
        let provider = ScriptedProvider::new();
        provider.push(Step::rows(vec![Row::new().with("n", 2i64)]));
        let (mut exec, _) = executor(&provider);

        let action = CliAction::Query {
            sql: "SELECT ? + 1 AS n".to_string(),
            params: vec![Value::Int(1)],
        };
        run(&mut exec, &action).unwrap();
        assert_eq!(
            provider.statements()[0].params,
            Params::Positional(vec![Value::Int(1)])
        );
    }

    #[test]
    fn test_query_terminal_error_is_not_retried() {
        let provider = ScriptedProvider::new();
        provider.push(Step::terminal("syntax error"));
        let (mut exec, sleeper) = executor(&provider);
        let action = CliAction::Query {
            sql: "SELEC 1".to_string(),
            params: vec![],
        };
        assert!(!run(&mut exec, &action).unwrap_err().is_transient());
        assert_eq!(sleeper.count(), 0);
    }
}
