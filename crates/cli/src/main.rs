//! resql CLI: connectivity smoke test and schema probe for MySQL.
//!
//! Every database command goes through the resilient executor, so transient
//! failures are retried and dropped connections reopened according to the
//! `[retry]` section of the config. `--verbose` shows each attempt.

mod commands;
mod format;
mod parse;
mod probe;

use std::path::{Path, PathBuf};
use std::process;

use resql_core::{Error, ResqlConfig, Result, CONFIG_FILE_NAME};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{format_error, format_rows, OutputMode};
use parse::{matches_to_action, CliAction};

fn main() {
    let matches = build_cli().get_matches();

    init_logging(matches.get_flag("verbose"));

    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(1);
        }
    };

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let exit_code = match run(&action, config_path.as_deref(), mode) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            1
        }
    };
    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("resql=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(action: &CliAction, config_path: Option<&Path>, mode: OutputMode) -> Result<()> {
    if let CliAction::InitConfig { path } = action {
        return init_config(path);
    }

    let config = load_config(config_path)?;
    debug!(
        target: "resql::cli",
        target_db = %config.connection.display_target(),
        max_attempts = config.retry.max_attempts,
        "Loaded configuration"
    );

    let mut executor = resql_mysql::executor(&config)?;
    let rows = probe::run(&mut executor, action)?;
    executor.close();

    let stats = executor.stats();
    debug!(
        target: "resql::cli",
        attempts = stats.attempts,
        retries = stats.retries,
        reconnects = stats.reconnects,
        target_db = %executor.connection_config().display_target(),
        "Done"
    );

    println!("{}", format_rows(&rows, mode));
    Ok(())
}

/// Explicit `--config`, else `./resql.toml` if present, else defaults; then
/// the `DB_*` environment overlay.
fn load_config(explicit: Option<&Path>) -> Result<ResqlConfig> {
    let mut config = match explicit {
        Some(path) => ResqlConfig::from_file(path)?,
        None => {
            let local = Path::new(CONFIG_FILE_NAME);
            if local.is_file() {
                ResqlConfig::from_file(local)?
            } else {
                ResqlConfig::default()
            }
        }
    };
    config.apply_env(std::env::vars())?;
    config.validate()?;
    Ok(config)
}

fn init_config(path: &Path) -> Result<()> {
    if ResqlConfig::write_default_if_missing(path)? {
        println!("Wrote {}", path.display());
        Ok(())
    } else {
        Err(Error::config(format!(
            "{} already exists; not overwriting",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_config_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resql.toml");

        init_config(&path).unwrap();
        assert!(path.is_file());
        assert!(ResqlConfig::from_file(&path).is_ok());

        let err = init_config(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[connection]\nhost = \"db.internal\"\nport = 3307\n\n[retry]\nmax_attempts = 5\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        // DB_* variables in the test environment may override the file
        if std::env::var("DB_HOST").is_err() {
            assert_eq!(config.connection.host, "db.internal");
        }
        if std::env::var("DB_MAX_ATTEMPTS").is_err() {
            assert_eq!(config.retry.max_attempts, 5);
        }
    }

    #[test]
    fn test_load_missing_explicit_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
