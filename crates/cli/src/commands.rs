//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("resql")
        .about("MySQL connectivity smoke test and schema probe with retry and reconnect")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Config file (default: ./resql.toml if present)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log every attempt, reconnect and backoff")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("ping")
                .about("Connect, run SELECT 1, and report the server version"),
        )
        .subcommand(
            Command::new("tables")
                .about("List base tables in the current database with approximate row counts"),
        )
        .subcommand(
            Command::new("describe")
                .about("List the columns of a table")
                .arg(Arg::new("table").required(true).help("Table name")),
        )
        .subcommand(
            Command::new("query")
                .about("Run a statement and print its rows")
                .arg(Arg::new("sql").required(true).help("SQL statement"))
                .arg(
                    Arg::new("param")
                        .long("param")
                        .short('p')
                        .action(ArgAction::Append)
                        .help("Positional bind value for a ? placeholder (repeatable)"),
                ),
        )
        .subcommand(
            Command::new("init-config")
                .about("Write a commented default config file if it does not exist")
                .arg(
                    Arg::new("path")
                        .default_value(resql_core::CONFIG_FILE_NAME)
                        .help("Where to write the file"),
                ),
        )
}
