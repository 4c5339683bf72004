use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use pg_util::prelude::*;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run SQL or named query files against PostgreSQL")]
struct Args {
    /// Connection string or URL; falls back to `DATABASE_URL`, then the `PG*` variables.
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// Directory of `.sql` files addressable by name; falls back to `PG_UTIL_QUERY_DIR`.
    #[arg(long, global = true)]
    queries: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute literal SQL and print every row.
    Exec { sql: String, params: Vec<String> },
    /// Execute literal SQL and print the first row.
    One { sql: String, params: Vec<String> },
    /// Run a named query and print every row.
    Run { name: String, params: Vec<String> },
    /// Run a named query and print the first row.
    First { name: String, params: Vec<String> },
    /// List the named queries.
    List,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_max_level(level)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.sql_state() {
                Some(code) => eprintln!("error [{code}]: {err}"),
                None => eprintln!("error: {err}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), PgUtilError> {
    let env = DbConfig::from_env();
    let config = DbConfig::new(
        args.database_url.or(env.database_url),
        args.queries.or(env.query_dir),
    );
    tracing::debug!(query_dir = ?config.query_dir, "starting");

    let db = Db::from_config(&config)?;
    match args.command {
        Command::Exec { sql, params } => {
            print_rows(&db.execute(Implicit, &sql, &parse_params(params)).await?)
        }
        Command::One { sql, params } => {
            print_row(db.fetch_first(Implicit, &sql, &parse_params(params)).await?)
        }
        Command::Run { name, params } => {
            print_rows(&db.run(Implicit, &name, &parse_params(params)).await?)
        }
        Command::First { name, params } => {
            print_row(db.first(Implicit, &name, &parse_params(params)).await?)
        }
        Command::List => {
            let registry = db.registry().ok_or(PgUtilError::NoQueryRegistry)?;
            let mut out = io::stdout().lock();
            for name in registry.names() {
                writeln!(out, "{name}")?;
            }
            Ok(())
        }
    }
}

/// JSON scalars bind as typed values; anything that is not valid JSON binds as text.
fn parse_params(raw: Vec<String>) -> Vec<RowValues> {
    raw.into_iter()
        .map(|param| match serde_json::from_str(&param) {
            Ok(value) => RowValues::from_json(value),
            Err(_) => RowValues::Text(param),
        })
        .collect()
}

fn print_rows(rows: &RowSet) -> Result<(), PgUtilError> {
    let mut out = io::stdout().lock();
    for row in rows {
        writeln!(out, "{}", row.to_json())?;
    }
    Ok(())
}

fn print_row(row: Option<Row>) -> Result<(), PgUtilError> {
    match row {
        Some(row) => Ok(writeln!(io::stdout(), "{}", row.to_json())?),
        None => Ok(()),
    }
}
