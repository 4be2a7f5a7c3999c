//! `sqlgate` command line interface
//!
//! Classifies, translates, authorizes and runs queries through the same
//! registry and guard the library uses.

mod output;

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use sqlgate_core::{
    AbstractExpression, ConnectionDescriptor, ConnectionMetadata, DriverRegistry, GateConfig,
    GateError, Query, QueryPlan, SecurityGuard, Translator, classify, classify_with,
    humanize_connection_error,
};
use sqlgate_drivers::{DriverCatalog, registry_from_config};
use sqlgate_query::{DriverConnectionSource, ExecutionAdapter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlgate")]
#[command(about = "Dialect translation and statement safety checks for SQL backends")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "SQLGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered drivers and their capabilities
    Drivers,

    /// Split SQL into statements and classify each one
    Classify {
        /// SQL text, `@file` to read a file, or `-` for stdin
        sql: String,

        /// Parse with this driver's dialect
        #[arg(long)]
        driver: Option<String>,
    },

    /// Translate a JSON query plan into dialect SQL
    Translate {
        /// JSON text, `@file` to read a file, or `-` for stdin
        input: String,

        #[arg(long)]
        driver: String,

        /// Input is a single expression instead of a query plan
        #[arg(long)]
        expression: bool,
    },

    /// Check whether a native query would be allowed
    Authorize {
        /// SQL text, `@file` to read a file, or `-` for stdin
        sql: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Authorize and execute a query
    Run {
        /// SQL text (or a JSON plan with --plan), `@file`, or `-` for stdin
        input: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Input is a JSON query plan
        #[arg(long)]
        plan: bool,
    },
}

#[derive(Args)]
struct TargetArgs {
    #[arg(long)]
    driver: String,

    /// Connection string, e.g. `file:/data/db;USER=reader`
    #[arg(long)]
    connection: String,

    /// Authenticated user, overriding the connection string's USER
    #[arg(long)]
    user: Option<String>,
}

impl TargetArgs {
    fn metadata(&self) -> anyhow::Result<ConnectionMetadata> {
        let descriptor = ConnectionDescriptor::decode(&self.connection)?;
        let metadata = ConnectionMetadata::new(self.driver.clone(), descriptor);
        Ok(match &self.user {
            Some(user) => metadata.with_user(user.clone()),
            None => metadata,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => GateConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => GateConfig::default(),
    };
    tracing::debug!(config = ?cli.config, "configuration loaded");
    let registry = Arc::new(registry_from_config(&config)?);

    match cli.command {
        Commands::Drivers => {
            println!("{}", output::drivers(&registry));
        }

        Commands::Classify { sql, driver } => {
            let sql = read_input(&sql)?;
            let parser = match driver {
                Some(id) => registry.resolve(&id)?.parser(),
                None => None,
            };
            let classifications = match parser {
                Some(parser) => classify_with(parser.as_ref(), &sql),
                None => classify(&sql),
            };
            println!("{}", output::classifications(&sql, &classifications));
        }

        Commands::Translate {
            input,
            driver,
            expression,
        } => {
            let input = read_input(&input)?;
            let handle = registry.resolve(&driver)?;
            let options = config.translate_options()?;
            let statement = if expression {
                let expr: AbstractExpression =
                    serde_json::from_str(&input).context("invalid expression JSON")?;
                Translator::new(handle, options).compile(&expr)?
            } else {
                let plan: QueryPlan = serde_json::from_str(&input).context("invalid plan JSON")?;
                Query::Plan(plan).compile(handle, &options)?
            };
            println!("{}", serde_json::to_string_pretty(&statement)?);
        }

        Commands::Authorize { sql, target } => {
            let query = Query::native(read_input(&sql)?);
            let guard = SecurityGuard::new(Arc::clone(&registry), config.policy_set());
            let decision = guard.authorize(&query, &target.metadata()?)?;
            match decision.reason {
                Some(reason) if !decision.allowed => {
                    tracing::warn!(driver = %target.driver, reason = %reason, "query denied");
                    println!("denied: {}", reason);
                    return Ok(ExitCode::FAILURE);
                }
                _ => println!("allowed"),
            }
        }

        Commands::Run {
            input,
            target,
            plan,
        } => {
            let input = read_input(&input)?;
            let query = if plan {
                Query::Plan(serde_json::from_str(&input).context("invalid plan JSON")?)
            } else {
                Query::native(input)
            };
            run(&config, registry, &target, &query).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run(
    config: &GateConfig,
    registry: Arc<DriverRegistry>,
    target: &TargetArgs,
    query: &Query,
) -> anyhow::Result<()> {
    let source = Arc::new(DriverConnectionSource::new(
        DriverCatalog::with_defaults(),
        Arc::clone(&registry),
    ));
    let adapter = ExecutionAdapter::from_config(config, Arc::clone(&registry), source)?;

    match adapter.execute(&target.driver, query, &target.metadata()?).await {
        Ok(result) => {
            tracing::info!(
                driver = %target.driver,
                rows = result.row_count(),
                execution_time_ms = result.execution_time_ms,
                "query completed"
            );
            println!("{}", output::query_result(&result));
            eprintln!(
                "{} row(s) in {} ms",
                result.row_count(),
                result.execution_time_ms
            );
            Ok(())
        }
        Err(GateError::Connection(message)) => {
            tracing::error!(driver = %target.driver, error = %message, "connection failed");
            let humanized = humanize_connection_error(registry.resolve(&target.driver)?, &message);
            bail!("{} [{}]", humanized.message, humanized.kind)
        }
        Err(e) => {
            tracing::error!(driver = %target.driver, error = %e, "query failed");
            Err(e.into())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(arg: &str) -> anyhow::Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    if let Some(path) = arg.strip_prefix('@') {
        return std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path));
    }
    Ok(arg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_target() {
        let cli = Cli::try_parse_from([
            "sqlgate",
            "-vv",
            "run",
            "SELECT 1",
            "--driver",
            "h2",
            "--connection",
            "file:/data/db;USER=sa",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run { target, plan, .. } = cli.command else {
            panic!("expected run");
        };
        assert!(!plan);
        let metadata = target.metadata().unwrap();
        assert_eq!(metadata.resolved_user(), "sa");
    }

    fn memory_target() -> TargetArgs {
        TargetArgs {
            driver: "sqlite".into(),
            connection: ":memory:".into(),
            user: None,
        }
    }

    #[tokio::test]
    async fn test_run_reports_query_and_denial_errors() {
        let config = GateConfig::default();
        let registry = Arc::new(registry_from_config(&config).unwrap());

        run(&config, Arc::clone(&registry), &memory_target(), &Query::native("SELECT 1"))
            .await
            .unwrap();

        let err = run(
            &config,
            Arc::clone(&registry),
            &memory_target(),
            &Query::native("SELECT * FROM missing_table"),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("missing_table"), "{err}");

        let err = run(&config, registry, &memory_target(), &Query::native("DROP TABLE t"))
            .await
            .unwrap_err();
        let gate_error = err.downcast_ref::<GateError>().unwrap();
        assert!(gate_error.security_violation().is_some());
    }

    #[test]
    fn test_read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.sql");
        std::fs::write(&path, "SELECT 2").unwrap();
        let arg = format!("@{}", path.display());
        assert_eq!(read_input(&arg).unwrap(), "SELECT 2");
        assert_eq!(read_input("SELECT 3").unwrap(), "SELECT 3");
    }
}
