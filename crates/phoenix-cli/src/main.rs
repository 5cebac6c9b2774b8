//! phoenix-init binary

use anyhow::Context;
use clap::{Parser, ValueEnum};
use phoenix_catalog::{Connector, InMemoryCatalogService};
use phoenix_common::{ConnectionConfig, Scheme};
use phoenix_initializer::{
    phoenix_plan, ConsoleReporter, Initializer, Reporter, RunReport, StatementPlan,
    TracingReporter,
};
use phoenix_trino::TrinoConnector;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const EXIT_RUN_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One status line per step
    Text,
    /// Final run report as JSON
    Json,
}

/// Connection flags override TRINO_* environment variables, which override
/// the config file, which overrides the defaults.
#[derive(Parser, Debug)]
#[command(name = "phoenix-init")]
#[command(version)]
#[command(about = "Create the phoenix schema and tables in a Trino catalog")]
struct Args {
    /// Coordinator scheme [env: TRINO_SCHEME] [default: http]
    #[arg(long, value_enum)]
    scheme: Option<Scheme>,

    /// Coordinator host [env: TRINO_HOST] [default: localhost]
    #[arg(long)]
    host: Option<String>,

    /// Coordinator port [env: TRINO_PORT] [default: 8080]
    #[arg(long)]
    port: Option<u16>,

    /// Principal to connect as [env: TRINO_USER] [default: admin]
    #[arg(long)]
    user: Option<String>,

    /// Password for basic authentication [env: TRINO_PASSWORD] [default: none]
    #[arg(long)]
    password: Option<String>,

    /// Target catalog [env: TRINO_CATALOG] [default: iceberg]
    #[arg(long)]
    catalog: Option<String>,

    /// TOML file with connection settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// TOML file with `[[statement]]` entries to apply instead of the phoenix schema
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Apply against an in-memory catalog instead of the coordinator
    #[arg(long)]
    dry_run: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Allow sending the password over plain http
    #[arg(long)]
    allow_insecure_credential: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

fn resolve_config<F>(args: &Args, lookup: F) -> anyhow::Result<ConnectionConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match &args.config {
        Some(path) => ConnectionConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConnectionConfig::default(),
    };
    let mut config = base.resolve_with(lookup)?;

    if let Some(scheme) = args.scheme {
        config.scheme = scheme;
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(user) = &args.user {
        config.user = user.clone();
    }
    if let Some(password) = &args.password {
        config.credential = password.clone();
    }
    if let Some(catalog) = &args.catalog {
        config.catalog = catalog.clone();
    }
    if args.allow_insecure_credential {
        config.allow_insecure_credential = true;
    }

    config.validate()?;
    Ok(config)
}

fn load_plan(args: &Args, config: &ConnectionConfig) -> anyhow::Result<StatementPlan> {
    let plan = match &args.plan {
        Some(path) => StatementPlan::load_from_file(path)
            .with_context(|| format!("loading plan {}", path.display()))?,
        None => phoenix_plan(&config.catalog)?,
    };
    Ok(plan)
}

/// Handle the `count`th interrupt: the first asks the run to stop at the next
/// step boundary, the second forces an exit with the returned code.
fn on_interrupt(count: u32, cancel: &tokio::sync::watch::Sender<bool>) -> Option<u8> {
    if count == 1 {
        tracing::warn!("Interrupted, stopping after the current step (interrupt again to abort)");
        cancel.send_replace(true);
        None
    } else {
        tracing::error!("Interrupted twice, aborting");
        Some(EXIT_INTERRUPTED)
    }
}

fn exit_status(report: &RunReport) -> u8 {
    if report.is_success() {
        0
    } else {
        EXIT_RUN_FAILED
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let prepared = resolve_config(&args, |key| std::env::var(key).ok())
        .and_then(|config| load_plan(&args, &config).map(|plan| (config, plan)));
    let (config, plan) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let connector: Arc<dyn Connector> = if args.dry_run {
        tracing::info!("Dry run: applying against an in-memory '{}' catalog", config.catalog);
        Arc::new(InMemoryCatalogService::with_catalogs([config.catalog.as_str()]))
    } else {
        Arc::new(TrinoConnector::new().with_timeout(Duration::from_secs(args.timeout_secs)))
    };
    let reporter: Arc<dyn Reporter> = match args.format {
        OutputFormat::Text => Arc::new(ConsoleReporter),
        OutputFormat::Json => Arc::new(TracingReporter),
    };

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let mut interrupts = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupts += 1;
            if let Some(code) = on_interrupt(interrupts, &cancel_tx) {
                std::process::exit(code.into());
            }
        }
    });

    let report = Initializer::new(connector, plan)
        .with_reporter(reporter)
        .with_cancellation(cancel_rx)
        .run(&config)
        .await;

    if args.format == OutputFormat::Json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!("Failed to render report: {}", e),
        }
    }
    ExitCode::from(exit_status(&report))
}
