//! cloudsurvey binary entry point.
//!
//! Loads the configuration, runs every source once and writes line protocol
//! to stdout or a file. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use cloudsurvey::config::{DEFAULT_CONFIG_PATH, parse_timeout};
use cloudsurvey::{AppConfig, PluginKind, PluginRegistry, Runner};
use tokio::io::{AsyncWrite, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// cloudsurvey - collect cloud metrics as line protocol
#[derive(Parser, Debug)]
#[command(name = "cloudsurvey", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "CLOUDSURVEY_CONFIG")]
    config: PathBuf,

    /// Enable debug logging on stderr
    #[arg(short, long, env = "CLOUDSURVEY_VERBOSE")]
    verbose: bool,

    /// Write metrics to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Whole-run deadline, e.g. `30s` or `5m` (overrides config file)
    #[arg(long, value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// List registered plugins and exit
    #[arg(long)]
    list_plugins: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,cloudsurvey=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let registry = PluginRegistry::builtin();
    if cli.list_plugins {
        for kind in [PluginKind::Credentials, PluginKind::Source] {
            for name in registry.names(kind) {
                println!("{kind}\t{name}");
            }
        }
        return ExitCode::SUCCESS;
    }

    match run(cli, &registry).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "cloudsurvey failed");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every source succeeded.
async fn run(cli: Cli, registry: &PluginRegistry) -> Result<bool, Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cloudsurvey starting");
    tracing::info!(config = %cli.config.display(), "Loading configuration");
    let config = AppConfig::load(&cli.config)?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(
        cancel.clone(),
        cli.timeout.or(config.runtime.timeout),
    ));

    let start = Instant::now();
    let runner = Runner::build(registry, &config.declarations()?, &cancel).await?;
    let options = config.run_options(cancel);

    let report = match &cli.output {
        Some(path) => {
            let file = tokio::fs::File::create(path).await?;
            run_into(runner, options, file).await?
        }
        None => run_into(runner, options, tokio::io::stdout()).await?,
    };

    for outcome in report.failures() {
        match &outcome.error {
            Some(error) => tracing::warn!(source = %outcome.name, error = %error, rejected = outcome.rejected, "Source did not succeed"),
            None => tracing::warn!(source = %outcome.name, rejected = outcome.rejected, "Source had rejected data"),
        }
    }
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        written = report.written(),
        "Run finished"
    );
    Ok(report.is_success())
}

async fn run_into<W>(
    runner: Runner,
    options: cloudsurvey::RunOptions,
    sink: W,
) -> Result<cloudsurvey::RunReport, cloudsurvey::RunError>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = BufWriter::new(sink);
    runner.run(options, &mut sink).await
}

/// Cancel the run on Ctrl+C, SIGTERM or when the deadline elapses.
async fn shutdown_signal(cancel: CancellationToken, deadline: Option<Duration>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let timeout = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, cancelling run");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, cancelling run");
        }
        _ = timeout => {
            tracing::warn!(timeout = ?deadline, "Run timeout elapsed, cancelling run");
        }
        _ = cancel.cancelled() => return,
    }
    cancel.cancel();
}
