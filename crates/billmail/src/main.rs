//! CLI entry point for billmail.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;

use billmail::config::{LogFormat, LoggingConfig};
use billmail::{build_orchestrator, load_config, run_invocation, InvocationSummary, Orchestrator};

#[derive(Parser)]
#[command(name = "billmail", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "BILLMAIL_CONFIG", default_value = "billmail.json", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the inbound listing once and print the summary
    Run,
    /// Run repeatedly until interrupted
    Watch {
        /// Seconds between the end of one run and the start of the next
        #[arg(long, default_value_t = 300)]
        interval: u64,
    },
    /// Validate the configuration file and exit
    CheckConfig,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let loaded = load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()));

    let config = match (loaded, &cli.command) {
        (Ok(config), _) => config,
        // `run` always answers with a summary, even when it cannot start.
        (Err(e), Commands::Run) => {
            let summary = InvocationSummary::failed(format!("{:#}", e));
            print_summary(&summary)?;
            return Ok(ExitCode::FAILURE);
        }
        (Err(e), _) => return Err(e),
    };

    if let Commands::CheckConfig = cli.command {
        println!("{}: OK", cli.config.display());
        return Ok(ExitCode::SUCCESS);
    }

    setup_logging(&config.logging)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;

    match cli.command {
        Commands::Run => {
            let summary = runtime.block_on(run_invocation(&config));
            print_summary(&summary)?;
            Ok(if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Watch { interval } => {
            let orchestrator = build_orchestrator(&config)?;
            runtime.block_on(watch(&orchestrator, Duration::from_secs(interval)))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckConfig => Ok(ExitCode::SUCCESS),
    }
}

/// Runs invocations back to back. Ctrl-C is honored between runs only.
async fn watch(orchestrator: &Orchestrator, interval: Duration) -> anyhow::Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("installing the Ctrl-C handler")?;

    info!("Watching every {}s, press Ctrl-C to stop", interval.as_secs());
    while !stop.load(Ordering::SeqCst) {
        let summary = orchestrator.run().await;
        if !summary.is_success() {
            warn!("Run failed: {}", summary.message);
        }
        print_summary(&summary)?;

        let mut waited = Duration::ZERO;
        while waited < interval && !stop.load(Ordering::SeqCst) {
            let step = Duration::from_secs(1).min(interval - waited);
            tokio::time::sleep(step).await;
            waited += step;
        }
    }
    info!("Stopped");
    Ok(())
}

fn print_summary(summary: &InvocationSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Set up tracing on stderr. `RUST_LOG` overrides the configured level and
/// `log` records are forwarded into tracing.
fn setup_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            ),
        ),
    }
    .context("installing the tracing subscriber")?;

    tracing_log::LogTracer::init().context("forwarding log records to tracing")?;
    Ok(())
}
