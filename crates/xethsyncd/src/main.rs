//! xeth Synchronization Daemon
//!
//! Main entry point for xethsyncd.
//! Replays driver message captures into the device registry and reports the
//! resulting lifecycle notes.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal;
use tracing::{error, info};
use xeth::{MetricsCollector, Reconciler};
use xeth_syncd::{DEFAULT_CONFIG_PATH, LoggingConfig, Result, SyncdConfig, SyncdError, XethSync};

/// xeth device state synchronizer
#[derive(Parser, Debug)]
#[command(name = "xethsyncd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Capture to replay; repeat for several, overrides the file
    #[arg(short = 's', long = "source")]
    sources: Vec<PathBuf>,

    /// Print registry and namespace index as JSON on exit
    #[arg(long)]
    dump: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("xethsyncd: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("xethsyncd: {}", e);
        return ExitCode::FAILURE;
    }

    info!("xethsyncd: starting");
    match run_daemon(&config, args.dump).await {
        Ok(()) => {
            info!("xethsyncd: exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "xethsyncd: fatal");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<SyncdConfig> {
    let mut config = SyncdConfig::load_or_default(&args.config)?;
    if !args.sources.is_empty() {
        config.transport.sources = args.sources.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Install the tracing subscriber; RUST_LOG overrides the configured level
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let result = if logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true).json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };
    result.map_err(|e| SyncdError::Logging(e.to_string()))
}

async fn run_daemon(config: &SyncdConfig, dump: bool) -> Result<()> {
    let metrics = MetricsCollector::new()?;
    let engine = Arc::new(Reconciler::with_metrics(metrics.clone()));
    let sync = XethSync::new(engine);

    setup_signal_handlers(sync.shutdown_flag());

    info!(sources = config.transport.sources.len(), "replaying sources");
    let stats = sync.run(&config.transport.sources).await?;
    info!(
        messages = stats.messages,
        notes = stats.notes,
        decode_errors = stats.decode_errors,
        links = sync.engine().links().len(),
        dump_done = sync.engine().dump_done(),
        "replay complete"
    );

    if dump {
        println!("{}", sync.dump_json()?);
    }
    if config.metrics.dump_on_exit {
        print!("{}", metrics.gather_metrics());
    }
    Ok(())
}

/// Set `shutdown` on SIGINT
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("xethsyncd: received SIGINT");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_sources_override_config() {
        let args = Args::parse_from([
            "xethsyncd",
            "--config",
            "/nonexistent/xethsyncd.toml",
            "--source",
            "/tmp/a.bin",
            "-s",
            "/tmp/b.bin",
            "--dump",
        ]);
        assert!(args.dump);
        let config = load_config(&args).unwrap();
        assert_eq!(
            config.transport.sources,
            vec![PathBuf::from("/tmp/a.bin"), PathBuf::from("/tmp/b.bin")]
        );
    }

    #[test]
    fn test_cli_defaults() {
        let args = Args::parse_from(["xethsyncd"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(args.sources.is_empty());
        assert!(!args.dump);
    }
}
