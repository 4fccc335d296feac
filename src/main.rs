// Main entrypoint for the cassgate gateway.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cassgate::app::App;
use cassgate::config::{Config, ConfigTrait, DEFAULT_PROBE_TIMEOUT};
use cassgate::liveness;
use cassgate::shutdown::GracefulShutdown;

const CONFIG_PATH: &str = "cfg/cassgate.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/cassgate.cfg.local.yaml";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// cassgate - Cassandra-compatible gateway with node resource governance
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then falls back to default config.
fn load_cfg(path: Option<PathBuf>) -> Result<(Config, String)> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        return Ok((cfg, custom_path.display().to_string()));
    }

    match Config::load(CONFIG_PATH_LOCAL) {
        Ok(cfg) => Ok((cfg, CONFIG_PATH_LOCAL.to_string())),
        Err(_) => {
            let cfg = Config::load(CONFIG_PATH)
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            Ok((cfg, CONFIG_PATH.to_string()))
        }
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_deref())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The recorder must be installed before the runtime starts.
    if let Err(e) = cassgate::metrics::init_metrics() {
        eprintln!("Warning: {:#}; metrics endpoint will not be available", e);
    }

    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let (cfg, cfg_path) = load_cfg(args.cfg)?;
    configure_logger(&cfg);
    info!(
        component = "config",
        event = "load_success",
        path = %cfg_path,
        "config loaded"
    );
    info!(
        component = "main",
        event = "num_cpus_configured",
        num_cpus = num_cpus::get(),
        "available cores"
    );

    let graceful_shutdown = GracefulShutdown::new(shutdown_token.clone()).with_timeout(SHUTDOWN_TIMEOUT);

    let probe_timeout = cfg
        .k8s()
        .and_then(|k8s| k8s.probe.timeout)
        .unwrap_or(DEFAULT_PROBE_TIMEOUT);
    let probe = Arc::new(liveness::Probe::new(probe_timeout));

    let app = App::new(shutdown_token.clone(), cfg, probe).await?;
    if let Err(e) = app.serve(&graceful_shutdown).await {
        error!(
            component = "main",
            scope = "app",
            event = "start_failed",
            error = %e,
            "failed to start app"
        );
        app.close();
        return Err(e);
    }

    let result = graceful_shutdown.await_shutdown().await;
    app.close();
    if let Err(ref e) = result {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
    }
    result
}
