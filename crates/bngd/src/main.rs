//! BNG control-plane daemon
//!
//! Main entry point for bngd.
//! Mirrors the kernel routing table and serves subscriber profiles until
//! SIGINT/SIGTERM.

use bngd::config::DEFAULT_CONFIG_PATH;
use bngd::{
    BngControl, BngError, BngdConfig, Classifier, NetlinkRouteSource, ProfileCacheKind, Result,
    RouteSync, StaticProfileDb,
};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "bngd", version, about = "BNG control-plane daemon")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Send only ARP and ICMP/ICMPv6 to the special path
    #[arg(long)]
    control_only: bool,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_logging()?;

    info!("bngd: Starting BNG control-plane daemon");

    match run_daemon(args).await {
        Ok(()) => {
            info!("bngd: Daemon exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "bngd: Daemon exiting with error");
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}

/// Initialize structured logging, honoring `RUST_LOG`
fn init_logging() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| BngError::Config(format!("Failed to set logger: {}", e)))?;

    Ok(())
}

async fn run_daemon(args: Args) -> Result<()> {
    let mut config = BngdConfig::load_or_default(&args.config)?;
    if args.control_only {
        config.classifier.control_only = true;
    }
    config.validate()?;
    info!(
        config = %args.config.display(),
        cache_mode = ?config.profile.cache_mode,
        control_only = config.classifier.control_only,
        "bngd: Configuration loaded"
    );

    // A failed initial listing or subscription aborts startup.
    let sync = RouteSync::initialize(NetlinkRouteSource::new(), config.route_sync_options()).await?;
    let routes = sync.table();
    let handle = sync.spawn().await?;
    info!("bngd: Listening to route events...");

    let backend = StaticProfileDb::from_records(
        config.profile.max_device_scopes,
        config.profile.static_profiles.iter().cloned(),
    )?;
    let profiles = ProfileCacheKind::new(
        config.profile.cache_mode,
        backend,
        config.profile.max_device_scopes,
    );
    let control = BngControl::new(Classifier::new(config.classifier.control_only), routes, profiles);
    info!(
        routes = control.routes().len(),
        mode = ?control.profiles().mode(),
        "bngd: Control plane ready"
    );

    let shutdown = async {
        signal::ctrl_c().await?;
        info!("bngd: Received SIGINT/SIGTERM");
        Ok::<(), std::io::Error>(())
    };
    handle.run_until(shutdown).await?;

    info!("bngd: Graceful shutdown complete");
    Ok(())
}
