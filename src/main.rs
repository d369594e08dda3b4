use std::process::ExitCode;

use clap::Parser;

use backsync::config::load_config;
use backsync::lifecycle::{self, Shutdown};
use backsync::observability;
use backsync::reconciler::Reconciler;

#[derive(Parser)]
#[command(name = "backsync")]
#[command(about = "Keep a local HAProxy converged to service-discovery state", version)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    config: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config failures are the only non-zero exits; logging is not up yet.
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("backsync: cannot load {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    observability::logging::init(&config.log_level);
    tracing::info!(
        instance = %config.instance_id,
        services = config.services.len(),
        do_writes = config.haproxy.do_writes,
        do_reloads = config.haproxy.do_reloads,
        do_socket = config.haproxy.do_socket,
        "backsync starting"
    );

    if let Some(address) = &config.metrics_address {
        match address.parse() {
            Ok(address) => observability::metrics::init_metrics(address),
            Err(e) => {
                tracing::error!(address = %address, error = %e, "Invalid metrics address")
            }
        }
    }

    let shutdown = Shutdown::new();
    let reconciler = Reconciler::new(&config, &shutdown);

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        lifecycle::wait_for_signal(&signal_shutdown).await;
    });

    reconciler.run().await;

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
