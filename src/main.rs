use std::path::PathBuf;

use clap::Parser;

use api_gateway::config::load_config;
use api_gateway::lifecycle;
use api_gateway::observability;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Rate-limiting, caching HTTP API gateway", long_about = None)]
struct Cli {
    /// TOML configuration file. Without one the built-in route table is used.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration, print the route table and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if cli.check {
        for route in &config.routes {
            println!(
                "{:<12} {:<24} -> {} (cache: {})",
                route.name,
                route.path_prefix,
                route.backend,
                route
                    .cache_ttl_secs
                    .map(|s| format!("{s}s"))
                    .unwrap_or_else(|| "off".to_string()),
            );
        }
        return Ok(());
    }

    observability::init_tracing(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        cache_store = ?config.cache.store,
        "api-gateway starting"
    );

    lifecycle::start(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
