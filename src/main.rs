use clap::Parser;
use model_grid::{
    api::{build_router, AppState},
    cache::{DistributedModelCache, RetryPolicy},
    config::{Config, ObservabilityConfig},
    flow::FlowRegistry,
    store::create_store,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "model-grid", version, about = "Write-through cached incremental model flows")]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<String>,

    /// Override the HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    if let Some(port) = cli.port {
        config.server.http_port = port;
    }

    init_tracing(&config.observability);
    tracing::info!("Starting model-grid v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.prometheus_enabled {
        if let Err(e) = model_grid::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    }

    tracing::info!(backend = ?config.store.backend, "Initializing model store");
    let store = create_store(&config.store).await?;

    let cache = Arc::new(DistributedModelCache::new(
        store,
        &config.cache,
        RetryPolicy::from_config(&config.retry),
    ));

    // Bad classifier kinds or options stop startup here
    let flows = Arc::new(FlowRegistry::from_config(&config.flows, cache.clone())?);
    tracing::info!(flows = ?flows.names(), "Flows started");

    let app = build_router(AppState::new(flows.clone(), cache));

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("HTTP server listening on {}", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Draining flows...");
    flows.shutdown().await;
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("model_grid={},tower_http=info", config.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
