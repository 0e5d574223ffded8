//! Main entry point for the load balancing gateway

use balancer_gateway::{
    backend::registry::BackendRegistry,
    config::Settings,
    gateway::{
        health_check::HealthMonitor,
        load_balancer::{LoadBalancer, Strategy},
        proxy,
    },
    AppState,
};
use clap::Parser;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let settings = Settings::parse();
    let strategy: Strategy = settings.strategy.parse()?;

    info!(
        strategy = %settings.strategy,
        port = settings.port,
        timeout = ?settings.timeout,
        "starting load balancing gateway"
    );

    let registry = Arc::new(BackendRegistry::from_services(&settings.services)?);
    info!(backends = registry.len(), "backend registry initialized");

    // One synchronous sweep so liveness is current before the first request,
    // then the monitor keeps it current in the background.
    let monitor = HealthMonitor::new(registry.clone());
    monitor.sweep().await;
    monitor.spawn();

    let balancer = Arc::new(LoadBalancer::new(registry.clone(), strategy));
    let track_latency = strategy == Strategy::AvgDuration;

    let state = Arc::new(AppState {
        registry,
        balancer,
        client: reqwest::Client::new(),
        track_latency,
    });

    // Inbound read/write timeout from the --timeout flag
    let app = proxy::create_router(state)
        .layer(ServiceBuilder::new().layer(TimeoutLayer::new(settings.timeout)));

    let addr = format!("0.0.0.0:{}", settings.port);
    info!("server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
