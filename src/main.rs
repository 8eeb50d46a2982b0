// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::count_data_repository::CountDataRepository;
use crate::application::kpi_service::KpiService;
use crate::infrastructure::config::{load_engine_config, load_server_config, DataSourceKind};
use crate::infrastructure::demo_repository::DemoCountDataRepository;
use crate::infrastructure::http_repository::HttpCountDataRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{compute_kpi, health_check, list_indicators};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let server_config = load_server_config()?;
    let dispatcher = Arc::new(load_engine_config()?.into_dispatcher()?);

    // Create repository (infrastructure layer)
    let repository: Arc<dyn CountDataRepository> = match server_config.data_source.kind {
        DataSourceKind::Demo => Arc::new(DemoCountDataRepository::new()),
        DataSourceKind::Http => {
            let base_url = server_config
                .data_source
                .base_url
                .clone()
                .context("data_source.base_url is required for the http data source")?;
            Arc::new(HttpCountDataRepository::new(base_url))
        }
    };

    // Create services (application layer)
    let state = Arc::new(AppState {
        kpi_service: KpiService::new(repository, dispatcher),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/indicators", get(list_indicators))
        .route("/kpis", get(compute_kpi))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = server_config
        .server
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address {}", server_config.server.listen))?;
    tracing::info!("Starting counter-kpi service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
