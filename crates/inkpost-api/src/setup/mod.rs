//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use anyhow::{Context, Result};
use inkpost_core::Config;
use inkpost_infra::LogFormat;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// A fully wired application, ready to serve.
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    /// Cancelled on shutdown; stops every background task
    pub cancel: CancellationToken,
    pub background: Vec<JoinHandle<()>>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    inkpost_infra::init_telemetry(
        LogFormat::parse(config.log_format()),
        "inkpost-api",
        config.environment(),
    )
    .context("Failed to initialize telemetry")?;

    // fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;
    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;

    let storage = inkpost_storage::create_storage(&config)
        .await
        .context("Failed to initialize media storage")?;

    let broker = services::setup_broker(&config, &pool).await;
    let components = services::initialize_services(&config, pool, storage, broker);

    let cancel = CancellationToken::new();
    let background = services::start_background_tasks(&config, &components, &cancel);

    let router = routes::setup_routes(&config, components.state.clone())?;

    Ok(App {
        state: components.state,
        router,
        cancel,
        background,
    })
}
