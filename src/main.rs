// src/main.rs
mod api;
mod catalog;
mod config;
mod grid;
mod model;
mod optimizer;
mod placement;
mod search;

use std::sync::Arc;

use log::{error, info, warn};

use api::ApiState;
use catalog::CatalogStore;
use config::AppConfig;

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    info!("🚀 Space search service starting...");
    info!(
        "⚙️ Cell size {}, rotation {}, up to {} locations in parallel",
        app_config.search.cell_size,
        if app_config.search.allow_rotation {
            "enabled"
        } else {
            "disabled"
        },
        app_config.search.max_parallel_locations
    );

    let catalog = match CatalogStore::open(app_config.catalog.listings_path()) {
        Ok(catalog) => Arc::new(catalog),
        Err(err) => {
            error!("❌ Failed to load listings: {}", err);
            std::process::exit(1);
        }
    };

    let state = ApiState::new(catalog, app_config.search);
    if let Err(err) = api::start_api_server(app_config.api, state).await {
        error!("❌ API server terminated with an error: {}", err);
        std::process::exit(1);
    }
}
