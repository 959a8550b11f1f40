//! HTTP API over the staging store and the sync pipeline.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::catalog::CatalogApi;
use crate::db::Store;
use crate::error::Result;
use crate::heartland::HeartlandClient;
use crate::settings::Settings;

// Catalog exports run to tens of megabytes.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub catalog: Arc<dyn CatalogApi>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/upload-po-csv", post(handlers::upload_po_csv))
        .route("/api/upload-toyhouse-csv", post(handlers::upload_catalog_csv))
        .route("/api/upload-sets-images", post(handlers::upload_images_csv))
        .route("/api/po-numbers", get(handlers::po_numbers))
        .route("/api/import-items", get(handlers::import_items))
        .route("/api/import-items/:id/price", post(handlers::update_item_price))
        .route("/api/po-import-master", get(handlers::list_import_master))
        .route("/api/po-import-master/:po/status", post(handlers::set_import_status))
        .route("/api/po-import-master/:po/complete", post(handlers::complete_review))
        .route("/api/import-heartland", post(handlers::import_heartland))
        .route("/api/create-po", post(handlers::create_po))
        .route("/api/add-item-to-po", post(handlers::add_item_to_po))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the database, build the Heartland client and serve until Ctrl-C.
pub async fn serve(settings: &Settings, bind_addr: &str) -> Result<()> {
    std::fs::create_dir_all(&settings.data_dir)?;
    let store = Store::open(&settings.db_path())?;
    let catalog = HeartlandClient::new(&settings.heartland)?;
    let state = AppState {
        store,
        catalog: Arc::new(catalog),
    };

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, db = %settings.db_path().display(), "po-bridge listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
