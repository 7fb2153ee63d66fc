//! HTTP service for the reconciliation back office.

use axum::Router;
use rekon_email::Mailer;
use rekon_import::CoreBankingApi;
use rekon_storage::{AttachmentStore, DbPool};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod reconcile;
pub mod telemetry;

pub use config::{LogFormat, ServerConfig};
pub use error::ApiError;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub core_api: Arc<dyn CoreBankingApi>,
    pub mailer: Arc<dyn Mailer>,
    pub attachments: AttachmentStore,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        db: DbPool,
        core_api: Arc<dyn CoreBankingApi>,
        mailer: Arc<dyn Mailer>,
        config: ServerConfig,
    ) -> Self {
        Self {
            db,
            core_api,
            mailer,
            attachments: AttachmentStore::new(config.attachments_dir.clone()),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::reference_routes())
        .merge(api::report_routes())
        .merge(api::consolidation_routes())
        .merge(api::submission_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
