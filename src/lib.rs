//! crate-digger: a personal vinyl record catalog service.
//!
//! Signed-in users keep a collection of records, fill them in by catalog
//! number through Discogs or from a photo read by a vision model. Every
//! endpoint that mutates the collection or calls out to a third party passes
//! through a per-caller fixed-window admission gate first.

pub mod auth;
pub mod cache;
pub mod config;
pub mod discogs;
pub mod error;
pub mod extraction;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod security;
pub mod state;
pub mod store;
pub mod validation;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use state::AppState;

// room for multipart framing around a maximum size image
const UPLOAD_BODY_LIMIT: usize = extraction::MAX_IMAGE_BYTES + 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route(
            "/api/records",
            get(handlers::list_records_handler).post(handlers::create_record_handler),
        )
        .route(
            "/api/records/{id}",
            get(handlers::get_record_handler)
                .put(handlers::update_record_handler)
                .delete(handlers::delete_record_handler),
        )
        .route("/api/discogs-lookup", get(handlers::discogs_lookup_handler))
        .route(
            "/api/extract-record",
            post(handlers::extract_record_handler).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .layer(from_fn(security::security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
