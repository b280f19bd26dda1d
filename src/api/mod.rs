//! HTTP JSON API and activity WebSocket.

mod error;
mod routes;
mod ws;

pub use error::ApiError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::routing::{get, patch, post};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::LeadPipeline;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<LeadPipeline>,
    /// Poll interval when the sheet poller runs.
    pub poll_interval: Option<Duration>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<LeadPipeline>) -> Self {
        Self {
            pipeline,
            poll_interval: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

/// Build the full router: REST endpoints, `/ws/activity`, tracing and CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/stats", get(routes::stats))
        .route("/api/leads", get(routes::list_leads).post(routes::create_lead))
        .route(
            "/api/leads/{id}",
            get(routes::get_lead)
                .patch(routes::update_lead)
                .delete(routes::delete_lead),
        )
        .route("/api/leads/{id}/qualify", post(routes::qualify_lead))
        .route("/api/leads/{id}/send-email", post(routes::send_email))
        .route("/api/leads/{id}/schedule-call", post(routes::schedule_call))
        .route("/api/leads/{id}/responses", post(routes::record_response))
        .route("/api/leads/{id}/activities", get(routes::lead_activities))
        .route("/api/activities", get(routes::list_activities))
        .route(
            "/api/email-templates",
            get(routes::list_templates).post(routes::create_template),
        )
        .route("/api/email-templates/{id}", patch(routes::update_template))
        .route("/api/email-logs", get(routes::list_email_logs))
        .route(
            "/api/settings/{key}",
            get(routes::get_setting).put(routes::put_setting),
        )
        .route("/api/system-status", get(routes::system_status))
        .route("/api/sync/google-sheets", post(routes::sync_sheets))
        .route("/ws/activity", get(ws::ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
