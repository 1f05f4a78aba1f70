use super::handlers::{
    api_subscriptions_handler, error_handler, healthz_handler, home_handler, readyz_handler,
    subscriptions_handler,
};
use crate::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/subscriptions", get(subscriptions_handler))
        .route("/api/subscriptions", get(api_subscriptions_handler))
        .route("/error", get(error_handler))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
