use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Webhook endpoints (authenticated by signature, not by session)
        .route("/webhooks/stripe", post(handlers::receive_stripe_webhook))
        .route("/invoke", post(handlers::invoke))

        .fallback(handlers::handler_404)
}
