pub mod config;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod signature;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use stripe_webhook_common::EventRecorder;

use crate::config::WebhookConfig;
use crate::handler::WebhookHandler;

#[derive(Clone)]
pub struct AppState {
    pub config: WebhookConfig,
    pub handler: Arc<WebhookHandler>,
}

impl AppState {
    pub fn new(config: WebhookConfig, recorder: Arc<dyn EventRecorder>) -> Self {
        let handler = WebhookHandler::from_config(&config, recorder);
        Self {
            config,
            handler: Arc::new(handler),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(allow_origin)
}

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    let body_limit = state.config.ingestion.max_body_bytes;

    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
