use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;

use stripe_webhook_common::{ApiResponse, AppError};

use crate::{
    models::{HandlerResponse, InboundEnvelope},
    signature::SIGNATURE_HEADER,
    AppState,
};

pub const OUTCOME_HEADER: &str = "x-webhook-outcome";

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (
            status,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
                (
                    HeaderName::from_static(OUTCOME_HEADER),
                    HeaderValue::from_static(self.outcome.as_str()),
                ),
            ],
            self.body,
        )
            .into_response()
    }
}

// Stripe delivery endpoint: raw body plus Stripe-Signature header
pub async fn receive_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let envelope = InboundEnvelope::from_bytes(&body);

    state
        .handler
        .handle_signed(&envelope, signature, chrono::Utc::now().timestamp())
}

// Lambda-style invocation: the request is the envelope, the reply is the
// proxy result and always travels with HTTP 200.
pub async fn invoke(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<HandlerResponse> {
    let envelope = InboundEnvelope::from_value(payload);

    let response = if state.config.signing.require_on_invoke {
        state.handler.handle_signed(
            &envelope,
            envelope.signature_header(),
            chrono::Utc::now().timestamp(),
        )
    } else {
        state.handler.handle(&envelope)
    };

    Json(response)
}

// Health check endpoint
pub async fn health_check() -> Result<Json<ApiResponse<String>>, AppError> {
    Ok(Json(ApiResponse::success(
        "Webhook service is healthy".to_string(),
    )))
}

pub async fn handler_404() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Endpoint not found".to_string())),
    )
}
