//! Event ingestion handler.
//!
//! Turns one [`InboundEnvelope`] into exactly one [`HandlerResponse`]:
//! `Received -> {Acknowledged, NoOp, Rejected}`. Nothing is kept between
//! invocations and nothing escapes as an error.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use stripe_webhook_common::{EventRecorder, RecordLevel};

use crate::config::WebhookConfig;
use crate::error::IngestError;
use crate::models::{HandlerResponse, InboundEnvelope, IngestOutcome, MessageStyle};
use crate::signature::SignatureVerifier;

pub const ACK_MESSAGE_PREFIX: &str = "✅ Webhook received successfully!. Data: ";
pub const LEGACY_PLACEHOLDER: &str = "${eventData}";

/// Pulls `data.object` out of a serialized event.
///
/// Missing intermediate keys are not an error: `{}` yields `Ok(None)`, as
/// does an explicit `null` object.
pub fn extract_event_object(body: Option<&str>) -> Result<Option<Value>, IngestError> {
    let body =
        body.ok_or_else(|| IngestError::MalformedPayload("request body is missing".to_string()))?;

    let document: Value = serde_json::from_str(body)
        .map_err(|e| IngestError::MalformedPayload(e.to_string()))?;

    Ok(document
        .get("data")
        .and_then(|data| data.get("object"))
        .filter(|object| !object.is_null())
        .cloned())
}

/// Acknowledgment text for the given style.
pub fn acknowledgment_message(style: MessageStyle, object: Option<&Value>) -> String {
    match style {
        MessageStyle::Legacy => format!("{}{}", ACK_MESSAGE_PREFIX, LEGACY_PLACEHOLDER),
        MessageStyle::Interpolated => {
            let rendered = object
                .map(Value::to_string)
                .unwrap_or_else(|| "null".to_string());
            format!("{}{}", ACK_MESSAGE_PREFIX, rendered)
        }
    }
}

pub struct WebhookHandler {
    recorder: Arc<dyn EventRecorder>,
    verifier: Option<SignatureVerifier>,
    message_style: MessageStyle,
}

impl WebhookHandler {
    pub fn new(recorder: Arc<dyn EventRecorder>, message_style: MessageStyle) -> Self {
        Self {
            recorder,
            verifier: None,
            message_style,
        }
    }

    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn from_config(config: &WebhookConfig, recorder: Arc<dyn EventRecorder>) -> Self {
        let handler = Self::new(recorder, config.ingestion.message_style);

        match &config.signing.secret {
            Some(secret) => handler.with_verifier(SignatureVerifier::new(
                secret.clone(),
                config.signing.tolerance_seconds,
            )),
            None => {
                handler.recorder.record(
                    RecordLevel::Warn,
                    "No signing secret configured; webhook signatures will not be verified",
                );
                handler
            }
        }
    }

    pub fn message_style(&self) -> MessageStyle {
        self.message_style
    }

    pub fn verifies_signatures(&self) -> bool {
        self.verifier.is_some()
    }

    /// Processes an envelope without the signature gate.
    pub fn handle(&self, envelope: &InboundEnvelope) -> HandlerResponse {
        let invocation_id = Uuid::new_v4();
        self.record_received(invocation_id, envelope);
        self.process(invocation_id, envelope)
    }

    /// Processes an envelope behind the signature gate. `now` is unix seconds.
    ///
    /// Without a configured verifier this behaves like [`handle`](Self::handle).
    pub fn handle_signed(
        &self,
        envelope: &InboundEnvelope,
        signature: Option<&str>,
        now: i64,
    ) -> HandlerResponse {
        let invocation_id = Uuid::new_v4();
        self.record_received(invocation_id, envelope);

        if let Some(verifier) = &self.verifier {
            if let Err(cause) = verifier.verify(envelope.signed_payload(), signature, now) {
                return self.reject(invocation_id, IngestError::Unauthenticated(cause));
            }
            self.recorder.record(
                RecordLevel::Debug,
                &format!("[{}] Signature verified", invocation_id),
            );
        }

        self.process(invocation_id, envelope)
    }

    fn record_received(&self, invocation_id: Uuid, envelope: &InboundEnvelope) {
        self.recorder.record(
            RecordLevel::Info,
            &format!("[{}] 🎫 Raw Event: {}", invocation_id, envelope),
        );
    }

    fn process(&self, invocation_id: Uuid, envelope: &InboundEnvelope) -> HandlerResponse {
        let object = match extract_event_object(envelope.body.as_deref()) {
            Ok(object) => object,
            Err(e) => return self.reject(invocation_id, e),
        };

        let message = acknowledgment_message(self.message_style, object.as_ref());
        self.recorder
            .record(RecordLevel::Info, &format!("[{}] {}", invocation_id, message));

        let outcome = match object {
            Some(_) => IngestOutcome::Acknowledged,
            None => {
                self.recorder.record(
                    RecordLevel::Warn,
                    &format!(
                        "[{}] Event has no data.object; acknowledged as no-op",
                        invocation_id
                    ),
                );
                IngestOutcome::NoOp
            }
        };

        HandlerResponse::new(200, message, outcome)
    }

    fn reject(&self, invocation_id: Uuid, error: IngestError) -> HandlerResponse {
        let message = error.response_message();
        self.recorder.record(
            RecordLevel::Error,
            &format!("[{}] {} ({})", invocation_id, message, error.error_code()),
        );
        HandlerResponse::new(error.status_code(), message, IngestOutcome::Rejected)
    }
}
