//! Property-based tests for the ingestion handler.
//!
//! Arbitrary bodies and `Stripe-Signature` values must always produce a
//! structured response with a known status, and identical inputs must
//! produce identical responses.

use std::sync::Arc;

use proptest::{prelude::*, test_runner::Config as ProptestConfig};

use stripe_webhook_common::MemoryRecorder;
use stripe_webhook_service::{
    handler::WebhookHandler,
    models::{InboundEnvelope, IngestOutcome, MessageStyle},
    signature::SignatureVerifier,
};

const SECRET: &str = "whsec_property_secret";

/// Uses `PROPTEST_CASES` when set, otherwise 64 cases.
fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(64);

    ProptestConfig::with_cases(cases)
}

fn unsigned_handler(style: MessageStyle) -> WebhookHandler {
    WebhookHandler::new(Arc::new(MemoryRecorder::new()), style)
}

fn signed_handler() -> WebhookHandler {
    unsigned_handler(MessageStyle::Legacy).with_verifier(SignatureVerifier::new(SECRET, 300))
}

fn message_style() -> impl Strategy<Value = MessageStyle> {
    prop_oneof![Just(MessageStyle::Legacy), Just(MessageStyle::Interpolated)]
}

/// Free-form text, or something shaped like a real header with extreme values.
fn signature_header() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<String>(),
        (any::<i64>(), "[0-9a-f]{0,64}").prop_map(|(t, v1)| format!("t={},v1={}", t, v1)),
        Just(format!("t={},v1={}", i64::MIN, "00".repeat(32))),
        Just(format!("t={},v1={}", i64::MAX, "00".repeat(32))),
    ]
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn any_body_gets_ok_or_bad_request(body in any::<String>(), style in message_style()) {
        let handler = unsigned_handler(style);
        let envelope = InboundEnvelope::new(body);

        let first = handler.handle(&envelope);
        let second = handler.handle(&envelope);

        prop_assert!(matches!(first.status_code, 200 | 400), "status {}", first.status_code);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn any_signature_header_gets_a_structured_response(
        body in any::<String>(),
        header in signature_header(),
        now in any::<i64>(),
    ) {
        let handler = signed_handler();
        let envelope = InboundEnvelope::new(body);

        let first = handler.handle_signed(&envelope, Some(&header), now);
        let second = handler.handle_signed(&envelope, Some(&header), now);

        prop_assert!(
            matches!(first.status_code, 200 | 400 | 401),
            "status {}",
            first.status_code
        );
        prop_assert_eq!(first, second);
    }

    #[test]
    fn any_bytes_signed_within_tolerance_pass_the_gate(
        payload in prop::collection::vec(any::<u8>(), 0..256),
        signed_at in 1_000_000_000i64..2_000_000_000i64,
        skew in -300i64..=300i64,
    ) {
        let verifier = SignatureVerifier::new(SECRET, 300);
        let header = verifier.header_for(&payload, signed_at).expect("signing should succeed");
        let envelope = InboundEnvelope::from_bytes(&payload);

        let response = signed_handler().handle_signed(&envelope, Some(&header), signed_at + skew);

        prop_assert_ne!(response.status_code, 401);
    }

    #[test]
    fn event_objects_are_always_acknowledged(id in "[a-zA-Z0-9_]{1,24}", amount in any::<i64>()) {
        let body = serde_json::json!({ "data": { "object": { "id": id, "amount": amount } } });
        let response = unsigned_handler(MessageStyle::Legacy).handle(&InboundEnvelope::new(body.to_string()));

        prop_assert_eq!(response.status_code, 200);
        prop_assert_eq!(response.outcome, IngestOutcome::Acknowledged);
    }

    #[test]
    fn scalar_invocation_bodies_are_no_ops(value in any::<i64>(), flag in any::<bool>()) {
        let handler = unsigned_handler(MessageStyle::Legacy);

        for body in [serde_json::json!(value), serde_json::json!(flag), serde_json::Value::Null] {
            let envelope = InboundEnvelope::from_value(serde_json::json!({ "body": body }));
            let response = handler.handle(&envelope);

            prop_assert_eq!(response.status_code, 200);
            prop_assert_eq!(response.outcome, IngestOutcome::NoOp);
        }
    }
}
