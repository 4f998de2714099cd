use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use stripe_webhook_common::MessageBody;

use crate::signature::SIGNATURE_HEADER;

/// Raw inbound request as delivered by the front door. Lives for one
/// invocation only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InboundEnvelope {
    pub body: Option<String>,
    /// Keyed by lowercase header name.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    headers: HashMap<String, String>,
    /// Original bytes when `body` had to be decoded lossily.
    #[serde(skip)]
    raw: Option<Vec<u8>>,
}

impl InboundEnvelope {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn without_body() -> Self {
        Self::default()
    }

    /// Envelope for a raw HTTP body. Invalid UTF-8 is replaced in `body`,
    /// while [`signed_payload`](Self::signed_payload) keeps the exact bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::new(text),
            Err(_) => Self {
                body: Some(String::from_utf8_lossy(bytes).into_owned()),
                raw: Some(bytes.to_vec()),
                ..Self::default()
            },
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Builds an envelope from a Lambda-style invocation document.
    ///
    /// Only a missing `body` key is absent. Scalar bodies (`null`, numbers,
    /// booleans) become their JSON text and parse as such; objects and
    /// arrays are not serialized event text and count as absent.
    /// Non-string header values are dropped.
    pub fn from_value(value: Value) -> Self {
        let mut object = match value {
            Value::Object(object) => object,
            _ => return Self::without_body(),
        };

        let body = match object.remove("body") {
            Some(Value::String(body)) => Some(body),
            Some(scalar @ (Value::Null | Value::Bool(_) | Value::Number(_))) => {
                Some(scalar.to_string())
            }
            Some(Value::Object(_) | Value::Array(_)) | None => None,
        };

        let mut envelope = Self {
            body,
            ..Self::default()
        };

        if let Some(Value::Object(headers)) = object.remove("headers") {
            for (name, value) in headers {
                if let Value::String(value) = value {
                    envelope = envelope.with_header(name, value);
                }
            }
        }

        envelope
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Bytes the sender signed.
    pub fn signed_payload(&self) -> &[u8] {
        match (&self.raw, &self.body) {
            (Some(raw), _) => raw,
            (None, Some(body)) => body.as_bytes(),
            (None, None) => &[],
        }
    }

    pub fn signature_header(&self) -> Option<&str> {
        self.header(SIGNATURE_HEADER)
    }
}

impl fmt::Display for InboundEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(rendered) => f.write_str(&rendered),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// How the acknowledgment message renders the extracted event object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStyle {
    /// Emits the literal `${eventData}` placeholder, byte-for-byte what
    /// existing consumers have always received.
    #[default]
    Legacy,
    /// Substitutes the compact JSON of `data.object` (`null` when absent).
    Interpolated,
}

impl FromStr for MessageStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(MessageStyle::Legacy),
            "interpolated" => Ok(MessageStyle::Interpolated),
            other => Err(format!(
                "unknown message style '{}', expected 'legacy' or 'interpolated'",
                other
            )),
        }
    }
}

impl fmt::Display for MessageStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStyle::Legacy => f.write_str("legacy"),
            MessageStyle::Interpolated => f.write_str("interpolated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Acknowledged,
    /// Valid document without a `data.object`.
    NoOp,
    Rejected,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Acknowledged => "acknowledged",
            IngestOutcome::NoOp => "no_op",
            IngestOutcome::Rejected => "rejected",
        }
    }
}

/// Proxy-style result: `{ "statusCode": 200, "body": "{\"message\":...}" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: String,
    #[serde(skip)]
    pub message: String,
    #[serde(skip)]
    pub outcome: IngestOutcome,
}

impl HandlerResponse {
    pub fn new(status_code: u16, message: impl Into<String>, outcome: IngestOutcome) -> Self {
        let message = message.into();
        let body =
            serde_json::to_string(&MessageBody::new(message.as_str())).unwrap_or_default();
        Self {
            status_code,
            body,
            message,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_takes_string_body() {
        let envelope = InboundEnvelope::from_value(json!({ "body": "{}" }));
        assert_eq!(envelope.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_from_value_keeps_scalar_bodies_as_json_text() {
        let body = |value| InboundEnvelope::from_value(value).body;

        assert_eq!(body(json!({ "body": null })).as_deref(), Some("null"));
        assert_eq!(body(json!({ "body": 42 })).as_deref(), Some("42"));
        assert_eq!(body(json!({ "body": true })).as_deref(), Some("true"));
    }

    #[test]
    fn test_from_value_missing_or_structured_body_is_absent() {
        assert_eq!(InboundEnvelope::from_value(json!({})).body, None);
        assert_eq!(InboundEnvelope::from_value(json!({ "body": { "a": 1 } })).body, None);
        assert_eq!(InboundEnvelope::from_value(json!({ "body": [1] })).body, None);
        assert_eq!(InboundEnvelope::from_value(json!("body")).body, None);
    }

    #[test]
    fn test_signature_header_lookup_ignores_case() {
        let envelope = InboundEnvelope::from_value(json!({
            "body": "{}",
            "headers": { "stripe-signature": "t=1,v1=ab", "x-count": 3 }
        }));
        assert_eq!(envelope.signature_header(), Some("t=1,v1=ab"));
        assert_eq!(envelope.header("STRIPE-SIGNATURE"), Some("t=1,v1=ab"));
        assert_eq!(envelope.headers.len(), 1);
    }

    #[test]
    fn test_header_names_differing_in_case_collapse_to_one() {
        let envelope = InboundEnvelope::new("{}")
            .with_header("Stripe-Signature", "t=1,v1=aa")
            .with_header("stripe-signature", "t=2,v1=bb");

        assert_eq!(envelope.headers.len(), 1);
        assert_eq!(envelope.signature_header(), Some("t=2,v1=bb"));
    }

    #[test]
    fn test_from_bytes_keeps_raw_payload_for_invalid_utf8() {
        let bytes = b"{\"data\":{\"object\":\"\xff\"}}";
        let envelope = InboundEnvelope::from_bytes(bytes);

        assert_eq!(envelope.signed_payload(), bytes);
        assert!(envelope.body.as_deref().unwrap().contains('\u{FFFD}'));

        let text = InboundEnvelope::from_bytes(b"{}");
        assert_eq!(text.signed_payload(), b"{}");
        assert_eq!(text, InboundEnvelope::new("{}"));
        assert!(InboundEnvelope::without_body().signed_payload().is_empty());
    }

    #[test]
    fn test_handler_response_body_is_message_json() {
        let response = HandlerResponse::new(200, "ok \"quoted\"", IngestOutcome::Acknowledged);
        let parsed: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(parsed, json!({ "message": "ok \"quoted\"" }));

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["statusCode"], 200);
        assert!(wire.get("outcome").is_none());
    }

    #[test]
    fn test_message_style_parsing() {
        assert_eq!("Interpolated".parse::<MessageStyle>(), Ok(MessageStyle::Interpolated));
        assert_eq!(" legacy ".parse::<MessageStyle>(), Ok(MessageStyle::Legacy));
        assert!("fancy".parse::<MessageStyle>().is_err());
    }
}
