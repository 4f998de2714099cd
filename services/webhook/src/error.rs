use thiserror::Error;

use crate::signature::SignatureError;

pub const PARSE_ERROR_PREFIX: &str = "❌ Error parsing event data: ";
pub const AUTH_ERROR_PREFIX: &str = "❌ Webhook signature verification failed: ";

/// Failures the ingestion handler turns into structured responses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("{0}")]
    MalformedPayload(String),

    #[error("{0}")]
    Unauthenticated(#[from] SignatureError),
}

impl IngestError {
    pub fn status_code(&self) -> u16 {
        match self {
            IngestError::MalformedPayload(_) => 400,
            IngestError::Unauthenticated(_) => 401,
        }
    }

    pub fn error_code(&self) -> &str {
        match self {
            IngestError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            IngestError::Unauthenticated(_) => "UNAUTHENTICATED",
        }
    }

    /// Message returned to the sender and written to the log.
    pub fn response_message(&self) -> String {
        match self {
            IngestError::MalformedPayload(detail) => format!("{}{}", PARSE_ERROR_PREFIX, detail),
            IngestError::Unauthenticated(cause) => format!("{}{}", AUTH_ERROR_PREFIX, cause),
        }
    }
}
