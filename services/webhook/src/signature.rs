//! Stripe webhook signature verification.
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends the
//! result in the `Stripe-Signature` header as `t=<unix>,v1=<hex>`. More than
//! one `v1` entry appears while a signing secret is being rolled; any match
//! is accepted. Other schemes (`v0`) are ignored.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header missing")]
    MissingHeader,

    #[error("invalid signature header: {0}")]
    InvalidFormat(String),

    #[error("timestamp outside tolerance ({age_seconds}s)")]
    TimestampOutOfTolerance { age_seconds: i64 },

    #[error("no signature matches the payload")]
    Mismatch,

    #[error("invalid signing secret")]
    InvalidSecret,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=').ok_or_else(|| {
                SignatureError::InvalidFormat(format!("expected key=value, got '{}'", part.trim()))
            })?;

            match key {
                "t" => {
                    let parsed = value.parse::<i64>().map_err(|_| {
                        SignatureError::InvalidFormat(format!("timestamp '{}' is not an integer", value))
                    })?;
                    timestamp = Some(parsed);
                }
                "v1" => {
                    let decoded = hex::decode(value).map_err(|_| {
                        SignatureError::InvalidFormat("v1 signature is not hex".to_string())
                    })?;
                    signatures.push(decoded);
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| SignatureError::InvalidFormat("missing timestamp".to_string()))?;

        if signatures.is_empty() {
            return Err(SignatureError::InvalidFormat("no v1 signature".to_string()));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_seconds: u64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance_seconds", &self.tolerance_seconds)
            .finish()
    }
}

impl SignatureVerifier {
    /// `tolerance_seconds == 0` disables the timestamp age check.
    pub fn new(secret: impl Into<String>, tolerance_seconds: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_seconds,
        }
    }

    fn mac_for(&self, payload: &[u8], timestamp: i64) -> Result<HmacSha256, SignatureError> {
        if self.secret.is_empty() {
            return Err(SignatureError::InvalidSecret);
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Hex signature for `payload` at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let mac = self.mac_for(payload, timestamp)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Full header value, as Stripe would send it.
    pub fn header_for(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        Ok(format!("t={},v1={}", timestamp, self.sign(payload, timestamp)?))
    }

    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = match header.map(str::trim) {
            Some(header) if !header.is_empty() => header,
            _ => return Err(SignatureError::MissingHeader),
        };

        let parsed = SignatureHeader::parse(header)?;

        if self.tolerance_seconds > 0 {
            // `t` is sender-controlled; never subtract it unchecked
            if now.abs_diff(parsed.timestamp) > self.tolerance_seconds {
                return Err(SignatureError::TimestampOutOfTolerance {
                    age_seconds: now.saturating_sub(parsed.timestamp),
                });
            }
        }

        for candidate in &parsed.signatures {
            // verify_slice compares in constant time
            if self
                .mac_for(payload, parsed.timestamp)?
                .verify_slice(candidate)
                .is_ok()
            {
                return Ok(());
            }
        }

        Err(SignatureError::Mismatch)
    }
}
