use serde::{Deserialize, Serialize};

use stripe_webhook_common::{env_list, env_or, env_parse, AppError, ServerConfig};

use crate::models::MessageStyle;
use crate::signature::DEFAULT_TOLERANCE_SECS;

pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub server: ServerConfig,
    pub ingestion: IngestionConfig,
    pub signing: SigningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub message_style: MessageStyle,
    pub max_body_bytes: usize,
    /// Service tag attached to every record.
    pub log_service: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// `None` leaves the endpoint unauthenticated.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub tolerance_seconds: u64,
    pub require_on_invoke: bool,
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("tolerance_seconds", &self.tolerance_seconds)
            .field("require_on_invoke", &self.require_on_invoke)
            .finish()
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8010,
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            ingestion: IngestionConfig {
                message_style: MessageStyle::Legacy,
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
                log_service: "stripe".to_string(),
            },
            signing: SigningConfig {
                secret: None,
                tolerance_seconds: DEFAULT_TOLERANCE_SECS,
                require_on_invoke: false,
            },
        }
    }
}

impl WebhookConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let config = Self {
            server: ServerConfig {
                host: env_or("WEBHOOK_HOST", &defaults.server.host),
                port: env_parse("WEBHOOK_PORT", defaults.server.port)?,
                cors_origins: env_list("CORS_ORIGINS", "http://localhost:3000"),
            },
            ingestion: IngestionConfig {
                message_style: env_parse("WEBHOOK_MESSAGE_STYLE", defaults.ingestion.message_style)?,
                max_body_bytes: env_parse("WEBHOOK_MAX_BODY_BYTES", defaults.ingestion.max_body_bytes)?,
                log_service: env_or("WEBHOOK_LOG_SERVICE", &defaults.ingestion.log_service),
            },
            signing: SigningConfig {
                secret: std::env::var("WEBHOOK_SIGNING_SECRET")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                tolerance_seconds: env_parse(
                    "WEBHOOK_SIGNATURE_TOLERANCE_SECS",
                    defaults.signing.tolerance_seconds,
                )?,
                require_on_invoke: env_parse(
                    "WEBHOOK_REQUIRE_SIGNATURE_ON_INVOKE",
                    defaults.signing.require_on_invoke,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.ingestion.max_body_bytes == 0 {
            return Err(AppError::Validation(
                "WEBHOOK_MAX_BODY_BYTES must be greater than zero".to_string(),
            ));
        }

        if self.signing.require_on_invoke && self.signing.secret.is_none() {
            return Err(AppError::Configuration(
                "WEBHOOK_REQUIRE_SIGNATURE_ON_INVOKE needs WEBHOOK_SIGNING_SECRET".to_string(),
            ));
        }

        Ok(())
    }
}
