//! Resend transactional email API client
//!
//! Only the single-send endpoint is used: ticket notifications and agent
//! replies are one message each, optionally with a BCC list.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const RESEND_API_BASE: &str = "https://api.resend.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// A single email ready to hand to the provider
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Provider acknowledgement
#[derive(Debug, Clone, Deserialize)]
pub struct SentEmail {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Clone)]
pub struct EmailClient {
    client: reqwest::Client,
    api_key: Arc<String>,
    base_url: Arc<String>,
}

impl EmailClient {
    pub fn new(api_key: String) -> Result<Self, EmailError> {
        Self::with_base_url(api_key, RESEND_API_BASE.to_string())
    }

    /// Point the client at a different host (self-hosted relay or a test server)
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("GymDesk/0.1.0")
            .build()?;

        Ok(Self {
            client,
            api_key: Arc::new(api_key),
            base_url: Arc::new(base_url.trim_end_matches('/').to_string()),
        })
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<SentEmail, EmailError> {
        let url = format!("{}/emails", self.base_url);
        debug!(
            "Sending email '{}' to {} (bcc: {})",
            email.subject,
            email.to,
            email.bcc.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.as_str())
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(text);
            warn!("Resend API error {}: {}", status, message);
            return Err(EmailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for EmailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
