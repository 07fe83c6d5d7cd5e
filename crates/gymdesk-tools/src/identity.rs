//! Hosted identity provider admin client
//!
//! Staff accounts are created by invitation: the provider emails the invitee
//! a sign-up link and returns the new user's id, which becomes the primary
//! key of the matching `users` row.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Invitation payload; `data` lands in the user's metadata
#[derive(Debug, Clone, Serialize)]
pub struct InviteRequest {
    pub email: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitedUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    base_url: Arc<String>,
    service_key: Arc<String>,
}

impl IdentityClient {
    pub fn new(base_url: String, service_key: String) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("GymDesk/0.1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::new(base_url.trim_end_matches('/').to_string()),
            service_key: Arc::new(service_key),
        })
    }

    /// Invite a user by email
    pub async fn invite_user(&self, request: &InviteRequest) -> Result<InvitedUser, IdentityError> {
        let url = format!("{}/auth/v1/invite", self.base_url);
        debug!("Inviting {} via identity provider", request.email);

        let response = self
            .client
            .post(&url)
            .header("apikey", self.service_key.as_str())
            .bearer_auth(self.service_key.as_str())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| {
                    v.get("msg")
                        .or_else(|| v.get("message"))
                        .or_else(|| v.get("error_description"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(text);
            warn!("Identity provider rejected invite {}: {}", status, message);
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityClient")
            .field("base_url", &self.base_url)
            .field("service_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn invite_returns_new_user_id() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/auth/v1/invite"))
            .and(header("apikey", "service"))
            .and(body_partial_json(serde_json::json!({
                "email": "coach@example.com",
                "data": {"role": "agent"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": id,
                "email": "coach@example.com"
            })))
            .mount(&server)
            .await;

        let client = IdentityClient::new(server.uri(), "service".into()).unwrap();
        let invited = client
            .invite_user(&InviteRequest {
                email: "coach@example.com".into(),
                data: serde_json::json!({"role": "agent", "first_name": "Sam"}),
            })
            .await
            .unwrap();
        assert_eq!(invited.id, id);
    }

    #[tokio::test]
    async fn already_registered_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/invite"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "msg": "A user with this email address has already been registered"
            })))
            .mount(&server)
            .await;

        let client = IdentityClient::new(server.uri(), "service".into()).unwrap();
        let err = client
            .invite_user(&InviteRequest {
                email: "coach@example.com".into(),
                data: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already been registered"));
    }
}
