//! Staff invitations (`invite-team-member`)

use gymdesk_tools::{IdentityClient, IdentityError, InviteRequest};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::store::users::{NewUser, Role, User};
use crate::store::GymDb;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InviteForm {
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "firstName")]
    pub first_name: String,
    #[serde(default, alias = "lastName")]
    pub last_name: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Role must be agent or admin")]
    InvalidRole,
    #[error("Invites are not configured (AUTH_URL / AUTH_SERVICE_KEY)")]
    Disabled,
    #[error("Invite failed: {0}")]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// A form whose fields are all present and whose role is a staff role
#[derive(Debug, Clone, PartialEq)]
pub struct ValidInvite {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl InviteForm {
    pub fn validate(&self) -> Result<ValidInvite, InviteError> {
        let email = self.email.trim();
        let first_name = self.first_name.trim();
        let last_name = self.last_name.trim();
        let role = self.role.trim();
        if email.is_empty() || first_name.is_empty() || last_name.is_empty() || role.is_empty() {
            return Err(InviteError::MissingFields);
        }

        let role: Role = role.parse().map_err(|_| InviteError::InvalidRole)?;
        if !role.is_staff() {
            return Err(InviteError::InvalidRole);
        }

        Ok(ValidInvite {
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role,
        })
    }
}

impl ValidInvite {
    pub fn request(&self) -> InviteRequest {
        InviteRequest {
            email: self.email.clone(),
            data: serde_json::json!({
                "first_name": self.first_name,
                "last_name": self.last_name,
                "role": self.role.as_str(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct TeamService {
    db: Arc<GymDb>,
    identity: Option<IdentityClient>,
}

impl TeamService {
    pub fn new(db: Arc<GymDb>, identity: Option<IdentityClient>) -> Self {
        Self { db, identity }
    }

    pub fn from_config(db: Arc<GymDb>, config: &Config) -> anyhow::Result<Self> {
        let identity = match (&config.auth_url, &config.auth_service_key) {
            (Some(url), Some(key)) => Some(IdentityClient::new(url.clone(), key.clone())?),
            _ => None,
        };
        Ok(Self::new(db, identity))
    }

    /// Invite through the identity provider, then create the `users` row
    /// under the id it assigned
    pub async fn invite(&self, form: &InviteForm) -> Result<User, InviteError> {
        let invite = form.validate()?;
        let identity = self.identity.as_ref().ok_or(InviteError::Disabled)?;

        let invited = identity.invite_user(&invite.request()).await.map_err(|e| {
            error!("Invite for {} failed: {}", invite.email, e);
            e
        })?;

        let user = self.db.users().insert(&NewUser {
            id: invited.id,
            email: invite.email.clone(),
            first_name: invite.first_name.clone(),
            last_name: invite.last_name.clone(),
            role: invite.role,
        })?;
        info!("👋 Invited {} as {}", user.email, user.role);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(role: &str) -> InviteForm {
        InviteForm {
            email: "coach@example.com".into(),
            first_name: "Jo".into(),
            last_name: "Park".into(),
            role: role.into(),
        }
    }

    #[test]
    fn test_valid_invite() {
        let invite = form("admin").validate().unwrap();
        assert_eq!(invite.role, Role::Admin);
        let request = invite.request();
        assert_eq!(request.email, "coach@example.com");
        assert_eq!(request.data["first_name"], "Jo");
        assert_eq!(request.data["role"], "admin");
    }

    #[test]
    fn test_missing_fields() {
        let mut f = form("agent");
        f.last_name = "  ".into();
        assert!(matches!(f.validate(), Err(InviteError::MissingFields)));
        assert!(matches!(
            InviteForm::default().validate(),
            Err(InviteError::MissingFields)
        ));
    }

    #[test]
    fn test_member_role_rejected() {
        assert!(matches!(form("member").validate(), Err(InviteError::InvalidRole)));
        assert!(matches!(form("owner").validate(), Err(InviteError::InvalidRole)));
    }

    #[test]
    fn test_camel_case_body() {
        let f: InviteForm = serde_json::from_value(serde_json::json!({
            "email": "a@example.com", "firstName": "A", "lastName": "B", "role": "agent"
        }))
        .unwrap();
        assert_eq!(f.first_name, "A");
        assert!(f.validate().is_ok());
    }
}
