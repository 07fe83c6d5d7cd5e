//! Session token validation
//!
//! The identity provider signs session JWTs with a shared HS256 secret.
//! Claims carry the user id in `sub` and the staff role in
//! `user_metadata.role`; a missing or unknown role means `member`.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use crate::store::users::{NewUser, Role};

pub const AUDIENCE: &str = "authenticated";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid subject")]
    InvalidSubject,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("staff access required")]
    StaffOnly,
    #[error("member access required")]
    MemberOnly,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub aud: String,
    pub exp: u64,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// An authenticated caller
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, AuthError> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSubject)?;
        let role = match claims.user_metadata.role.as_deref() {
            None => Role::Member,
            Some(raw) => Role::from_str(raw).unwrap_or_else(|_| {
                warn!("Unknown role '{}' on token for {}, treating as member", raw, id);
                Role::Member
            }),
        };

        Ok(Self {
            id,
            email: claims.email.unwrap_or_default(),
            role,
            first_name: claims.user_metadata.first_name.unwrap_or_default(),
            last_name: claims.user_metadata.last_name.unwrap_or_default(),
        })
    }

    pub fn require_staff(&self) -> Result<(), AuthError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AuthError::StaffOnly)
        }
    }

    pub fn require_member(&self) -> Result<(), AuthError> {
        if self.role == Role::Member {
            Ok(())
        } else {
            Err(AuthError::MemberOnly)
        }
    }

    pub fn portal_path(&self) -> &'static str {
        self.role.portal_path()
    }

    /// The `users` row a first sign-in creates
    pub fn profile(&self) -> NewUser {
        NewUser {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
        }
    }

    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.validate_exp = true;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        AuthUser::from_claims(data.claims)
    }

    /// Pull the token out of an `Authorization: Bearer <jwt>` header value
    pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
        header
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub const SECRET: &str = "test-secret-with-enough-length";

    pub fn token_for(id: Uuid, role: Option<&str>, exp_offset_secs: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset_secs) as u64;
        let claims = Claims {
            sub: id.to_string(),
            email: Some("pat@example.com".to_string()),
            aud: AUDIENCE.to_string(),
            exp,
            user_metadata: UserMetadata {
                role: role.map(str::to_string),
                first_name: Some("Pat".to_string()),
                last_name: Some("Lee".to_string()),
            },
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }
}
