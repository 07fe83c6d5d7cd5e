//! Signed-in user and portal redirect

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::api::error::ApiError;
use crate::api::extract::AuthState;
use crate::api::state::AppState;
use crate::auth::AuthUser;
use crate::store::users::{Role, User};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: AuthUser,
    /// Where the client should land: `/member` or `/admin/dashboard`
    pub redirect_to: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<User>,
}

/// `GET /api/session`. A member's first call creates their profile.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<SessionResponse>, ApiError> {
    if user.role == Role::Member {
        state.ensure_member(&user)?;
    }
    if let Err(e) = state.db.users().touch_last_sign_in(user.id) {
        warn!("Could not stamp last sign-in for {}: {}", user.id, e);
    }
    let profile = state.db.users().get(user.id)?;

    Ok(Json(SessionResponse {
        redirect_to: user.portal_path(),
        user,
        profile,
    }))
}
