//! Staff directory: members and team

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::extract::Staff;
use crate::api::state::AppState;
use crate::store::users::{Role, User};

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

/// `GET /api/members`
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.db.users().list_members()?;
    Ok(Json(UsersResponse { users }))
}

/// `GET /api/members/{id}` including stored recommendations
pub async fn get_member(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    state
        .db
        .users()
        .get(id)?
        .filter(|u| u.role == Role::Member)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Member not found"))
}

/// `GET /api/team`, agents and admins, newest first
pub async fn list_team(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.db.users().list_staff()?;
    Ok(Json(UsersResponse { users }))
}
