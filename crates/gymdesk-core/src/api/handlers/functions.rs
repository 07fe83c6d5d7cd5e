//! Function-style endpoints called by the admin and member apps

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::extract::Staff;
use crate::api::state::AppState;
use crate::auth::AuthUser;
use crate::notifications::TicketNotification;
use crate::store::users::User;
use crate::team::InviteForm;

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub message: &'static str,
    pub id: String,
}

/// `POST /api/functions/invite-team-member`
pub async fn invite_team_member(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
    Json(form): Json<InviteForm>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.team.invite(&form).await?;
    Ok((
        StatusCode::CREATED,
        Json(InviteResponse {
            message: "Team member invited successfully",
            user,
        }),
    ))
}

/// `POST /api/functions/send-ticket-notification`
pub async fn send_ticket_notification(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(payload): Json<TicketNotification>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let sent = state.notifications.send(&payload).await?;
    Ok(Json(NotificationResponse {
        message: "Email sent successfully",
        id: sent.id,
    }))
}
