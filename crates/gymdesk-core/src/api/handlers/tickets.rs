//! Staff ticket endpoints: list, detail, status, assignment, replies

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::change_feed;
use crate::api::error::ApiError;
use crate::api::extract::Staff;
use crate::api::state::AppState;
use crate::store::tickets::{
    self,
    Ticket, TicketFilter, TicketStats, TicketStatus, TicketUpdate, TicketWithMember,
};
use crate::workflow::{DraftResponse, ReplyOutcome, StaffTicketForm};

#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<TicketWithMember>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssigneeBody {
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    pub text: String,
    #[serde(default)]
    pub bcc: Vec<String>,
}

/// `GET /api/tickets?status&assigned_to`
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
    Query(filter): Query<TicketFilter>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let tickets = state.db.tickets().list(&filter)?;
    Ok(Json(ListTicketsResponse { tickets }))
}

/// `POST /api/tickets`
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Staff(agent): Staff,
    Json(form): Json<StaffTicketForm>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state.workflow.staff_create(&agent, form)?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// `GET /api/tickets/{id}`
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketWithMember>, ApiError> {
    state
        .db
        .tickets()
        .get_with_member(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Ticket not found"))
}

/// `PATCH /api/tickets/{id}` edits title, description or priority
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
    Path(id): Path<Uuid>,
    Json(update): Json<TicketUpdate>,
) -> Result<Json<Ticket>, ApiError> {
    if update.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".into()));
    }
    state
        .db
        .tickets()
        .update_details(id, &update)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Ticket not found"))
}

/// `DELETE /api/tickets/{id}`
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Staff(agent): Staff,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.db.tickets().delete(id)? {
        return Err(ApiError::not_found("Ticket not found"));
    }
    info!("🗑️ Ticket {} deleted by {}", id, agent.email);
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/tickets/{id}/status`. Any status may follow any other.
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Staff(agent): Staff,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = state
        .db
        .tickets()
        .set_status(id, body.status)?
        .ok_or_else(|| ApiError::not_found("Ticket not found"))?;
    info!("Ticket {} moved to {} by {}", id, body.status.label(), agent.email);
    Ok(Json(ticket))
}

/// `PUT /api/tickets/{id}/assignee`, `null` unassigns
pub async fn set_assignee(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
    Path(id): Path<Uuid>,
    Json(body): Json<AssigneeBody>,
) -> Result<Json<Ticket>, ApiError> {
    if let Some(agent_id) = body.assigned_to {
        let is_staff = state
            .db
            .users()
            .get(agent_id)?
            .is_some_and(|u| u.role.is_staff());
        if !is_staff {
            return Err(ApiError::BadRequest("Assignee must be an agent or admin".into()));
        }
    }
    state
        .db
        .tickets()
        .assign(id, body.assigned_to)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Ticket not found"))
}

/// `POST /api/tickets/{id}/replies`
pub async fn reply(
    State(state): State<Arc<AppState>>,
    Staff(agent): Staff,
    Path(id): Path<Uuid>,
    Json(body): Json<ReplyBody>,
) -> Result<Json<ReplyOutcome>, ApiError> {
    let outcome = state.workflow.reply(id, &agent, &body.text, body.bcc).await?;
    Ok(Json(outcome))
}

/// `POST /api/tickets/{id}/draft`
pub async fn draft(
    State(state): State<Arc<AppState>>,
    Staff(agent): Staff,
    Path(id): Path<Uuid>,
) -> Result<Json<DraftResponse>, ApiError> {
    let draft = state.workflow.draft_response(id, &agent).await?;
    Ok(Json(draft))
}

/// `GET /api/tickets/stats`
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
) -> Result<Json<TicketStats>, ApiError> {
    Ok(Json(state.db.tickets().stats()?))
}

/// `GET /api/tickets/events`
pub async fn events(State(state): State<Arc<AppState>>, Staff(_): Staff) -> impl IntoResponse {
    change_feed(&state.events, tickets::TABLE)
}
