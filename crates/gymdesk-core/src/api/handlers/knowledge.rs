//! Knowledge base management

use std::sync::Arc;

use axum::extract::{Path, State};
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
use crate::store::knowledge::{self, KnowledgeEntry, NewEntry};

#[derive(Debug, Serialize)]
pub struct ListEntriesResponse {
    pub entries: Vec<KnowledgeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContentBody {
    pub content: String,
}

/// `GET /api/knowledge`
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
) -> Result<Json<ListEntriesResponse>, ApiError> {
    let entries = state.db.knowledge().list()?;
    Ok(Json(ListEntriesResponse { entries }))
}

/// `POST /api/knowledge`. The entry is embedded later by `embed-knowledge`.
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    Staff(agent): Staff,
    Json(entry): Json<NewEntry>,
) -> Result<impl IntoResponse, ApiError> {
    if entry.title.trim().is_empty() || entry.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Title and content are required".into()));
    }
    let created = state.db.knowledge().create(&entry)?;
    info!("📚 {} added knowledge entry '{}'", agent.email, created.title);
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PATCH /api/knowledge/{id}` replaces the content and clears the embedding
pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateContentBody>,
) -> Result<Json<KnowledgeEntry>, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Content cannot be empty".into()));
    }
    state
        .db
        .knowledge()
        .update_content(id, &body.content)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Entry not found"))
}

/// `DELETE /api/knowledge/{id}`
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Staff(_): Staff,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.db.knowledge().delete(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Entry not found"))
    }
}

/// `GET /api/knowledge/events`
pub async fn events(State(state): State<Arc<AppState>>, Staff(_): Staff) -> impl IntoResponse {
    change_feed(&state.events, knowledge::TABLE)
}
