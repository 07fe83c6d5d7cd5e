//! Member portal: support requests, own tickets, workout log

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::extract::Member;
use crate::api::state::AppState;
use crate::store::tickets::{TicketFilter, TicketWithMember};
use crate::store::workouts::WorkoutEntry;
use crate::workflow::SubmissionOutcome;
use crate::workouts::{DateRange, WorkoutSummary};

#[derive(Debug, Deserialize)]
pub struct SupportRequestBody {
    pub message: String,
    #[serde(default, alias = "aiMode")]
    pub ai_mode: bool,
}

#[derive(Debug, Serialize)]
pub struct MemberTicketsResponse {
    pub tickets: Vec<TicketWithMember>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkoutQuery {
    #[serde(default)]
    pub date_range: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkoutHistoryResponse {
    pub period: String,
    pub workouts: Vec<WorkoutEntry>,
    pub summary: WorkoutSummary,
}

#[derive(Debug, Deserialize)]
pub struct LogWorkoutBody {
    pub text: String,
}

/// `POST /api/member/requests`
pub async fn submit_request(
    State(state): State<Arc<AppState>>,
    Member(member): Member,
    Json(body): Json<SupportRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome: SubmissionOutcome = state
        .workflow
        .submit_member_request(&member, &body.message, body.ai_mode)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `GET /api/member/tickets`, the caller's own tickets
pub async fn my_tickets(
    State(state): State<Arc<AppState>>,
    Member(member): Member,
) -> Result<Json<MemberTicketsResponse>, ApiError> {
    let filter = TicketFilter {
        created_by: Some(member.id),
        ..TicketFilter::default()
    };
    let tickets = state.db.tickets().list(&filter)?;
    Ok(Json(MemberTicketsResponse { tickets }))
}

/// `GET /api/member/workouts?date_range=today|week|month|YYYY-MM-DD`
pub async fn workout_history(
    State(state): State<Arc<AppState>>,
    Member(member): Member,
    Query(query): Query<WorkoutQuery>,
) -> Result<Json<WorkoutHistoryResponse>, ApiError> {
    let range = query
        .date_range
        .as_deref()
        .map_or(DateRange::Default, DateRange::parse);

    let workouts = state.workouts.history(member.id, range)?;
    let summary = state.workouts.summary(member.id, range)?;
    Ok(Json(WorkoutHistoryResponse {
        period: range.label(),
        workouts,
        summary,
    }))
}

/// `POST /api/member/workouts` with free text, parsed before storing
pub async fn log_workout(
    State(state): State<Arc<AppState>>,
    Member(member): Member,
    Json(body): Json<LogWorkoutBody>,
) -> Result<impl IntoResponse, ApiError> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Workout text cannot be empty".into()));
    }
    let entry = state.workouts.create_entry(member.id, text).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_request_defaults_to_normal_mode() {
        let body: SupportRequestBody = serde_json::from_str(r#"{"message": "Locker broke"}"#).unwrap();
        assert!(!body.ai_mode);

        let body: SupportRequestBody =
            serde_json::from_str(r#"{"message": "Hours?", "aiMode": true}"#).unwrap();
        assert!(body.ai_mode);
    }

    #[test]
    fn workout_query_is_optional() {
        let query: WorkoutQuery = serde_json::from_str("{}").unwrap();
        assert!(query.date_range.is_none());
    }
}
