//! Router configuration

use std::sync::Arc;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    assistant, directory, functions, health, knowledge, member, session, tickets,
};
use super::state::AppState;

/// Build the router with all routes and middleware.
///
/// Staff routes (`/api/tickets`, `/api/members`, `/api/team`,
/// `/api/knowledge`, invites) reject members with 403; member routes
/// (`/api/member/*`, `/api/assistant/*`) reject staff.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health::health))
        .route("/api/session", get(session::get_session))
        // Tickets
        .route(
            "/api/tickets",
            get(tickets::list_tickets).post(tickets::create_ticket),
        )
        .route("/api/tickets/stats", get(tickets::stats))
        .route("/api/tickets/events", get(tickets::events))
        .route(
            "/api/tickets/{id}",
            get(tickets::get_ticket)
                .patch(tickets::update_ticket)
                .delete(tickets::delete_ticket),
        )
        .route("/api/tickets/{id}/status", put(tickets::set_status))
        .route("/api/tickets/{id}/assignee", put(tickets::set_assignee))
        .route("/api/tickets/{id}/replies", post(tickets::reply))
        .route("/api/tickets/{id}/draft", post(tickets::draft))
        // Member portal
        .route("/api/member/requests", post(member::submit_request))
        .route("/api/member/tickets", get(member::my_tickets))
        .route(
            "/api/member/workouts",
            get(member::workout_history).post(member::log_workout),
        )
        // Directory
        .route("/api/members", get(directory::list_members))
        .route("/api/members/{id}", get(directory::get_member))
        .route("/api/team", get(directory::list_team))
        // Knowledge base
        .route(
            "/api/knowledge",
            get(knowledge::list_entries).post(knowledge::create_entry),
        )
        .route("/api/knowledge/events", get(knowledge::events))
        .route(
            "/api/knowledge/{id}",
            patch(knowledge::update_entry).delete(knowledge::delete_entry),
        )
        // Functions
        .route(
            "/api/functions/invite-team-member",
            post(functions::invite_team_member),
        )
        .route(
            "/api/functions/send-ticket-notification",
            post(functions::send_ticket_notification),
        )
        // Assistant
        .route("/api/assistant/chat", post(assistant::chat))
        .route("/api/assistant/chat/stream", post(assistant::chat_stream))
        .route("/api/assistant/session", delete(assistant::clear_session))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let app = Router::new()
            .route("/health", get(health::health))
            .layer(cors_layer());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "https://portal.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
