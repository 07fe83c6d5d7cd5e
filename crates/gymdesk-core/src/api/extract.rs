//! Request extractors
//!
//! Extractors work against any state that can verify tokens and provision
//! member profiles, so the role gates can be exercised without a database.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;
use crate::auth::{AuthUser, JwtVerifier};

pub trait AuthState: Send + Sync {
    fn verifier(&self) -> &JwtVerifier;

    /// Create the member's `users` row on first sight; no-op afterwards
    fn ensure_member(&self, member: &AuthUser) -> anyhow::Result<()>;
}

/// Validates `Authorization: Bearer <token>` and yields the caller
impl<S> FromRequestParts<Arc<S>> for AuthUser
where
    S: AuthState + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<S>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = JwtVerifier::bearer_token(header)?;
        Ok(state.verifier().verify(token)?)
    }
}

/// An authenticated agent or admin
#[derive(Debug, Clone)]
pub struct Staff(pub AuthUser);

impl<S> FromRequestParts<Arc<S>> for Staff
where
    S: AuthState + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<S>) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_staff()?;
        Ok(Staff(user))
    }
}

/// An authenticated member whose profile row exists
#[derive(Debug, Clone)]
pub struct Member(pub AuthUser);

impl<S> FromRequestParts<Arc<S>> for Member
where
    S: AuthState + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<S>) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_member()?;
        state.ensure_member(&user)?;
        Ok(Member(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{token_for, SECRET};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use std::sync::Mutex;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct GateState {
        verifier: JwtVerifier,
        provisioned: Mutex<Vec<Uuid>>,
    }

    impl AuthState for GateState {
        fn verifier(&self) -> &JwtVerifier {
            &self.verifier
        }

        fn ensure_member(&self, member: &AuthUser) -> anyhow::Result<()> {
            let mut seen = self.provisioned.lock().unwrap();
            if !seen.contains(&member.id) {
                seen.push(member.id);
            }
            Ok(())
        }
    }

    async fn whoami(user: AuthUser) -> String {
        user.id.to_string()
    }

    async fn staff_only(Staff(user): Staff) -> String {
        user.role.to_string()
    }

    async fn member_only(Member(user): Member) -> String {
        user.id.to_string()
    }

    fn gate() -> (Router, Arc<GateState>) {
        let state = Arc::new(GateState {
            verifier: JwtVerifier::new(SECRET),
            provisioned: Mutex::new(Vec::new()),
        });
        let router = Router::new()
            .route("/api/session", get(whoami))
            .route("/api/tickets", get(staff_only))
            .route("/api/member/tickets", get(member_only))
            .with_state(state.clone());
        (router, state)
    }

    async fn status_for(router: Router, uri: &str, token: Option<&str>) -> StatusCode {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        router
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (router, _) = gate();
        assert_eq!(status_for(router, "/api/session", None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() {
        let (router, _) = gate();
        assert_eq!(
            status_for(router, "/api/tickets", Some("not-a-jwt")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let (router, _) = gate();
        let token = token_for(Uuid::new_v4(), Some("admin"), -3600);
        assert_eq!(
            status_for(router, "/api/tickets", Some(&token)).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn member_token_on_staff_route_is_forbidden() {
        let (router, _) = gate();
        let token = token_for(Uuid::new_v4(), None, 3600);
        assert_eq!(
            status_for(router, "/api/tickets", Some(&token)).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn staff_token_on_staff_route_is_ok() {
        let (router, _) = gate();
        let token = token_for(Uuid::new_v4(), Some("agent"), 3600);
        assert_eq!(status_for(router, "/api/tickets", Some(&token)).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn staff_token_on_member_route_is_forbidden() {
        let (router, state) = gate();
        let token = token_for(Uuid::new_v4(), Some("admin"), 3600);
        assert_eq!(
            status_for(router, "/api/member/tickets", Some(&token)).await,
            StatusCode::FORBIDDEN
        );
        assert!(state.provisioned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_member_is_provisioned_before_the_handler_runs() {
        let (router, state) = gate();
        let id = Uuid::new_v4();
        let token = token_for(id, None, 3600);

        assert_eq!(
            status_for(router.clone(), "/api/member/tickets", Some(&token)).await,
            StatusCode::OK
        );
        assert_eq!(
            status_for(router, "/api/member/tickets", Some(&token)).await,
            StatusCode::OK
        );
        assert_eq!(*state.provisioned.lock().unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn provisioning_failure_is_internal_error() {
        struct BrokenDb(JwtVerifier);

        impl AuthState for BrokenDb {
            fn verifier(&self) -> &JwtVerifier {
                &self.0
            }

            fn ensure_member(&self, _member: &AuthUser) -> anyhow::Result<()> {
                anyhow::bail!("insert or update on table \"users\" violates constraint")
            }
        }

        let router = Router::new()
            .route("/api/member/tickets", get(member_only))
            .with_state(Arc::new(BrokenDb(JwtVerifier::new(SECRET))));
        let token = token_for(Uuid::new_v4(), None, 3600);
        assert_eq!(
            status_for(router, "/api/member/tickets", Some(&token)).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
