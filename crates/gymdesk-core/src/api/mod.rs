//! HTTP API
//!
//! Staff and member apps talk to these routes with the identity provider's
//! access token as a bearer token. Change feeds are served as SSE.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
