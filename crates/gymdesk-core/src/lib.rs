//! GymDesk Core Library
//!
//! Support desk, knowledge base, class booking, workout log and member
//! assistant for a gym, served over HTTP.

pub mod analysis;
pub mod api;
pub mod assistant;
pub mod auth;
pub mod calendar;
pub mod config;
pub mod embedding;
pub mod events;
pub mod knowledge;
pub mod llm;
pub mod notifications;
pub mod schema;
pub mod store;
pub mod team;
pub mod workflow;
pub mod workouts;

// Re-export key types for convenience
pub use config::Config;
pub use events::{ChangeEvent, ChangeKind, EventBus};
pub use store::GymDb;
