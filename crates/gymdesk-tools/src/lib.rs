//! GymDesk Tools - external services the desk talks to
//!
//! Tools are organized by category:
//! - resend: transactional email API client
//! - identity: hosted identity provider admin API (staff invites)
//! - datetime: current date/time tool for the assistant

pub mod datetime;
pub mod identity;
pub mod resend;

pub use datetime::{CurrentDateTime, DateTimeArgs, DateTimeFormat};
pub use identity::{IdentityClient, IdentityError, InviteRequest, InvitedUser};
pub use resend::{EmailClient, EmailError, OutgoingEmail, SentEmail};
