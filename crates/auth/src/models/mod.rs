//! Domain models for authentication state.

pub mod principal;
pub mod session;

pub use principal::{Principal, UserMetadata};
pub use session::{AuthEvent, AuthEventKind, Session};
