//! Core types for PropDesk.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod role;
pub mod route;

pub use email::{Email, EmailError};
pub use id::{PrincipalId, PrincipalIdError};
pub use role::Role;
pub use route::{AppRoute, RouteKind};
