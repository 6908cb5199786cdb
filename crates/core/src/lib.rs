//! PropDesk Core - Shared types library.
//!
//! This crate provides common types used across all PropDesk components:
//! - `auth` - Session and role resolution for the client/admin dashboard
//! - `cli` - Command-line composition root for the auth component
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no network access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for principal IDs, emails, roles, and routes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
