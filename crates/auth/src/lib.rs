//! PropDesk session and role resolution.
//!
//! Decides who is signed in, whether they are an administrator, and where
//! the dashboard should send them. Authentication itself is delegated to a
//! hosted backend behind [`provider::AuthProvider`].
//!
//! The entry point is [`AuthService`], assembled once at the composition
//! root and passed explicitly to whatever needs it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod bypass;
pub mod config;
pub mod error;
pub mod markers;
pub mod models;
pub mod navigation;
pub mod notify;
pub mod provider;
pub mod retry;
pub mod roles;
pub mod services;
pub mod state;
pub mod storage;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{AuthConfig, ConfigError};
pub use services::auth::{AuthDeps, AuthError, AuthService, AuthSettings, SignUpReport, SignUpWarning};
pub use state::{AuthSnapshot, AuthStatus, SessionStore};
