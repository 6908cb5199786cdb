//! Services built on the auth provider and its adjacent backends.

pub mod auth;
pub mod mailer;
pub mod profiles;
