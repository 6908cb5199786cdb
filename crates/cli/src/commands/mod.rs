//! Command implementations.

pub mod bypass;
pub mod profile;
pub mod session;
pub mod visit;
