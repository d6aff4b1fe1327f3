//! Database models for the Site Stock Management Platform
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
