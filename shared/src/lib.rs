//! Shared types and models for the Site Stock Management Platform
//!
//! This crate contains types shared between the backend and any future
//! components of the system (reporting jobs, import tools).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
