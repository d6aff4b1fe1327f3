//! Item category models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An item category. Categories are managed by an external collaborator;
/// the stock engine only checks whether one is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
