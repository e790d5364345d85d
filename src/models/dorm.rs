//! Dorm model matching the frontend Dorm interface.

use serde::{Deserialize, Serialize};

/// A physical property owned by a landlord, containing rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dorm {
    pub id: String,
    pub landlord_id: String,
    pub name: String,
    pub address: String,
    /// Day of month invoices fall due (1..=28 so every month has it).
    pub due_day: i64,
    pub created_at: String,
}

/// Request body for creating a new dorm.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDormRequest {
    pub landlord_id: String,
    pub name: String,
    pub address: String,
    #[serde(default = "default_due_day")]
    pub due_day: i64,
}

fn default_due_day() -> i64 {
    5
}

/// Request body for updating an existing dorm.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDormRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub due_day: Option<i64>,
}

/// Query parameters for dorm deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteDormQuery {
    /// When true, remaining amenities (and their room links) are cascaded.
    #[serde(default)]
    pub force: bool,
}
