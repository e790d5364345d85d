//! Renter model.

use serde::{Deserialize, Serialize};

/// A renter account. `assigned_room_id` and the room's `current_renter_id`
/// form a bidirectional pointer kept consistent by the assign/unassign
/// operations, which patch both sides in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Renter {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_room_id: Option<String>,
}

/// Request body for creating a renter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRenterRequest {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Request body for assigning a renter to a room.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRenterRequest {
    pub room_id: String,
}
