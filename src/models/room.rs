//! Room and room-amenity link models.

use serde::{Deserialize, Serialize};

/// Occupancy status of a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Vacant,
    Occupied,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Vacant => "vacant",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "vacant" => Some(RoomStatus::Vacant),
            "occupied" => Some(RoomStatus::Occupied),
            "maintenance" => Some(RoomStatus::Maintenance),
            _ => None,
        }
    }
}

/// A rentable room inside a dorm.
///
/// Invariant: `current_renter_id` set implies status is occupied or
/// maintenance, never vacant. The update path enforces this.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub dorm_id: String,
    pub landlord_id: String,
    /// Room code, unique per landlord (e.g. "P101").
    pub code: String,
    /// Monthly rent in VND.
    pub price: i64,
    pub status: RoomStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_renter_id: Option<String>,
}

/// Per-room subscription/state for one amenity: the enabled flag plus the
/// running meter baseline for metered amenities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAmenityLink {
    pub id: String,
    pub room_id: String,
    pub amenity_id: String,
    pub enabled: bool,
    /// Meter reading the next invoice bills from.
    pub last_used_number: i64,
    /// Calendar month (1..=12) the reading belongs to.
    pub month: i64,
}

/// Request body for creating a new room.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub dorm_id: String,
    pub code: String,
    pub price: i64,
}

/// Request body for updating an existing room.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub status: Option<RoomStatus>,
}

/// Request body for toggling one amenity link on a room.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLinkRequest {
    pub amenity_id: String,
    pub enabled: bool,
}

/// One submitted meter reading.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReading {
    pub amenity_id: String,
    pub current: i64,
}

/// Request body for recording a batch of meter readings on a room.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReadingsRequest {
    pub readings: Vec<MeterReading>,
}

/// Per-reading outcome of a meter recording batch. Readings for amenities the
/// room has no link for are skipped rather than failing the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingOutcome {
    pub amenity_id: String,
    pub applied: bool,
}

/// Counts reported back from a dorm link reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub created: i64,
    pub existing: i64,
}
