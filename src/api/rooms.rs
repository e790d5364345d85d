//! Room API endpoints: CRUD plus amenity-link toggling and meter readings.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    CreateRoomRequest, ReadingOutcome, RecordReadingsRequest, Room, RoomAmenityLink,
    ToggleLinkRequest, UpdateRoomRequest,
};
use crate::AppState;

/// POST /api/rooms - Create a new room, gated by the landlord's tier. Links
/// for the dorm's existing amenities are fanned out on creation.
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> ApiResult<Room> {
    if request.code.trim().is_empty() {
        return Err(AppError::validation("code", "Mã phòng không được để trống"));
    }
    if request.price < 0 {
        return Err(AppError::validation("price", "Giá phòng không được âm"));
    }

    let dorm = state
        .repo
        .get_dorm(&request.dorm_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Dorm {} not found", request.dorm_id)))?;
    let landlord = state
        .repo
        .get_landlord(&dorm.landlord_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Landlord {} not found", dorm.landlord_id)))?;

    if let Some(limit) = landlord.subscription_tier.room_limit() {
        let count = state.repo.count_rooms(&landlord.id).await?;
        if count >= limit {
            return Err(AppError::LimitExceeded(format!(
                "Gói {} chỉ cho phép tối đa {} phòng",
                landlord.subscription_tier.as_str(),
                limit
            )));
        }
    }

    let room = state.repo.create_room(&request).await?;
    success(room)
}

/// GET /api/rooms/:id - Get a single room.
pub async fn get_room(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Room> {
    let room = state
        .repo
        .get_room(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Room {} not found", id)))?;
    success(room)
}

/// GET /api/dorms/:id/rooms - List a dorm's rooms.
pub async fn list_rooms(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Room>> {
    let rooms = state.repo.list_rooms(&id).await?;
    success(rooms)
}

/// PUT /api/rooms/:id - Update a room. A room with a renter assigned cannot
/// move to vacant.
pub async fn update_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateRoomRequest>,
) -> ApiResult<Room> {
    let room = state.repo.update_room(&id, &request).await?;
    success(room)
}

/// DELETE /api/rooms/:id - Delete a room and its amenity links.
pub async fn delete_room(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.repo.delete_room(&id).await?;
    success(())
}

/// GET /api/rooms/:id/links - List a room's amenity links.
pub async fn list_links(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<RoomAmenityLink>> {
    let links = state.repo.list_links(&id).await?;
    success(links)
}

/// PUT /api/rooms/:id/links - Toggle one amenity link on or off.
pub async fn toggle_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ToggleLinkRequest>,
) -> ApiResult<RoomAmenityLink> {
    let link = state
        .repo
        .toggle_link(&id, &request.amenity_id, request.enabled)
        .await?;
    success(link)
}

/// POST /api/rooms/:id/readings - Record a batch of meter readings. Readings
/// with no matching link are reported as skipped, not errors.
pub async fn record_readings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RecordReadingsRequest>,
) -> ApiResult<Vec<ReadingOutcome>> {
    if request.readings.is_empty() {
        return Err(AppError::validation("readings", "Chưa có chỉ số nào được gửi"));
    }
    let outcomes = state.repo.record_meter_readings(&id, &request.readings).await?;
    success(outcomes)
}
