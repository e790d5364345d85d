//! Renter API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{AssignRenterRequest, CreateRenterRequest, Renter};
use crate::AppState;

/// POST /api/renters - Create a new renter.
pub async fn create_renter(
    State(state): State<AppState>,
    Json(request): Json<CreateRenterRequest>,
) -> ApiResult<Renter> {
    if request.display_name.trim().is_empty() {
        return Err(AppError::validation("displayName", "Tên người thuê không được để trống"));
    }
    if request.user_id.trim().is_empty() {
        return Err(AppError::validation("userId", "Thiếu tài khoản người dùng"));
    }

    let renter = state.repo.create_renter(&request).await?;
    success(renter)
}

/// GET /api/renters/:id - Get a single renter.
pub async fn get_renter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Renter> {
    let renter = state
        .repo
        .get_renter(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Renter {} not found", id)))?;
    success(renter)
}

/// POST /api/renters/:id/assign - Assign a renter to a room. Both sides of
/// the renter/room pointer are patched in one transaction.
pub async fn assign_renter(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AssignRenterRequest>,
) -> ApiResult<Renter> {
    let renter = state.repo.assign_renter(&id, &request.room_id).await?;
    success(renter)
}

/// POST /api/renters/:id/unassign - Unassign a renter from their room.
pub async fn unassign_renter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Renter> {
    let renter = state.repo.unassign_renter(&id).await?;
    success(renter)
}
