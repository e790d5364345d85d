//! Dorm API endpoints, including the tier gate on creation.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateDormRequest, DeleteDormQuery, Dorm, UpdateDormRequest};
use crate::AppState;

/// POST /api/dorms - Create a new dorm, gated by the landlord's tier.
pub async fn create_dorm(
    State(state): State<AppState>,
    Json(request): Json<CreateDormRequest>,
) -> ApiResult<Dorm> {
    if request.name.trim().is_empty() {
        return Err(AppError::validation("name", "Tên nhà trọ không được để trống"));
    }
    if request.address.trim().is_empty() {
        return Err(AppError::validation("address", "Địa chỉ không được để trống"));
    }
    if !(1..=28).contains(&request.due_day) {
        return Err(AppError::validation(
            "dueDay",
            "Ngày đến hạn phải nằm trong khoảng 1 đến 28",
        ));
    }

    let landlord = state
        .repo
        .get_landlord(&request.landlord_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Landlord {} not found", request.landlord_id))
        })?;

    if let Some(limit) = landlord.subscription_tier.dorm_limit() {
        let count = state.repo.count_dorms(&landlord.id).await?;
        if count >= limit {
            return Err(AppError::LimitExceeded(format!(
                "Gói {} chỉ cho phép tối đa {} nhà trọ",
                landlord.subscription_tier.as_str(),
                limit
            )));
        }
    }

    let dorm = state
        .repo
        .create_dorm(&landlord.id, &request.name, &request.address, request.due_day)
        .await?;
    success(dorm)
}

/// GET /api/dorms/:id - Get a single dorm.
pub async fn get_dorm(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Dorm> {
    let dorm = state
        .repo
        .get_dorm(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Dorm {} not found", id)))?;
    success(dorm)
}

/// GET /api/landlords/:id/dorms - List a landlord's dorms.
pub async fn list_dorms(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Dorm>> {
    let dorms = state.repo.list_dorms(&id).await?;
    success(dorms)
}

/// PUT /api/dorms/:id - Update a dorm.
pub async fn update_dorm(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDormRequest>,
) -> ApiResult<Dorm> {
    let dorm = state.repo.update_dorm(&id, &request).await?;
    success(dorm)
}

/// DELETE /api/dorms/:id - Delete a dorm; `?force=true` cascades amenities.
pub async fn delete_dorm(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteDormQuery>,
) -> ApiResult<()> {
    state.repo.delete_dorm(&id, query.force).await?;
    success(())
}
