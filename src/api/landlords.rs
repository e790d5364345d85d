//! Landlord API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateLandlordRequest, Landlord, Subscription};
use crate::AppState;

/// POST /api/landlords - Create a new landlord on the free tier.
pub async fn create_landlord(
    State(state): State<AppState>,
    Json(request): Json<CreateLandlordRequest>,
) -> ApiResult<Landlord> {
    if request.display_name.trim().is_empty() {
        return Err(AppError::validation("displayName", "Display name is required"));
    }

    let landlord = state.repo.create_landlord(&request).await?;
    success(landlord)
}

/// GET /api/landlords/:id - Get a single landlord.
pub async fn get_landlord(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Landlord> {
    let landlord = state
        .repo
        .get_landlord(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Landlord {} not found", id)))?;
    success(landlord)
}

/// GET /api/landlords/:id/subscriptions - List granted subscription periods.
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Subscription>> {
    let subscriptions = state.repo.list_subscriptions(&id).await?;
    success(subscriptions)
}
