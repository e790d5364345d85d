//! Amenity catalog endpoints: diff-sync save and link reconciliation.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::models::{Amenity, ReconcileReport, SaveAmenitiesReport, SaveAmenitiesRequest};
use crate::AppState;

/// GET /api/dorms/:id/amenities - List a dorm's amenity catalog.
pub async fn list_amenities(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Amenity>> {
    let amenities = state.repo.list_amenities(&id).await?;
    success(amenities)
}

/// PUT /api/dorms/:id/amenities - Replace the catalog with the incoming list.
///
/// Matched ids update, entries without an id insert (fanning links out to
/// every room), existing rows absent from the list delete with their links.
pub async fn save_amenities(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SaveAmenitiesRequest>,
) -> ApiResult<SaveAmenitiesReport> {
    let report = state.repo.save_amenities(&id, &request.amenities).await?;
    tracing::info!(
        dorm_id = %id,
        updated = report.updated,
        inserted = report.inserted,
        deleted = report.deleted,
        links_created = report.links_created,
        "Amenity catalog saved"
    );
    success(report)
}

/// POST /api/dorms/:id/reconcile-links - Ensure every (room, amenity) pair
/// in the dorm has exactly one link row. Idempotent.
pub async fn reconcile_links(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ReconcileReport> {
    let report = state.repo.reconcile_dorm_links(&id).await?;
    tracing::info!(
        dorm_id = %id,
        created = report.created,
        existing = report.existing,
        "Dorm links reconciled"
    );
    success(report)
}
