//! Invoice and payment evidence endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    CreateInvoiceRequest, Invoice, PaymentEvidence, ReviewEvidenceRequest, SubmitEvidenceRequest,
    UpdateInvoiceStatusRequest,
};
use crate::AppState;

/// POST /api/rooms/:id/invoices - Compose an invoice for a billing month.
///
/// Idempotent per (room, period): a repeat call returns the existing invoice.
/// On paying tiers a newly created invoice triggers a fire-and-forget
/// notification email to the assigned renter.
pub async fn create_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CreateInvoiceRequest>,
) -> ApiResult<Invoice> {
    let (invoice, created) = state.repo.create_invoice(&id, &request).await?;

    if created {
        notify_renter(&state, &invoice).await;
    }

    success(invoice)
}

/// Send the invoice email when the landlord's tier includes it. Lookup
/// failures only cost the notification, never the invoice.
async fn notify_renter(state: &AppState, invoice: &Invoice) {
    let room = match state.repo.get_room(&invoice.room_id).await {
        Ok(Some(room)) => room,
        _ => return,
    };
    let landlord = match state.repo.get_landlord(&room.landlord_id).await {
        Ok(Some(landlord)) => landlord,
        _ => return,
    };
    if !landlord.subscription_tier.sends_invoice_email() {
        return;
    }
    let Some(renter_id) = &room.current_renter_id else {
        return;
    };
    let email = match state.repo.get_renter(renter_id).await {
        Ok(Some(renter)) => renter.email,
        _ => None,
    };
    if let Some(email) = email {
        state.mailer.notify_invoice_created(vec![email], invoice, &room.code);
    }
}

/// GET /api/invoices/:id - Get a single invoice.
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Invoice> {
    let invoice = state
        .repo
        .get_invoice(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", id)))?;
    success(invoice)
}

/// GET /api/rooms/:id/invoices - List a room's invoices.
pub async fn list_invoices(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Invoice>> {
    let invoices = state.repo.list_invoices(&id).await?;
    success(invoices)
}

/// PUT /api/invoices/:id/status - Update an invoice's status. Paid/unpaid
/// require evidence on file.
pub async fn update_invoice_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateInvoiceStatusRequest>,
) -> ApiResult<Invoice> {
    let invoice = state.repo.update_invoice_status(&id, &request.status).await?;
    success(invoice)
}

/// POST /api/invoices/:id/evidence - Submit renter payment evidence.
pub async fn submit_evidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SubmitEvidenceRequest>,
) -> ApiResult<PaymentEvidence> {
    let evidence = state
        .repo
        .submit_evidence(&id, &request.renter_id, &request.files)
        .await?;
    success(evidence)
}

/// POST /api/evidence/:id/review - Approve or reject submitted evidence.
pub async fn review_evidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReviewEvidenceRequest>,
) -> ApiResult<PaymentEvidence> {
    let evidence = state.repo.review_evidence(&id, request.approve).await?;
    success(evidence)
}
