//! Tier-upgrade checkout and the gateway webhook endpoint.

use axum::{extract::State, Json};
use chrono::Utc;

use super::{success, ApiResult};
use crate::db::WebhookOutcome;
use crate::errors::AppError;
use crate::models::{CreateCheckoutRequest, Tier};
use crate::payments::{CheckoutSession, WebhookPayload};
use crate::AppState;

/// POST /api/payments/checkout - Start a tier-upgrade checkout at the gateway.
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckoutRequest>,
) -> ApiResult<CheckoutSession> {
    let landlord = state
        .repo
        .get_landlord(&request.landlord_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Landlord {} not found", request.landlord_id))
        })?;

    if request.target_tier == Tier::Free {
        return Err(AppError::validation("targetTier", "Không thể mua gói miễn phí"));
    }
    if request.target_tier == landlord.subscription_tier {
        return Err(AppError::validation("targetTier", "Bạn đang dùng gói này rồi"));
    }

    let amount = request.target_tier.upgrade_price();
    let order_code = Utc::now().timestamp_millis();
    let description = format!("DormHub {}", request.target_tier.as_str());

    let session = state
        .gateway
        .create_checkout(order_code, amount, &description)
        .await?;

    state
        .repo
        .create_payment_request(&landlord.id, order_code, request.target_tier, amount)
        .await?;

    tracing::info!(
        landlord_id = %landlord.id,
        order_code,
        target_tier = request.target_tier.as_str(),
        "Checkout session created"
    );

    success(session)
}

/// POST /api/payments/webhook - Gateway status callback.
///
/// The signature must verify before anything is touched. Replays of a settled
/// order are acknowledged as no-ops so the gateway stops retrying.
pub async fn handle_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> ApiResult<WebhookOutcome> {
    state.gateway.verify_webhook(&payload)?;

    let outcome = state
        .repo
        .apply_payment_webhook(payload.order_code, &payload.status)
        .await?;

    if outcome.applied {
        tracing::info!(
            order_code = outcome.order_code,
            status = outcome.status.as_str(),
            "Payment webhook applied"
        );
    } else {
        tracing::info!(
            order_code = outcome.order_code,
            "Payment webhook replay ignored"
        );
    }

    success(outcome)
}
