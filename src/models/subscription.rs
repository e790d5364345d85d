//! Landlord, subscription tier, and payment request models.

use serde::{Deserialize, Serialize};

/// Subscription plan controlling resource limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Pro,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Tier::Free),
            "basic" => Some(Tier::Basic),
            "pro" => Some(Tier::Pro),
            _ => None,
        }
    }

    /// Maximum number of dorms a landlord on this tier may own. `None` = unlimited.
    pub fn dorm_limit(&self) -> Option<i64> {
        match self {
            Tier::Free => Some(1),
            Tier::Basic => Some(5),
            Tier::Pro => None,
        }
    }

    /// Maximum number of rooms across all dorms. `None` = unlimited.
    pub fn room_limit(&self) -> Option<i64> {
        match self {
            Tier::Free => Some(15),
            Tier::Basic => Some(100),
            Tier::Pro => None,
        }
    }

    /// Upgrade price in VND charged through the payment gateway.
    pub fn upgrade_price(&self) -> i64 {
        match self {
            Tier::Free => 0,
            Tier::Basic => 99_000,
            Tier::Pro => 249_000,
        }
    }

    /// Whether invoice notification emails are sent on this tier.
    pub fn sends_invoice_email(&self) -> bool {
        !matches!(self, Tier::Free)
    }
}

/// A landlord account owning dorms and rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Landlord {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub subscription_tier: Tier,
    pub created_at: String,
}

/// Request body for creating a landlord.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLandlordRequest {
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Status of a tier-upgrade payment request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRequestStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRequestStatus::Pending => "pending",
            PaymentRequestStatus::Completed => "completed",
            PaymentRequestStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentRequestStatus::Pending),
            "completed" => Some(PaymentRequestStatus::Completed),
            "failed" => Some(PaymentRequestStatus::Failed),
            _ => None,
        }
    }
}

/// A pending or settled tier-upgrade order against the payment gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub id: String,
    pub landlord_id: String,
    pub order_code: i64,
    pub target_tier: Tier,
    pub amount: i64,
    pub status: PaymentRequestStatus,
    pub created_at: String,
}

/// A granted subscription period, created when the gateway reports PAID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub landlord_id: String,
    pub tier: Tier,
    pub period_start: String,
    pub period_end: String,
    pub payment_request_id: String,
    pub created_at: String,
}

/// Request body for starting a tier-upgrade checkout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub landlord_id: String,
    pub target_tier: Tier,
}
