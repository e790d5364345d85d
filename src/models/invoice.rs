//! Invoice and payment evidence models.

use serde::{Deserialize, Serialize};

/// Invoice lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Submitted,
    Approved,
    Rejected,
    Unpaid,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Submitted => "submitted",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Rejected => "rejected",
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvoiceStatus::Pending),
            "submitted" => Some(InvoiceStatus::Submitted),
            "approved" => Some(InvoiceStatus::Approved),
            "rejected" => Some(InvoiceStatus::Rejected),
            "unpaid" => Some(InvoiceStatus::Unpaid),
            "paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }
}

/// A billing month, identified by its first day.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub year: i32,
    /// 1..=12
    pub month: u32,
}

impl Period {
    /// Canonical storage key for the period ("YYYY-MM-01"). The unique index
    /// on (room_id, period_start) keys off this.
    pub fn start_key(&self) -> String {
        format!("{:04}-{:02}-01", self.year, self.month)
    }

    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month) && self.year >= 2000
    }
}

/// One line of an invoice. Amounts are always computed server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub description: String,
    /// Amenity id this line bills, absent for the room rent line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amenity_id: Option<String>,
    pub unit_price: i64,
    pub quantity: i64,
    pub amount: i64,
}

/// A billing document for a room over one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub room_id: String,
    /// First day of the billing month ("YYYY-MM-01").
    pub period_start: String,
    pub total_amount: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_url: Option<String>,
    pub lines: Vec<InvoiceLine>,
    pub created_at: String,
}

/// Request body for creating an invoice. Line amounts are NOT accepted from
/// the caller; only the raw pricing inputs are.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub period: Period,
    /// Occupants for per-person amenities; defaults to 1.
    #[serde(default)]
    pub occupant_count: Option<i64>,
    /// Current meter readings for metered amenities.
    #[serde(default)]
    pub readings: Vec<crate::models::MeterReading>,
}

/// Request body for updating an invoice status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceStatusRequest {
    pub status: String,
}

/// Status of a renter-submitted payment evidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceStatus {
    Submitted,
    Approved,
    Rejected,
}

impl EvidenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceStatus::Submitted => "submitted",
            EvidenceStatus::Approved => "approved",
            EvidenceStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(EvidenceStatus::Submitted),
            "approved" => Some(EvidenceStatus::Approved),
            "rejected" => Some(EvidenceStatus::Rejected),
            _ => None,
        }
    }
}

/// Renter-submitted proof of payment attached to an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvidence {
    pub id: String,
    pub invoice_id: String,
    pub renter_id: String,
    /// Storage URLs of the uploaded files.
    pub files: Vec<String>,
    pub status: EvidenceStatus,
    pub created_at: String,
}

/// Request body for submitting payment evidence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEvidenceRequest {
    pub renter_id: String,
    pub files: Vec<String>,
}

/// Request body for approving or rejecting evidence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEvidenceRequest {
    pub approve: bool,
}
