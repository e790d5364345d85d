//! Amenity catalog models.
//!
//! An amenity is a billable utility/service entry scoped to one dorm
//! (electricity, water, internet, ...). The catalog is replaced as a whole
//! through the diff-sync save operation.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// How an amenity is charged on an invoice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeeMode {
    /// unit_price × consumed units since the last meter reading.
    Metered,
    /// unit_price × number of occupants in the room.
    PerPerson,
    /// unit_price, flat per month.
    Fixed,
}

impl FeeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeMode::Metered => "metered",
            FeeMode::PerPerson => "per_person",
            FeeMode::Fixed => "fixed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "metered" => Some(FeeMode::Metered),
            "per_person" => Some(FeeMode::PerPerson),
            "fixed" => Some(FeeMode::Fixed),
            _ => None,
        }
    }
}

/// A billable amenity belonging to exactly one dorm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amenity {
    pub id: String,
    pub dorm_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Price in VND, per unit / person / month depending on fee mode.
    pub unit_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub fee_mode: FeeMode,
}

/// One entry of the incoming list for the diff-sync save operation.
/// An entry with an `id` updates the matching row; without one it inserts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmenityInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub unit_price: Option<i64>,
    #[serde(default)]
    pub unit: Option<String>,
    pub fee_mode: Option<FeeMode>,
}

impl AmenityInput {
    /// Validate one incoming amenity. Messages are the user-facing Vietnamese
    /// strings shown in the app; the field name is the stable machine handle.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name", "Tên dịch vụ không được để trống"));
        }
        match self.unit_price {
            None => {
                return Err(AppError::validation("unitPrice", "Đơn giá dịch vụ là bắt buộc"));
            }
            Some(p) if p < 0 => {
                return Err(AppError::validation("unitPrice", "Đơn giá dịch vụ không được âm"));
            }
            _ => {}
        }
        if self.fee_mode.is_none() {
            return Err(AppError::validation("feeMode", "Hình thức tính phí là bắt buộc"));
        }
        if let Some(unit) = &self.unit {
            if unit.trim().is_empty() {
                return Err(AppError::validation("unit", "Đơn vị tính không được để trống"));
            }
        }
        if let Some(category) = &self.category {
            if category.trim().is_empty() {
                return Err(AppError::validation("category", "Nhóm dịch vụ không được để trống"));
            }
        }
        Ok(())
    }
}

/// Request body for the catalog diff-sync save.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAmenitiesRequest {
    #[serde(default)]
    pub amenities: Vec<AmenityInput>,
}

/// Counts reported back from a catalog save.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAmenitiesReport {
    pub updated: i64,
    pub inserted: i64,
    pub deleted: i64,
    pub total: i64,
    pub links_created: i64,
}
