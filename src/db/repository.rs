//! Database repository for CRUD operations and the core business routines:
//! room-amenity link reconciliation, amenity catalog diff-sync, invoice
//! composition, and the payment webhook transition.
//!
//! Uses prepared statements and transactions for data integrity. Every
//! multi-write routine that touches only the store runs in one transaction.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::billing;
use crate::errors::AppError;
use crate::models::{
    Amenity, AmenityInput, CreateInvoiceRequest, CreateLandlordRequest, CreateRenterRequest,
    CreateRoomRequest, Dorm, EvidenceStatus, FeeMode, Invoice, InvoiceStatus, Landlord,
    MeterReading, PaymentEvidence, PaymentRequest, PaymentRequestStatus, ReadingOutcome,
    ReconcileReport, Renter, Room, RoomAmenityLink, RoomStatus, SaveAmenitiesReport, Subscription,
    Tier, UpdateDormRequest, UpdateRoomRequest,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

/// Result of applying one gateway webhook delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    pub order_code: i64,
    pub status: PaymentRequestStatus,
    /// False when the request had already settled and the delivery was a no-op.
    pub applied: bool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== LANDLORD OPERATIONS ====================

    /// Create a new landlord on the free tier.
    pub async fn create_landlord(
        &self,
        request: &CreateLandlordRequest,
    ) -> Result<Landlord, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO landlords (id, display_name, email, subscription_tier, created_at) VALUES (?, ?, ?, 'free', ?)",
        )
        .bind(&id)
        .bind(&request.display_name)
        .bind(&request.email)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Landlord {
            id,
            display_name: request.display_name.clone(),
            email: request.email.clone(),
            subscription_tier: Tier::Free,
            created_at: now,
        })
    }

    /// Get a landlord by ID.
    pub async fn get_landlord(&self, id: &str) -> Result<Option<Landlord>, AppError> {
        let row = sqlx::query(
            "SELECT id, display_name, email, subscription_tier, created_at FROM landlords WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(landlord_from_row))
    }

    /// Count dorms owned by a landlord, for the tier gate.
    pub async fn count_dorms(&self, landlord_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM dorms WHERE landlord_id = ?")
            .bind(landlord_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Count rooms across all of a landlord's dorms, for the tier gate.
    pub async fn count_rooms(&self, landlord_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM rooms WHERE landlord_id = ?")
            .bind(landlord_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    // ==================== DORM OPERATIONS ====================

    /// Create a new dorm. The tier gate runs in the handler before this.
    pub async fn create_dorm(
        &self,
        landlord_id: &str,
        name: &str,
        address: &str,
        due_day: i64,
    ) -> Result<Dorm, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO dorms (id, landlord_id, name, address, due_day, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(landlord_id)
        .bind(name)
        .bind(address)
        .bind(due_day)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Dorm {
            id,
            landlord_id: landlord_id.to_string(),
            name: name.to_string(),
            address: address.to_string(),
            due_day,
            created_at: now,
        })
    }

    /// Get a dorm by ID.
    pub async fn get_dorm(&self, id: &str) -> Result<Option<Dorm>, AppError> {
        let row = sqlx::query(
            "SELECT id, landlord_id, name, address, due_day, created_at FROM dorms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(dorm_from_row))
    }

    /// List dorms owned by a landlord.
    pub async fn list_dorms(&self, landlord_id: &str) -> Result<Vec<Dorm>, AppError> {
        let rows = sqlx::query(
            "SELECT id, landlord_id, name, address, due_day, created_at FROM dorms WHERE landlord_id = ? ORDER BY name",
        )
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(dorm_from_row).collect())
    }

    /// Update a dorm.
    pub async fn update_dorm(
        &self,
        id: &str,
        request: &UpdateDormRequest,
    ) -> Result<Dorm, AppError> {
        let existing = self
            .get_dorm(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dorm {} not found", id)))?;

        let name = request.name.as_ref().unwrap_or(&existing.name);
        let address = request.address.as_ref().unwrap_or(&existing.address);
        let due_day = request.due_day.unwrap_or(existing.due_day);

        if !(1..=28).contains(&due_day) {
            return Err(AppError::validation(
                "dueDay",
                "Ngày đến hạn phải nằm trong khoảng 1 đến 28",
            ));
        }

        sqlx::query("UPDATE dorms SET name = ?, address = ?, due_day = ? WHERE id = ?")
            .bind(name)
            .bind(address)
            .bind(due_day)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(Dorm {
            id: id.to_string(),
            landlord_id: existing.landlord_id,
            name: name.clone(),
            address: address.clone(),
            due_day,
            created_at: existing.created_at,
        })
    }

    /// Delete a dorm. Rejected while rooms remain. Remaining amenities require
    /// `force`, which cascades their room links first.
    pub async fn delete_dorm(&self, id: &str, force: bool) -> Result<(), AppError> {
        let dorm = self
            .get_dorm(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dorm {} not found", id)))?;

        let room_count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM rooms WHERE dorm_id = ?")
            .bind(&dorm.id)
            .fetch_one(&self.pool)
            .await?
            .get("n");
        if room_count > 0 {
            return Err(AppError::validation(
                "dormId",
                "Không thể xóa nhà trọ khi vẫn còn phòng",
            ));
        }

        let amenity_count: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM amenities WHERE dorm_id = ?")
                .bind(&dorm.id)
                .fetch_one(&self.pool)
                .await?
                .get("n");
        if amenity_count > 0 && !force {
            return Err(AppError::validation(
                "dormId",
                "Nhà trọ vẫn còn dịch vụ, dùng force để xóa kèm",
            ));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM room_amenity_links WHERE amenity_id IN (SELECT id FROM amenities WHERE dorm_id = ?)",
        )
        .bind(&dorm.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM amenities WHERE dorm_id = ?")
            .bind(&dorm.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM dorms WHERE id = ?")
            .bind(&dorm.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ==================== AMENITY OPERATIONS ====================

    /// List a dorm's amenities.
    pub async fn list_amenities(&self, dorm_id: &str) -> Result<Vec<Amenity>, AppError> {
        let rows = sqlx::query(
            "SELECT id, dorm_id, name, category, unit_price, unit, fee_mode FROM amenities WHERE dorm_id = ? ORDER BY name",
        )
        .bind(dorm_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(amenity_from_row).collect())
    }

    /// Replace a dorm's amenity catalog with the incoming list in one logical
    /// operation: update rows whose id matches, insert rows without an id,
    /// delete existing rows absent from the list (cascading their room links),
    /// then fan links for the inserted amenities out to every room.
    pub async fn save_amenities(
        &self,
        dorm_id: &str,
        incoming: &[AmenityInput],
    ) -> Result<SaveAmenitiesReport, AppError> {
        // Fail fast: the whole operation aborts on the first invalid entry.
        for input in incoming {
            input.validate()?;
        }

        let dorm = self
            .get_dorm(dorm_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dorm {} not found", dorm_id)))?;

        let existing = self.list_amenities(&dorm.id).await?;
        let existing_ids: HashSet<&str> = existing.iter().map(|a| a.id.as_str()).collect();
        let incoming_ids: HashSet<&str> = incoming
            .iter()
            .filter_map(|a| a.id.as_deref())
            .collect();

        let room_ids: Vec<String> = sqlx::query("SELECT id FROM rooms WHERE dorm_id = ?")
            .bind(&dorm.id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| row.get("id"))
            .collect();

        let month = Utc::now().month() as i64;
        let mut tx = self.pool.begin().await?;

        let mut updated = 0i64;
        let mut inserted = 0i64;
        let mut links_created = 0i64;

        for input in incoming {
            let unit_price = input.unit_price.unwrap_or_default();
            let fee_mode = input.fee_mode.unwrap_or(FeeMode::Fixed);

            match &input.id {
                Some(amenity_id) => {
                    if !existing_ids.contains(amenity_id.as_str()) {
                        return Err(AppError::NotFound(format!(
                            "Amenity {} not found in dorm {}",
                            amenity_id, dorm.id
                        )));
                    }
                    sqlx::query(
                        "UPDATE amenities SET name = ?, category = ?, unit_price = ?, unit = ?, fee_mode = ? WHERE id = ? AND dorm_id = ?",
                    )
                    .bind(&input.name)
                    .bind(&input.category)
                    .bind(unit_price)
                    .bind(&input.unit)
                    .bind(fee_mode.as_str())
                    .bind(amenity_id)
                    .bind(&dorm.id)
                    .execute(&mut *tx)
                    .await?;
                    updated += 1;
                }
                None => {
                    let amenity_id = uuid::Uuid::new_v4().to_string();
                    sqlx::query(
                        "INSERT INTO amenities (id, dorm_id, name, category, unit_price, unit, fee_mode) VALUES (?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(&amenity_id)
                    .bind(&dorm.id)
                    .bind(&input.name)
                    .bind(&input.category)
                    .bind(unit_price)
                    .bind(&input.unit)
                    .bind(fee_mode.as_str())
                    .execute(&mut *tx)
                    .await?;
                    inserted += 1;

                    // Fan the new amenity out to every room in the dorm.
                    for room_id in &room_ids {
                        let result = sqlx::query(
                            "INSERT INTO room_amenity_links (id, room_id, amenity_id, enabled, last_used_number, month) VALUES (?, ?, ?, 1, 0, ?) ON CONFLICT(room_id, amenity_id) DO NOTHING",
                        )
                        .bind(uuid::Uuid::new_v4().to_string())
                        .bind(room_id)
                        .bind(&amenity_id)
                        .bind(month)
                        .execute(&mut *tx)
                        .await?;
                        links_created += result.rows_affected() as i64;
                    }
                }
            }
        }

        let mut deleted = 0i64;
        for amenity in &existing {
            if !incoming_ids.contains(amenity.id.as_str()) {
                sqlx::query("DELETE FROM room_amenity_links WHERE amenity_id = ?")
                    .bind(&amenity.id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM amenities WHERE id = ?")
                    .bind(&amenity.id)
                    .execute(&mut *tx)
                    .await?;
                deleted += 1;
            }
        }

        tx.commit().await?;

        Ok(SaveAmenitiesReport {
            updated,
            inserted,
            deleted,
            total: existing.len() as i64 - deleted + inserted,
            links_created,
        })
    }

    // ==================== ROOM OPERATIONS ====================

    /// Create a new room and fan out links for the dorm's existing amenities.
    /// The tier gate runs in the handler before this.
    pub async fn create_room(&self, request: &CreateRoomRequest) -> Result<Room, AppError> {
        let dorm = self
            .get_dorm(&request.dorm_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dorm {} not found", request.dorm_id)))?;

        let amenities = self.list_amenities(&dorm.id).await?;
        let id = uuid::Uuid::new_v4().to_string();
        let month = Utc::now().month() as i64;

        let mut tx = self.pool.begin().await?;

        let insert = sqlx::query(
            "INSERT INTO rooms (id, dorm_id, landlord_id, code, price, status, current_renter_id) VALUES (?, ?, ?, ?, ?, 'vacant', NULL)",
        )
        .bind(&id)
        .bind(&dorm.id)
        .bind(&dorm.landlord_id)
        .bind(&request.code)
        .bind(request.price)
        .execute(&mut *tx)
        .await;

        if let Err(err) = insert {
            if is_unique_violation(&err) {
                return Err(AppError::validation("code", "Mã phòng đã tồn tại"));
            }
            return Err(err.into());
        }

        for amenity in &amenities {
            sqlx::query(
                "INSERT INTO room_amenity_links (id, room_id, amenity_id, enabled, last_used_number, month) VALUES (?, ?, ?, 1, 0, ?) ON CONFLICT(room_id, amenity_id) DO NOTHING",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&id)
            .bind(&amenity.id)
            .bind(month)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Room {
            id,
            dorm_id: dorm.id,
            landlord_id: dorm.landlord_id,
            code: request.code.clone(),
            price: request.price,
            status: RoomStatus::Vacant,
            current_renter_id: None,
        })
    }

    /// Get a room by ID.
    pub async fn get_room(&self, id: &str) -> Result<Option<Room>, AppError> {
        let row = sqlx::query(
            "SELECT id, dorm_id, landlord_id, code, price, status, current_renter_id FROM rooms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(room_from_row))
    }

    /// List rooms in a dorm.
    pub async fn list_rooms(&self, dorm_id: &str) -> Result<Vec<Room>, AppError> {
        let rows = sqlx::query(
            "SELECT id, dorm_id, landlord_id, code, price, status, current_renter_id FROM rooms WHERE dorm_id = ? ORDER BY code",
        )
        .bind(dorm_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(room_from_row).collect())
    }

    /// Update a room. A room with a renter assigned can never move to vacant.
    pub async fn update_room(
        &self,
        id: &str,
        request: &UpdateRoomRequest,
    ) -> Result<Room, AppError> {
        let existing = self
            .get_room(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", id)))?;

        let code = request.code.as_ref().unwrap_or(&existing.code);
        let price = request.price.unwrap_or(existing.price);
        let status = request.status.unwrap_or(existing.status);

        if existing.current_renter_id.is_some() && status == RoomStatus::Vacant {
            return Err(AppError::validation(
                "status",
                "Phòng đang có người thuê, không thể chuyển về trạng thái trống",
            ));
        }

        let result = sqlx::query("UPDATE rooms SET code = ?, price = ?, status = ? WHERE id = ?")
            .bind(code)
            .bind(price)
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await;

        if let Err(err) = result {
            if is_unique_violation(&err) {
                return Err(AppError::validation("code", "Mã phòng đã tồn tại"));
            }
            return Err(err.into());
        }

        Ok(Room {
            id: id.to_string(),
            dorm_id: existing.dorm_id,
            landlord_id: existing.landlord_id,
            code: code.clone(),
            price,
            status,
            current_renter_id: existing.current_renter_id,
        })
    }

    /// Delete a room and its amenity links. Rejected while a renter is assigned.
    pub async fn delete_room(&self, id: &str) -> Result<(), AppError> {
        let room = self
            .get_room(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", id)))?;

        if room.current_renter_id.is_some() {
            return Err(AppError::validation(
                "roomId",
                "Không thể xóa phòng đang có người thuê",
            ));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM room_amenity_links WHERE room_id = ?")
            .bind(&room.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(&room.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ==================== LINK OPERATIONS ====================

    /// List a room's amenity links.
    pub async fn list_links(&self, room_id: &str) -> Result<Vec<RoomAmenityLink>, AppError> {
        let rows = sqlx::query(
            "SELECT id, room_id, amenity_id, enabled, last_used_number, month FROM room_amenity_links WHERE room_id = ?",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(link_from_row).collect())
    }

    /// Guarantee every (room, amenity) pair in the dorm has exactly one link.
    ///
    /// Loads the dorm's rooms, amenities, and existing links in three indexed
    /// scans, diffs the Cartesian product against an in-memory pair set, and
    /// inserts only the missing links. The unique index on (room_id,
    /// amenity_id) makes concurrent calls converge without duplicates.
    /// Idempotent: a second call creates zero rows.
    pub async fn reconcile_dorm_links(&self, dorm_id: &str) -> Result<ReconcileReport, AppError> {
        let dorm = self
            .get_dorm(dorm_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dorm {} not found", dorm_id)))?;

        let rooms = self.list_rooms(&dorm.id).await?;
        let amenities = self.list_amenities(&dorm.id).await?;

        let existing_rows = sqlx::query(
            "SELECT l.room_id, l.amenity_id FROM room_amenity_links l JOIN rooms r ON r.id = l.room_id WHERE r.dorm_id = ?",
        )
        .bind(&dorm.id)
        .fetch_all(&self.pool)
        .await?;

        let existing: HashSet<(String, String)> = existing_rows
            .iter()
            .map(|row| (row.get("room_id"), row.get("amenity_id")))
            .collect();

        let month = Utc::now().month() as i64;
        let mut tx = self.pool.begin().await?;
        let mut created = 0i64;

        for room in &rooms {
            for amenity in &amenities {
                if existing.contains(&(room.id.clone(), amenity.id.clone())) {
                    continue;
                }
                let result = sqlx::query(
                    "INSERT INTO room_amenity_links (id, room_id, amenity_id, enabled, last_used_number, month) VALUES (?, ?, ?, 1, 0, ?) ON CONFLICT(room_id, amenity_id) DO NOTHING",
                )
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(&room.id)
                .bind(&amenity.id)
                .bind(month)
                .execute(&mut *tx)
                .await?;
                created += result.rows_affected() as i64;
            }
        }

        tx.commit().await?;

        let total = rooms.len() as i64 * amenities.len() as i64;
        Ok(ReconcileReport {
            created,
            existing: total - created,
        })
    }

    /// Flip the enabled flag on one room-amenity link.
    pub async fn toggle_link(
        &self,
        room_id: &str,
        amenity_id: &str,
        enabled: bool,
    ) -> Result<RoomAmenityLink, AppError> {
        let result = sqlx::query(
            "UPDATE room_amenity_links SET enabled = ? WHERE room_id = ? AND amenity_id = ?",
        )
        .bind(enabled as i32)
        .bind(room_id)
        .bind(amenity_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No amenity link for room {} and amenity {}",
                room_id, amenity_id
            )));
        }

        let row = sqlx::query(
            "SELECT id, room_id, amenity_id, enabled, last_used_number, month FROM room_amenity_links WHERE room_id = ? AND amenity_id = ?",
        )
        .bind(room_id)
        .bind(amenity_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(link_from_row(&row))
    }

    /// Record a batch of meter readings on a room. Readings for amenities the
    /// room has no link for are skipped, and each reading reports whether it
    /// was applied.
    pub async fn record_meter_readings(
        &self,
        room_id: &str,
        readings: &[MeterReading],
    ) -> Result<Vec<ReadingOutcome>, AppError> {
        let month = Utc::now().month() as i64;
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(readings.len());

        for reading in readings {
            let result = sqlx::query(
                "UPDATE room_amenity_links SET last_used_number = ?, month = ? WHERE room_id = ? AND amenity_id = ?",
            )
            .bind(reading.current)
            .bind(month)
            .bind(room_id)
            .bind(&reading.amenity_id)
            .execute(&mut *tx)
            .await?;

            outcomes.push(ReadingOutcome {
                amenity_id: reading.amenity_id.clone(),
                applied: result.rows_affected() > 0,
            });
        }

        tx.commit().await?;
        Ok(outcomes)
    }

    // ==================== RENTER OPERATIONS ====================

    /// Create a new renter.
    pub async fn create_renter(&self, request: &CreateRenterRequest) -> Result<Renter, AppError> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO renters (id, user_id, display_name, email, active, assigned_room_id) VALUES (?, ?, ?, ?, ?, NULL)",
        )
        .bind(&id)
        .bind(&request.user_id)
        .bind(&request.display_name)
        .bind(&request.email)
        .bind(request.active as i32)
        .execute(&self.pool)
        .await?;

        Ok(Renter {
            id,
            user_id: request.user_id.clone(),
            display_name: request.display_name.clone(),
            email: request.email.clone(),
            active: request.active,
            assigned_room_id: None,
        })
    }

    /// Get a renter by ID.
    pub async fn get_renter(&self, id: &str) -> Result<Option<Renter>, AppError> {
        let row = sqlx::query(
            "SELECT id, user_id, display_name, email, active, assigned_room_id FROM renters WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(renter_from_row))
    }

    /// Assign a renter to a room. Both sides of the bidirectional pointer are
    /// patched in one transaction; the room moves to occupied.
    pub async fn assign_renter(&self, renter_id: &str, room_id: &str) -> Result<Renter, AppError> {
        let renter = self
            .get_renter(renter_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Renter {} not found", renter_id)))?;
        let room = self
            .get_room(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))?;

        if renter.assigned_room_id.is_some() {
            return Err(AppError::validation(
                "renterId",
                "Người thuê đã được xếp phòng",
            ));
        }
        if room.current_renter_id.is_some() {
            return Err(AppError::validation("roomId", "Phòng đã có người thuê"));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE rooms SET current_renter_id = ?, status = 'occupied' WHERE id = ?")
            .bind(renter_id)
            .bind(room_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE renters SET assigned_room_id = ? WHERE id = ?")
            .bind(room_id)
            .bind(renter_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Renter {
            assigned_room_id: Some(room_id.to_string()),
            ..renter
        })
    }

    /// Unassign a renter from their room; the room moves back to vacant.
    pub async fn unassign_renter(&self, renter_id: &str) -> Result<Renter, AppError> {
        let renter = self
            .get_renter(renter_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Renter {} not found", renter_id)))?;

        let Some(room_id) = renter.assigned_room_id.clone() else {
            return Err(AppError::validation(
                "renterId",
                "Người thuê chưa được xếp phòng",
            ));
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE rooms SET current_renter_id = NULL, status = 'vacant' WHERE id = ?")
            .bind(&room_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE renters SET assigned_room_id = NULL WHERE id = ?")
            .bind(renter_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Renter {
            assigned_room_id: None,
            ..renter
        })
    }

    // ==================== INVOICE OPERATIONS ====================

    /// Compose and persist an invoice for a room and billing month.
    ///
    /// All amounts are computed server-side from stored pricing and the
    /// submitted readings/occupant count. Idempotent per (room, period): an
    /// existing invoice is returned unchanged with `created = false` and no
    /// writes. Submitted metered readings advance the link baselines in the
    /// same transaction as the insert.
    pub async fn create_invoice(
        &self,
        room_id: &str,
        request: &CreateInvoiceRequest,
    ) -> Result<(Invoice, bool), AppError> {
        if !request.period.is_valid() {
            return Err(AppError::validation("period", "Kỳ hóa đơn không hợp lệ"));
        }
        let period_key = request.period.start_key();

        let room = self
            .get_room(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            "SELECT id, room_id, period_start, total_amount, currency, status, evidence_url, lines, created_at FROM invoices WHERE room_id = ? AND period_start = ?",
        )
        .bind(&room.id)
        .bind(&period_key)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            tx.rollback().await?;
            return Ok((invoice_from_row(&row), false));
        }

        // Enabled links with their amenities, joined in memory.
        let links: Vec<RoomAmenityLink> = sqlx::query(
            "SELECT id, room_id, amenity_id, enabled, last_used_number, month FROM room_amenity_links WHERE room_id = ? AND enabled = 1",
        )
        .bind(&room.id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(link_from_row)
        .collect();

        let amenities: HashMap<String, Amenity> = sqlx::query(
            "SELECT id, dorm_id, name, category, unit_price, unit, fee_mode FROM amenities WHERE dorm_id = ?",
        )
        .bind(&room.dorm_id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(amenity_from_row)
        .map(|a| (a.id.clone(), a))
        .collect();

        let billable: Vec<(Amenity, RoomAmenityLink)> = links
            .into_iter()
            .filter_map(|link| {
                amenities
                    .get(&link.amenity_id)
                    .cloned()
                    .map(|amenity| (amenity, link))
            })
            .collect();

        let occupants = request.occupant_count.unwrap_or(1);
        let lines = billing::compute_line_items(&room, &billable, &request.readings, occupants);
        let total_amount = billing::total(&lines);

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let lines_json = serde_json::to_string(&lines)?;

        sqlx::query(
            "INSERT INTO invoices (id, room_id, period_start, total_amount, currency, status, evidence_url, lines, created_at) VALUES (?, ?, ?, ?, 'VND', 'pending', NULL, ?, ?)",
        )
        .bind(&id)
        .bind(&room.id)
        .bind(&period_key)
        .bind(total_amount)
        .bind(&lines_json)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        // Advance metered baselines so the next period bills from here.
        for reading in &request.readings {
            let is_metered = billable
                .iter()
                .any(|(a, _)| a.id == reading.amenity_id && a.fee_mode == FeeMode::Metered);
            if is_metered {
                sqlx::query(
                    "UPDATE room_amenity_links SET last_used_number = ?, month = ? WHERE room_id = ? AND amenity_id = ?",
                )
                .bind(reading.current)
                .bind(request.period.month as i64)
                .bind(&room.id)
                .bind(&reading.amenity_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        Ok((
            Invoice {
                id,
                room_id: room.id,
                period_start: period_key,
                total_amount,
                currency: "VND".to_string(),
                status: InvoiceStatus::Pending,
                evidence_url: None,
                lines,
                created_at: now,
            },
            true,
        ))
    }

    /// Get an invoice by ID.
    pub async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, AppError> {
        let row = sqlx::query(
            "SELECT id, room_id, period_start, total_amount, currency, status, evidence_url, lines, created_at FROM invoices WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(invoice_from_row))
    }

    /// List a room's invoices, newest period first.
    pub async fn list_invoices(&self, room_id: &str) -> Result<Vec<Invoice>, AppError> {
        let rows = sqlx::query(
            "SELECT id, room_id, period_start, total_amount, currency, status, evidence_url, lines, created_at FROM invoices WHERE room_id = ? ORDER BY period_start DESC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(invoice_from_row).collect())
    }

    /// Update an invoice's status. Paid/unpaid require evidence to be on file.
    pub async fn update_invoice_status(
        &self,
        id: &str,
        status: &str,
    ) -> Result<Invoice, AppError> {
        let Some(status) = InvoiceStatus::from_str(status) else {
            return Err(AppError::validation(
                "status",
                "Trạng thái hóa đơn không hợp lệ",
            ));
        };

        let invoice = self
            .get_invoice(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", id)))?;

        if matches!(status, InvoiceStatus::Paid | InvoiceStatus::Unpaid)
            && invoice.evidence_url.is_none()
        {
            return Err(AppError::validation(
                "status",
                "Hóa đơn chưa có minh chứng thanh toán",
            ));
        }

        sqlx::query("UPDATE invoices SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(Invoice { status, ..invoice })
    }

    // ==================== EVIDENCE OPERATIONS ====================

    /// Submit renter payment evidence: the invoice moves to submitted and its
    /// evidence URL points at the first uploaded file.
    pub async fn submit_evidence(
        &self,
        invoice_id: &str,
        renter_id: &str,
        files: &[String],
    ) -> Result<PaymentEvidence, AppError> {
        let Some(first_file) = files.first() else {
            return Err(AppError::validation(
                "files",
                "Cần ít nhất một ảnh minh chứng",
            ));
        };

        let invoice = self
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", invoice_id)))?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let files_json = serde_json::to_string(files)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO payment_evidence (id, invoice_id, renter_id, files, status, created_at) VALUES (?, ?, ?, ?, 'submitted', ?)",
        )
        .bind(&id)
        .bind(&invoice.id)
        .bind(renter_id)
        .bind(&files_json)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE invoices SET status = 'submitted', evidence_url = ? WHERE id = ?")
            .bind(first_file)
            .bind(&invoice.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(PaymentEvidence {
            id,
            invoice_id: invoice.id,
            renter_id: renter_id.to_string(),
            files: files.to_vec(),
            status: EvidenceStatus::Submitted,
            created_at: now,
        })
    }

    /// Approve or reject submitted evidence: approving marks the linked
    /// invoice paid, rejecting marks it rejected. One transaction each.
    pub async fn review_evidence(
        &self,
        evidence_id: &str,
        approve: bool,
    ) -> Result<PaymentEvidence, AppError> {
        let row = sqlx::query(
            "SELECT id, invoice_id, renter_id, files, status, created_at FROM payment_evidence WHERE id = ?",
        )
        .bind(evidence_id)
        .fetch_optional(&self.pool)
        .await?;

        let evidence = row
            .as_ref()
            .map(evidence_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Evidence {} not found", evidence_id)))?;

        if evidence.status != EvidenceStatus::Submitted {
            return Err(AppError::validation(
                "status",
                "Minh chứng đã được xử lý trước đó",
            ));
        }

        let (evidence_status, invoice_status) = if approve {
            (EvidenceStatus::Approved, InvoiceStatus::Paid)
        } else {
            (EvidenceStatus::Rejected, InvoiceStatus::Rejected)
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE payment_evidence SET status = ? WHERE id = ?")
            .bind(evidence_status.as_str())
            .bind(&evidence.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE invoices SET status = ? WHERE id = ?")
            .bind(invoice_status.as_str())
            .bind(&evidence.invoice_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(PaymentEvidence {
            status: evidence_status,
            ..evidence
        })
    }

    // ==================== PAYMENT / SUBSCRIPTION OPERATIONS ====================

    /// Persist a pending tier-upgrade order before redirecting to the gateway.
    pub async fn create_payment_request(
        &self,
        landlord_id: &str,
        order_code: i64,
        target_tier: Tier,
        amount: i64,
    ) -> Result<PaymentRequest, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO payment_requests (id, landlord_id, order_code, target_tier, amount, status, created_at) VALUES (?, ?, ?, ?, ?, 'pending', ?)",
        )
        .bind(&id)
        .bind(landlord_id)
        .bind(order_code)
        .bind(target_tier.as_str())
        .bind(amount)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(PaymentRequest {
            id,
            landlord_id: landlord_id.to_string(),
            order_code,
            target_tier,
            amount,
            status: PaymentRequestStatus::Pending,
            created_at: now,
        })
    }

    /// Apply one gateway webhook delivery.
    ///
    /// A request that already settled is left untouched and reported as a
    /// no-op, so replayed deliveries create exactly one subscription row and
    /// patch the tier exactly once. "PAID" completes the request, grants a
    /// subscription through the end of next month, and patches the landlord's
    /// tier; any other gateway status fails the request with no side effects.
    pub async fn apply_payment_webhook(
        &self,
        order_code: i64,
        gateway_status: &str,
    ) -> Result<WebhookOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, landlord_id, order_code, target_tier, amount, status, created_at FROM payment_requests WHERE order_code = ?",
        )
        .bind(order_code)
        .fetch_optional(&mut *tx)
        .await?;

        let request = row
            .as_ref()
            .map(payment_request_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_code)))?;

        if request.status != PaymentRequestStatus::Pending {
            tx.rollback().await?;
            return Ok(WebhookOutcome {
                order_code,
                status: request.status,
                applied: false,
            });
        }

        let now = Utc::now();
        let outcome_status = if gateway_status == "PAID" {
            sqlx::query("UPDATE payment_requests SET status = 'completed' WHERE id = ?")
                .bind(&request.id)
                .execute(&mut *tx)
                .await?;

            let period_start = now.date_naive();
            let period_end = end_of_next_month(period_start);
            sqlx::query(
                "INSERT INTO subscriptions (id, landlord_id, tier, period_start, period_end, payment_request_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&request.landlord_id)
            .bind(request.target_tier.as_str())
            .bind(period_start.to_string())
            .bind(period_end.to_string())
            .bind(&request.id)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE landlords SET subscription_tier = ? WHERE id = ?")
                .bind(request.target_tier.as_str())
                .bind(&request.landlord_id)
                .execute(&mut *tx)
                .await?;

            PaymentRequestStatus::Completed
        } else {
            sqlx::query("UPDATE payment_requests SET status = 'failed' WHERE id = ?")
                .bind(&request.id)
                .execute(&mut *tx)
                .await?;
            PaymentRequestStatus::Failed
        };

        tx.commit().await?;

        Ok(WebhookOutcome {
            order_code,
            status: outcome_status,
            applied: true,
        })
    }

    /// List a landlord's granted subscription periods, newest first.
    pub async fn list_subscriptions(&self, landlord_id: &str) -> Result<Vec<Subscription>, AppError> {
        let rows = sqlx::query(
            "SELECT id, landlord_id, tier, period_start, period_end, payment_request_id, created_at FROM subscriptions WHERE landlord_id = ? ORDER BY created_at DESC",
        )
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(subscription_from_row).collect())
    }
}

/// Last day of the month after `today`'s ("next-month-inclusive" periods).
fn end_of_next_month(today: NaiveDate) -> NaiveDate {
    let (year, month) = (today.year(), today.month());
    let (fy, fm) = if month >= 11 {
        (year + 1, month - 10)
    } else {
        (year, month + 2)
    };
    NaiveDate::from_ymd_opt(fy, fm, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(today)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}

// Helper functions for row conversion

fn landlord_from_row(row: &sqlx::sqlite::SqliteRow) -> Landlord {
    let tier: String = row.get("subscription_tier");
    Landlord {
        id: row.get("id"),
        display_name: row.get("display_name"),
        email: row.get("email"),
        subscription_tier: Tier::from_str(&tier).unwrap_or(Tier::Free),
        created_at: row.get("created_at"),
    }
}

fn dorm_from_row(row: &sqlx::sqlite::SqliteRow) -> Dorm {
    Dorm {
        id: row.get("id"),
        landlord_id: row.get("landlord_id"),
        name: row.get("name"),
        address: row.get("address"),
        due_day: row.get("due_day"),
        created_at: row.get("created_at"),
    }
}

fn amenity_from_row(row: &sqlx::sqlite::SqliteRow) -> Amenity {
    let fee_mode: String = row.get("fee_mode");
    Amenity {
        id: row.get("id"),
        dorm_id: row.get("dorm_id"),
        name: row.get("name"),
        category: row.get("category"),
        unit_price: row.get("unit_price"),
        unit: row.get("unit"),
        fee_mode: FeeMode::from_str(&fee_mode).unwrap_or(FeeMode::Fixed),
    }
}

fn room_from_row(row: &sqlx::sqlite::SqliteRow) -> Room {
    let status: String = row.get("status");
    Room {
        id: row.get("id"),
        dorm_id: row.get("dorm_id"),
        landlord_id: row.get("landlord_id"),
        code: row.get("code"),
        price: row.get("price"),
        status: RoomStatus::from_str(&status).unwrap_or(RoomStatus::Vacant),
        current_renter_id: row.get("current_renter_id"),
    }
}

fn link_from_row(row: &sqlx::sqlite::SqliteRow) -> RoomAmenityLink {
    let enabled: i32 = row.get("enabled");
    RoomAmenityLink {
        id: row.get("id"),
        room_id: row.get("room_id"),
        amenity_id: row.get("amenity_id"),
        enabled: enabled != 0,
        last_used_number: row.get("last_used_number"),
        month: row.get("month"),
    }
}

fn renter_from_row(row: &sqlx::sqlite::SqliteRow) -> Renter {
    let active: i32 = row.get("active");
    Renter {
        id: row.get("id"),
        user_id: row.get("user_id"),
        display_name: row.get("display_name"),
        email: row.get("email"),
        active: active != 0,
        assigned_room_id: row.get("assigned_room_id"),
    }
}

fn invoice_from_row(row: &sqlx::sqlite::SqliteRow) -> Invoice {
    let status: String = row.get("status");
    let lines_str: String = row.get("lines");
    Invoice {
        id: row.get("id"),
        room_id: row.get("room_id"),
        period_start: row.get("period_start"),
        total_amount: row.get("total_amount"),
        currency: row.get("currency"),
        status: InvoiceStatus::from_str(&status).unwrap_or(InvoiceStatus::Pending),
        evidence_url: row.get("evidence_url"),
        lines: serde_json::from_str(&lines_str).unwrap_or_default(),
        created_at: row.get("created_at"),
    }
}

fn evidence_from_row(row: &sqlx::sqlite::SqliteRow) -> PaymentEvidence {
    let status: String = row.get("status");
    let files_str: String = row.get("files");
    PaymentEvidence {
        id: row.get("id"),
        invoice_id: row.get("invoice_id"),
        renter_id: row.get("renter_id"),
        files: serde_json::from_str(&files_str).unwrap_or_default(),
        status: EvidenceStatus::from_str(&status).unwrap_or(EvidenceStatus::Submitted),
        created_at: row.get("created_at"),
    }
}

fn payment_request_from_row(row: &sqlx::sqlite::SqliteRow) -> PaymentRequest {
    let tier: String = row.get("target_tier");
    let status: String = row.get("status");
    PaymentRequest {
        id: row.get("id"),
        landlord_id: row.get("landlord_id"),
        order_code: row.get("order_code"),
        target_tier: Tier::from_str(&tier).unwrap_or(Tier::Free),
        amount: row.get("amount"),
        status: PaymentRequestStatus::from_str(&status).unwrap_or(PaymentRequestStatus::Pending),
        created_at: row.get("created_at"),
    }
}

fn subscription_from_row(row: &sqlx::sqlite::SqliteRow) -> Subscription {
    let tier: String = row.get("tier");
    Subscription {
        id: row.get("id"),
        landlord_id: row.get("landlord_id"),
        tier: Tier::from_str(&tier).unwrap_or(Tier::Free),
        period_start: row.get("period_start"),
        period_end: row.get("period_end"),
        payment_request_id: row.get("payment_request_id"),
        created_at: row.get("created_at"),
    }
}
