//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data. Uniqueness
//! invariants (room codes, room-amenity pairs, invoice periods, gateway order
//! codes) live in UNIQUE indexes rather than read-then-write checks.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS landlords (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            email TEXT,
            subscription_tier TEXT NOT NULL DEFAULT 'free',
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dorms (
            id TEXT PRIMARY KEY,
            landlord_id TEXT NOT NULL,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            due_day INTEGER NOT NULL DEFAULT 5,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS amenities (
            id TEXT PRIMARY KEY,
            dorm_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT,
            unit_price INTEGER NOT NULL,
            unit TEXT,
            fee_mode TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id TEXT PRIMARY KEY,
            dorm_id TEXT NOT NULL,
            landlord_id TEXT NOT NULL,
            code TEXT NOT NULL,
            price INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'vacant',
            current_renter_id TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS room_amenity_links (
            id TEXT PRIMARY KEY,
            room_id TEXT NOT NULL,
            amenity_id TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            last_used_number INTEGER NOT NULL DEFAULT 0,
            month INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS renters (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            email TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            assigned_room_id TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id TEXT PRIMARY KEY,
            room_id TEXT NOT NULL,
            period_start TEXT NOT NULL,
            total_amount INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT 'VND',
            status TEXT NOT NULL DEFAULT 'pending',
            evidence_url TEXT,
            lines TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_evidence (
            id TEXT PRIMARY KEY,
            invoice_id TEXT NOT NULL,
            renter_id TEXT NOT NULL,
            files TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'submitted',
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_requests (
            id TEXT PRIMARY KEY,
            landlord_id TEXT NOT NULL,
            order_code INTEGER NOT NULL,
            target_tier TEXT NOT NULL,
            amount INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            landlord_id TEXT NOT NULL,
            tier TEXT NOT NULL,
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            payment_request_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Uniqueness invariants and lookup indexes
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_rooms_landlord_code ON rooms(landlord_id, code);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_links_room_amenity ON room_amenity_links(room_id, amenity_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_invoices_room_period ON invoices(room_id, period_start);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_payment_requests_order ON payment_requests(order_code);
        CREATE INDEX IF NOT EXISTS idx_dorms_landlord ON dorms(landlord_id);
        CREATE INDEX IF NOT EXISTS idx_amenities_dorm ON amenities(dorm_id);
        CREATE INDEX IF NOT EXISTS idx_rooms_dorm ON rooms(dorm_id);
        CREATE INDEX IF NOT EXISTS idx_links_room ON room_amenity_links(room_id);
        CREATE INDEX IF NOT EXISTS idx_links_amenity ON room_amenity_links(amenity_id);
        CREATE INDEX IF NOT EXISTS idx_invoices_room ON invoices(room_id);
        CREATE INDEX IF NOT EXISTS idx_evidence_invoice ON payment_evidence(invoice_id);
        CREATE INDEX IF NOT EXISTS idx_subscriptions_landlord ON subscriptions(landlord_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
