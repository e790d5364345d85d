//! DormHub Backend
//!
//! A production-grade REST backend for dormitory rental management with
//! SQLite persistence, payment-gateway checkout/webhook handling, and
//! invoice notification emails.

mod api;
mod auth;
mod billing;
mod config;
mod db;
mod errors;
mod models;
mod notify;
mod payments;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use notify::Mailer;
use payments::PaymentGateway;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub gateway: Arc<PaymentGateway>,
    pub mailer: Arc<Mailer>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DormHub Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (DORMHUB_API_PSK). Authentication is disabled!");
    }
    if config.gateway_checksum_key.is_none() {
        tracing::warn!(
            "No gateway checksum key configured (DORMHUB_GATEWAY_CHECKSUM_KEY). Payment webhooks will be rejected."
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // External collaborators
    let gateway = Arc::new(PaymentGateway::from_config(&config));
    let mailer = Arc::new(Mailer::from_config(&config));

    // Create application state
    let state = AppState {
        repo,
        gateway,
        mailer,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Landlords
        .route("/landlords", post(api::create_landlord))
        .route("/landlords/{id}", get(api::get_landlord))
        .route("/landlords/{id}/dorms", get(api::list_dorms))
        .route("/landlords/{id}/subscriptions", get(api::list_subscriptions))
        // Dorms
        .route("/dorms", post(api::create_dorm))
        .route("/dorms/{id}", get(api::get_dorm))
        .route("/dorms/{id}", put(api::update_dorm))
        .route("/dorms/{id}", delete(api::delete_dorm))
        .route("/dorms/{id}/amenities", get(api::list_amenities))
        .route("/dorms/{id}/amenities", put(api::save_amenities))
        .route("/dorms/{id}/reconcile-links", post(api::reconcile_links))
        .route("/dorms/{id}/rooms", get(api::list_rooms))
        // Rooms
        .route("/rooms", post(api::create_room))
        .route("/rooms/{id}", get(api::get_room))
        .route("/rooms/{id}", put(api::update_room))
        .route("/rooms/{id}", delete(api::delete_room))
        .route("/rooms/{id}/links", get(api::list_links))
        .route("/rooms/{id}/links", put(api::toggle_link))
        .route("/rooms/{id}/readings", post(api::record_readings))
        .route("/rooms/{id}/invoices", post(api::create_invoice))
        .route("/rooms/{id}/invoices", get(api::list_invoices))
        // Renters
        .route("/renters", post(api::create_renter))
        .route("/renters/{id}", get(api::get_renter))
        .route("/renters/{id}/assign", post(api::assign_renter))
        .route("/renters/{id}/unassign", post(api::unassign_renter))
        // Invoices & evidence
        .route("/invoices/{id}", get(api::get_invoice))
        .route("/invoices/{id}/status", put(api::update_invoice_status))
        .route("/invoices/{id}/evidence", post(api::submit_evidence))
        .route("/evidence/{id}/review", post(api::review_evidence))
        // Payments
        .route("/payments/checkout", post(api::create_checkout))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Gateway webhook authenticates by signature, not PSK; health needs neither
    let open_routes = Router::new()
        .route("/api/payments/webhook", post(api::handle_webhook))
        .route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(open_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
