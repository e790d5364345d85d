//! Configuration module for the DormHub backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Payment gateway base URL
    pub gateway_api_url: Option<String>,
    /// Shared checksum key for gateway signatures; webhooks are rejected without it
    pub gateway_checksum_key: Option<String>,
    /// URL the gateway redirects to after a successful payment
    pub gateway_return_url: String,
    /// URL the gateway redirects to after a cancelled payment
    pub gateway_cancel_url: String,
    /// Email provider send endpoint; notifications are skipped without it
    pub email_api_url: Option<String>,
    /// Email provider API key
    pub email_api_key: Option<String>,
    /// Sender address for outbound mail
    pub email_from: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("DORMHUB_API_PSK").ok();

        let db_path = env::var("DORMHUB_DB_PATH")
            .unwrap_or_else(|_| "./data/app.sqlite".to_string())
            .into();

        let bind_addr = env::var("DORMHUB_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid DORMHUB_BIND_ADDR format");

        let log_level = env::var("DORMHUB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let gateway_api_url = env::var("DORMHUB_GATEWAY_URL").ok();
        let gateway_checksum_key = env::var("DORMHUB_GATEWAY_CHECKSUM_KEY").ok();
        let gateway_return_url = env::var("DORMHUB_GATEWAY_RETURN_URL")
            .unwrap_or_else(|_| "http://localhost:3000/payment/return".to_string());
        let gateway_cancel_url = env::var("DORMHUB_GATEWAY_CANCEL_URL")
            .unwrap_or_else(|_| "http://localhost:3000/payment/cancel".to_string());

        let email_api_url = env::var("DORMHUB_EMAIL_API_URL").ok();
        let email_api_key = env::var("DORMHUB_EMAIL_API_KEY").ok();
        let email_from = env::var("DORMHUB_EMAIL_FROM")
            .unwrap_or_else(|_| "no-reply@dormhub.vn".to_string());

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            gateway_api_url,
            gateway_checksum_key,
            gateway_return_url,
            gateway_cancel_url,
            email_api_url,
            email_api_key,
            email_from,
        }
    }
}
