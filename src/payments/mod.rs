//! Payment gateway integration.
//!
//! Outbound checkout-session creation and inbound webhook verification. The
//! gateway signs and verifies an HMAC-SHA256 digest over a pipe-delimited
//! field string using the shared checksum key; a missing key rejects webhooks
//! instead of bypassing verification.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

/// A created checkout session the frontend redirects the landlord to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub order_code: i64,
    pub checkout_url: String,
}

/// Inbound webhook body delivered by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub order_code: i64,
    pub status: String,
    pub amount: i64,
    pub signature: String,
}

impl WebhookPayload {
    /// Field string the webhook signature covers.
    pub fn signing_payload(&self) -> String {
        format!("{}|{}|{}", self.order_code, self.status, self.amount)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionBody<'a> {
    order_code: i64,
    amount: i64,
    description: &'a str,
    return_url: &'a str,
    cancel_url: &'a str,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    #[serde(default)]
    checkout_url: Option<String>,
    #[serde(default)]
    desc: Option<String>,
}

/// Client for the external payment gateway.
#[derive(Clone)]
pub struct PaymentGateway {
    client: reqwest::Client,
    api_url: Option<String>,
    checksum_key: Option<String>,
    return_url: String,
    cancel_url: String,
}

impl PaymentGateway {
    pub fn from_config(config: &Config) -> Self {
        // 30s cap on the checkout-creation path; the gateway is slow under load.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url: config.gateway_api_url.clone(),
            checksum_key: config.gateway_checksum_key.clone(),
            return_url: config.gateway_return_url.clone(),
            cancel_url: config.gateway_cancel_url.clone(),
        }
    }

    fn key(&self) -> Result<&str, AppError> {
        self.checksum_key.as_deref().ok_or_else(|| {
            AppError::ExternalService("Payment gateway checksum key not configured".to_string())
        })
    }

    /// HMAC-SHA256 over `payload`, hex-encoded.
    pub fn sign(&self, payload: &str) -> Result<String, AppError> {
        let key = self.key()?;
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|_| AppError::Internal("Invalid checksum key".to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify an inbound webhook signature. Constant-time comparison; an
    /// unconfigured checksum key rejects the delivery.
    pub fn verify_webhook(&self, payload: &WebhookPayload) -> Result<(), AppError> {
        if self.checksum_key.is_none() {
            return Err(AppError::Unauthorized(
                "Webhook rejected: checksum key not configured".to_string(),
            ));
        }
        let expected = self.sign(&payload.signing_payload())?;
        let matches: bool = expected
            .as_bytes()
            .ct_eq(payload.signature.as_bytes())
            .into();
        if matches {
            Ok(())
        } else {
            Err(AppError::Unauthorized("Invalid webhook signature".to_string()))
        }
    }

    /// Create a checkout session at the gateway. One-shot, no retry; failure
    /// surfaces as ExternalService with the provider detail appended.
    pub async fn create_checkout(
        &self,
        order_code: i64,
        amount: i64,
        description: &str,
    ) -> Result<CheckoutSession, AppError> {
        let api_url = self.api_url.as_deref().ok_or_else(|| {
            AppError::ExternalService("Payment gateway URL not configured".to_string())
        })?;

        let signing_payload = format!(
            "{}|{}|{}|{}|{}",
            order_code, amount, description, self.return_url, self.cancel_url
        );
        let signature = self.sign(&signing_payload)?;

        let body = CreateSessionBody {
            order_code,
            amount,
            description,
            return_url: &self.return_url,
            cancel_url: &self.cancel_url,
            signature,
        };

        let response = self
            .client
            .post(format!("{}/v2/payment-requests", api_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let parsed: CreateSessionResponse = response.json().await?;

        if !status.is_success() {
            let detail = parsed.desc.unwrap_or_else(|| "no detail".to_string());
            return Err(AppError::ExternalService(format!(
                "Payment gateway returned {}: {}",
                status, detail
            )));
        }

        let checkout_url = parsed.checkout_url.ok_or_else(|| {
            AppError::ExternalService("Payment gateway response missing checkout URL".to_string())
        })?;

        Ok(CheckoutSession {
            order_code,
            checkout_url,
        })
    }
}
