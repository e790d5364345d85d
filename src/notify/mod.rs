//! Email notifications.
//!
//! Thin client for the external email provider plus the invoice notification
//! template. Invoice emails are fire-and-forget: failures are logged, never
//! retried, and never fail the operation that triggered them.

use serde::Serialize;

use crate::billing;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::Invoice;

#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

/// Client for the external email provider.
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    api_url: Option<String>,
    api_key: Option<String>,
    from: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
        }
    }

    /// Send one email. An unconfigured provider is a silent skip.
    pub async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), AppError> {
        let Some(api_url) = self.api_url.as_deref() else {
            tracing::debug!("Email provider not configured, skipping send to {:?}", to);
            return Ok(());
        };

        let body = SendEmailBody {
            from: &self.from,
            to,
            subject,
            html,
        };

        let mut request = self.client.post(api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Email provider returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Notify a renter of a freshly created invoice, without blocking or
    /// failing the creating request.
    pub fn notify_invoice_created(&self, to: Vec<String>, invoice: &Invoice, room_code: &str) {
        if to.is_empty() {
            return;
        }
        let subject = format!("Hóa đơn tháng mới cho phòng {}", room_code);
        let html = invoice_email_html(invoice, room_code);
        let mailer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, &subject, &html).await {
                tracing::warn!("Failed to send invoice notification: {}", e);
            }
        });
    }
}

/// Fixed HTML layout for the invoice notification, Vietnamese currency format.
pub fn invoice_email_html(invoice: &Invoice, room_code: &str) -> String {
    let mut rows = String::new();
    for line in &invoice.lines {
        rows.push_str(&format!(
            "<tr><td>{}</td><td style=\"text-align:right\">{}</td></tr>",
            line.description,
            billing::format_vnd(line.amount)
        ));
    }

    format!(
        concat!(
            "<div style=\"font-family:sans-serif\">",
            "<h2>Hóa đơn phòng {room}</h2>",
            "<p>Kỳ thanh toán: {period}</p>",
            "<table width=\"100%\" cellpadding=\"4\">{rows}",
            "<tr><td><strong>Tổng cộng</strong></td>",
            "<td style=\"text-align:right\"><strong>{total}</strong></td></tr>",
            "</table>",
            "<p>Vui lòng thanh toán và gửi minh chứng trên ứng dụng.</p>",
            "</div>"
        ),
        room = room_code,
        period = invoice.period_start,
        rows = rows,
        total = billing::format_vnd(invoice.total_amount),
    )
}
