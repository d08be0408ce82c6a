// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound notifications: transactional email (Brevo) and SMS (Twilio).
//!
//! Delivery is best effort. Every method reports whether the message left the
//! process; callers never roll back state because a notification failed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";
const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Notification collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_otp(&self, email: &str, code: &str, expiry_minutes: u32) -> bool;

    async fn send_password_reset(&self, email: &str, link: &str, expiry_minutes: u32) -> bool;

    async fn send_sms(&self, phone: &str, code: &str) -> bool;
}

/// Brevo credentials.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub api_key: String,
    pub sender_email: String,
}

/// Twilio credentials.
#[derive(Debug, Clone)]
pub struct SmsSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

/// HTTP notifier. A channel without credentials logs the message instead
/// and reports non-delivery.
pub struct HttpNotifier {
    http: Client,
    email: Option<EmailSettings>,
    sms: Option<SmsSettings>,
}

impl HttpNotifier {
    pub fn new(
        email: Option<EmailSettings>,
        sms: Option<SmsSettings>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        if email.is_none() {
            tracing::warn!("BREVO_API_KEY not set; emails will only be logged");
        }
        if sms.is_none() {
            tracing::warn!("Twilio credentials not set; SMS will only be logged");
        }
        Ok(Self { http, email, sms })
    }

    async fn send_email(&self, to: &str, subject: &str, html: String) -> bool {
        let Some(settings) = &self.email else {
            tracing::info!(to = %to, subject = %subject, body = %html, "Email not sent (dev fallback)");
            return false;
        };

        let payload = json!({
            "sender": { "email": settings.sender_email, "name": "Exchange" },
            "to": [{ "email": to }],
            "subject": subject,
            "htmlContent": html,
        });

        let result = self
            .http
            .post(BREVO_SEND_URL)
            .header("api-key", &settings.api_key)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(to = %to, subject = %subject, "Email sent");
                true
            }
            Ok(resp) => {
                tracing::warn!(to = %to, status = %resp.status(), "Email provider rejected message");
                false
            }
            Err(e) => {
                tracing::warn!(to = %to, error = %e, "Email delivery failed");
                false
            }
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_otp(&self, email: &str, code: &str, expiry_minutes: u32) -> bool {
        let html = format!(
            "<p>Your verification code is <strong>{code}</strong>.</p>\
             <p>It expires in {expiry_minutes} minutes.</p>"
        );
        self.send_email(email, "Your verification code", html).await
    }

    async fn send_password_reset(&self, email: &str, link: &str, expiry_minutes: u32) -> bool {
        let html = format!(
            "<p>Use the link below to reset your password.</p>\
             <p><a href=\"{link}\">{link}</a></p>\
             <p>The link expires in {expiry_minutes} minutes.</p>"
        );
        self.send_email(email, "Reset your password", html).await
    }

    async fn send_sms(&self, phone: &str, code: &str) -> bool {
        let body = format!("Your OTP code is: {code}");
        let Some(settings) = &self.sms else {
            tracing::info!(to = %phone, body = %body, "SMS not sent (dev fallback)");
            return false;
        };

        let url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            settings.account_sid
        );
        let form = [
            ("To", phone),
            ("From", settings.from_number.as_str()),
            ("Body", body.as_str()),
        ];

        match self
            .http
            .post(&url)
            .basic_auth(&settings.account_sid, Some(&settings.auth_token))
            .form(&form)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(to = %phone, status = %resp.status(), "SMS provider rejected message");
                false
            }
            Err(e) => {
                tracing::warn!(to = %phone, error = %e, "SMS delivery failed");
                false
            }
        }
    }
}

/// Captures outgoing messages for assertions.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
    pub deliver: bool,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn delivering() -> Self {
        Self {
            sent: Default::default(),
            deliver: true,
        }
    }

    /// Most recent payload sent to `to`.
    pub fn last_for(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(dest, _)| dest == to)
            .map(|(_, payload)| payload.clone())
    }

    fn record(&self, to: &str, payload: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), payload.to_string()));
        self.deliver
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_otp(&self, email: &str, code: &str, _expiry_minutes: u32) -> bool {
        self.record(email, code)
    }

    async fn send_password_reset(&self, email: &str, link: &str, _expiry_minutes: u32) -> bool {
        self.record(email, link)
    }

    async fn send_sms(&self, phone: &str, code: &str) -> bool {
        self.record(phone, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_channels_report_non_delivery() {
        let notifier = HttpNotifier::new(None, None).unwrap();
        assert!(!notifier.send_otp("a@example.com", "123456", 10).await);
        assert!(
            !notifier
                .send_password_reset("a@example.com", "http://x/reset?token=t", 30)
                .await
        );
        assert!(!notifier.send_sms("+15550001111", "123456").await);
    }

    #[tokio::test]
    async fn recording_notifier_keeps_latest_payload() {
        let notifier = RecordingNotifier::delivering();
        notifier.send_otp("a@example.com", "111111", 10).await;
        notifier.send_otp("a@example.com", "222222", 10).await;
        assert_eq!(notifier.last_for("a@example.com").as_deref(), Some("222222"));
        assert_eq!(notifier.last_for("b@example.com"), None);
    }
}
