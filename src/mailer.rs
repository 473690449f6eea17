use crate::config::Config;
use anyhow::{Context, Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

pub const REMINDER_SUBJECT: &str = "You forgot to clock out 😴 | Quick clock-out option inside";

// Gmail access tokens live for an hour; keep them a little less than that
// so a cached token is never presented right at its expiry.
static ACCESS_TOKEN_CACHE: Lazy<Cache<&'static str, String>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(Duration::from_secs(3300))
        .build()
});

/// Transactional mail through the Gmail API, authenticated with an OAuth
/// refresh token.
#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

impl Mailer {
    /// Present only when all three Gmail credentials are configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        Some(Self {
            http: reqwest::Client::new(),
            client_id: config.google_client_id.clone()?,
            client_secret: config.google_client_secret.clone()?,
            refresh_token: config.google_refresh_token.clone()?,
        })
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = ACCESS_TOKEN_CACHE.get("gmail").await {
            debug!("Using cached Gmail access token");
            return Ok(token);
        }

        let response = self
            .http
            .post(OAUTH_TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("refresh token exchange failed")?;

        let body: TokenResponse = response
            .json()
            .await
            .context("token endpoint returned malformed JSON")?;

        let token = body
            .access_token
            .ok_or_else(|| anyhow!("token endpoint returned no access token"))?;

        ACCESS_TOKEN_CACHE.insert("gmail", token.clone()).await;
        Ok(token)
    }

    pub async fn send_clockout_reminder(
        &self,
        to: &str,
        full_name: &str,
        clock_in_time: DateTime<Utc>,
        clockout_url: &str,
    ) -> Result<()> {
        let access_token = self.access_token().await?;

        let message = build_reminder_message(to, full_name, clock_in_time, clockout_url);
        let raw = URL_SAFE_NO_PAD.encode(message);

        let response = self
            .http
            .post(GMAIL_SEND_URL)
            .bearer_auth(access_token)
            .json(&json!({ "raw": raw }))
            .send()
            .await
            .context("Gmail send request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Gmail API rejected the message: {status}: {body}");
        }

        Ok(())
    }
}

/// RFC 2822 message for the Gmail `raw` field.
fn build_reminder_message(
    to: &str,
    full_name: &str,
    clock_in_time: DateTime<Utc>,
    clockout_url: &str,
) -> String {
    [
        format!("To: {to}"),
        format!("Subject: {REMINDER_SUBJECT}"),
        "Content-Type: text/html; charset=utf-8".to_string(),
        String::new(),
        build_reminder_body(full_name, clock_in_time, clockout_url),
    ]
    .join("\n")
}

fn build_reminder_body(full_name: &str, clock_in_time: DateTime<Utc>, clockout_url: &str) -> String {
    let clock_in = format_clock_in(clock_in_time);

    format!(
        concat!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;\">",
            "<h2 style=\"color: #333;\">Hi {name},</h2>",
            "<p style=\"font-size: 16px; line-height: 1.6;\">",
            "It looks like you haven't clocked out today. For your convenience, you can clock out directly from this email.",
            "</p>",
            "<div style=\"background-color: #f8f9fa; padding: 15px; border-radius: 8px; margin: 20px 0;\">",
            "<p style=\"margin: 0; font-size: 14px; color: #666;\">",
            "<strong>Your clock-in time today:</strong> {clock_in}",
            "</p>",
            "</div>",
            "<div style=\"text-align: center; margin: 30px 0;\">",
            "<a href=\"{url}\" style=\"background-color: #28a745; color: white; padding: 15px 30px; ",
            "text-decoration: none; border-radius: 8px; font-size: 16px; font-weight: bold; display: inline-block;\">",
            "\u{2705} Clock Out Now",
            "</a>",
            "</div>",
            "<p style=\"font-size: 14px; color: #666; text-align: center;\">",
            "This will automatically update your attendance record.",
            "</p>",
            "<hr style=\"border: none; border-top: 1px solid #eee; margin: 30px 0;\">",
            "<p style=\"font-size: 12px; color: #999; text-align: center;\">",
            "This link will expire in 12 hours for security purposes.",
            "</p>",
            "</div>",
        ),
        name = crate::map::html_escape(full_name),
        clock_in = clock_in,
        url = clockout_url,
    )
}

/// `h:mm AM/PM`, the way the clock-in time is shown in the app.
fn format_clock_in(t: DateTime<Utc>) -> String {
    t.format("%l:%M %p").to_string().trim_start().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reminder_message_carries_headers_and_link() {
        let clock_in = Utc.with_ymd_and_hms(2025, 6, 2, 9, 5, 0).unwrap();
        let msg = build_reminder_message(
            "jane@company.com",
            "Jane Doe",
            clock_in,
            "http://localhost:8080/clock-out?token=abc",
        );

        assert!(msg.starts_with("To: jane@company.com\n"));
        assert!(msg.contains(&format!("Subject: {REMINDER_SUBJECT}")));
        assert!(msg.contains("Content-Type: text/html"));
        assert!(msg.contains("http://localhost:8080/clock-out?token=abc"));
        assert!(msg.contains("Hi Jane Doe"));
        assert!(msg.contains("9:05 AM"));
    }

    #[test]
    fn raw_encoding_round_trips() {
        let raw = URL_SAFE_NO_PAD.encode("To: a@b.c\n\nhello");
        let decoded = URL_SAFE_NO_PAD.decode(raw).unwrap();
        assert_eq!(decoded, b"To: a@b.c\n\nhello");
    }

    #[test]
    fn clock_in_formatting_uses_twelve_hour_clock() {
        let afternoon = Utc.with_ymd_and_hms(2025, 6, 2, 17, 30, 0).unwrap();
        assert_eq!(format_clock_in(afternoon), "5:30 PM");
    }
}
