use crate::{
    feed::{ChangeAction, ChangeFeed},
    map::{MapRenderer, html_escape},
    model::attendance::{AttendanceLog, Location, SessionStatus},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

/// Failure modes of the emailed clock-out link, each with its page text.
#[derive(Debug, Copy, Clone, Display)]
pub enum ClockoutPageError {
    #[display(fmt = "Invalid or missing token")]
    MissingToken,
    #[display(fmt = "Invalid or expired token")]
    InvalidToken,
    #[display(fmt = "This clock-out link has expired")]
    Expired,
    #[display(fmt = "Failed to update attendance record")]
    UpdateFailed,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

pub fn token_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expiry) => now > expiry,
        // A token without a recorded expiry is never honored.
        None => true,
    }
}

/// `GET /clock-out?token=…`, the emailed one-time clock-out link.
pub async fn clock_out_by_token(
    query: web::Query<TokenQuery>,
    pool: web::Data<PgPool>,
    feed: web::Data<ChangeFeed>,
    map: web::Data<dyn MapRenderer>,
) -> impl Responder {
    let Some(token) = query.token.as_deref().filter(|t| !t.is_empty()) else {
        return error_page(ClockoutPageError::MissingToken, 400);
    };

    let log = match sqlx::query_as::<_, AttendanceLog>(
        r#"
        SELECT * FROM attendance_logs
        WHERE clockout_token = $1 AND clock_out_time IS NULL
        "#,
    )
    .bind(token)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(log)) => log,
        Ok(None) => return error_page(ClockoutPageError::InvalidToken, 400),
        Err(e) => {
            error!(error = %e, "Token lookup failed");
            return error_page(ClockoutPageError::InvalidToken, 400);
        }
    };

    let now = Utc::now();
    if token_expired(log.token_expires_at, now) {
        return error_page(ClockoutPageError::Expired, 400);
    }

    // Guarded so a reused link (or a race with a manual clock-out) cannot
    // close the session twice.
    let updated = sqlx::query(
        r#"
        UPDATE attendance_logs
        SET clock_out_time = $1,
            status = $2,
            auto_clockout = TRUE,
            clockout_token = NULL,
            token_expires_at = NULL
        WHERE id = $3 AND clock_out_time IS NULL
        "#,
    )
    .bind(now)
    .bind(SessionStatus::Completed.to_string())
    .bind(log.id)
    .execute(pool.get_ref())
    .await;

    match updated {
        Ok(res) if res.rows_affected() == 1 => {}
        Ok(_) => return error_page(ClockoutPageError::InvalidToken, 400),
        Err(e) => {
            error!(log_id = log.id, error = %e, "Failed to clock out via token");
            return error_page(ClockoutPageError::UpdateFailed, 500);
        }
    }

    feed.publish("attendance_logs", ChangeAction::Update);
    info!(log_id = log.id, user_id = log.user_id, "Clocked out via email link");

    let map_html = log
        .location
        .as_deref()
        .and_then(|s| s.parse::<Location>().ok())
        .map(|loc| map.render(&loc, "Clock-in Location"));

    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(success_page(&log.full_name, now, map_html.as_deref()))
}

fn error_page(err: ClockoutPageError, status: u16) -> HttpResponse {
    let body = format!(
        "<html><body><h1>Error</h1><p>{err}</p></body></html>"
    );

    let mut response = match status {
        500 => HttpResponse::InternalServerError(),
        _ => HttpResponse::BadRequest(),
    };
    response.content_type("text/html; charset=utf-8").body(body)
}

fn success_page(full_name: &str, clock_out_time: DateTime<Utc>, map_html: Option<&str>) -> String {
    format!(
        concat!(
            "<html>",
            "<head>",
            "<title>Clock Out Successful</title>",
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">",
            "<style>",
            "body {{ font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; ",
            "text-align: center; background-color: #f8f9fa; }}",
            ".container {{ background-color: white; padding: 40px; border-radius: 12px; ",
            "box-shadow: 0 2px 10px rgba(0,0,0,0.1); }}",
            ".success-title {{ color: #28a745; font-size: 24px; margin-bottom: 15px; }}",
            ".success-message {{ color: #666; font-size: 16px; line-height: 1.6; margin-bottom: 20px; }}",
            ".time-info {{ background-color: #e8f5e8; padding: 15px; border-radius: 8px; margin: 20px 0; }}",
            "</style>",
            "</head>",
            "<body>",
            "<div class=\"container\">",
            "<div style=\"font-size: 48px; margin-bottom: 20px;\">\u{2705}</div>",
            "<h1 class=\"success-title\">Clock Out Successful!</h1>",
            "<p class=\"success-message\">Hi {name}, you've been successfully clocked out.</p>",
            "<div class=\"time-info\"><strong>Clock-out time:</strong> {time} UTC</div>",
            "{map}",
            "<p class=\"success-message\">Your attendance record has been updated.</p>",
            "</div>",
            "</body>",
            "</html>",
        ),
        name = html_escape(full_name),
        time = clock_out_time.format("%Y-%m-%d %H:%M"),
        map = map_html.unwrap_or(""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn missing_expiry_counts_as_expired() {
        assert!(token_expired(None, Utc::now()));
    }

    #[test]
    fn expiry_is_a_hard_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        assert!(token_expired(Some(now - Duration::seconds(1)), now));
        assert!(!token_expired(Some(now), now));
        assert!(!token_expired(Some(now + Duration::hours(12)), now));
    }

    #[test]
    fn success_page_greets_by_name() {
        let t = Utc.with_ymd_and_hms(2025, 6, 2, 18, 45, 0).unwrap();
        let page = success_page("Jane Doe", t, None);
        assert!(page.contains("Hi Jane Doe"));
        assert!(page.contains("2025-06-02 18:45"));
        assert!(page.contains("Clock Out Successful"));
    }

    #[test]
    fn success_page_embeds_map_when_present() {
        let t = Utc.with_ymd_and_hms(2025, 6, 2, 18, 45, 0).unwrap();
        let page = success_page("Jane", t, Some("<iframe id=\"m\"></iframe>"));
        assert!(page.contains("<iframe id=\"m\">"));
    }

    #[test]
    fn page_errors_spell_out_their_cause() {
        assert_eq!(
            ClockoutPageError::Expired.to_string(),
            "This clock-out link has expired"
        );
        assert_eq!(
            ClockoutPageError::MissingToken.to_string(),
            "Invalid or missing token"
        );
    }
}
