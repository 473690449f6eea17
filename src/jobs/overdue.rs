use crate::{
    config::Config,
    feed::{ChangeAction, ChangeFeed},
    mailer::Mailer,
    model::attendance::AttendanceLog,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Default, Serialize)]
pub struct SweepStats {
    pub scanned: usize,
    pub stamped: usize,
    pub emailed: usize,
    pub failed: usize,
}

/// Background loop: sweep for overdue sessions on a fixed cadence.
pub async fn run(pool: PgPool, config: Config, mailer: Option<Mailer>, feed: ChangeFeed) {
    let period = std::time::Duration::from_secs(config.overdue_poll_secs);

    loop {
        match sweep_overdue_sessions(&pool, &config, mailer.as_ref(), &feed).await {
            Ok(stats) => {
                if stats.scanned > 0 {
                    info!(
                        scanned = stats.scanned,
                        stamped = stats.stamped,
                        emailed = stats.emailed,
                        failed = stats.failed,
                        "Overdue clock-out sweep finished"
                    );
                }
            }
            Err(e) => error!(error = %e, "Overdue clock-out sweep failed"),
        }

        tokio::time::sleep(period).await;
    }
}

/// One sweep: stamp each overdue session with a single-use clock-out token
/// and email its owner a clock-out link. Per-session failures are logged
/// and the sweep moves on.
pub async fn sweep_overdue_sessions(
    pool: &PgPool,
    config: &Config,
    mailer: Option<&Mailer>,
    feed: &ChangeFeed,
) -> anyhow::Result<SweepStats> {
    let cutoff = Utc::now() - Duration::hours(config.overdue_after_hours);

    let overdue = sqlx::query_as::<_, AttendanceLog>(
        r#"
        SELECT * FROM attendance_logs
        WHERE clock_out_time IS NULL
          AND reminder_sent_at IS NULL
          AND clock_in_time < $1
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    let mut stats = SweepStats {
        scanned: overdue.len(),
        ..Default::default()
    };

    for log in overdue {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::hours(config.clockout_token_ttl_hours);

        let stamped = sqlx::query(
            r#"
            UPDATE attendance_logs
            SET clockout_token = $1, token_expires_at = $2, reminder_sent_at = NOW()
            WHERE id = $3 AND clock_out_time IS NULL AND reminder_sent_at IS NULL
            "#,
        )
        .bind(&token)
        .bind(expires_at)
        .bind(log.id)
        .execute(pool)
        .await;

        match stamped {
            Ok(res) if res.rows_affected() == 1 => stats.stamped += 1,
            // Closed or stamped out from under us; nothing to remind.
            Ok(_) => continue,
            Err(e) => {
                error!(log_id = log.id, error = %e, "Failed to stamp clock-out token");
                stats.failed += 1;
                continue;
            }
        }

        feed.publish("attendance_logs", ChangeAction::Update);

        let Some(mailer) = mailer else {
            warn!(log_id = log.id, "Reminder mailer not configured, skipping email");
            continue;
        };

        let url = clockout_url(&config.public_base_url, &token);
        match mailer
            .send_clockout_reminder(&log.email, &log.full_name, log.clock_in_time, &url)
            .await
        {
            Ok(()) => {
                info!(log_id = log.id, "Reminder email sent");
                stats.emailed += 1;
            }
            Err(e) => {
                error!(log_id = log.id, error = %e, "Failed to send reminder email");
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

pub fn clockout_url(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/clock-out?token={}",
        public_base_url.trim_end_matches('/'),
        token
    )
}

/// Manual sweep trigger
#[utoipa::path(
    post,
    path = "/api/v1/jobs/check-overdue",
    responses(
        (status = 200, description = "Sweep finished", body = Object, example = json!({
            "scanned": 1, "stamped": 1, "emailed": 1, "failed": 0
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Jobs"
)]
pub async fn trigger_sweep(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    mailer: web::Data<Option<Mailer>>,
    feed: web::Data<ChangeFeed>,
) -> actix_web::Result<impl Responder> {
    let stats = sweep_overdue_sessions(
        pool.get_ref(),
        config.get_ref(),
        mailer.get_ref().as_ref(),
        feed.get_ref(),
    )
    .await
    .map_err(|e| {
        error!(error = %e, "Manual overdue sweep failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clockout_url_joins_cleanly() {
        assert_eq!(
            clockout_url("http://localhost:8080/", "abc"),
            "http://localhost:8080/clock-out?token=abc"
        );
        assert_eq!(
            clockout_url("https://hr.example.com", "abc"),
            "https://hr.example.com/clock-out?token=abc"
        );
    }
}
