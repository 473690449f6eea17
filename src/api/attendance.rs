use crate::{
    auth::auth::AuthUser,
    feed::{ChangeAction, ChangeFeed},
    map::MapRenderer,
    model::attendance::{
        AttendanceLog, Location, PauseKind, PauseResumeEvent, SessionStatus, total_paused_minutes,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::{PgPool, types::Json};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct ClockInReq {
    /// Browser-captured `"<lat>, <lng>"`, if the user granted location access.
    #[schema(example = "23.780573, 90.419418", nullable = true)]
    pub location: Option<String>,
}

/// UTC day window containing `now`; a session belongs to the calendar day
/// it was clocked in on.
fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();
    (start, start + Duration::days(1))
}

/// Row plus its display duration, the shape the UI renders.
fn with_duration(log: &AttendanceLog, now: DateTime<Utc>) -> serde_json::Value {
    let mut value = serde_json::to_value(log).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "duration".to_string(),
            serde_json::json!(log.worked_duration(now)),
        );
    }
    value
}

async fn fetch_today_log(
    pool: &PgPool,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<AttendanceLog>, sqlx::Error> {
    let (day_start, day_end) = day_bounds(now);

    sqlx::query_as::<_, AttendanceLog>(
        r#"
        SELECT * FROM attendance_logs
        WHERE user_id = $1 AND clock_in_time >= $2 AND clock_in_time < $3
        ORDER BY clock_in_time DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(day_start)
    .bind(day_end)
    .fetch_optional(pool)
    .await
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-in",
    request_body = ClockInReq,
    responses(
        (status = 200, description = "Clocked in successfully", body = Object),
        (status = 409, description = "An open session already exists for today", body = Object, example = json!({
            "message": "You have already clocked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<ClockInReq>,
) -> actix_web::Result<impl Responder> {
    let now = Utc::now();
    let (day_start, day_end) = day_bounds(now);

    // The open-session check rides inside the insert, closing the
    // read-then-write gap a separate existence query would leave.
    let inserted = sqlx::query_as::<_, AttendanceLog>(
        r#"
        INSERT INTO attendance_logs
            (user_id, full_name, email, clock_in_time, location, status,
             pause_resume_log, total_paused_minutes)
        SELECT $1, $2, $3, $4, $5, $6, '[]'::jsonb, 0
        WHERE NOT EXISTS (
            SELECT 1 FROM attendance_logs
            WHERE user_id = $1
              AND clock_in_time >= $7 AND clock_in_time < $8
              AND status <> $9
        )
        RETURNING *
        "#,
    )
    .bind(auth.user_id)
    .bind(&auth.full_name)
    .bind(&auth.email)
    .bind(now)
    .bind(&payload.location)
    .bind(SessionStatus::Working.to_string())
    .bind(day_start)
    .bind(day_end)
    .bind(SessionStatus::Completed.to_string())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id = auth.user_id, "Clock-in failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match inserted {
        Some(log) => {
            feed.publish("attendance_logs", ChangeAction::Insert);
            Ok(HttpResponse::Ok().json(with_duration(&log, now)))
        }
        None => Ok(HttpResponse::Conflict().json(serde_json::json!({
            "message": "You have already clocked in today"
        }))),
    }
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-out",
    responses(
        (status = 200, description = "Clocked out successfully", body = Object),
        (status = 400, description = "No open session for today", body = Object, example = json!({
            "message": "You must clock in before clocking out"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    feed: web::Data<ChangeFeed>,
) -> actix_web::Result<impl Responder> {
    let now = Utc::now();

    let today = fetch_today_log(pool.get_ref(), auth.user_id, now)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = auth.user_id, "Clock-out lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let Some(log) = today else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "You must clock in before clocking out"
        })));
    };

    if log.clock_out_time.is_some() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "You have already clocked out today"
        })));
    }

    // Clocking out while paused is allowed: the end is timestamped without
    // an implicit resume, so an unmatched trailing pause stays unpaired.
    let updated = sqlx::query_as::<_, AttendanceLog>(
        r#"
        UPDATE attendance_logs
        SET clock_out_time = $1, status = $2
        WHERE id = $3 AND clock_out_time IS NULL
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(SessionStatus::Completed.to_string())
    .bind(log.id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id = auth.user_id, "Clock-out failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match updated {
        Some(log) => {
            feed.publish("attendance_logs", ChangeAction::Update);
            Ok(HttpResponse::Ok().json(with_duration(&log, now)))
        }
        None => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "You have already clocked out today"
        }))),
    }
}

/// Pause endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/pause",
    responses(
        (status = 200, description = "Work paused", body = Object),
        (status = 400, description = "No working session to pause", body = Object, example = json!({
            "message": "Cannot pause work at this time"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn pause_work(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    feed: web::Data<ChangeFeed>,
) -> actix_web::Result<impl Responder> {
    let now = Utc::now();

    let today = fetch_today_log(pool.get_ref(), auth.user_id, now)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = auth.user_id, "Pause lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let Some(log) = today.filter(|l| l.session_status() == Some(SessionStatus::Working)) else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Cannot pause work at this time"
        })));
    };

    let mut events = log.pause_resume_log.0.clone();
    events.push(PauseResumeEvent {
        kind: PauseKind::Pause,
        timestamp: now,
    });

    let updated = sqlx::query_as::<_, AttendanceLog>(
        r#"
        UPDATE attendance_logs
        SET status = $1, pause_resume_log = $2
        WHERE id = $3 AND status = $4
        RETURNING *
        "#,
    )
    .bind(SessionStatus::Paused.to_string())
    .bind(Json(&events))
    .bind(log.id)
    .bind(SessionStatus::Working.to_string())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id = auth.user_id, "Pause failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match updated {
        Some(log) => {
            feed.publish("attendance_logs", ChangeAction::Update);
            Ok(HttpResponse::Ok().json(with_duration(&log, now)))
        }
        None => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Cannot pause work at this time"
        }))),
    }
}

/// Resume endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/resume",
    responses(
        (status = 200, description = "Work resumed", body = Object),
        (status = 400, description = "No paused session to resume", body = Object, example = json!({
            "message": "Cannot resume work at this time"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn resume_work(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    feed: web::Data<ChangeFeed>,
) -> actix_web::Result<impl Responder> {
    let now = Utc::now();

    let today = fetch_today_log(pool.get_ref(), auth.user_id, now)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = auth.user_id, "Resume lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let Some(log) = today.filter(|l| l.session_status() == Some(SessionStatus::Paused)) else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Cannot resume work at this time"
        })));
    };

    let mut events = log.pause_resume_log.0.clone();
    events.push(PauseResumeEvent {
        kind: PauseKind::Resume,
        timestamp: now,
    });
    let paused_minutes = total_paused_minutes(&events);

    let updated = sqlx::query_as::<_, AttendanceLog>(
        r#"
        UPDATE attendance_logs
        SET status = $1, pause_resume_log = $2, total_paused_minutes = $3
        WHERE id = $4 AND status = $5
        RETURNING *
        "#,
    )
    .bind(SessionStatus::Working.to_string())
    .bind(Json(&events))
    .bind(paused_minutes)
    .bind(log.id)
    .bind(SessionStatus::Paused.to_string())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id = auth.user_id, "Resume failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match updated {
        Some(log) => {
            feed.publish("attendance_logs", ChangeAction::Update);
            Ok(HttpResponse::Ok().json(with_duration(&log, now)))
        }
        None => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Cannot resume work at this time"
        }))),
    }
}

/// Today's session
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today",
    responses(
        (status = 200, description = "Today's attendance record", body = Object),
        (status = 404, description = "No record for today", body = Object, example = json!({
            "message": "No attendance record for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today_attendance(
    auth: AuthUser,
    pool: web::Data<PgPool>,
) -> actix_web::Result<impl Responder> {
    let now = Utc::now();

    let today = fetch_today_log(pool.get_ref(), auth.user_id, now)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = auth.user_id, "Today lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    match today {
        Some(log) => Ok(HttpResponse::Ok().json(with_duration(&log, now))),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "No attendance record for today"
        }))),
    }
}

/// Attendance history
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    responses(
        (status = 200, description = "All of the caller's sessions, newest first", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<PgPool>,
) -> actix_web::Result<impl Responder> {
    let now = Utc::now();

    let logs = sqlx::query_as::<_, AttendanceLog>(
        r#"
        SELECT * FROM attendance_logs
        WHERE user_id = $1
        ORDER BY clock_in_time DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id = auth.user_id, "Attendance list failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let body: Vec<_> = logs.iter().map(|log| with_duration(log, now)).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// Map view of a session's clock-in location
#[utoipa::path(
    get,
    path = "/api/v1/attendance/{log_id}/map",
    params(
        ("log_id", Path, description = "Attendance log ID")
    ),
    responses(
        (status = 200, description = "HTML map view", content_type = "text/html"),
        (status = 404, description = "Log not found"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn map_view(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    map: web::Data<dyn MapRenderer>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let log_id = path.into_inner();

    let log = sqlx::query_as::<_, AttendanceLog>(
        r#"SELECT * FROM attendance_logs WHERE id = $1 AND user_id = $2"#,
    )
    .bind(log_id)
    .bind(auth.user_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, log_id, "Map lookup failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(log) = log else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Attendance log not found"
        })));
    };

    let html = match log
        .location
        .as_deref()
        .and_then(|s| s.parse::<Location>().ok())
    {
        Some(location) => map.render(&location, "Clock-in Location"),
        None => map.render_unavailable("Clock-in Location"),
    };

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::types::Json;

    fn sample_log(clock_in: DateTime<Utc>, clock_out: Option<DateTime<Utc>>) -> AttendanceLog {
        AttendanceLog {
            id: 1,
            user_id: 1,
            full_name: "Jane Doe".into(),
            email: "jane@company.com".into(),
            clock_in_time: clock_in,
            clock_out_time: clock_out,
            location: None,
            status: "completed".into(),
            pause_resume_log: Json(vec![]),
            total_paused_minutes: 30,
            auto_clockout: false,
            reminder_sent_at: None,
            clockout_token: None,
            token_expires_at: None,
            created_at: clock_in,
        }
    }

    #[test]
    fn day_bounds_cover_exactly_one_day() {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 12).unwrap();
        let (start, end) = day_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap());
        assert!(start <= now && now < end);
    }

    #[test]
    fn response_shape_includes_display_duration() {
        let clock_in = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let clock_out = Utc.with_ymd_and_hms(2025, 6, 2, 17, 30, 0).unwrap();
        let log = sample_log(clock_in, Some(clock_out));

        let value = with_duration(&log, clock_out);
        assert_eq!(value["duration"], "8h 0m");
        assert_eq!(value["full_name"], "Jane Doe");
        // The capability token never leaves the server.
        assert!(value.get("clockout_token").is_none());
    }

    #[test]
    fn open_sessions_measure_to_now() {
        let clock_in = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 10, 45, 0).unwrap();
        let mut log = sample_log(clock_in, None);
        log.status = "working".into();
        log.total_paused_minutes = 0;

        let value = with_duration(&log, now);
        assert_eq!(value["duration"], "1h 45m");
    }
}
