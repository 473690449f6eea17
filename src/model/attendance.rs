use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::str::FromStr;
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Work-session state as stored in `attendance_logs.status`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Working,
    Paused,
    Completed,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, Serialize, Deserialize, ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PauseKind {
    Pause,
    Resume,
}

/// Append-only entry in a session's pause/resume log.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PauseResumeEvent {
    #[serde(rename = "type")]
    pub kind: PauseKind,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceLog {
    #[schema(example = 1)]
    pub id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    #[schema(value_type = String, format = DateTime)]
    pub clock_in_time: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = DateTime, nullable = true)]
    pub clock_out_time: Option<DateTime<Utc>>,
    /// `"<lat>, <lng>"` as captured in the browser, if granted.
    #[schema(example = "23.780573, 90.419418", nullable = true)]
    pub location: Option<String>,
    #[schema(example = "working")]
    pub status: String,
    #[schema(value_type = Vec<PauseResumeEvent>)]
    pub pause_resume_log: Json<Vec<PauseResumeEvent>>,
    pub total_paused_minutes: i64,
    pub auto_clockout: bool,
    #[schema(value_type = Option<String>, format = DateTime, nullable = true)]
    pub reminder_sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub clockout_token: Option<String>,
    #[serde(skip_serializing)]
    #[schema(value_type = Option<String>, format = DateTime, nullable = true)]
    pub token_expires_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<Utc>,
}

impl AttendanceLog {
    pub fn session_status(&self) -> Option<SessionStatus> {
        SessionStatus::from_str(&self.status).ok()
    }

    pub fn is_open(&self) -> bool {
        self.clock_out_time.is_none() && self.session_status() != Some(SessionStatus::Completed)
    }

    /// Net worked duration, measured to the clock-out time or to `now`
    /// for a still-open session.
    pub fn worked_duration(&self, now: DateTime<Utc>) -> String {
        let end = self.clock_out_time.unwrap_or(now);
        format_duration(net_worked_minutes(
            self.clock_in_time,
            end,
            self.total_paused_minutes,
        ))
    }
}

/// Total paused minutes for an event log: consecutive entries are taken in
/// pairs, and each well-formed (pause, resume) pair contributes the whole
/// minutes elapsed between them. An unmatched trailing pause contributes
/// zero until a resume closes it.
pub fn total_paused_minutes(events: &[PauseResumeEvent]) -> i64 {
    events
        .chunks(2)
        .filter_map(|pair| match pair {
            [p, r] if p.kind == PauseKind::Pause && r.kind == PauseKind::Resume => {
                Some((r.timestamp - p.timestamp).num_minutes())
            }
            _ => None,
        })
        .sum()
}

/// Wall-clock minutes between clock-in and `end`, net of paused time.
pub fn net_worked_minutes(
    clock_in: DateTime<Utc>,
    end: DateTime<Utc>,
    paused_minutes: i64,
) -> i64 {
    let elapsed = (end - clock_in).max(Duration::zero()).num_minutes();
    (elapsed - paused_minutes).max(0)
}

pub fn format_duration(minutes: i64) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// A parsed `"<lat>, <lng>"` coordinate pair.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl FromStr for Location {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s.split_once(',').ok_or(())?;
        let lat: f64 = lat.trim().parse().map_err(|_| ())?;
        let lng: f64 = lng.trim().parse().map_err(|_| ())?;
        if !lat.is_finite() || !lng.is_finite() {
            return Err(());
        }
        Ok(Location { lat, lng })
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    fn ev(kind: PauseKind, h: u32, m: u32) -> PauseResumeEvent {
        PauseResumeEvent {
            kind,
            timestamp: at(h, m),
        }
    }

    #[test]
    fn empty_log_has_no_paused_time() {
        assert_eq!(total_paused_minutes(&[]), 0);
    }

    #[test]
    fn single_pair_sums_elapsed_minutes() {
        let log = vec![ev(PauseKind::Pause, 12, 0), ev(PauseKind::Resume, 12, 30)];
        assert_eq!(total_paused_minutes(&log), 30);
    }

    #[test]
    fn multiple_pairs_accumulate() {
        let log = vec![
            ev(PauseKind::Pause, 10, 0),
            ev(PauseKind::Resume, 10, 15),
            ev(PauseKind::Pause, 13, 0),
            ev(PauseKind::Resume, 13, 45),
        ];
        assert_eq!(total_paused_minutes(&log), 60);
    }

    #[test]
    fn trailing_pause_contributes_zero() {
        let log = vec![
            ev(PauseKind::Pause, 10, 0),
            ev(PauseKind::Resume, 10, 20),
            ev(PauseKind::Pause, 16, 0),
        ];
        assert_eq!(total_paused_minutes(&log), 20);
    }

    #[test]
    fn sub_minute_pause_rounds_down() {
        let log = vec![
            PauseResumeEvent {
                kind: PauseKind::Pause,
                timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
            },
            PauseResumeEvent {
                kind: PauseKind::Resume,
                timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 12, 1, 59).unwrap(),
            },
        ];
        assert_eq!(total_paused_minutes(&log), 1);
    }

    #[test]
    fn full_day_with_one_pause_displays_net_duration() {
        // 09:00 -> 17:30 with 30 paused minutes nets out to 8h 0m.
        let minutes = net_worked_minutes(at(9, 0), at(17, 30), 30);
        assert_eq!(format_duration(minutes), "8h 0m");
    }

    #[rstest]
    #[case(0, "0h 0m")]
    #[case(59, "0h 59m")]
    #[case(60, "1h 0m")]
    #[case(505, "8h 25m")]
    fn duration_formatting(#[case] minutes: i64, #[case] expected: &str) {
        assert_eq!(format_duration(minutes), expected);
    }

    #[test]
    fn paused_time_cannot_exceed_elapsed() {
        assert_eq!(net_worked_minutes(at(9, 0), at(9, 10), 60), 0);
    }

    #[rstest]
    #[case("23.780573, 90.419418", 23.780573, 90.419418)]
    #[case("-33.86, 151.21", -33.86, 151.21)]
    #[case("0,0", 0.0, 0.0)]
    fn location_parses(#[case] s: &str, #[case] lat: f64, #[case] lng: f64) {
        let loc: Location = s.parse().unwrap();
        assert_eq!(loc.lat, lat);
        assert_eq!(loc.lng, lng);
    }

    #[rstest]
    #[case("")]
    #[case("not a location")]
    #[case("12.5")]
    #[case("abc, def")]
    fn bad_locations_are_rejected(#[case] s: &str) {
        assert!(s.parse::<Location>().is_err());
    }

    #[test]
    fn location_displays_six_decimals() {
        let loc = Location {
            lat: 23.780573,
            lng: 90.419418,
        };
        assert_eq!(loc.to_string(), "23.780573, 90.419418");
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            SessionStatus::Working,
            SessionStatus::Paused,
            SessionStatus::Completed,
        ] {
            assert_eq!(
                SessionStatus::from_str(&status.to_string()).unwrap(),
                status
            );
        }
    }
}
