use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "full_name": "John Doe",
        "email": "john.doe@company.com",
        "department": "Engineering",
        "role": "Backend Developer",
        "phone": "+8801712345678",
        "profile_picture": "http://localhost:8080/media/profile-photos/1.png",
        "joining_date": "2024-01-01",
        "created_at": "2024-01-01T09:00:00Z",
        "updated_at": "2024-01-01T09:00:00Z"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: i64,

    #[schema(example = "John Doe")]
    pub full_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "Engineering")]
    pub department: String,

    #[schema(example = "Backend Developer")]
    pub role: String,

    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(nullable = true)]
    pub profile_picture: Option<String>,

    #[schema(example = "2024-01-01", value_type = Option<String>, format = "date", nullable = true)]
    pub joining_date: Option<NaiveDate>,

    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<Utc>,

    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyJoining {
    #[schema(example = "Aug 2025")]
    pub month: String,
    #[schema(example = 3)]
    pub count: i64,
}

/// Head-count of joining dates bucketed into the 12 calendar months ending
/// at `now`'s month. Buckets with no joiners are zero-filled.
pub fn monthly_joining_counts(joining_dates: &[NaiveDate], now: NaiveDate) -> Vec<MonthlyJoining> {
    let anchor = now.with_day(1).unwrap_or(now);

    (0..12)
        .rev()
        .map(|back| {
            let month_start = anchor
                .checked_sub_months(Months::new(back))
                .unwrap_or(anchor);
            let count = joining_dates
                .iter()
                .filter(|d| d.year() == month_start.year() && d.month() == month_start.month())
                .count() as i64;
            MonthlyJoining {
                month: month_start.format("%b %Y").to_string(),
                count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn always_twelve_buckets_zero_filled() {
        let buckets = monthly_joining_counts(&[], d(2025, 8, 6));
        assert_eq!(buckets.len(), 12);
        assert!(buckets.iter().all(|b| b.count == 0));
        assert_eq!(buckets.first().unwrap().month, "Sep 2024");
        assert_eq!(buckets.last().unwrap().month, "Aug 2025");
    }

    #[test]
    fn joiners_land_in_their_month() {
        let dates = vec![d(2025, 8, 1), d(2025, 8, 20), d(2025, 3, 15)];
        let buckets = monthly_joining_counts(&dates, d(2025, 8, 6));
        assert_eq!(buckets.last().unwrap().count, 2);
        let march = buckets.iter().find(|b| b.month == "Mar 2025").unwrap();
        assert_eq!(march.count, 1);
    }

    #[test]
    fn joiners_outside_the_window_are_ignored() {
        let dates = vec![d(2024, 8, 31), d(2026, 1, 1)];
        let buckets = monthly_joining_counts(&dates, d(2025, 8, 6));
        assert!(buckets.iter().all(|b| b.count == 0));
    }

    #[test]
    fn year_boundary_is_bucketed_correctly() {
        let dates = vec![d(2024, 12, 31), d(2025, 1, 1)];
        let buckets = monthly_joining_counts(&dates, d(2025, 8, 6));
        let dec = buckets.iter().find(|b| b.month == "Dec 2024").unwrap();
        let jan = buckets.iter().find(|b| b.month == "Jan 2025").unwrap();
        assert_eq!(dec.count, 1);
        assert_eq!(jan.count, 1);
    }
}
