use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Base URL prepended to public links (photo URLs, emailed clock-out links).
    pub public_base_url: String,
    /// Directory profile photos are written under.
    pub media_root: String,

    // Overdue clock-out handling
    pub overdue_after_hours: i64,
    pub clockout_token_ttl_hours: i64,
    pub overdue_poll_secs: u64,

    // Gmail API credentials; the reminder mailer is disabled when absent.
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_refresh_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            access_token_ttl: env::var("ACCESS_TOKEN_TTL")
                .unwrap_or_else(|_| "900".to_string()) // default 15 min
                .parse()
                .unwrap(),
            refresh_token_ttl: env::var("REFRESH_TOKEN_TTL")
                .unwrap_or_else(|_| "604800".to_string()) // default 7 days
                .parse()
                .unwrap(),

            rate_login_per_min: env::var("RATE_LOGIN_PER_MIN")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),
            rate_register_per_min: env::var("RATE_REGISTER_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            rate_refresh_per_min: env::var("RATE_REFRESH_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            rate_protected_per_min: env::var("RATE_PROTECTED_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            media_root: env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()),

            overdue_after_hours: env::var("OVERDUE_AFTER_HOURS")
                .unwrap_or_else(|_| "9".to_string())
                .parse()
                .unwrap(),
            clockout_token_ttl_hours: env::var("CLOCKOUT_TOKEN_TTL_HOURS")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .unwrap(),
            overdue_poll_secs: env::var("OVERDUE_POLL_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .unwrap(),

            google_client_id: env::var("GOOGLE_CLIENT_ID").ok(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").ok(),
            google_refresh_token: env::var("GOOGLE_REFRESH_TOKEN").ok(),
        }
    }
}
