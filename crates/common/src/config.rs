use std::str::FromStr;

/// Global application configuration loaded from environment variables.
///
/// Resolved once at process start. Mail credentials are optional here: a
/// server without them still accepts registrations, it just cannot notify.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 10)
    pub db_max_connections: u32,

    /// HTTP listen port (default: 5000)
    pub server_port: u16,

    /// JWT secret for admin authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Admin login identity for the registrations listing
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,

    /// Cloudinary account that asset URLs must belong to
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,

    /// Mail relay account address
    pub email_user: Option<String>,

    /// Mail relay secret
    pub email_pass: Option<String>,

    /// Relay alias (`gmail`, `outlook`, `yahoo`) or a literal SMTP host
    pub email_service: String,

    /// Display name used in the From header
    pub email_from_name: String,

    /// Total delivery attempts per notification, first try included
    pub notify_max_attempts: u32,

    /// Fixed delay between delivery attempts in milliseconds
    pub notify_retry_delay_ms: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            server_port: parse_or("PORT", 5000)?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: parse_or("JWT_EXPIRY_HOURS", 24)?,
            admin_email: non_empty("ADMIN_EMAIL"),
            admin_password: non_empty("ADMIN_PASSWORD"),
            cloudinary_cloud_name: non_empty("CLOUDINARY_CLOUD_NAME"),
            cloudinary_api_key: non_empty("CLOUDINARY_API_KEY"),
            cloudinary_api_secret: non_empty("CLOUDINARY_API_SECRET"),
            email_user: non_empty("EMAIL_USER"),
            email_pass: non_empty("EMAIL_PASS"),
            email_service: non_empty("EMAIL_SERVICE").unwrap_or_else(|| "gmail".to_string()),
            email_from_name: non_empty("EMAIL_FROM_NAME")
                .unwrap_or_else(|| "ICVK Team".to_string()),
            notify_max_attempts: parse_or("NOTIFY_MAX_ATTEMPTS", 3)?,
            notify_retry_delay_ms: parse_or("NOTIFY_RETRY_DELAY_MS", 2000)?,
        };

        if config.notify_max_attempts == 0 {
            anyhow::bail!("NOTIFY_MAX_ATTEMPTS must be at least 1");
        }

        Ok(config)
    }
}

/// Read an env var, treating blank values as absent.
fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional env var, falling back to `default` when unset.
fn parse_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match non_empty(key) {
        Some(raw) => raw.parse().map_err(|_| {
            anyhow::anyhow!("{} must be a valid {}", key, std::any::type_name::<T>())
        }),
        None => Ok(default),
    }
}
