//! Application configuration management.
//!
//! Configuration is read from environment variables with the `envy` crate,
//! after an optional `.env` file has been loaded by `dotenvy`.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SESSION_SECRET` (required): key used to sign session cookies
/// - `GATEWAY_KEY_ID`, `GATEWAY_KEY_SECRET` (required): payment gateway credentials
/// - `GATEWAY_WEBHOOK_SECRET` (required): HMAC key for gateway webhooks
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `SESSION_TTL_HOURS` (optional): session lifetime, defaults to 168
/// - `COOKIE_SECURE` (optional): set the `Secure` cookie attribute, defaults to true
/// - `GATEWAY_BASE_URL` (optional): payment gateway API root
/// - `CURRENCY` (optional): ISO 4217 code for wallets and orders, defaults to USD
/// - `MIN_PAYOUT_CENTS` (optional): smallest payout a creator may request
/// - `ADMIN_EMAILS` (optional): comma-separated emails granted the admin flag
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    pub session_secret: String,

    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,

    #[serde(default = "default_gateway_base_url")]
    pub gateway_base_url: String,

    pub gateway_key_id: String,

    pub gateway_key_secret: String,

    pub gateway_webhook_secret: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_min_payout_cents")]
    pub min_payout_cents: i64,

    #[serde(default)]
    pub admin_emails: String,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

/// One week.
fn default_session_ttl_hours() -> i64 {
    24 * 7
}

fn default_cookie_secure() -> bool {
    true
}

fn default_gateway_base_url() -> String {
    "https://api.gateway.example/v1".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_min_payout_cents() -> i64 {
    1000
}

impl Config {
    /// Whether an email (already lowercased) is listed in `ADMIN_EMAILS`.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .split(',')
            .map(|e| e.trim())
            .any(|e| !e.is_empty() && e.eq_ignore_ascii_case(email))
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value cannot
    /// be parsed into the expected type.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are converted automatically: session_secret -> SESSION_SECRET
        envy::from_env::<Config>()
    }

    /// Configuration used by router tests. Nothing here talks to a real service.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/viral_payouts_test".to_string(),
            server_port: 0,
            database_max_connections: 1,
            session_secret: "test-session-secret".to_string(),
            session_ttl_hours: 1,
            cookie_secure: false,
            gateway_base_url: "http://127.0.0.1:9/v1".to_string(),
            gateway_key_id: "key_test".to_string(),
            gateway_key_secret: "key_secret".to_string(),
            gateway_webhook_secret: "whsec_test".to_string(),
            currency: "USD".to_string(),
            min_payout_cents: 1000,
            admin_emails: "root@viral.example".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_values_fall_back_to_defaults() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://db/vp".to_string()),
            ("SESSION_SECRET".to_string(), "s".to_string()),
            ("GATEWAY_KEY_ID".to_string(), "k".to_string()),
            ("GATEWAY_KEY_SECRET".to_string(), "ks".to_string()),
            ("GATEWAY_WEBHOOK_SECRET".to_string(), "wh".to_string()),
        ];

        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.session_ttl_hours, 168);
        assert_eq!(config.currency, "USD");
        assert_eq!(config.min_payout_cents, 1000);
        assert!(config.cookie_secure);
    }

    #[test]
    fn admin_emails_are_matched_case_insensitively() {
        let mut config = Config::for_tests();
        config.admin_emails = " ops@viral.example, Root@Viral.example ,".to_string();

        assert!(config.is_admin_email("root@viral.example"));
        assert!(config.is_admin_email("ops@viral.example"));
        assert!(!config.is_admin_email("creator@viral.example"));
        assert!(!config.is_admin_email(""));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let vars = vec![("DATABASE_URL".to_string(), "postgres://db/vp".to_string())];
        assert!(envy::from_iter::<_, Config>(vars).is_err());
    }
}
