use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub chapa_secret_key: String,
    pub chapa_base_url: String,
    pub chapa_return_url: String,
    pub chapa_callback_url: String,
    pub pending_hold_ttl_minutes: i64,
    pub currency: String,
    pub http_timeout_sec: u64,
    /// Skip weekly open/close rules entirely. Blackouts still apply.
    pub always_open_slots: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "fieldbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            chapa_secret_key: env::var("CHAPA_SECRET_KEY").unwrap_or_default(),
            chapa_base_url: env::var("CHAPA_BASE_URL")
                .unwrap_or_else(|_| "https://api.chapa.co".to_string())
                .trim_end_matches('/')
                .to_string(),
            chapa_return_url: env::var("CHAPA_RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:3000/payment-return".to_string()),
            chapa_callback_url: env::var("CHAPA_CALLBACK_URL").unwrap_or_else(|_| {
                "http://localhost:3000/payments/gateway/callback".to_string()
            }),
            pending_hold_ttl_minutes: env::var("PENDING_HOLD_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            currency: env::var("CURRENCY").unwrap_or_else(|_| "ETB".to_string()),
            http_timeout_sec: env::var("HTTP_TIMEOUT_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            always_open_slots: env::var("ALWAYS_OPEN_SLOTS")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    pub fn hold_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.pending_hold_ttl_minutes)
    }

    pub fn validate_payments(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.chapa_secret_key.is_empty(), "CHAPA_SECRET_KEY must be set");
        anyhow::ensure!(!self.chapa_return_url.is_empty(), "CHAPA_RETURN_URL must be set");
        anyhow::ensure!(!self.chapa_callback_url.is_empty(), "CHAPA_CALLBACK_URL must be set");
        Ok(())
    }
}
