use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    pub jwt_secret: String,
    pub payment_gateway_url: String,
    pub payment_key_id: String,
    pub payment_key_secret: String,
    pub notification_webhook_url: String,
    pub credit_ledger_url: String,
    pub gender_preference_fee: f64,
    pub max_extras_per_booking: usize,
    pub no_show_sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_PATH not set, using ./homecare.db");
                    "./homecare.db".to_string()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            payment_gateway_url: env::var("PAYMENT_GATEWAY_URL")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_GATEWAY_URL not set, using empty value");
                    String::new()
                }),
            payment_key_id: env::var("PAYMENT_KEY_ID")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_KEY_ID not set, using empty value");
                    String::new()
                }),
            payment_key_secret: env::var("PAYMENT_KEY_SECRET")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_KEY_SECRET not set, using empty value");
                    String::new()
                }),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .unwrap_or_default(),
            credit_ledger_url: env::var("CREDIT_LEDGER_URL").unwrap_or_default(),
            gender_preference_fee: env::var("GENDER_PREFERENCE_FEE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            max_extras_per_booking: env::var("MAX_EXTRAS_PER_BOOKING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            no_show_sweep_interval_secs: env::var("NO_SHOW_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.database_path.is_empty() && !self.jwt_secret.is_empty()
    }

    pub fn is_payment_gateway_configured(&self) -> bool {
        !self.payment_gateway_url.is_empty()
            && !self.payment_key_id.is_empty()
            && !self.payment_key_secret.is_empty()
    }
}
