use crate::core::money::{DEFAULT_MONEY_SCALE, MAX_MONEY_SCALE};
use dotenv::dotenv;
use once_cell::sync::Lazy;
use std::env;

pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub jwt_secret: String,
    /// Decimal places of the currency's minor unit.
    pub money_scale: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("jwt_secret", &"<redacted>")
            .field("money_scale", &self.money_scale)
            .finish()
    }
}

impl Config {
    fn from_env() -> Self {
        dotenv().ok();

        Self {
            port: env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(3000),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()),
            money_scale: env::var("MONEY_SCALE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|scale| *scale <= MAX_MONEY_SCALE)
                .unwrap_or(DEFAULT_MONEY_SCALE),
        }
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);
