//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub app_base_url: String,
    pub openai_api_key: Option<String>,
    pub chat_model: String,
    pub chat_temperature: f32,
    pub chat_max_tokens: u32,
    pub free_message_allowance: u64,
    pub paid_monthly_allowance: u64,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub yookassa_shop_id: Option<String>,
    pub yookassa_secret_key: Option<String>,
    pub crypto_ipn_secret: Option<String>,
    pub crypto_gateway_url: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let app_base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load Model Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let chat_temperature = parse_env_or("CHAT_TEMPERATURE", 0.8)?;
        let chat_max_tokens = parse_env_or("CHAT_MAX_TOKENS", 400)?;

        // --- Load Quota Settings ---
        let free_message_allowance = parse_env_or("FREE_MESSAGE_ALLOWANCE", 2)?;
        let paid_monthly_allowance = parse_env_or("PAID_MONTHLY_ALLOWANCE", 500)?;

        // --- Load Payment Provider Credentials (all optional; gateways fail closed) ---
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY").ok();
        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET").ok();
        let yookassa_shop_id = std::env::var("YK_SHOP_ID").ok();
        let yookassa_secret_key = std::env::var("YK_SECRET_KEY").ok();
        let crypto_ipn_secret = std::env::var("CRYPTO_IPN_SECRET").ok();
        let crypto_gateway_url = std::env::var("CRYPTO_GATEWAY_URL")
            .unwrap_or_else(|_| "https://crypto-payment-gateway.com/pay".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            app_base_url,
            openai_api_key,
            chat_model,
            chat_temperature,
            chat_max_tokens,
            free_message_allowance,
            paid_monthly_allowance,
            stripe_secret_key,
            stripe_webhook_secret,
            yookassa_shop_id,
            yookassa_secret_key,
            crypto_ipn_secret,
            crypto_gateway_url,
        })
    }
}

fn parse_env_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
