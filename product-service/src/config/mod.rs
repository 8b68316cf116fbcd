use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct ProductConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub connect_max_attempts: u32,
    pub connect_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl ProductConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and PORT)
        let common = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ProductConfig {
            common,
            mongodb: MongoConfig {
                uri: get_env("MONGO_URI", None, is_prod)?,
                database: get_env("MONGO_DATABASE", Some("products"), is_prod)?,
                connect_max_attempts: parse_env(get_env(
                    "MONGO_CONNECT_ATTEMPTS",
                    Some("15"),
                    is_prod,
                )?)?,
                connect_retry_delay_ms: parse_env(get_env(
                    "MONGO_CONNECT_RETRY_DELAY_MS",
                    Some("3000"),
                    is_prod,
                )?)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("*"), is_prod)?
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(value: String) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!(format!(
            "'{}' is not a valid number: {}",
            value, e
        )))
    })
}
