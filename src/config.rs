use std::{env, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable '{0}' not set")]
    Missing(&'static str),
    #[error("Environment variable '{name}' has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration, read from the environment.
/// A `.env` file in the working directory is loaded first when present.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
    /// Directory holding publicly served uploads, mapped to `/storage/...`
    pub storage_root: PathBuf,
    pub pool_size: u32,
    /// Tokens older than this are rejected. `None` means tokens never expire.
    pub token_expiration_minutes: Option<i64>,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        Ok(Config {
            database_url,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT")?.unwrap_or(8080),
            storage_root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("storage/app/public")),
            pool_size: parse_var("DATABASE_POOL_SIZE")?.unwrap_or(10),
            token_expiration_minutes: parse_var("TOKEN_EXPIRATION_MINUTES")?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(None),
    }
}
