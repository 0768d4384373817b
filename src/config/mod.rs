//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::util::rate_limit::ADMIN_RATE_LIMIT;

/// Default location of the hit-delay profile document
pub const DEFAULT_PROFILES_PATH: &str = "hit_delay_profiles.json";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Where the profile registry is persisted
    pub profiles_path: PathBuf,

    /// HMAC secret for admin/host bearer tokens
    pub admin_jwt_secret: String,
    /// Requests per second accepted on the admin surface
    pub admin_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let admin_rate_limit = match env::var("ADMIN_RATE_LIMIT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("ADMIN_RATE_LIMIT"))?,
            Err(_) => ADMIN_RATE_LIMIT,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            profiles_path: env::var("HIT_DELAY_PROFILES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_PROFILES_PATH)),

            admin_jwt_secret: env::var("ADMIN_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("ADMIN_JWT_SECRET"))?,
            admin_rate_limit,
        })
    }

    /// Configuration for in-process tests
    #[cfg(test)]
    pub fn for_tests(profiles_path: PathBuf) -> Self {
        Self {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".to_string(),
            profiles_path,
            admin_jwt_secret: "test-secret".to_string(),
            admin_rate_limit: 1_000,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Environment variable {0} must be a non-negative integer")]
    InvalidNumber(&'static str),
}
