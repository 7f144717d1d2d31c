use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt: JwtConfig,
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    /// Offset of the business clock from UTC (Santo Domingo is UTC-4).
    pub business_utc_offset_minutes: i32,
    /// Cancellation window used when a betting pool has none configured.
    pub default_cancel_minutes: i64,
    pub reservation_ttl_secs: u64,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub permits: u32,
    pub window_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_path: PathBuf::from("banca.db"),
            jwt: JwtConfig {
                secret: String::new(),
                issuer: "banca-api".to_string(),
                audience: "banca-clients".to_string(),
                token_ttl_minutes: 8 * 60,
            },
            cors_origins: vec!["http://localhost:3000".to_string()],
            rate_limit: RateLimitConfig {
                permits: 300,
                window_secs: 60,
            },
            business_utc_offset_minutes: -240,
            default_cancel_minutes: 5,
            reservation_ttl_secs: 120,
            cache_ttl_secs: 300,
        }
    }
}

impl ServiceConfig {
    /// Build a configuration from `BANCA_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let cors_origins = match env::var("BANCA_CORS_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => {
                info!("BANCA_CORS_ORIGINS not set, using default: {:?}", defaults.cors_origins);
                defaults.cors_origins
            }
        };

        Ok(Self {
            host: try_load("BANCA_HOST", defaults.host)?,
            port: try_load("BANCA_PORT", defaults.port)?,
            database_path: try_load("BANCA_DATABASE_PATH", defaults.database_path)?,
            jwt: JwtConfig {
                secret: env::var("BANCA_JWT_SECRET").unwrap_or_else(|_| {
                    warn!("BANCA_JWT_SECRET not set");
                    String::new()
                }),
                issuer: try_load("BANCA_JWT_ISSUER", defaults.jwt.issuer)?,
                audience: try_load("BANCA_JWT_AUDIENCE", defaults.jwt.audience)?,
                token_ttl_minutes: try_load("BANCA_JWT_TTL_MINUTES", defaults.jwt.token_ttl_minutes)?,
            },
            cors_origins,
            rate_limit: RateLimitConfig {
                permits: try_load("BANCA_RATE_LIMIT_PERMITS", defaults.rate_limit.permits)?,
                window_secs: try_load("BANCA_RATE_LIMIT_WINDOW_SECS", defaults.rate_limit.window_secs)?,
            },
            business_utc_offset_minutes: try_load(
                "BANCA_UTC_OFFSET_MINUTES",
                defaults.business_utc_offset_minutes,
            )?,
            default_cancel_minutes: try_load(
                "BANCA_DEFAULT_CANCEL_MINUTES",
                defaults.default_cancel_minutes,
            )?,
            reservation_ttl_secs: try_load("BANCA_RESERVATION_TTL_SECS", defaults.reservation_ttl_secs)?,
            cache_ttl_secs: try_load("BANCA_CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt.secret.len() < 32 {
            return Err(CoreError::config("JWT secret must be at least 32 bytes"));
        }

        if self.jwt.token_ttl_minutes <= 0 {
            return Err(CoreError::config("Token lifetime must be greater than 0"));
        }

        if self.port == 0 {
            return Err(CoreError::config("Port must be greater than 0"));
        }

        if self.rate_limit.window_secs == 0 || self.rate_limit.permits == 0 {
            return Err(CoreError::config("Rate limit window and permits must be greater than 0"));
        }

        if self.reservation_ttl_secs == 0 {
            return Err(CoreError::config("Reservation TTL must be greater than 0"));
        }

        if !(-720..=840).contains(&self.business_utc_offset_minutes) {
            return Err(CoreError::config("UTC offset must be between -720 and 840 minutes"));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn try_load<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + std::fmt::Debug,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| {
            warn!("Invalid {} value: {}", key, e);
            CoreError::config(format!("Invalid {}: {}", key, e))
        }),
        Err(_) => {
            info!("{} not set, using default: {:?}", key, default);
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.jwt.secret = "0123456789abcdef0123456789abcdef".to_string();
        config
    }

    #[test]
    fn test_default_needs_secret() {
        assert!(ServiceConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_window() {
        let mut config = valid();
        config.rate_limit.window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_try_load_parses_and_defaults() {
        env::set_var("BANCA_TEST_PORT_VALUE", "8088");
        let port: u16 = try_load("BANCA_TEST_PORT_VALUE", 1).unwrap();
        assert_eq!(port, 8088);

        let missing: u16 = try_load("BANCA_TEST_MISSING_VALUE", 7).unwrap();
        assert_eq!(missing, 7);

        env::set_var("BANCA_TEST_BAD_VALUE", "not-a-port");
        assert!(try_load::<u16>("BANCA_TEST_BAD_VALUE", 1).is_err());
    }
}
