use chrono::{FixedOffset, Offset, Utc};
use service_core::config::{self as core_config, get_env, get_optional_env, parse_env, Environment};
use service_core::error::AppError;

use crate::utils::Password;

/// Password the admin account is seeded with outside production.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Clone)]
pub struct UsageConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mongodb: MongoConfig,
    pub admin: AdminConfig,
    pub rollover: RolloverConfig,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub password: Password,
    /// When set, `/admin_dashboard` requires a matching `X-Admin-Api-Key` header.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RolloverConfig {
    pub enabled: bool,
    /// Zone whose midnight is the day boundary for readings and rollover.
    pub utc_offset: FixedOffset,
    /// Maximum users rolled over at the same time.
    pub concurrency: usize,
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            utc_offset: Utc.fix(),
            concurrency: 8,
        }
    }
}

impl UsageConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let environment = Environment::from_env()?;
        let is_prod = environment.is_prod();

        let config = UsageConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("usage-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("water_usage"), is_prod)?,
            },
            admin: AdminConfig {
                password: Password::new(get_env(
                    "ADMIN_PASSWORD",
                    Some(DEFAULT_ADMIN_PASSWORD),
                    is_prod,
                )?),
                api_key: get_optional_env("ADMIN_API_KEY"),
            },
            rollover: RolloverConfig {
                enabled: parse_env("ROLLOVER_ENABLED", "true")?,
                utc_offset: parse_utc_offset(&parse_env::<String>("ROLLOVER_UTC_OFFSET", "+00:00")?)?,
                concurrency: parse_env("ROLLOVER_CONCURRENCY", "8")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.rollover.concurrency == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ROLLOVER_CONCURRENCY must be positive"
            )));
        }

        if self.environment.is_prod() {
            if self.admin.password.as_str() == DEFAULT_ADMIN_PASSWORD {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "ADMIN_PASSWORD must not be the default in production"
                )));
            }

            if self.admin.api_key.is_none() {
                tracing::warn!("ADMIN_API_KEY not set; /admin_dashboard is unauthenticated");
            }
        }

        Ok(())
    }
}

/// `+HH:MM` or `-HH:MM`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, AppError> {
    let invalid = || {
        AppError::ConfigError(anyhow::anyhow!(
            "ROLLOVER_UTC_OFFSET has invalid value '{}': expected +HH:MM or -HH:MM",
            raw
        ))
    };

    let trimmed = raw.trim();
    let (sign, rest) = if let Some(rest) = trimmed.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours < 0 || !(0..60).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
