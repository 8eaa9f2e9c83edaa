use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

// Top-level configuration, assembled from the environment at startup
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
    pub storage: StorageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
    /// Staff account ensured at startup when both e-mail and password are set.
    pub staff_email: Option<String>,
    pub staff_password: Option<String>,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(name, default)
        .parse()
        .with_context(|| format!("{name} must be a valid value"))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => bail!("unknown log format {other:?}, expected text or json"),
        }
    }
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StorageKind::Postgres),
            "memory" => Ok(StorageKind::Memory),
            other => bail!("unknown storage {other:?}, expected postgres or memory"),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let storage: StorageKind = var_or("STORAGE", "postgres").parse()?;
        let log_format: LogFormat = var_or("LOG_FORMAT", "text").parse()?;

        let database_url = optional_var("DATABASE_URL");
        if storage == StorageKind::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE=postgres");
        }

        let secret = optional_var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let bcrypt_cost: u32 = parse_var("BCRYPT_COST", "12")?;
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }

        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parse_var("PORT", "8000")?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "planetarium=debug,tower_http=debug"),
                log_format,
                storage,
            },
            database: DatabaseConfig {
                url: database_url,
                pool_size: parse_var("DB_POOL_SIZE", "20")?,
            },
            jwt: JwtConfig {
                secret,
                expires_in_hours: parse_var("JWT_EXPIRES_IN_HOURS", "24")?,
            },
            auth: AuthConfig {
                bcrypt_cost,
                staff_email: optional_var("STAFF_EMAIL"),
                staff_password: optional_var("STAFF_PASSWORD"),
            },
        })
    }

    /// Settings for tests and local tooling: in-memory storage, cheapest bcrypt cost.
    pub fn for_tests() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
                rust_log: "planetarium=debug".to_string(),
                log_format: LogFormat::Text,
                storage: StorageKind::Memory,
            },
            database: DatabaseConfig {
                url: None,
                pool_size: 1,
            },
            jwt: JwtConfig {
                secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
                expires_in_hours: 1,
            },
            auth: AuthConfig {
                bcrypt_cost: 4,
                staff_email: None,
                staff_password: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_enum_values() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("memory".parse::<StorageKind>().unwrap(), StorageKind::Memory);
        assert!("redis".parse::<StorageKind>().is_err());
    }

    #[test]
    fn test_config_uses_cheap_hashing() {
        assert_eq!(Config::for_tests().auth.bcrypt_cost, 4);
    }
}
