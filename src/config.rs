use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use tracing::info;

use crate::db::PoolSettings;

/// Process configuration, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub seed_path: PathBuf,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// `None` allows any origin
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: try_load("DATABASE_URL", "sqlite:restaurants.db")?,
            host: try_load("HOST", "127.0.0.1")?,
            port: try_load("PORT", "8080")?,
            seed_path: try_load("SEED_PATH", "data/restaurants.json")?,
            max_connections: try_load("DB_MAX_CONNECTIONS", "10")?,
            acquire_timeout: Duration::from_secs(try_load("DB_ACQUIRE_TIMEOUT_SECS", "10")?),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|s| !s.is_empty()),
        })
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_load_falls_back_and_parses() {
        let port: u16 = try_load("CAMPUS_EATS_TEST_UNSET_PORT", "8080").unwrap();
        assert_eq!(port, 8080);

        env::set_var("CAMPUS_EATS_TEST_BAD_PORT", "eighty");
        let err = try_load::<u16>("CAMPUS_EATS_TEST_BAD_PORT", "8080").unwrap_err();
        assert!(err.to_string().contains("CAMPUS_EATS_TEST_BAD_PORT"));
    }
}
