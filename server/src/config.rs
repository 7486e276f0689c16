//! Process configuration loaded from environment variables.
//!
//! Every setting has a typed default except the database location, which comes either from
//! `DATABASE_URL` or from the `POSTGRES_*` parts. A `.env` file is read first if present.
//!
//! | Variable                    | Default          |
//! |-----------------------------|------------------|
//! | `DATABASE_URL`              | built from parts |
//! | `DATABASE_MAX_CONNECTIONS`  | 10               |
//! | `DATABASE_MIN_CONNECTIONS`  | 1                |
//! | `DATABASE_CONNECT_TIMEOUT`  | 5 (seconds)      |
//! | `TG_TOKEN`                  | unset (log only) |
//! | `SWEEP_INTERVAL_SECS`       | 30               |
//! | `NOTIFY_WORKERS`            | 3                |
//! | `NOTIFY_QUEUE_CAPACITY`     | 100              |
//! | `NOTIFY_MAX_ATTEMPTS`       | 5                |
//! | `NOTIFY_RETRY_BASE_SECS`    | 3                |
//! | `METRICS_HOST`              | 0.0.0.0          |
//! | `METRICS_PORT`              | 9090             |
//! | `SHUTDOWN_TIMEOUT_SECS`     | 10               |
//! | `JWT_SECRET_KEY`            | unset            |

use eventbooker_postgres::PoolSettings;
use eventbooker_runtime::dispatcher::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, DispatcherConfig};
use eventbooker_runtime::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use eventbooker_runtime::sweeper::{DEFAULT_SWEEP_INTERVAL, SweeperConfig};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is missing.
    #[error("Environment variable {0} is not set")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parse failure
        reason: String,
    },

    /// Values parse but do not make sense together.
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Token-signing secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(String);

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Database settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: String,
    /// Pool sizing and timeouts
    pub pool: PoolSettings,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &redact_url(&self.url))
            .field("pool", &self.pool)
            .finish()
    }
}

/// Notification delivery settings.
#[derive(Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Bot token; messages are only logged without one
    pub telegram_token: Option<String>,
    /// Worker pool, queue and retry policy
    pub dispatcher: DispatcherConfig,
}

impl fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("telegram_token", &self.telegram_token.as_ref().map(|_| "<redacted>"))
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Database settings
    pub database: DatabaseConfig,
    /// Notification settings
    pub notify: NotifyConfig,
    /// Sweeper settings
    pub sweeper: SweeperConfig,
    /// Prometheus scrape address
    pub metrics_addr: SocketAddr,
    /// Grace period for background tasks after a shutdown signal
    pub shutdown_timeout: Duration,
    /// Secret for signing session tokens
    pub signing_key: Option<SigningKey>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is malformed, the database location is missing,
    /// or the values are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a variable if set.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let database = DatabaseConfig {
            url: database_url(&env)?,
            pool: PoolSettings {
                max_connections: env.parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: env.parse_or("DATABASE_MIN_CONNECTIONS", 1)?,
                connect_timeout: env.secs_or("DATABASE_CONNECT_TIMEOUT", Duration::from_secs(5))?,
            },
        };

        let retry = RetryPolicy::builder()
            .max_attempts(env.parse_or("NOTIFY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?)
            .base_delay(env.secs_or("NOTIFY_RETRY_BASE_SECS", DEFAULT_BASE_DELAY)?)
            .build();
        let notify = NotifyConfig {
            telegram_token: env.get("TG_TOKEN"),
            dispatcher: DispatcherConfig {
                workers: env.parse_or("NOTIFY_WORKERS", DEFAULT_WORKERS)?,
                queue_capacity: env.parse_or("NOTIFY_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
                retry,
            },
        };

        let sweeper = SweeperConfig {
            interval: env.secs_or("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL)?,
        };

        let metrics_host: IpAddr = env.parse_or("METRICS_HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let metrics_port: u16 = env.parse_or("METRICS_PORT", 9090)?;

        let config = Self {
            database,
            notify,
            sweeper,
            metrics_addr: SocketAddr::new(metrics_host, metrics_port),
            shutdown_timeout: env.secs_or("SHUTDOWN_TIMEOUT_SECS", Duration::from_secs(10))?,
            signing_key: env.get("JWT_SECRET_KEY").map(SigningKey),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pool = &self.database.pool;
        if pool.max_connections == 0 {
            return Err(ConfigError::Validation("DATABASE_MAX_CONNECTIONS must be > 0".to_string()));
        }
        if pool.min_connections > pool.max_connections {
            return Err(ConfigError::Validation(format!(
                "DATABASE_MIN_CONNECTIONS ({}) exceeds DATABASE_MAX_CONNECTIONS ({})",
                pool.min_connections, pool.max_connections
            )));
        }
        let dispatcher = &self.notify.dispatcher;
        if dispatcher.workers == 0 {
            return Err(ConfigError::Validation("NOTIFY_WORKERS must be > 0".to_string()));
        }
        if dispatcher.queue_capacity == 0 {
            return Err(ConfigError::Validation("NOTIFY_QUEUE_CAPACITY must be > 0".to_string()));
        }
        if dispatcher.retry.max_attempts == 0 {
            return Err(ConfigError::Validation("NOTIFY_MAX_ATTEMPTS must be > 0".to_string()));
        }
        if self.sweeper.interval.is_zero() {
            return Err(ConfigError::Validation("SWEEP_INTERVAL_SECS must be > 0".to_string()));
        }
        Ok(())
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value of `key`.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn secs_or(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(_) => self.parse_or::<u64>(key, 0).map(Duration::from_secs),
        }
    }
}

fn database_url<F>(env: &Env<F>) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env.get("DATABASE_URL") {
        return Ok(url);
    }

    let user = env.get("POSTGRES_USER").ok_or(ConfigError::Missing("DATABASE_URL"))?;
    let password = env.get("POSTGRES_PASSWORD").unwrap_or_default();
    let host = env.get("POSTGRES_HOST").unwrap_or_else(|| "localhost:5432".to_string());
    let db = env.get("POSTGRES_DB").unwrap_or_else(|| user.clone());
    Ok(format!("postgres://{user}:{password}@{host}/{db}"))
}

/// Hide the password component of a connection URL.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => url.to_string(),
    }
}
