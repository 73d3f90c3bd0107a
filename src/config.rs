use std::env;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8083";
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// The immutable configuration loaded at startup, pulled into handlers and
/// extractors via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the x-user-id bypass and log format.
    pub env: Env,
    // Postgres connection string. None selects the in-memory repository.
    pub db_url: Option<String>,
    // Secret used to validate incoming HS256 JWTs.
    pub jwt_secret: String,
    // Socket address the HTTP server listens on.
    pub bind_addr: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
}

impl Default for AppConfig {
    /// default
    ///
    /// A local, database-less configuration for tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// try_load
    ///
    /// Reads the configuration from the environment. Production requires
    /// `DATABASE_URL` and `JWT_SECRET`; local runs fall back to defaults.
    pub fn try_load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let db_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        let jwt_secret = env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        match env {
            Env::Local => Ok(Self {
                env,
                db_url,
                jwt_secret: jwt_secret.unwrap_or_else(|| LOCAL_JWT_SECRET.to_string()),
                bind_addr,
            }),
            Env::Production => Ok(Self {
                env,
                db_url: Some(db_url.ok_or(ConfigError::Missing("DATABASE_URL"))?),
                jwt_secret: jwt_secret.ok_or(ConfigError::Missing("JWT_SECRET"))?,
                bind_addr,
            }),
        }
    }

    /// load
    ///
    /// [`AppConfig::try_load`], failing fast.
    ///
    /// # Panics
    /// Panics when a variable required in production is missing, so the
    /// service never starts half-configured.
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(config) => config,
            Err(e) => panic!("FATAL: {e}"),
        }
    }
}
