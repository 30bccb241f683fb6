use chrono::Duration;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

const DEVELOPMENT_JWT_SECRET: &str = "sms-development-secret";

pub const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365;
pub const MAX_SESSION_MAX_AGE_DAYS: u64 = 10 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size_bytes: usize,
}

/// Which persistence backend the server runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub session_max_age_days: u64,
    pub secure_cookies: bool,
    pub cors_origins: Vec<String>,
    pub password_min_length: usize,
}

/// Optional superadmin provisioned at startup when missing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub superadmin_name: String,
    pub superadmin_email: Option<String>,
    #[serde(skip_serializing)]
    pub superadmin_password: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set outside development")]
    MissingJwtSecret,

    #[error("DATABASE_URL is required for the postgres store")]
    MissingDatabaseUrl,

    #[error("Invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

impl SecurityConfig {
    /// Bearer token lifetime, at most one year
    pub fn token_ttl(&self) -> Result<Duration, ConfigError> {
        bounded(
            "SECURITY_JWT_EXPIRY_HOURS",
            self.jwt_expiry_hours,
            MAX_JWT_EXPIRY_HOURS,
            Duration::try_hours,
        )
    }

    /// Session lifetime, at most ten years
    pub fn session_max_age(&self) -> Result<Duration, ConfigError> {
        bounded(
            "SECURITY_SESSION_MAX_AGE_DAYS",
            self.session_max_age_days,
            MAX_SESSION_MAX_AGE_DAYS,
            Duration::try_days,
        )
    }
}

fn bounded(
    setting: &'static str,
    value: u64,
    max: u64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::Invalid(setting, format!("must be between 1 and {}", max)));
    }
    i64::try_from(value)
        .ok()
        .and_then(unit)
        .ok_or_else(|| ConfigError::Invalid(setting, "out of range".to_string()))
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("SMS_API_HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("SMS_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.server.max_request_size_bytes =
                v.parse().unwrap_or(self.server.max_request_size_bytes);
        }

        // Database overrides
        match env::var("SMS_STORE").as_deref() {
            Ok("memory") => self.database.backend = StoreBackend::Memory,
            Ok("postgres") => self.database.backend = StoreBackend::Postgres,
            _ => {}
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout =
                v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_SESSION_MAX_AGE_DAYS") {
            self.security.session_max_age_days =
                v.parse().unwrap_or(self.security.session_max_age_days);
        }
        if let Ok(v) = env::var("SECURITY_SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Bootstrap superadmin
        if let Ok(v) = env::var("SMS_BOOTSTRAP_NAME") {
            self.bootstrap.superadmin_name = v;
        }
        if let Ok(v) = env::var("SMS_BOOTSTRAP_EMAIL") {
            self.bootstrap.superadmin_email = Some(v);
        }
        if let Ok(v) = env::var("SMS_BOOTSTRAP_PASSWORD") {
            self.bootstrap.superadmin_password = Some(v);
        }

        self
    }

    /// Rejects settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty()
            || (self.environment != Environment::Development
                && self.security.jwt_secret == DEVELOPMENT_JWT_SECRET)
        {
            return Err(ConfigError::MissingJwtSecret);
        }

        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        self.security.token_ttl()?;
        self.security.session_max_age()?;

        Ok(())
    }

    /// Address the HTTP listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            security: SecurityConfig {
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                jwt_expiry_hours: 24,
                session_max_age_days: 30,
                secure_cookies: false,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                password_min_length: 6,
            },
            bootstrap: BootstrapConfig {
                superadmin_name: "Superadmin".to_string(),
                ..Default::default()
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_request_size_bytes: 512 * 1024,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                session_max_age_days: 30,
                secure_cookies: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                password_min_length: 6,
            },
            bootstrap: BootstrapConfig {
                superadmin_name: "Superadmin".to_string(),
                ..Default::default()
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_request_size_bytes: 256 * 1024,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                session_max_age_days: 30,
                secure_cookies: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                password_min_length: 6,
            },
            bootstrap: BootstrapConfig {
                superadmin_name: "Superadmin".to_string(),
                ..Default::default()
            },
        }
    }

    /// In-memory configuration used by tests and local experiments
    pub fn for_memory(jwt_secret: impl Into<String>) -> Self {
        let mut config = Self::development();
        config.database.backend = StoreBackend::Memory;
        config.security.jwt_secret = jwt_secret.into();
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.security.jwt_expiry_hours, 24);
        assert_eq!(config.security.session_max_age_days, 30);
        assert!(!config.security.secure_cookies);
        assert!(config.database.run_migrations);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.secure_cookies);
        assert!(config.security.jwt_secret.is_empty());
        assert!(!config.database.run_migrations);
    }

    #[test]
    fn production_requires_secret() {
        let mut config = AppConfig::production();
        config.database.url = Some("postgres://localhost/sms".to_string());
        assert_eq!(config.validate(), Err(ConfigError::MissingJwtSecret));

        config.security.jwt_secret = DEVELOPMENT_JWT_SECRET.to_string();
        assert_eq!(config.validate(), Err(ConfigError::MissingJwtSecret));

        config.security.jwt_secret = "a-real-secret".to_string();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn postgres_backend_requires_url() {
        let config = AppConfig::development();
        assert_eq!(config.validate(), Err(ConfigError::MissingDatabaseUrl));

        let memory = AppConfig::for_memory("secret");
        assert_eq!(memory.validate(), Ok(()));
    }

    #[test]
    fn lifetimes_are_bounded() {
        let mut config = AppConfig::for_memory("secret");
        assert_eq!(config.security.token_ttl(), Ok(Duration::hours(24)));
        assert_eq!(config.security.session_max_age(), Ok(Duration::days(30)));

        config.security.jwt_expiry_hours = u64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid("SECURITY_JWT_EXPIRY_HOURS", _))
        ));

        config.security.jwt_expiry_hours = 0;
        assert!(config.security.token_ttl().is_err());

        config.security.jwt_expiry_hours = MAX_JWT_EXPIRY_HOURS;
        config.security.session_max_age_days = MAX_SESSION_MAX_AGE_DAYS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid("SECURITY_SESSION_MAX_AGE_DAYS", _))
        ));
    }

    #[test]
    fn bind_addr_uses_host_and_port() {
        let mut config = AppConfig::for_memory("secret");
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 8080;
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }
}
