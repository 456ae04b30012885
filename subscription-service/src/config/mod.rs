use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

/// subscription-service configuration.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage_backend: StorageBackend,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Bearer-token verification settings. Tokens are issued elsewhere.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    pub jwt_issuer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

impl SubscriptionConfig {
    /// Load from the process environment (and `.env`).
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `ENVIRONMENT=prod` makes every
    /// setting mandatory.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_prod = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()) == "prod";
        let get = |key: &str, default: Option<&str>| get_env(&lookup, key, default, is_prod);

        let storage_backend = get("STORAGE_BACKEND", Some("postgres"))?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        // Only the postgres backend needs a connection string.
        let database_url = match storage_backend {
            StorageBackend::Postgres => get("DATABASE_URL", None)?,
            StorageBackend::Memory => lookup("DATABASE_URL").unwrap_or_default(),
        };

        Ok(SubscriptionConfig {
            common,
            service_name: get("SERVICE_NAME", Some("subscription-service"))?,
            log_level: get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|v| !v.is_empty()),
            storage_backend,
            database: DatabaseConfig {
                url: Secret::new(database_url),
                max_connections: parse_number(
                    "DATABASE_MAX_CONNECTIONS",
                    get("DATABASE_MAX_CONNECTIONS", Some("10"))?,
                )?,
                min_connections: parse_number(
                    "DATABASE_MIN_CONNECTIONS",
                    get("DATABASE_MIN_CONNECTIONS", Some("1"))?,
                )?,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(get("JWT_SECRET", None)?),
                jwt_issuer: get("JWT_ISSUER", Some("subscription-service"))?,
            },
        })
    }
}

fn parse_number(key: &str, value: String) -> Result<u32, AppError> {
    value.parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} must be a number: {}", key, e))
    })
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<SubscriptionConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SubscriptionConfig::from_lookup(core_config::Config::default(), |key| {
            vars.get(key).cloned()
        })
    }

    #[test]
    fn dev_defaults_apply() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/subscriptions"),
            ("JWT_SECRET", "secret"),
        ])
        .unwrap();

        assert_eq!(config.service_name, "subscription-service");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.otlp_endpoint, None);
        assert_eq!(config.storage_backend, StorageBackend::Postgres);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(config.auth.jwt_issuer, "subscription-service");
        assert_eq!(config.auth.jwt_secret.expose_secret(), "secret");
    }

    #[test]
    fn memory_backend_needs_no_database_url() {
        let config = load(&[("STORAGE_BACKEND", "Memory"), ("JWT_SECRET", "s")]).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        assert!(matches!(
            load(&[("JWT_SECRET", "s")]),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn jwt_secret_is_always_required() {
        assert!(matches!(
            load(&[("DATABASE_URL", "postgres://x")]),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn prod_rejects_missing_settings_even_with_defaults() {
        let err = load(&[
            ("ENVIRONMENT", "prod"),
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("required in production"));
    }

    #[test]
    fn rejects_unknown_backend_and_bad_numbers() {
        assert!(load(&[("STORAGE_BACKEND", "redis"), ("JWT_SECRET", "s")]).is_err());
        assert!(load(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
        ])
        .is_err());
    }
}
