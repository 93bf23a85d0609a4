/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: Bind address (default: 0.0.0.0:5000)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `IDENTITY_JWT_SECRET`: ID token verification key, at least 32 characters (required)
/// - `IDENTITY_ISSUER` / `IDENTITY_AUDIENCE`: Expected token claims
///   (default: parcelhub / parcelhub-client)
/// - `PAYMENT_GATEWAY_KEY`: Stripe secret key (required)
/// - `PAYMENT_GATEWAY_URL`: Stripe base URL (default: https://api.stripe.com)
/// - `PAYMENT_CURRENCY`: Charge currency (default: usd)
/// - `COLLABORATOR_TIMEOUT_MS`: Bound on verifier, gateway and store calls (default: 5000, must be > 0)
/// - `READ_RETRY_ATTEMPTS`: Retries for idempotent reads (default: 3)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use parcelhub_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use parcelhub_shared::db::pool::DatabaseConfig as PoolConfig;
use parcelhub_shared::db::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// ID token verification
    pub identity: IdentityConfig,

    /// Payment gateway
    pub gateway: GatewayConfig,

    /// Timeouts and retries for outbound calls
    pub resilience: ResilienceConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// ID token verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Shared HS256 key
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    pub jwt_secret: String,

    /// Expected `iss` claim
    pub issuer: String,

    /// Expected `aud` claim
    pub audience: String,
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Stripe secret key
    pub secret_key: String,

    /// Base URL of the Stripe API
    pub base_url: String,

    /// ISO currency code for charges
    pub currency: String,
}

/// Timeouts and retries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Upper bound on each verifier, gateway or store call
    pub collaborator_timeout_ms: u64,

    /// Retries after the first attempt for idempotent reads
    pub read_retry_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// A `.env` file is read first if present.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| var(key).ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key));
        let or_default = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = required("IDENTITY_JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("IDENTITY_JWT_SECRET must be at least 32 characters long");
        }

        // A zero timeout would fail every collaborator call immediately
        let collaborator_timeout_ms = parse_var(&var, "COLLABORATOR_TIMEOUT_MS", 5000)?;
        if collaborator_timeout_ms == 0 {
            anyhow::bail!("COLLABORATOR_TIMEOUT_MS must be greater than zero");
        }

        let cors_origins = or_default("CORS_ORIGINS", "*")
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            api: ApiConfig {
                host: or_default("API_HOST", "0.0.0.0"),
                port: parse_var(&var, "API_PORT", 5000)?,
                cors_origins,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parse_var(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            identity: IdentityConfig {
                jwt_secret,
                issuer: or_default("IDENTITY_ISSUER", "parcelhub"),
                audience: or_default("IDENTITY_AUDIENCE", "parcelhub-client"),
            },
            gateway: GatewayConfig {
                secret_key: required("PAYMENT_GATEWAY_KEY")?,
                base_url: or_default("PAYMENT_GATEWAY_URL", "https://api.stripe.com"),
                currency: or_default("PAYMENT_CURRENCY", "usd"),
            },
            resilience: ResilienceConfig {
                collaborator_timeout_ms,
                read_retry_attempts: parse_var(&var, "READ_RETRY_ATTEMPTS", 3)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.resilience.collaborator_timeout_ms)
    }

    /// Retry schedule for listing and search reads
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.resilience.read_retry_attempts,
            attempt_timeout: self.collaborator_timeout(),
            ..Default::default()
        }
    }

    /// Pool settings; checkouts wait no longer than any other store call
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            acquire_timeout: self.collaborator_timeout(),
            ..Default::default()
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_var<F, T>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgresql://localhost/parcelhub_test"),
        ("IDENTITY_JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
        ("PAYMENT_GATEWAY_KEY", "sk_test_123"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&REQUIRED)).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert!(config.allows_any_origin());
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.identity.issuer, "parcelhub");
        assert_eq!(config.identity.audience, "parcelhub-client");
        assert_eq!(config.gateway.base_url, "https://api.stripe.com");
        assert_eq!(config.gateway.currency, "usd");
        assert_eq!(config.collaborator_timeout(), Duration::from_millis(5000));
        assert_eq!(config.retry_policy().max_retries, 3);
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "8080"),
            ("CORS_ORIGINS", "https://app.parcelhub.dev, https://admin.parcelhub.dev"),
            ("COLLABORATOR_TIMEOUT_MS", "250"),
            ("READ_RETRY_ATTEMPTS", "0"),
        ]);

        let config = Config::from_vars(vars(&pairs)).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(
            config.api.cors_origins,
            vec!["https://app.parcelhub.dev", "https://admin.parcelhub.dev"]
        );
        assert!(!config.allows_any_origin());

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.attempt_timeout, Duration::from_millis(250));
        assert_eq!(config.pool_config().acquire_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_required_variable() {
        let err = Config::from_vars(vars(&REQUIRED[1..])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let pairs = [
            ("DATABASE_URL", "postgresql://localhost/parcelhub_test"),
            ("IDENTITY_JWT_SECRET", "too-short"),
            ("PAYMENT_GATEWAY_KEY", "sk_test_123"),
        ];
        assert!(Config::from_vars(vars(&pairs)).is_err());
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("API_PORT", "eighty"));

        let err = Config::from_vars(vars(&pairs)).unwrap_err();
        assert!(err.to_string().contains("API_PORT"));
    }

    #[test]
    fn test_zero_collaborator_timeout_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("COLLABORATOR_TIMEOUT_MS", "0"));

        let err = Config::from_vars(vars(&pairs)).unwrap_err();
        assert!(err.to_string().contains("COLLABORATOR_TIMEOUT_MS"));

        pairs.pop();
        pairs.push(("COLLABORATOR_TIMEOUT_MS", "1"));
        let config = Config::from_vars(vars(&pairs)).unwrap();
        assert_eq!(config.collaborator_timeout().as_millis(), 1);
    }
}
