//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `BAZAAR_API_URL` - REST API base URL (default: `http://localhost:3000`)
//! - `BAZAAR_DATA_DIR` - Directory of the local store (default: `.bazaar`)
//! - `BAZAAR_CART_DEBOUNCE_MS` - Quantity confirmation window in ms (default: 500)
//! - `BAZAAR_AUTH_TOKEN` - Bearer token to seed the session with
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_DATA_DIR: &str = ".bazaar";
const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Longest accepted debounce window.
const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// REST API base URL
    pub api_url: Url,
    /// Directory holding the file-backed local store
    pub data_dir: PathBuf,
    /// Quiet period before a quantity change is sent to the server
    pub cart_debounce: Duration,
    /// Token to seed the session with (overrides the stored one)
    pub auth_token: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("api_url", &self.api_url.as_str())
            .field("data_dir", &self.data_dir)
            .field("cart_debounce", &self.cart_debounce)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl StorefrontConfig {
    /// Configuration for the API at `api_url` with a local store in
    /// `data_dir`; everything else takes its default.
    #[must_use]
    pub fn new(api_url: Url, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_url,
            data_dir: data_dir.into(),
            cart_debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            auth_token: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(
            "BAZAAR_API_URL",
            &get_env_or_default("BAZAAR_API_URL", DEFAULT_API_URL),
        )?;
        let data_dir = PathBuf::from(get_env_or_default("BAZAAR_DATA_DIR", DEFAULT_DATA_DIR));
        let cart_debounce = parse_debounce(
            "BAZAAR_CART_DEBOUNCE_MS",
            &get_env_or_default("BAZAAR_CART_DEBOUNCE_MS", &DEFAULT_DEBOUNCE_MS.to_string()),
        )?;
        let auth_token = get_optional_env("BAZAAR_AUTH_TOKEN").map(SecretString::from);
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            api_url,
            data_dir,
            cart_debounce,
            auth_token,
            sentry_dsn,
            sentry_environment,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_api_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_debounce(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let millis = value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if millis > MAX_DEBOUNCE_MS {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be at most {MAX_DEBOUNCE_MS} ms (got {millis})"),
        ));
    }
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_parse_api_url() {
        let url = parse_api_url("K", "https://shop.example.com/api-root").unwrap();
        assert_eq!(url.host_str(), Some("shop.example.com"));

        assert!(matches!(
            parse_api_url("K", "not a url"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(parse_api_url("K", "ftp://example.com").is_err());
    }

    #[test]
    fn test_parse_debounce() {
        assert_eq!(
            parse_debounce("K", "250").unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(parse_debounce("K", "0").unwrap(), Duration::ZERO);
        assert!(parse_debounce("K", "-5").is_err());
        assert!(parse_debounce("K", "soon").is_err());
        assert!(parse_debounce("K", "600000").is_err());
    }

    fn local_config() -> StorefrontConfig {
        StorefrontConfig::new(Url::parse("http://localhost:3000").unwrap(), ".bazaar")
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = local_config();
        assert_eq!(config.api_url.as_str(), "http://localhost:3000/");
        assert_eq!(config.data_dir, PathBuf::from(".bazaar"));
        assert_eq!(config.cart_debounce, Duration::from_millis(500));
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let config = StorefrontConfig {
            auth_token: Some(SecretString::from("super_secret_token")),
            sentry_dsn: Some("https://key@sentry.example.com/1".to_string()),
            ..local_config()
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("localhost:3000"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_token"));
        assert!(!debug_output.contains("sentry.example.com"));
        assert_eq!(
            config.auth_token.unwrap().expose_secret(),
            "super_secret_token"
        );
    }
}
