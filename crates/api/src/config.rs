//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `NOVATECH_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `NOVATECH_TOKEN_SECRET` - Session token signing secret (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//!
//! ## Optional
//! - `NOVATECH_HOST` - Bind address (default: 127.0.0.1)
//! - `NOVATECH_PORT` - Listen port (default: 5000)
//! - `NOVATECH_FRONTEND_URL` - Frontend origin used in email links (default: <http://localhost:3000>)
//! - `NOVATECH_ALLOWED_ORIGINS` - Comma-separated CORS origins
//!   (default: `http://localhost:3000,http://127.0.0.1:3000`)
//! - `NOVATECH_SECURE_COOKIES` - Mark the session cookie `Secure` (default: true if the
//!   frontend URL is https)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_CURRENCY` - ISO currency code for charges (default: eur)
//! - `SMTP_HOST`, `SMTP_PORT` (default 587), `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   SMTP relay. Set all of them or none; without SMTP, emails are logged.
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error sample rate 0.0-1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate 0.0-1.0 (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public URL of the frontend, used to build links in emails
    pub frontend_url: String,
    /// Origins allowed to make credentialed CORS requests
    pub allowed_origins: Vec<String>,
    /// Session token signing secret
    pub token_secret: SecretString,
    /// Whether the session cookie carries the `Secure` attribute
    pub secure_cookies: bool,
    /// Stripe configuration
    pub stripe: StripeConfig,
    /// SMTP configuration, if outgoing mail is enabled
    pub smtp: Option<SmtpConfig>,
    /// Sentry error tracking configuration
    pub sentry: SentryConfig,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_live_...` / `sk_test_...`)
    pub secret_key: SecretString,
    /// API base URL, overridable for stripe-mock
    pub api_base: String,
    /// Lowercase ISO currency code
    pub currency: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .finish()
    }
}

/// SMTP relay configuration.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Sentry configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: Option<f32>,
    pub traces_sample_rate: Option<f32>,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("NOVATECH_DATABASE_URL")?;
        let host = get_env_or_default("NOVATECH_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("NOVATECH_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("NOVATECH_PORT", "5000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("NOVATECH_PORT".to_string(), e.to_string()))?;

        let frontend_url = get_env_or_default("NOVATECH_FRONTEND_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&frontend_url).map_err(|e| {
            ConfigError::InvalidEnvVar("NOVATECH_FRONTEND_URL".to_string(), e.to_string())
        })?;

        let allowed_origins = parse_origins(&get_env_or_default(
            "NOVATECH_ALLOWED_ORIGINS",
            "http://localhost:3000,http://127.0.0.1:3000",
        ));

        let secure_cookies = match get_optional_env("NOVATECH_SECURE_COOKIES") {
            Some(value) => parse_bool("NOVATECH_SECURE_COOKIES", &value)?,
            None => frontend_url.starts_with("https://"),
        };

        let token_secret = get_validated_secret("NOVATECH_TOKEN_SECRET")?;
        validate_token_secret(&token_secret, "NOVATECH_TOKEN_SECRET")?;

        let stripe = StripeConfig::from_env()?;
        let smtp = SmtpConfig::from_env()?;
        let sentry = SentryConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            frontend_url,
            allowed_origins,
            token_secret,
            secure_cookies,
            stripe,
            smtp,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Link the password reset email points at.
    #[must_use]
    pub fn reset_password_url(&self, token: &str) -> String {
        format!("{}/reset-password/{token}", self.frontend_url)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            api_base: get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com")
                .trim_end_matches('/')
                .to_string(),
            currency: get_env_or_default("STRIPE_CURRENCY", "eur").to_lowercase(),
        })
    }
}

impl SmtpConfig {
    /// SMTP is all-or-nothing: either every variable is set or none is.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let host = get_optional_env("SMTP_HOST");
        let username = get_optional_env("SMTP_USERNAME");
        let password = get_optional_env("SMTP_PASSWORD");
        let from_address = get_optional_env("EMAIL_FROM");

        match (host, username, password, from_address) {
            (None, None, None, None) => Ok(None),
            (Some(host), Some(username), Some(password), Some(from_address)) => {
                let port = get_env_or_default("SMTP_PORT", "587")
                    .parse::<u16>()
                    .map_err(|e| {
                        ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string())
                    })?;
                Ok(Some(Self {
                    host,
                    port,
                    username,
                    password: SecretString::from(password),
                    from_address,
                }))
            }
            (host, username, password, from_address) => {
                let missing = [
                    ("SMTP_HOST", host.is_none()),
                    ("SMTP_USERNAME", username.is_none()),
                    ("SMTP_PASSWORD", password.is_none()),
                    ("EMAIL_FROM", from_address.is_none()),
                ]
                .into_iter()
                .find_map(|(key, missing)| missing.then_some(key))
                .unwrap_or("SMTP_HOST");
                Err(ConfigError::MissingEnvVar(missing.to_string()))
            }
        }
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: get_optional_rate("SENTRY_SAMPLE_RATE")?,
            traces_sample_rate: get_optional_rate("SENTRY_TRACES_SAMPLE_RATE")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn get_optional_rate(key: &str) -> Result<Option<f32>, ConfigError> {
    get_optional_env(key)
        .map(|value| {
            value
                .parse::<f32>()
                .ok()
                .filter(|rate| (0.0..=1.0).contains(rate))
                .ok_or_else(|| {
                    ConfigError::InvalidEnvVar(
                        key.to_string(),
                        format!("expected a number between 0.0 and 1.0, got '{value}'"),
                    )
                })
        })
        .transpose()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

/// Validate that the token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Configuration with fixed, valid values for unit tests.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://localhost/novatech_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 5000,
        frontend_url: "http://localhost:3000".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        token_secret: SecretString::from("k3Y!9xQ@vB7#mZ2$wL5%rT8^pN4&cH6*"),
        secure_cookies: false,
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            api_base: "https://api.stripe.com".to_string(),
            currency: "eur".to_string(),
        },
        smtp: None,
        sentry: SentryConfig::default(),
    }
}
