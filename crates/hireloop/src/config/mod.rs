use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub functions: FunctionsConfig,
    pub email: EmailConfig,
    pub scoring: ScoringConfig,
    pub uploads: UploadConfig,
    pub billing: BillingConfig,
    pub preferences_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let functions = FunctionsConfig {
            base_url: optional_var("AI_FUNCTIONS_URL"),
            api_key: optional_var("AI_FUNCTIONS_KEY"),
            timeout: Duration::from_secs(parse_var("AI_TIMEOUT_SECS", 60u64)?),
        };

        let email = EmailConfig {
            api_url: optional_var("EMAIL_API_URL"),
            api_key: optional_var("EMAIL_API_KEY"),
            from_address: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Hiring Team <hiring@hireloop.dev>".to_string()),
        };

        let scoring = ScoringConfig {
            batch_size: parse_var("SCORING_BATCH_SIZE", ScoringConfig::DEFAULT_BATCH_SIZE)?,
            batch_delay: Duration::from_millis(parse_var("SCORING_BATCH_DELAY_MS", 1_000u64)?),
            rating_scale: parse_var("SCORING_RATING_SCALE", ScoringConfig::DEFAULT_RATING_SCALE)?,
        };
        if scoring.batch_size == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "SCORING_BATCH_SIZE",
            });
        }

        let uploads = UploadConfig {
            max_resume_bytes: parse_var("RESUME_MAX_BYTES", UploadConfig::DEFAULT_MAX_RESUME_BYTES)?,
        };

        let billing = BillingConfig {
            webhook_secret: optional_var("BILLING_WEBHOOK_SECRET"),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            functions,
            email,
            scoring,
            uploads,
            billing,
            preferences_path: optional_var("PREFERENCES_PATH").map(PathBuf::from),
        })
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        None => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the serverless AI functions (scoring, resume parsing, content generation).
#[derive(Debug, Clone)]
pub struct FunctionsConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Transactional e-mail vendor settings.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from_address: String,
}

/// Batch rescoring dials.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub rating_scale: f32,
}

impl ScoringConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 3;
    pub const DEFAULT_RATING_SCALE: f32 = 5.0;
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_secs(1),
            rating_scale: Self::DEFAULT_RATING_SCALE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub max_resume_bytes: usize,
}

impl UploadConfig {
    pub const DEFAULT_MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_resume_bytes: Self::DEFAULT_MAX_RESUME_BYTES,
        }
    }
}

/// Payment vendor webhook settings.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BillingConfig {
    pub webhook_secret: Option<String>,
}

impl fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BillingConfig")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "AI_FUNCTIONS_URL",
            "AI_FUNCTIONS_KEY",
            "AI_TIMEOUT_SECS",
            "EMAIL_API_URL",
            "EMAIL_API_KEY",
            "EMAIL_FROM",
            "SCORING_BATCH_SIZE",
            "SCORING_BATCH_DELAY_MS",
            "SCORING_RATING_SCALE",
            "RESUME_MAX_BYTES",
            "PREFERENCES_PATH",
            "BILLING_WEBHOOK_SECRET",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.functions.base_url.is_none());
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.uploads, UploadConfig::default());
        assert_eq!(config.billing, BillingConfig::default());
        assert!(config.preferences_path.is_none());
    }

    #[test]
    fn reads_the_webhook_secret_without_printing_it() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("BILLING_WEBHOOK_SECRET", "whsec_live");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.billing.webhook_secret.as_deref(), Some("whsec_live"));
        assert!(!format!("{:?}", config.billing).contains("whsec_live"));
        reset_env();
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_scoring_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCORING_BATCH_SIZE", "5");
        env::set_var("SCORING_BATCH_DELAY_MS", "250");
        env::set_var("SCORING_RATING_SCALE", "3");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.scoring.batch_size, 5);
        assert_eq!(config.scoring.batch_delay, Duration::from_millis(250));
        assert_eq!(config.scoring.rating_scale, 3.0);
        reset_env();
    }

    #[test]
    fn rejects_zero_batch_size() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCORING_BATCH_SIZE", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { key }) => assert_eq!(key, "SCORING_BATCH_SIZE"),
            other => panic!("expected invalid number, got {other:?}"),
        }
        reset_env();
    }
}
