use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use std::{fmt, time::Duration};
use tracing::{debug, info};
use trade_core::{Result, TradeError};

pub const LIVE_BASE_URL: &str = "https://api.binance.com";
pub const TEST_BASE_URL: &str = "https://testnet.binance.vision";

/// Which Binance deployment the process talks to.
///
/// `BINANCE_ENV=LIVE` selects the live exchange; any other value, or none,
/// selects the spot testnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinanceEnv {
    Live,
    Test,
}

impl BinanceEnv {
    pub fn from_value(value: &str) -> Self {
        if value == "LIVE" {
            BinanceEnv::Live
        } else {
            BinanceEnv::Test
        }
    }

    fn key_prefix(&self) -> &'static str {
        match self {
            BinanceEnv::Live => "live",
            BinanceEnv::Test => "test",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            BinanceEnv::Live => LIVE_BASE_URL,
            BinanceEnv::Test => TEST_BASE_URL,
        }
    }
}

/// API key pair. The secret is only ever used to sign requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub env: BinanceEnv,
    pub base_url: String,
    pub credentials: Option<Credentials>,
}

impl BinanceConfig {
    pub fn credentials(&self) -> Result<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            TradeError::Configuration(format!(
                "{prefix}_BINANCE_API_KEY and {prefix}_BINANCE_SECRET_KEY are not set",
                prefix = self.env.key_prefix().to_uppercase()
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl DatabaseConfig {
    pub fn url(&self) -> Result<&str> {
        self.url.as_deref().ok_or_else(|| {
            TradeError::Configuration(
                "DATABASE_URL is not set. Please configure it in your .env file".to_string(),
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Process configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub binance: BinanceConfig,
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Load from `.env` (if present), an optional `config` file and the
    /// process environment, in increasing order of precedence.
    pub fn load() -> Result<Self> {
        match dotenv::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) => debug!("No .env file loaded: {}", e),
        }

        let source = with_defaults(Config::builder())?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::default().ignore_empty(true))
            .build()
            .map_err(configuration)?;

        Self::from_source(&source)
    }

    /// Resolve an [`AppConfig`] from an already-built source. Keys are the
    /// lower-cased environment variable names.
    pub fn from_source(source: &Config) -> Result<Self> {
        let env = BinanceEnv::from_value(&source.get_string("binance_env").map_err(configuration)?);
        let prefix = env.key_prefix();

        let base_url = optional_string(source, &format!("{prefix}_binance_base_url"))?
            .unwrap_or_else(|| env.default_base_url().to_string());

        let api_key = optional_string(source, &format!("{prefix}_binance_api_key"))?;
        let secret_key = optional_string(source, &format!("{prefix}_binance_secret_key"))?;
        let credentials = match (api_key, secret_key) {
            (Some(api_key), Some(secret_key)) => Some(Credentials::new(api_key, secret_key)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(TradeError::Configuration(format!(
                    "{}_BINANCE_SECRET_KEY is not set",
                    prefix.to_uppercase()
                )))
            }
            (None, Some(_)) => {
                return Err(TradeError::Configuration(format!(
                    "{}_BINANCE_API_KEY is not set",
                    prefix.to_uppercase()
                )))
            }
        };

        let database = DatabaseConfig {
            url: optional_string(source, "database_url")?,
            max_connections: source
                .get::<u32>("database_max_connections")
                .map_err(configuration)?,
            min_connections: source
                .get::<u32>("database_min_connections")
                .map_err(configuration)?,
        };

        let retry = RetryConfig {
            max_attempts: source.get::<u32>("retry_max_attempts").map_err(configuration)?,
            delay: Duration::from_millis(source.get::<u64>("retry_delay_ms").map_err(configuration)?),
        };

        info!(
            env = ?env,
            base_url = %base_url,
            signed = credentials.is_some(),
            "Configuration loaded"
        );

        Ok(Self {
            binance: BinanceConfig {
                env,
                base_url,
                credentials,
            },
            database,
            retry,
        })
    }
}

/// Built-in defaults, the lowest-precedence layer.
fn with_defaults(builder: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>> {
    builder
        .set_default("binance_env", "TEST")
        .and_then(|b| b.set_default("database_max_connections", 5_i64))
        .and_then(|b| b.set_default("database_min_connections", 1_i64))
        .and_then(|b| b.set_default("retry_max_attempts", 3_i64))
        .and_then(|b| b.set_default("retry_delay_ms", 1000_i64))
        .map_err(configuration)
}

fn optional_string(source: &Config, key: &str) -> Result<Option<String>> {
    match source.get_string(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(configuration(e)),
    }
}

fn configuration(e: ConfigError) -> TradeError {
    TradeError::Configuration(e.to_string())
}
