//! Configuration module for the trade reconciler.
//!
//! Provides configuration loading, validation, and environment variable
//! interpolation for every component.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trade_reconciler::config::load_config;
//!
//! // Load from $RECONCILER_CONFIG, else config.yaml, else the embedded template
//! let config = load_config(None)?;
//!
//! println!("db: {}", config.persistence.db_path);
//! ```

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::services::PollingConfig;
use crate::application::use_cases::{PartialFillPolicy, ReconcileConfig};
use crate::domain::risk_management::RiskPolicy;
use crate::infrastructure::broker::alpaca::{AlpacaConfig, AlpacaEnvironment, RetryConfig};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "RECONCILER_CONFIG";

/// Template used when no config file exists.
pub const DEFAULT_CONFIG: &str = include_str!("../config.default.yaml");

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),

    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Broker selection and credentials.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Order lifecycle engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Pre-trade risk limits.
    #[serde(default)]
    pub risk: RiskConfig,
    /// Polling cadence and connectivity backoff.
    #[serde(default)]
    pub polling: PollingSettings,
    /// Storage settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Entry signal inbox.
    #[serde(default)]
    pub signals: SignalsConfig,
    /// Operator alert delivery.
    #[serde(default)]
    pub alerts: AlertsConfig,
}

// ============================================
// Broker
// ============================================

/// Which `BrokerPort` implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// Alpaca trading API.
    #[default]
    Alpaca,
    /// JSON tickets for an operator.
    Manual,
}

/// Broker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Selected broker.
    #[serde(default)]
    pub kind: BrokerKind,
    /// Alpaca settings.
    #[serde(default)]
    pub alpaca: AlpacaSettings,
    /// Manual broker settings.
    #[serde(default)]
    pub manual: ManualBrokerSettings,
}

/// Alpaca settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaSettings {
    /// `paper` or `live`.
    #[serde(default = "default_alpaca_environment")]
    pub environment: String,
    /// API key.
    #[serde(default)]
    pub api_key: String,
    /// API secret.
    #[serde(default)]
    pub api_secret: String,
    /// Trading API override; empty uses the environment's URL.
    #[serde(default)]
    pub base_url: String,
    /// HTTP timeout per request.
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,
    /// Attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for AlpacaSettings {
    fn default() -> Self {
        Self {
            environment: default_alpaca_environment(),
            api_key: String::new(),
            api_secret: String::new(),
            base_url: String::new(),
            api_timeout_secs: default_api_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_alpaca_environment() -> String {
    "paper".to_string()
}
const fn default_api_timeout_secs() -> u64 {
    10
}
const fn default_max_attempts() -> u32 {
    3
}

/// Manual broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualBrokerSettings {
    /// Directory the tickets are written to.
    #[serde(default = "default_tickets_dir")]
    pub tickets_dir: String,
    /// Notional equity reported to the risk gate.
    #[serde(default = "default_manual_equity")]
    pub equity: Decimal,
}

impl Default for ManualBrokerSettings {
    fn default() -> Self {
        Self {
            tickets_dir: default_tickets_dir(),
            equity: default_manual_equity(),
        }
    }
}

fn default_tickets_dir() -> String {
    "logs/trade_tickets".to_string()
}
fn default_manual_equity() -> Decimal {
    dec!(10000)
}

// ============================================
// Engine
// ============================================

/// Order lifecycle engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Prefix of every client order id.
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    /// Seconds an entry may stay unfilled.
    #[serde(default = "default_entry_timeout_secs")]
    pub entry_timeout_secs: u64,
    /// Consecutive arm failures before a group is failed.
    #[serde(default = "default_max_arm_failures")]
    pub max_arm_failures: u32,
    /// What to do with an entry partially filled at timeout.
    #[serde(default)]
    pub partial_fill_policy: PartialFillPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client_id_prefix: default_client_id_prefix(),
            entry_timeout_secs: default_entry_timeout_secs(),
            max_arm_failures: default_max_arm_failures(),
            partial_fill_policy: PartialFillPolicy::default(),
        }
    }
}

fn default_client_id_prefix() -> String {
    "SCFD".to_string()
}
const fn default_entry_timeout_secs() -> u64 {
    300
}
const fn default_max_arm_failures() -> u32 {
    3
}

// ============================================
// Risk
// ============================================

/// Pre-trade risk limits. Fractions are of account equity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Equity risked between entry and stop on one trade.
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: Decimal,
    /// Maximum notional of one position.
    #[serde(default = "default_max_position_fraction")]
    pub max_position_fraction: Decimal,
    /// Maximum entry-to-stop risk across open groups.
    #[serde(default = "default_max_portfolio_risk_fraction")]
    pub max_portfolio_risk_fraction: Decimal,
    /// Maximum notional across open groups.
    #[serde(default = "default_max_total_exposure_fraction")]
    pub max_total_exposure_fraction: Decimal,
    /// Circuit breaker multiple of ATR; zero disables it.
    #[serde(default = "default_volatility_multiplier")]
    pub volatility_multiplier: Decimal,
    /// Bars in the trailing true range average.
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// Daily loss that halts new entries.
    #[serde(default = "default_max_daily_drawdown")]
    pub max_daily_drawdown: Decimal,
    /// Decimal places quantities are truncated to.
    #[serde(default = "default_quantity_decimals")]
    pub quantity_decimals: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: default_risk_per_trade(),
            max_position_fraction: default_max_position_fraction(),
            max_portfolio_risk_fraction: default_max_portfolio_risk_fraction(),
            max_total_exposure_fraction: default_max_total_exposure_fraction(),
            volatility_multiplier: default_volatility_multiplier(),
            atr_period: default_atr_period(),
            max_daily_drawdown: default_max_daily_drawdown(),
            quantity_decimals: default_quantity_decimals(),
        }
    }
}

fn default_risk_per_trade() -> Decimal {
    dec!(0.01)
}
fn default_max_position_fraction() -> Decimal {
    dec!(0.25)
}
fn default_max_portfolio_risk_fraction() -> Decimal {
    dec!(0.05)
}
fn default_max_total_exposure_fraction() -> Decimal {
    dec!(0.50)
}
fn default_volatility_multiplier() -> Decimal {
    dec!(3.0)
}
const fn default_atr_period() -> usize {
    14
}
fn default_max_daily_drawdown() -> Decimal {
    dec!(0.05)
}
const fn default_quantity_decimals() -> u32 {
    6
}

// ============================================
// Polling
// ============================================

/// Polling cadence and connectivity backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Seconds between healthy cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// First delay after a failed connectivity check.
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,
    /// Cap on the connectivity backoff.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Spread backoff delays by up to ±10%.
    #[serde(default = "default_true")]
    pub jitter: bool,
    /// Heartbeats older than this make the service unhealthy.
    #[serde(default = "default_heartbeat_max_age_secs")]
    pub heartbeat_max_age_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            jitter: true,
            heartbeat_max_age_secs: default_heartbeat_max_age_secs(),
        }
    }
}

const fn default_interval_secs() -> u64 {
    30
}
const fn default_initial_backoff_secs() -> u64 {
    2
}
const fn default_max_backoff_secs() -> u64 {
    60
}
const fn default_true() -> bool {
    true
}
const fn default_heartbeat_max_age_secs() -> u64 {
    120
}

// ============================================
// Persistence, logging, signals
// ============================================

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database file holding trade groups and heartbeats.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "app.db".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human oriented.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Entry signal inbox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalsConfig {
    /// Directory of `*.json` signals; empty disables the inbox.
    #[serde(default)]
    pub inbox: String,
}

/// Operator alert delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Webhook receiving alerts as JSON; empty keeps alerts in the log.
    #[serde(default)]
    pub webhook_url: String,
    /// Webhook request timeout in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

const fn default_webhook_timeout_secs() -> u64 {
    10
}

// ============================================
// Conversions
// ============================================

impl Config {
    /// Alpaca adapter configuration.
    pub fn alpaca_config(&self) -> Result<AlpacaConfig, ConfigError> {
        let alpaca = &self.broker.alpaca;
        let environment = alpaca
            .environment
            .parse::<AlpacaEnvironment>()
            .map_err(ConfigError::ValidationError)?;
        let mut config = AlpacaConfig::new(
            alpaca.api_key.clone(),
            alpaca.api_secret.clone(),
            environment,
        )
        .with_timeout(Duration::from_secs(alpaca.api_timeout_secs))
        .with_retry(RetryConfig {
            max_attempts: alpaca.max_attempts,
            ..RetryConfig::default()
        });
        if !alpaca.base_url.trim().is_empty() {
            config = config.with_base_url(alpaca.base_url.trim());
        }
        Ok(config)
    }

    /// Engine settings.
    #[must_use]
    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            entry_timeout: chrono::Duration::seconds(
                i64::try_from(self.engine.entry_timeout_secs).unwrap_or(i64::MAX),
            ),
            max_arm_failures: self.engine.max_arm_failures,
            partial_fill_policy: self.engine.partial_fill_policy,
        }
    }

    /// Risk gate policy.
    #[must_use]
    pub fn risk_policy(&self) -> RiskPolicy {
        let risk = &self.risk;
        RiskPolicy {
            risk_per_trade: risk.risk_per_trade,
            max_position_fraction: risk.max_position_fraction,
            max_total_exposure_fraction: risk.max_total_exposure_fraction,
            max_portfolio_risk_fraction: risk.max_portfolio_risk_fraction,
            volatility_multiplier: risk.volatility_multiplier,
            atr_period: risk.atr_period,
            max_daily_drawdown: risk.max_daily_drawdown,
            quantity_decimals: risk.quantity_decimals,
        }
    }

    /// Polling driver settings.
    #[must_use]
    pub const fn polling_config(&self) -> PollingConfig {
        PollingConfig {
            interval: Duration::from_secs(self.polling.interval_secs),
            initial_backoff: Duration::from_secs(self.polling.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.polling.max_backoff_secs),
            jitter: self.polling.jitter,
        }
    }

    /// Maximum heartbeat age for a healthy verdict.
    #[must_use]
    pub fn heartbeat_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(
            i64::try_from(self.polling.heartbeat_max_age_secs).unwrap_or(i64::MAX),
        )
    }

    /// Signal inbox directory, if one is configured.
    #[must_use]
    pub fn signal_inbox(&self) -> Option<&Path> {
        let inbox = self.signals.inbox.trim();
        (!inbox.is_empty()).then(|| Path::new(inbox))
    }

    /// Alert webhook URL, if one is configured.
    #[must_use]
    pub fn alert_webhook(&self) -> Option<&str> {
        let url = self.alerts.webhook_url.trim();
        (!url.is_empty()).then_some(url)
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration with environment variable interpolation.
///
/// The path is `path`, else `$RECONCILER_CONFIG`, else `config.yaml`. When
/// that file does not exist the embedded template is used.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(
        || std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.yaml".to_string()),
        str::to_string,
    );

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path, "Config file not found, using embedded defaults");
            DEFAULT_CONFIG.to_string()
        }
        Err(e) => return Err(ConfigError::ReadError { path, source: e }),
    };

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Broker
    config
        .broker
        .alpaca
        .environment
        .parse::<AlpacaEnvironment>()
        .map_err(ConfigError::ValidationError)?;
    if config.broker.alpaca.api_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "broker.alpaca.api_timeout_secs must be positive".to_string(),
        ));
    }
    if config.broker.alpaca.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "broker.alpaca.max_attempts must be at least 1".to_string(),
        ));
    }
    if config.broker.kind == BrokerKind::Manual && config.broker.manual.equity <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "broker.manual.equity must be positive".to_string(),
        ));
    }

    // Engine
    let prefix = &config.engine.client_id_prefix;
    if prefix.is_empty()
        || prefix.len() > 16
        || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ConfigError::ValidationError(format!(
            "engine.client_id_prefix must be 1-16 alphanumeric characters, got '{prefix}'"
        )));
    }
    if config.engine.entry_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "engine.entry_timeout_secs must be positive".to_string(),
        ));
    }
    if config.engine.max_arm_failures == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_arm_failures must be at least 1".to_string(),
        ));
    }

    // Risk
    config
        .risk_policy()
        .validate()
        .map_err(|e| ConfigError::ValidationError(format!("risk: {e}")))?;

    // Polling
    let polling = &config.polling;
    if polling.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "polling.interval_secs must be positive".to_string(),
        ));
    }
    if polling.initial_backoff_secs == 0 || polling.initial_backoff_secs > polling.max_backoff_secs
    {
        return Err(ConfigError::ValidationError(
            "polling.initial_backoff_secs must be positive and not above max_backoff_secs"
                .to_string(),
        ));
    }

    if config.persistence.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "persistence.db_path must not be empty".to_string(),
        ));
    }

    if let Some(url) = config.alert_webhook() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "alerts.webhook_url must be an http(s) URL, got '{url}'"
            )));
        }
        if config.alerts.webhook_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "alerts.webhook_timeout_secs must be positive".to_string(),
            ));
        }
    }

    Ok(())
}

/// Check that the selected broker has what it needs to start.
///
/// Kept apart from validation so the `health` command runs without secrets.
///
/// # Errors
///
/// Returns `MissingEnvVar` naming the credential that is absent.
pub fn require_credentials(config: &Config) -> Result<(), ConfigError> {
    if config.broker.kind != BrokerKind::Alpaca {
        return Ok(());
    }
    if config.broker.alpaca.api_key.trim().is_empty() {
        return Err(ConfigError::MissingEnvVar("APCA_API_KEY_ID".to_string()));
    }
    if config.broker.alpaca.api_secret.trim().is_empty() {
        return Err(ConfigError::MissingEnvVar("APCA_API_SECRET_KEY".to_string()));
    }
    Ok(())
}
