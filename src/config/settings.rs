//! Configuration settings for pricedrop.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `PRICEDROP__POLLER__INTERVAL_MINS=5`.
const ENV_PREFIX: &str = "PRICEDROP";
const ENV_SEPARATOR: &str = "__";

/// Upper bound for minute-valued settings (one year).
const MAX_MINUTES: u64 = 60 * 24 * 365;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API configuration.
    pub api: ApiConfig,
    /// Poll cycle timing.
    pub poller: PollerConfig,
    /// Alert decisions.
    pub alerts: AlertConfig,
    /// Notification surface.
    pub notifications: NotificationConfig,
    /// Product registration.
    pub registration: RegistrationConfig,
    /// Local settings store.
    pub storage: StorageConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file, layered with `PRICEDROP__*` environment variables.
    pub fn load(path: Option<PathBuf>) -> crate::Result<Self> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(
        path: Option<PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> crate::Result<Self> {
        let config_path = path.unwrap_or_else(super::default_config_path);

        let environment = ::config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env);

        ::config::Config::builder()
            .add_source(
                ::config::File::from(config_path)
                    .format(::config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(environment)
            .build()
            .and_then(|layered| layered.try_deserialize())
            .map_err(|e| crate::Error::config(e.to_string()))
    }

    /// Save configuration to file.
    pub fn save(&self, path: Option<PathBuf>) -> crate::Result<PathBuf> {
        let config_path = path.unwrap_or_else(super::default_config_path);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::config(e.to_string()))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }
}

/// Remote API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL used when the settings store has none.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 15,
            connect_timeout_secs: 5,
        }
    }
}

/// Poll cycle timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Minutes between poll cycles; also the delay before the first one.
    pub interval_mins: u64,
    /// Milliseconds to wait between two force-check requests.
    pub request_delay_ms: u64,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_mins.clamp(1, MAX_MINUTES) * 60)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_mins: 60,
            request_delay_ms: 1000,
        }
    }
}

/// What "stop monitoring" does to a tracked product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopAction {
    /// Remove the product from the tracked list.
    #[default]
    Remove,
    /// Keep polling the product but never alert for it.
    Mute,
}

impl std::fmt::Display for StopAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remove => write!(f, "remove"),
            Self::Mute => write!(f, "mute"),
        }
    }
}

/// Alert configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Identical alerts for a product are suppressed for this many minutes (0 disables).
    pub repeat_window_mins: u64,
    /// Behaviour of the "stop monitoring" notification action.
    pub stop_action: StopAction,
    /// Currency symbol used in alert messages.
    pub currency_symbol: String,
}

impl AlertConfig {
    /// Suppression window, `None` when suppression is disabled.
    pub fn repeat_window(&self) -> Option<chrono::Duration> {
        if self.repeat_window_mins == 0 {
            return None;
        }
        i64::try_from(self.repeat_window_mins.min(MAX_MINUTES))
            .ok()
            .map(chrono::Duration::minutes)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            repeat_window_mins: 60,
            stop_action: StopAction::Remove,
            currency_symbol: "R$".to_string(),
        }
    }
}

/// Notification surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Also show desktop notifications (notify-send / osascript).
    pub desktop: bool,
    /// Open the "view" destination in a browser.
    pub open_links: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            desktop: false,
            open_links: true,
        }
    }
}

/// Values sent with every product registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Notification channel requested from the API.
    pub channel: String,
    /// Channel endpoint identifying this client.
    pub endpoint: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            channel: "webpush".to_string(),
            endpoint: "pricedrop-cli".to_string(),
        }
    }
}

/// Local settings store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON settings file (defaults to the data directory).
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the settings file path.
    pub fn settings_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            super::data_dir()
                .map(|p| p.join("settings.json"))
                .unwrap_or_else(|_| PathBuf::from("settings.json"))
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Also write a daily rolling log file to the data directory.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "pricedrop=info".to_string(),
            file: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            Config::load_with_env(Some(dir.path().join("missing.toml")), Some(HashMap::new()))
                .unwrap();

        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.poller.interval(), Duration::from_secs(3600));
        assert_eq!(config.poller.request_delay(), Duration::from_millis(1000));
        assert_eq!(config.alerts.stop_action, StopAction::Remove);
        assert_eq!(config.registration.channel, "webpush");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[poller]\ninterval_mins = 15\n\n[alerts]\nstop_action = \"mute\"\n",
        )
        .unwrap();

        let config = Config::load_with_env(Some(path), Some(HashMap::new())).unwrap();

        assert_eq!(config.poller.interval_mins, 15);
        assert_eq!(config.poller.request_delay_ms, 1000);
        assert_eq!(config.alerts.stop_action, StopAction::Mute);
        assert_eq!(config.api.timeout_secs, 15);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nbase_url = \"http://file:8000\"\n").unwrap();

        let env = HashMap::from([
            (
                "PRICEDROP__API__BASE_URL".to_string(),
                "http://env:9000".to_string(),
            ),
            (
                "PRICEDROP__POLLER__REQUEST_DELAY_MS".to_string(),
                "250".to_string(),
            ),
        ]);
        let config = Config::load_with_env(Some(path), Some(env)).unwrap();

        assert_eq!(config.api.base_url, "http://env:9000");
        assert_eq!(config.poller.request_delay_ms, 250);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.alerts.repeat_window_mins = 0;

        let written = config.save(Some(path.clone())).unwrap();
        assert_eq!(written, path);

        let loaded = Config::load_with_env(Some(path), Some(HashMap::new())).unwrap();
        assert_eq!(loaded.alerts.repeat_window(), None);
    }

    #[test]
    fn test_repeat_window_minutes() {
        let alerts = AlertConfig::default();
        assert_eq!(alerts.repeat_window(), Some(chrono::Duration::minutes(60)));
    }

    #[test]
    fn test_huge_minute_values_are_capped() {
        let poller = PollerConfig {
            interval_mins: u64::MAX,
            ..PollerConfig::default()
        };
        assert_eq!(poller.interval(), Duration::from_secs(MAX_MINUTES * 60));

        let alerts = AlertConfig {
            repeat_window_mins: u64::MAX,
            ..AlertConfig::default()
        };
        assert_eq!(
            alerts.repeat_window(),
            Some(chrono::Duration::days(365))
        );

        let zero = PollerConfig {
            interval_mins: 0,
            ..PollerConfig::default()
        };
        assert_eq!(zero.interval(), Duration::from_secs(60));
    }
}
