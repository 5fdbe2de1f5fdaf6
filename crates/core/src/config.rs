use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub aoa: AoaConfig,
    pub demand: DemandConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Settings of the consultant-allocation subsystem. This section is the
/// single source for what the legacy platform kept in a settings table.
#[derive(Clone, Debug)]
pub struct AoaConfig {
    pub api_url: String,
    pub api_token: Option<SecretString>,
    /// Share of eligible opportunities routed into the AOA treatment
    /// cohort, 0..=100.
    pub test_group_percent: u8,
    pub algo_version: String,
    /// Months a consultant's rolling average remembers.
    pub remember_window_size: u32,
    /// First month the historical backfill may compute.
    pub backfill_epoch: NaiveDate,
    /// Category whose unassigned opportunities are AOA-eligible.
    pub bu_category_ident: String,
}

#[derive(Clone, Debug)]
pub struct DemandConfig {
    /// Gates the CRM event emitted when an accepted mandate completes
    /// the questionnaire.
    pub crm_events_enabled: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://courtier.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            aoa: AoaConfig {
                api_url: "http://localhost:9292/api/ranks".to_string(),
                api_token: None,
                test_group_percent: 50,
                algo_version: "v2".to_string(),
                remember_window_size: 12,
                backfill_epoch: NaiveDate::from_ymd_opt(2023, 1, 1)
                    .unwrap_or(NaiveDate::MIN),
                bu_category_ident: "bu".to_string(),
            },
            demand: DemandConfig { crm_events_enabled: false },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    aoa: Option<AoaPatch>,
    demand: Option<DemandPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AoaPatch {
    api_url: Option<String>,
    api_token: Option<String>,
    test_group_percent: Option<u8>,
    algo_version: Option<String>,
    remember_window_size: Option<u32>,
    /// ISO date string; TOML date literals would not round-trip through
    /// chrono's serde impl.
    backfill_epoch: Option<String>,
    bu_category_ident: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DemandPatch {
    crm_events_enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("courtier.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(aoa) = patch.aoa {
            if let Some(api_url) = aoa.api_url {
                self.aoa.api_url = api_url;
            }
            if let Some(api_token_value) = aoa.api_token {
                self.aoa.api_token = Some(api_token_value.into());
            }
            if let Some(test_group_percent) = aoa.test_group_percent {
                self.aoa.test_group_percent = test_group_percent;
            }
            if let Some(algo_version) = aoa.algo_version {
                self.aoa.algo_version = algo_version;
            }
            if let Some(remember_window_size) = aoa.remember_window_size {
                self.aoa.remember_window_size = remember_window_size;
            }
            if let Some(backfill_epoch) = aoa.backfill_epoch {
                if let Ok(date) = backfill_epoch.parse() {
                    self.aoa.backfill_epoch = date;
                }
            }
            if let Some(bu_category_ident) = aoa.bu_category_ident {
                self.aoa.bu_category_ident = bu_category_ident;
            }
        }

        if let Some(demand) = patch.demand {
            if let Some(crm_events_enabled) = demand.crm_events_enabled {
                self.demand.crm_events_enabled = crm_events_enabled;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COURTIER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("COURTIER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("COURTIER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COURTIER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("COURTIER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COURTIER_AOA_API_URL") {
            self.aoa.api_url = value;
        }
        if let Some(value) = read_env("COURTIER_AOA_API_TOKEN") {
            self.aoa.api_token = Some(value.into());
        }
        if let Some(value) = read_env("COURTIER_AOA_TEST_GROUP_PERCENT") {
            self.aoa.test_group_percent = parse_u8("COURTIER_AOA_TEST_GROUP_PERCENT", &value)?;
        }
        if let Some(value) = read_env("COURTIER_AOA_ALGO_VERSION") {
            self.aoa.algo_version = value;
        }
        if let Some(value) = read_env("COURTIER_AOA_REMEMBER_WINDOW_SIZE") {
            self.aoa.remember_window_size =
                parse_u32("COURTIER_AOA_REMEMBER_WINDOW_SIZE", &value)?;
        }
        if let Some(value) = read_env("COURTIER_AOA_BACKFILL_EPOCH") {
            self.aoa.backfill_epoch = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "COURTIER_AOA_BACKFILL_EPOCH".to_string(),
                    value,
                }
            })?;
        }
        if let Some(value) = read_env("COURTIER_AOA_BU_CATEGORY_IDENT") {
            self.aoa.bu_category_ident = value;
        }

        if let Some(value) = read_env("COURTIER_DEMAND_CRM_EVENTS_ENABLED") {
            self.demand.crm_events_enabled =
                parse_bool("COURTIER_DEMAND_CRM_EVENTS_ENABLED", &value)?;
        }

        let log_level =
            read_env("COURTIER_LOGGING_LEVEL").or_else(|| read_env("COURTIER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COURTIER_LOGGING_FORMAT").or_else(|| read_env("COURTIER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.aoa.api_url.trim().is_empty() {
            return Err(ConfigError::Validation("aoa.api_url must not be empty".to_string()));
        }
        if self.aoa.test_group_percent > 100 {
            return Err(ConfigError::Validation(
                "aoa.test_group_percent must be between 0 and 100".to_string(),
            ));
        }
        if self.aoa.remember_window_size == 0 {
            return Err(ConfigError::Validation(
                "aoa.remember_window_size must be at least 1".to_string(),
            ));
        }
        if self.aoa.algo_version.trim().is_empty() {
            return Err(ConfigError::Validation("aoa.algo_version must not be empty".to_string()));
        }

        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let default = PathBuf::from("courtier.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{AppConfig, ConfigError};

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.aoa.remember_window_size, 12);
        assert_eq!(config.aoa.backfill_epoch, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    }

    #[test]
    fn rejects_out_of_range_test_group_percent() {
        let mut config = AppConfig::default();
        config.aoa.test_group_percent = 101;

        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_zero_remember_window() {
        let mut config = AppConfig::default();
        config.aoa.remember_window_size = 0;

        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    // One test owns all env-var manipulation so parallel test threads
    // never observe each other's overrides.
    #[test]
    fn env_overrides_beat_file_values_and_reject_malformed_input() {
        std::env::set_var("COURTIER_AOA_TEST_GROUP_PERCENT", "10");
        let mut config = AppConfig::default();
        config.aoa.test_group_percent = 80;
        config.apply_env_overrides().expect("override applies");
        std::env::remove_var("COURTIER_AOA_TEST_GROUP_PERCENT");
        assert_eq!(config.aoa.test_group_percent, 10);

        std::env::set_var("COURTIER_DEMAND_CRM_EVENTS_ENABLED", "maybe");
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides();
        std::env::remove_var("COURTIER_DEMAND_CRM_EVENTS_ENABLED");
        assert!(matches!(result, Err(ConfigError::InvalidEnvOverride { .. })));
    }

    #[test]
    fn parses_file_patch() {
        let patch: super::ConfigPatch = toml::from_str(
            r#"
            [aoa]
            api_url = "https://aoa.internal/api/ranks"
            test_group_percent = 25
            backfill_epoch = "2024-03-01"

            [demand]
            crm_events_enabled = true
            "#,
        )
        .expect("patch parses");

        let mut config = AppConfig::default();
        config.apply_patch(patch);

        assert_eq!(config.aoa.api_url, "https://aoa.internal/api/ranks");
        assert_eq!(config.aoa.test_group_percent, 25);
        assert_eq!(config.aoa.backfill_epoch, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(config.demand.crm_events_enabled);
    }
}
