use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;
use soilwatch_parser::{ChannelDepthTable, ParserError};
use thiserror::Error;

use crate::pipeline::{parse_depth_list, parse_timezone, TemperatureUnit};

pub const DEFAULT_BASE_URL: &str = "https://www.irrimaxlive.com/api/";
pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SOILWATCH_API_KEY (or upstream.api_key) must be set")]
    MissingApiKey,
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("invalid channel depth table: {0}")]
    ChannelDepths(#[from] ParserError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub upstream: UpstreamSettings,
    pub server: ServerSettings,
    pub defaults: RequestDefaults,
    /// Channel number to installation depth in inches, for exports without depth labels.
    pub channel_depths: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    /// Empty means any origin may call the read-only endpoints.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub timezone: String,
    pub moisture_depths: Vec<f64>,
    pub window_days: u32,
    pub temperature_depth: f64,
    pub temperature_unit: TemperatureUnit,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            moisture_depths: vec![6.0, 22.0],
            window_days: 7,
            temperature_depth: 6.0,
            temperature_unit: TemperatureUnit::Fahrenheit,
        }
    }
}

impl RequestDefaults {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        parse_timezone(&self.timezone).map_err(|err| ConfigError::InvalidValue {
            key: "defaults.timezone",
            message: err.to_string(),
        })
    }
}

impl Settings {
    /// Reads the optional TOML file, then applies `SOILWATCH_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup("SOILWATCH_API_KEY") {
            self.upstream.api_key = Some(key);
        }
        if let Some(url) = lookup("SOILWATCH_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(raw) = lookup("SOILWATCH_TIMEOUT_SECS") {
            self.upstream.timeout_secs = parse_number("SOILWATCH_TIMEOUT_SECS", &raw)?;
        }
        if let Some(bind) = lookup("SOILWATCH_BIND") {
            self.server.bind = bind;
        }
        if let Some(origins) = lookup("SOILWATCH_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(tz) = lookup("SOILWATCH_DEFAULT_TZ") {
            self.defaults.timezone = tz;
        }
        if let Some(raw) = lookup("SOILWATCH_MOISTURE_DEPTHS") {
            self.defaults.moisture_depths =
                parse_depth_list(&raw).map_err(|message| ConfigError::InvalidValue {
                    key: "SOILWATCH_MOISTURE_DEPTHS",
                    message,
                })?;
        }
        if let Some(raw) = lookup("SOILWATCH_WINDOW_DAYS") {
            self.defaults.window_days = parse_number("SOILWATCH_WINDOW_DAYS", &raw)?;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.defaults.timezone()?;
        if self.defaults.window_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "defaults.window_days",
                message: "must be at least 1".to_string(),
            });
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "upstream.timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        self.channel_depth_table()?;
        Ok(())
    }

    pub fn channel_depth_table(&self) -> Result<ChannelDepthTable, ConfigError> {
        Ok(ChannelDepthTable::from_string_keys(&self.channel_depths)?)
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        key,
        message: err.to_string(),
    })
}
