/// Configuration for the traffic collection service.
///
/// Three sources, in increasing precedence: compiled-in defaults (the
/// reference deployment's constants), an optional TOML file, and the
/// environment. The API key comes only from the environment, never from
/// the config file, since it is a credential. A missing or empty key is
/// a startup error here, not a runtime fetch error.

use crate::grid::GridSpec;
use crate::logging::LogLevel;
use crate::model::BoundingBox;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the TomTom API key. Loaded after
/// `dotenv`, so a `.env` file works too.
pub const API_KEY_ENV: &str = "TOMTOM_API_KEY";

/// Config file consulted when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

// ---------------------------------------------------------------------------
// Reference deployment defaults
// ---------------------------------------------------------------------------

/// New York City bounding box (minLon, minLat, maxLon, maxLat).
const DEFAULT_BBOX: [f64; 4] = [-74.25, 40.50, -73.70, 40.95];
const DEFAULT_INCIDENT_INTERVAL_MINUTES: u64 = 60;
/// The interval flow mode keeps the legacy loop's 120-second cadence.
const DEFAULT_FLOW_INTERVAL_MINUTES: u64 = 2;
const DEFAULT_TRIGGER_HOURS: [u32; 2] = [8, 18];
const DEFAULT_GRID_STEP_DEG: f64 = 0.05;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Filled from the environment in `load`, never from the file.
    #[serde(skip)]
    pub api_key: String,
    pub api: ApiConfig,
    pub incidents: IncidentsConfig,
    pub flow: FlowConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Per-request deadline for the HTTP client, in seconds.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncidentsConfig {
    /// Query region: minLon, minLat, maxLon, maxLat.
    pub bbox: [f64; 4],
    /// Minimum time between incident fetches.
    pub interval_minutes: u64,
    pub output_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowConfig {
    /// `"trigger-hours"` sweeps once per configured hour-of-day;
    /// `"interval"` sweeps on a fixed interval like the incidents feed.
    pub schedule: String,
    pub trigger_hours: Vec<u32>,
    /// Only consulted in `"interval"` mode.
    pub interval_minutes: u64,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_step: f64,
    pub lon_step: f64,
    pub output_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Sleep between due-test passes. Due tests are hour- or
    /// minute-granular, so once a minute is plenty.
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Optional append-mode log file for daemon runs.
    pub file: Option<String>,
    pub console_timestamps: bool,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: String::new(),
            api: ApiConfig::default(),
            incidents: IncidentsConfig::default(),
            flow: FlowConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for IncidentsConfig {
    fn default() -> Self {
        IncidentsConfig {
            bbox: DEFAULT_BBOX,
            interval_minutes: DEFAULT_INCIDENT_INTERVAL_MINUTES,
            output_dir: "TrafficIncidentData".to_string(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        FlowConfig {
            schedule: "trigger-hours".to_string(),
            trigger_hours: DEFAULT_TRIGGER_HOURS.to_vec(),
            interval_minutes: DEFAULT_FLOW_INTERVAL_MINUTES,
            lat_min: DEFAULT_BBOX[1],
            lat_max: DEFAULT_BBOX[3],
            lon_min: DEFAULT_BBOX[0],
            lon_max: DEFAULT_BBOX[2],
            lat_step: DEFAULT_GRID_STEP_DEG,
            lon_step: DEFAULT_GRID_STEP_DEG,
            output_dir: "TrafficFlowData".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
            console_timestamps: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived accessors
// ---------------------------------------------------------------------------

/// Which due test governs the flow sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowSchedule {
    TriggerHours(Vec<u32>),
    IntervalMinutes(u64),
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.poll_interval_secs)
    }

    /// The validated schedule mode. `validate` has already rejected
    /// unknown mode strings, so this cannot fail after `load`.
    pub fn flow_schedule(&self) -> FlowSchedule {
        if self.flow.schedule == "interval" {
            FlowSchedule::IntervalMinutes(self.flow.interval_minutes)
        } else {
            FlowSchedule::TriggerHours(self.flow.trigger_hours.clone())
        }
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_config(&self.logging.level).unwrap_or(LogLevel::Info)
    }
}

impl IncidentsConfig {
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            min_lon: self.bbox[0],
            min_lat: self.bbox[1],
            max_lon: self.bbox[2],
            max_lat: self.bbox[3],
        }
    }
}

impl FlowConfig {
    pub fn grid(&self) -> GridSpec {
        GridSpec {
            lat_min: self.lat_min,
            lat_max: self.lat_max,
            lon_min: self.lon_min,
            lon_max: self.lon_max,
            lat_step: self.lat_step,
            lon_step: self.lon_step,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl Config {
    /// Parses a TOML document over the defaults and checks its structural
    /// invariants. The API key is not consulted here.
    pub fn from_toml_str(text: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate_structure()?;
        Ok(config)
    }

    /// Loads the effective configuration: the given file (or
    /// `config.toml` when present), the defaults for everything the file
    /// omits, and the API key from the environment.
    ///
    /// An explicitly given path must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadError {
                    path: p.display().to_string(),
                    message: e.to_string(),
                })?;
                Config::from_toml_str(&text)?
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    let text =
                        std::fs::read_to_string(default).map_err(|e| ConfigError::ReadError {
                            path: DEFAULT_CONFIG_PATH.to_string(),
                            message: e.to_string(),
                        })?;
                    Config::from_toml_str(&text)?
                } else {
                    Config::default()
                }
            }
        };

        config.api_key = std::env::var(API_KEY_ENV)
            .unwrap_or_default()
            .trim()
            .to_string();
        if config.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(config)
    }

    fn validate_structure(&self) -> Result<(), ConfigError> {
        if self.flow.schedule != "trigger-hours" && self.flow.schedule != "interval" {
            return Err(ConfigError::Invalid(format!(
                "flow.schedule must be \"trigger-hours\" or \"interval\", got \"{}\"",
                self.flow.schedule
            )));
        }
        for &hour in &self.flow.trigger_hours {
            if hour > 23 {
                return Err(ConfigError::Invalid(format!(
                    "flow.trigger_hours entries must be 0-23, got {}",
                    hour
                )));
            }
        }
        self.flow
            .grid()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.incidents.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "incidents.interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.flow.schedule == "interval" && self.flow.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "flow.interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.scheduler.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if LogLevel::from_config(&self.logging.level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be debug, info, warn, or error, got \"{}\"",
                self.logging.level
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ReadError { path: String, message: String },
    ParseError(String),
    MissingApiKey,
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, message } => {
                write!(f, "Cannot read config file {}: {}", path, message)
            }
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::MissingApiKey => write!(
                f,
                "No API key configured: set {} in the environment or in .env",
                API_KEY_ENV
            ),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_reference_defaults() {
        let config = Config::from_toml_str("").expect("empty config should parse");
        assert_eq!(config.incidents.bbox, [-74.25, 40.50, -73.70, 40.95]);
        assert_eq!(config.incidents.interval_minutes, 60);
        assert_eq!(config.incidents.output_dir, "TrafficIncidentData");
        assert_eq!(config.flow.schedule, "trigger-hours");
        assert_eq!(config.flow.trigger_hours, vec![8, 18]);
        assert_eq!(config.flow.output_dir, "TrafficFlowData");
        assert_eq!(config.scheduler.poll_interval_secs, 60);
        assert_eq!(config.api.request_timeout_secs, 30);
    }

    #[test]
    fn test_default_grid_covers_collection_region() {
        let grid = Config::default().flow.grid();
        assert!(grid.validate().is_ok());
        // The 0.45° latitude span divides to just over 9 in floats, so
        // the row count rounds up to 10.
        assert_eq!(grid.rows(), 10);
        assert_eq!(grid.cols(), 11);
        assert_eq!(grid.len(), 110);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [incidents]
            interval_minutes = 30
            "#,
        )
        .expect("partial section should parse");
        assert_eq!(config.incidents.interval_minutes, 30);
        // Everything not named keeps its default.
        assert_eq!(config.incidents.bbox, [-74.25, 40.50, -73.70, 40.95]);
        assert_eq!(config.flow.trigger_hours, vec![8, 18]);
    }

    #[test]
    fn test_interval_mode_parses() {
        let config = Config::from_toml_str(
            r#"
            [flow]
            schedule = "interval"
            interval_minutes = 15
            "#,
        )
        .expect("interval mode should parse");
        assert_eq!(config.flow_schedule(), FlowSchedule::IntervalMinutes(15));
    }

    #[test]
    fn test_trigger_hours_mode_is_default_schedule() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(
            config.flow_schedule(),
            FlowSchedule::TriggerHours(vec![8, 18])
        );
    }

    #[test]
    fn test_unknown_schedule_mode_is_rejected() {
        let result = Config::from_toml_str(
            r#"
            [flow]
            schedule = "hourly"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_out_of_range_trigger_hour_is_rejected() {
        let result = Config::from_toml_str(
            r#"
            [flow]
            trigger_hours = [8, 24]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_grid_step_is_rejected() {
        let result = Config::from_toml_str(
            r#"
            [flow]
            lat_step = 0.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let result = Config::from_toml_str(
            r#"
            [scheduler]
            poll_interval_secs = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        // Catches config file typos like "interval_mins".
        let result = Config::from_toml_str(
            r#"
            [incidents]
            interval_mins = 30
            "#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_bounding_box_accessor_uses_api_field_order() {
        let config = Config::from_toml_str(
            r#"
            [incidents]
            bbox = [-74.0, 40.0, -73.0, 41.0]
            "#,
        )
        .unwrap();
        let bbox = config.incidents.bounding_box();
        assert_eq!(bbox.min_lon, -74.0);
        assert_eq!(bbox.min_lat, 40.0);
        assert_eq!(bbox.max_lon, -73.0);
        assert_eq!(bbox.max_lat, 41.0);
    }

    #[test]
    fn test_bad_log_level_is_rejected() {
        let result = Config::from_toml_str(
            r#"
            [logging]
            level = "loud"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
