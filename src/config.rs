use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RemoteConfig {
    pub classifier: ClassifierConfig,
    pub debounce: DebounceConfig,
    pub serial: SerialConfig,
    pub commands: CommandsConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Tip-to-wrist must exceed PIP-to-wrist by this factor for a finger to count as extended
    #[serde(default = "default_extension_margin")]
    pub extension_margin: f32,

    /// Minimum thumb-tip to index-MCP distance for the thumb to count as extended
    #[serde(default = "default_thumb_extension_distance")]
    pub thumb_extension_distance: f32,

    /// Horizontal tip/PIP offset needed before a pointing finger picks a direction
    #[serde(default = "default_pointing_threshold")]
    pub pointing_threshold: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DebounceConfig {
    /// Number of recent frames considered for a majority decision
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Votes a gesture needs within a full window
    #[serde(default = "default_majority")]
    pub majority: usize,

    /// Minimum time between two emitted gestures, in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SerialConfig {
    /// Manual port, tried after the discovered candidates
    pub port: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Seconds between reconnect attempts while disconnected
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    /// Device boot time after opening the port
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Substrings marking a port as a likely USB/ACM device
    #[serde(default = "default_port_patterns")]
    pub port_patterns: Vec<String>,

    /// Double the reconnect interval after each consecutive failure
    #[serde(default = "default_reconnect_backoff")]
    pub reconnect_backoff: bool,

    #[serde(default = "default_max_reconnect_interval_secs")]
    pub max_reconnect_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommandMode {
    /// `!{protocol}:{address}:{data}` lines built from an IR command table
    Ir,
    /// Bare single-letter commands understood by the simple firmware
    Legacy,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CommandsConfig {
    #[serde(default = "default_command_mode")]
    pub mode: CommandMode,

    /// IR command file loaded at startup
    pub ir_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Sleep between worker iterations when the landmark source has nothing new
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_interval_secs)
    }
}

impl DebounceConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl RemoteConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "classifier.extension_margin",
                default_extension_margin() as f64,
            )?
            .set_default(
                "classifier.thumb_extension_distance",
                default_thumb_extension_distance() as f64,
            )?
            .set_default(
                "classifier.pointing_threshold",
                default_pointing_threshold() as f64,
            )?
            .set_default("debounce.window_size", default_window_size() as i64)?
            .set_default("debounce.majority", default_majority() as i64)?
            .set_default("debounce.cooldown_ms", default_cooldown_ms())?
            .set_default("serial.baud_rate", default_baud_rate())?
            .set_default("serial.read_timeout_ms", default_read_timeout_ms())?
            .set_default(
                "serial.reconnect_interval_secs",
                default_reconnect_interval_secs(),
            )?
            .set_default("serial.settle_delay_ms", default_settle_delay_ms())?
            .set_default("serial.port_patterns", default_port_patterns())?
            .set_default("serial.reconnect_backoff", default_reconnect_backoff())?
            .set_default(
                "serial.max_reconnect_interval_secs",
                default_max_reconnect_interval_secs(),
            )?
            .set_default("commands.mode", "ir")?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.idle_poll_ms", default_idle_poll_ms())?
            .add_source(File::with_name(&path_str).required(false))
            // GESTURE_REMOTE_SERIAL__BAUD_RATE -> serial.baud_rate
            .add_source(
                Environment::with_prefix("GESTURE_REMOTE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: RemoteConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("extension_margin", self.classifier.extension_margin),
            (
                "thumb_extension_distance",
                self.classifier.thumb_extension_distance,
            ),
            ("pointing_threshold", self.classifier.pointing_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Message(format!(
                    "Classifier {} must be a positive number",
                    name
                )));
            }
        }

        if self.debounce.window_size == 0 {
            return Err(ConfigError::Message(
                "Debounce window_size must be greater than 0".to_string(),
            ));
        }

        if self.debounce.majority == 0 || self.debounce.majority > self.debounce.window_size {
            return Err(ConfigError::Message(format!(
                "Debounce majority must be between 1 and window_size ({})",
                self.debounce.window_size
            )));
        }

        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Message(
                "Serial baud_rate must be greater than 0".to_string(),
            ));
        }

        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Serial read_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.serial.reconnect_interval_secs == 0 {
            return Err(ConfigError::Message(
                "Serial reconnect_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.serial.max_reconnect_interval_secs < self.serial.reconnect_interval_secs {
            return Err(ConfigError::Message(
                "Serial max_reconnect_interval_secs must not be below reconnect_interval_secs"
                    .to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            debounce: DebounceConfig::default(),
            serial: SerialConfig::default(),
            commands: CommandsConfig {
                mode: default_command_mode(),
                ir_file: None,
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                idle_poll_ms: default_idle_poll_ms(),
            },
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            extension_margin: default_extension_margin(),
            thumb_extension_distance: default_thumb_extension_distance(),
            pointing_threshold: default_pointing_threshold(),
        }
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            majority: default_majority(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            port_patterns: default_port_patterns(),
            reconnect_backoff: default_reconnect_backoff(),
            max_reconnect_interval_secs: default_max_reconnect_interval_secs(),
        }
    }
}

// Default value functions
fn default_extension_margin() -> f32 {
    1.1
}
fn default_thumb_extension_distance() -> f32 {
    0.15
}
fn default_pointing_threshold() -> f32 {
    0.05
}

fn default_window_size() -> usize {
    7
}
fn default_majority() -> usize {
    5
}
fn default_cooldown_ms() -> u64 {
    800
}

fn default_baud_rate() -> u32 {
    115_200
}
fn default_read_timeout_ms() -> u64 {
    1000
}
fn default_reconnect_interval_secs() -> u64 {
    5
}
// ESP32 boards reset when the port opens
fn default_settle_delay_ms() -> u64 {
    2000
}
fn default_port_patterns() -> Vec<String> {
    vec!["USB".to_string(), "ACM".to_string()]
}
fn default_reconnect_backoff() -> bool {
    false
}
fn default_max_reconnect_interval_secs() -> u64 {
    60
}

fn default_command_mode() -> CommandMode {
    CommandMode::Ir
}

fn default_event_bus_capacity() -> usize {
    100
}
fn default_idle_poll_ms() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RemoteConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.debounce.window_size, 7);
        assert_eq!(config.debounce.majority, 5);
        assert_eq!(config.debounce.cooldown(), Duration::from_millis(800));
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.serial.reconnect_interval(), Duration::from_secs(5));
        assert_eq!(config.commands.mode, CommandMode::Ir);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = RemoteConfig::load_from_file(&path).unwrap();
        assert_eq!(config, RemoteConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[debounce]
cooldown_ms = 1000

[serial]
port = "/dev/ttyACM3"
reconnect_backoff = true

[commands]
mode = "legacy"
"#
        )
        .unwrap();

        let config = RemoteConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.debounce.cooldown_ms, 1000);
        assert_eq!(config.debounce.window_size, 7);
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM3"));
        assert!(config.serial.reconnect_backoff);
        assert_eq!(config.commands.mode, CommandMode::Legacy);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RemoteConfig::default();

        config.debounce.majority = 8;
        assert!(config.validate().is_err());

        config.debounce.majority = 5;
        config.classifier.extension_margin = f32::NAN;
        assert!(config.validate().is_err());

        config.classifier.extension_margin = 1.1;
        config.serial.baud_rate = 0;
        assert!(config.validate().is_err());

        config.serial.baud_rate = 9600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = RemoteConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[debounce]"));
        let parsed: RemoteConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
