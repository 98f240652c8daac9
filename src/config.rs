use crate::client::RetryPolicy;
use crate::coordinator::{CoordinatorConfig, FanOut};
use crate::device::{IdlePolicy, DEFAULT_IDLE_TIMEOUT};
use crate::error::{LightError, Result};
use crate::schedule::WorkSchedule;
use crate::server::{DEFAULT_POLL_INTERVAL, DEFAULT_PORT};
use crate::types::{Color, DeviceAddress, Palette};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default controller settings file, looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "light_addresses.json";

/// Controller settings stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Light endpoints, contacted in this order
    pub addresses: Vec<String>,

    #[serde(default = "default_available")]
    pub available_color: Color,

    #[serde(default = "default_busy")]
    pub busy_color: Color,

    #[serde(default)]
    pub fan_out: FanOut,

    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_available() -> Color {
    Color::GREEN
}

fn default_busy() -> Color {
    Color::RED
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            available_color: default_available(),
            busy_color: default_busy(),
            fan_out: FanOut::default(),
            retry: RetrySettings::default(),
        }
    }
}

/// Retry knobs in settings-file units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub reconnect_every: u32,
    pub connect_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            poll_interval_ms: millis(policy.poll_interval),
            max_attempts: policy.max_attempts,
            reconnect_every: policy.reconnect_every,
            connect_timeout_ms: millis(policy.connect_timeout),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            max_attempts: settings.max_attempts,
            reconnect_every: settings.reconnect_every,
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
        }
    }
}

impl ControllerSettings {
    /// Load settings, writing a default file first if none exists
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let settings = Self::default();
            settings.save(path)?;
            tracing::info!(path = %path.display(), "created default settings file");
            return Ok(settings);
        }

        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.available_color == self.busy_color {
            return Err(LightError::InvalidConfig(format!(
                "available and busy colors are both \"{}\"",
                self.available_color
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(LightError::InvalidConfig("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Parse every configured address, failing on the first bad one
    pub fn device_addresses(&self) -> Result<Vec<DeviceAddress>> {
        self.addresses.iter().map(|raw| DeviceAddress::parse(raw.as_str())).collect()
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            available_color: self.available_color.clone(),
            busy_color: self.busy_color.clone(),
            fan_out: self.fan_out,
            retry: self.retry.into(),
        }
    }
}

/// Everything a light process needs to start
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub bind: SocketAddr,
    pub poll_interval: Duration,
    pub idle_timeout: Duration,
    pub schedule: WorkSchedule,
    pub brightness: f32,
    pub palette: Palette,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            schedule: WorkSchedule::default(),
            brightness: 0.1,
            palette: Palette::default(),
        }
    }
}

impl DeviceConfig {
    /// Check value ranges and derive the idle policy
    pub fn idle_policy(&self) -> Result<IdlePolicy> {
        if !(0.0..=1.0).contains(&self.brightness) {
            return Err(LightError::InvalidConfig(format!(
                "brightness {} is outside 0.0..=1.0",
                self.brightness
            )));
        }
        IdlePolicy::new(self.idle_timeout, self.schedule)
    }

    /// Merge palette overrides from a JSON file, if given
    pub fn with_palette_file(mut self, path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            self.palette = self.palette.load_overrides(path)?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SETTINGS_FILE);

        let settings = ControllerSettings::load_or_create(&path).unwrap();
        assert!(settings.addresses.is_empty());
        assert!(path.exists());

        let reloaded = ControllerSettings::load_or_create(&path).unwrap();
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn minimal_file_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lights.json");
        std::fs::write(&path, r#"{"addresses": ["tcp://192.168.1.20:5556", "desk.local:5556"]}"#).unwrap();

        let settings = ControllerSettings::load_or_create(&path).unwrap();
        let addresses = settings.device_addresses().unwrap();
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].url(), "ws://192.168.1.20:5556");

        let config = settings.coordinator_config();
        assert_eq!(config.available_color, Color::GREEN);
        assert_eq!(config.busy_color, Color::RED);
        assert_eq!(config.fan_out, FanOut::FailFast);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lights.json");
        std::fs::write(
            &path,
            r#"{
                "addresses": [],
                "available_color": "blue",
                "busy_color": "red",
                "fan_out": "best-effort",
                "retry": { "poll_interval_ms": 20, "max_attempts": 10 }
            }"#,
        )
        .unwrap();

        let config = ControllerSettings::load_or_create(&path).unwrap().coordinator_config();
        assert_eq!(config.available_color, Color::BLUE);
        assert_eq!(config.fan_out, FanOut::BestEffort);
        assert_eq!(config.retry.poll_interval, Duration::from_millis(20));
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.reconnect_every, 5);
    }

    #[test]
    fn addresses_are_required() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lights.json");
        std::fs::write(&path, r#"{"busy_color": "blue"}"#).unwrap();
        assert!(matches!(ControllerSettings::load_or_create(&path), Err(LightError::Json(_))));
    }

    #[test]
    fn bad_address_is_reported() {
        let settings = ControllerSettings {
            addresses: vec!["tcp://*:5556".to_string()],
            ..ControllerSettings::default()
        };
        assert!(matches!(settings.device_addresses(), Err(LightError::InvalidAddress(_))));
    }

    #[test]
    fn same_available_and_busy_color_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lights.json");
        std::fs::write(&path, r#"{"addresses": [], "available_color": "red"}"#).unwrap();
        assert!(matches!(
            ControllerSettings::load_or_create(&path),
            Err(LightError::InvalidConfig(_))
        ));
    }

    #[test]
    fn device_brightness_range() {
        let config = DeviceConfig {
            brightness: 1.5,
            ..DeviceConfig::default()
        };
        assert!(config.idle_policy().is_err());
        assert!(DeviceConfig::default().idle_policy().is_ok());
    }
}
