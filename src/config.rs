// Timeouts, topics, base configuration
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::motor::ReconnectPolicy;
use crate::motor::link::DEFAULT_FRAME_TIMEOUT;
use crate::motor::pid::PidGains;
use crate::motor::units::DEFAULT_WHEEL_DIAMETER;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics (host side)
pub const TOPIC_CMD_WHEELS: &str = "jaguar/cmd/wheels"; // wheel velocity commands
pub const TOPIC_STATE_JOINTS: &str = "jaguar/state/joints"; // joint position/velocity
pub const TOPIC_HEALTH: &str = "jaguar/state/health"; // health status

// Zenoh topics (motor board bridge)
pub const TOPIC_HW_ENCODERS: &str = "jaguar/hw/encoders";
pub const TOPIC_HW_MOTOR: &str = "jaguar/hw/motor";

// Motor board network address
pub const ROBOT_IP: &str = "172.16.51.52";
pub const ROBOT_PORT: u16 = 10001;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Base parameters, loaded once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseConfig {
    /// Wheel diameter including the track (m)
    pub wheel_diameter: f64,
    /// Not used by the control loop, forwarded for consumers
    pub max_accel: f64,
    /// Ceiling on either side's linear speed (m/s)
    pub max_speed: f64,
    /// Seconds without an encoder frame before the board link is closed
    pub polling_timeout: f64,
    pub robot_ip: String,
    pub robot_port: u16,
    pub pid: PidGains,
    /// Seconds between link re-open attempts while disconnected; `None` never retries
    pub reconnect_interval: Option<f64>,
    pub loop_hz: u64,
    pub cmd_timeout_ms: u64,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            wheel_diameter: DEFAULT_WHEEL_DIAMETER,
            max_accel: 5.0,
            max_speed: 2.0,
            polling_timeout: 10.0,
            robot_ip: ROBOT_IP.to_string(),
            robot_port: ROBOT_PORT,
            pid: PidGains::default(),
            reconnect_interval: None,
            loop_hz: LOOP_HZ,
            cmd_timeout_ms: CMD_TIMEOUT.as_millis() as u64,
        }
    }
}

impl BaseConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: BaseConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the control loop cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.wheel_diameter.is_finite() && self.wheel_diameter > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "wheel_diameter must be positive, got {}",
                self.wheel_diameter
            )));
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_speed must be positive, got {}",
                self.max_speed
            )));
        }
        if !(self.polling_timeout.is_finite() && self.polling_timeout > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "polling_timeout must be positive, got {}",
                self.polling_timeout
            )));
        }
        if self.pid.i_min > self.pid.i_max {
            return Err(ConfigError::Invalid(format!(
                "pid.i_min ({}) is greater than pid.i_max ({})",
                self.pid.i_min, self.pid.i_max
            )));
        }
        if let Some(secs) = self.reconnect_interval {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "reconnect_interval must be positive, got {}",
                    secs
                )));
            }
        }
        if self.loop_hz == 0 || self.loop_hz > 1000 {
            return Err(ConfigError::Invalid(format!(
                "loop_hz must be within 1..=1000, got {}",
                self.loop_hz
            )));
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.reconnect_interval
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .map_or(ReconnectPolicy::Never, ReconnectPolicy::Every)
    }

    /// Encoder silence tolerated before the board link is closed
    pub fn frame_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.polling_timeout).unwrap_or(DEFAULT_FRAME_TIMEOUT)
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(1000 / self.loop_hz)
    }

    pub fn cmd_timeout(&self) -> Duration {
        Duration::from_millis(self.cmd_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BaseConfig::default();
        assert_eq!(config.wheel_diameter, 0.27);
        assert_eq!(config.max_speed, 2.0);
        assert_eq!(config.robot_ip, "172.16.51.52");
        assert_eq!(config.robot_port, 10001);
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::Never);
        assert_eq!(config.loop_period(), Duration::from_millis(20));
        assert_eq!(config.frame_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: BaseConfig =
            serde_json::from_str(r#"{"max_speed": 1.5, "pid": {"p_gain": 2.0}}"#).unwrap();
        assert_eq!(config.max_speed, 1.5);
        assert_eq!(config.pid.p_gain, 2.0);
        assert_eq!(config.pid.i_max, PidGains::default().i_max);
        assert_eq!(config.wheel_diameter, 0.27);
    }

    #[test]
    fn test_reconnect_interval() {
        let config: BaseConfig = serde_json::from_str(r#"{"reconnect_interval": 2.5}"#).unwrap();
        assert_eq!(
            config.reconnect_policy(),
            ReconnectPolicy::Every(Duration::from_millis(2500))
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = BaseConfig::default();
        config.wheel_diameter = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BaseConfig::default();
        config.max_speed = -1.0;
        assert!(config.validate().is_err());

        let mut config = BaseConfig::default();
        config.pid.i_min = 1.0;
        config.pid.i_max = -1.0;
        assert!(config.validate().is_err());

        let mut config = BaseConfig::default();
        config.polling_timeout = 0.0;
        assert!(config.validate().is_err());

        let mut config = BaseConfig::default();
        config.loop_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = BaseConfig::from_file("/nonexistent/jaguar.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
