// Sensor/actuator link to the Jaguar motor board
//
// The control loop only talks to the board through the MotorLink trait:
// - ZenohLink: production link, bridged over a zenoh session
// - MockLink: in-memory fake for tests

use serde::{Deserialize, Serialize};

mod mock;
mod bridge;

pub use mock::MockLink;
pub use bridge::{DEFAULT_FRAME_TIMEOUT, ZenohLink};

/// Number of motor channels reported by the board in one frame
pub const RAW_CHANNEL_COUNT: usize = 6;

/// Error types for the motor link
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Link is not open")]
    NotOpen,

    #[error("Could not open link to {endpoint}: {reason}")]
    Open { endpoint: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No sensor frame for {0:?}, link presumed down")]
    Silent(std::time::Duration),

    #[error("Failed to decode sensor frame: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode actuator command: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// One encoder channel as reported by the board
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEncoderSample {
    /// Encoder count, wraps at the board's encoder bound
    pub encoder_pos: u16,
    /// Speed encoder count per sample period
    pub encoder_vel: u16,
    /// Direction flag: 0 = reverse, anything else = forward
    pub encoder_dir: u8,
}

impl RawEncoderSample {
    pub fn new(encoder_pos: u16, encoder_vel: u16, encoder_dir: u8) -> Self {
        Self {
            encoder_pos,
            encoder_vel,
            encoder_dir,
        }
    }

    pub fn is_reverse(&self) -> bool {
        self.encoder_dir == 0
    }
}

/// All encoder channels read in one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub channels: [RawEncoderSample; RAW_CHANNEL_COUNT],
}

impl SensorFrame {
    pub fn new(channels: [RawEncoderSample; RAW_CHANNEL_COUNT]) -> Self {
        Self { channels }
    }
}

/// Actuation mode understood by the board
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    #[default]
    Pwm,
}

/// Offset-binary forward/turn command sent once per cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub forward: u16,
    pub turn: u16,
    pub mode: ControlMode,
}

impl ActuatorCommand {
    pub fn pwm(forward: u16, turn: u16) -> Self {
        Self {
            forward,
            turn,
            mode: ControlMode::Pwm,
        }
    }
}

/// Capability interface of the motor board link
///
/// Implementations must not block longer than a control cycle: a read with
/// no new data returns `Ok(None)` instead of waiting.
pub trait MotorLink {
    /// Whether the link is currently usable
    fn is_open(&self) -> bool;

    /// Open the link to the board at `address:port`
    fn open(&mut self, address: &str, port: u16) -> Result<()>;

    /// Latest sensor frame, or `None` if the board has nothing new
    fn read_sensor_frame(&mut self) -> Result<Option<SensorFrame>>;

    /// Send one forward/turn command to the board
    fn send_actuator_command(&mut self, command: ActuatorCommand) -> Result<()>;
}
