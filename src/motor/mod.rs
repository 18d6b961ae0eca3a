// Motor control module for the Jaguar 4x4 base
//
// Provides:
// - Encoder fusion (raw counts -> continuous joint state)
// - Per-side velocity PID with gain regimes
// - Differential drive mixing to the board's PWM command
// - Link abstraction to the motor board
// - Control loop tying it together

mod driver;
pub mod encoder;
pub mod link;
pub mod mixer;
pub mod pid;
pub mod units;

pub use driver::{ControlLoop, LinkState, ReconnectPolicy};
pub use encoder::{JointState, WHEEL_COUNT, Wheel};
pub use link::{ActuatorCommand, LinkError, MockLink, MotorLink, SensorFrame, ZenohLink};
pub use pid::{PidGains, Side, VelocityPid};
