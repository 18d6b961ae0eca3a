//! Motor-control runtime for the Jaguar 4x4 wheel base.
//!
//! Turns encoder telemetry from the motor board into joint state and wheel
//! velocity commands into the board's forward/turn PWM command, once per
//! control period.

pub mod config;
pub mod messages;
pub mod motor;
pub mod runtime;
