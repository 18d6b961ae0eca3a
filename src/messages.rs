// Message types exchanged with the host over zenoh

use serde::{Deserialize, Serialize};

use crate::motor::{JointState, Wheel};

// Command from teleop/trajectory controller -> runtime
// Wheel speeds in rad/s, applied to both wheels on a side
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelCommand {
    pub left: f64,
    pub right: f64,
}

// State of one joint, runtime -> consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointStateMsg {
    pub name: String,
    pub position: f64,
    pub velocity: f64,
}

impl JointStateMsg {
    pub fn new(wheel: Wheel, state: &JointState) -> Self {
        Self {
            name: wheel.joint_name().to_string(),
            position: state.position,
            velocity: state.velocity,
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    LinkDown,
}
