// Encoder fusion: raw board counts -> continuous joint position and signed velocity
//
// Encoder counts wrap, and a wrapped count looks like a huge jump. Any jump of
// ROLLOVER_THRESHOLD or more is absorbed into a hidden per-joint offset instead
// of the reported position, so position stays continuous.

use std::f64::consts::PI;

use tracing::debug;

use super::link::SensorFrame;
use super::units::angular_to_linear;

/// Speed encoder pulses per wheel revolution
pub const PULSES_PER_REVOLUTION: f64 = 186.0;

/// Position jumps (rad) at or above this are treated as rollover, not motion
pub const ROLLOVER_THRESHOLD: f64 = 3.0;

/// Number of wheel joints on the base
pub const WHEEL_COUNT: usize = 4;

/// Raw board channel read for each logical wheel
///
/// The board reports six motor channels; the wheels sit on 0, 1, 3 and 4.
pub const LOGICAL_TO_RAW_CHANNEL: [usize; WHEEL_COUNT] = [0, 1, 3, 4];

/// Raw channels whose encoders are mounted with reversed polarity
const REVERSED_CHANNELS: [usize; 2] = [1, 4];

/// Logical wheel joints, in joint index order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    RearLeft = 0,
    RearRight = 1,
    FrontLeft = 2,
    FrontRight = 3,
}

impl Wheel {
    pub const ALL: [Wheel; WHEEL_COUNT] = [
        Wheel::RearLeft,
        Wheel::RearRight,
        Wheel::FrontLeft,
        Wheel::FrontRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Joint name exposed to controllers
    pub fn joint_name(self) -> &'static str {
        match self {
            Wheel::RearLeft => "rear_left_wheel",
            Wheel::RearRight => "rear_right_wheel",
            Wheel::FrontLeft => "front_left_wheel",
            Wheel::FrontRight => "front_right_wheel",
        }
    }

    pub fn raw_channel(self) -> usize {
        LOGICAL_TO_RAW_CHANNEL[self.index()]
    }
}

/// State of one wheel joint
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JointState {
    /// Unwrapped wheel angle (rad)
    pub position: f64,
    /// Accumulated rollover correction (rad), never reported
    pub position_offset: f64,
    /// Signed wheel speed (rad/s)
    pub velocity: f64,
    /// Commanded wheel speed (rad/s)
    pub velocity_command: f64,
}

fn counts_to_radians(counts: u16) -> f64 {
    f64::from(counts) / PULSES_PER_REVOLUTION * 2.0 * PI
}

/// Fold one board frame into the joint states
///
/// All four joints are updated from the same frame before returning.
/// `wheel_diameter` is only used for diagnostics.
pub fn fuse_frame(joints: &mut [JointState; WHEEL_COUNT], frame: &SensorFrame, wheel_diameter: f64) {
    for wheel in Wheel::ALL {
        let channel = wheel.raw_channel();
        let sample = &frame.channels[channel];
        let joint = &mut joints[wheel.index()];

        let mut angle = counts_to_radians(sample.encoder_pos);
        if REVERSED_CHANNELS.contains(&channel) {
            angle = -angle;
        }
        let delta = angle - joint.position_offset - joint.position;

        if delta.abs() < ROLLOVER_THRESHOLD {
            joint.position += delta;
        } else {
            // Suspicious jump: drop it and re-base later readings
            debug!(
                "{}: absorbing encoder jump of {:.3} rad into offset",
                wheel.joint_name(),
                delta
            );
            joint.position_offset += delta;
        }

        let mut velocity = counts_to_radians(sample.encoder_vel);
        if sample.is_reverse() {
            velocity = -velocity;
        }
        joint.velocity = velocity;

        debug!(
            "{} (ch {}): delta {:.4} m, velocity {:.4} m/s",
            wheel.joint_name(),
            channel,
            angular_to_linear(delta, wheel_diameter),
            angular_to_linear(velocity, wheel_diameter)
        );
    }
}
