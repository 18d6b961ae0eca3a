// Control loop for the Jaguar 4x4 base
//
// Combines encoder fusion, per-side velocity PID and drive mixing on top of a
// MotorLink. The host calls `read` then `write(dt)` once per control period.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::encoder::{JointState, WHEEL_COUNT, Wheel, fuse_frame};
use super::link::{ActuatorCommand, MotorLink};
use super::mixer::mix;
use super::pid::{Side, VelocityPid};
use super::units::angular_to_linear;
use crate::config::BaseConfig;

/// Whether the board link is usable this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

/// What to do about a link that failed to open or dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Stay disconnected until the link reports open on its own
    #[default]
    Never,
    /// Try to re-open the link after this much disconnected time
    Every(Duration),
}

/// Per-cycle motor control for the four-wheel base
pub struct ControlLoop<L: MotorLink> {
    link: L,
    link_state: LinkState,
    joints: [JointState; WHEEL_COUNT],
    left: VelocityPid,
    right: VelocityPid,
    wheel_diameter: f64,
    max_speed: f64,
    address: String,
    port: u16,
    reconnect: ReconnectPolicy,
    disconnected_for: Duration,
    last_command: Option<ActuatorCommand>,
}

impl<L: MotorLink> ControlLoop<L> {
    pub fn new(link: L, config: &BaseConfig) -> Self {
        let link_state = if link.is_open() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
        Self {
            link,
            link_state,
            joints: [JointState::default(); WHEEL_COUNT],
            left: VelocityPid::new(Side::Left, config.pid),
            right: VelocityPid::new(Side::Right, config.pid),
            wheel_diameter: config.wheel_diameter,
            max_speed: config.max_speed,
            address: config.robot_ip.clone(),
            port: config.robot_port,
            reconnect: config.reconnect_policy(),
            disconnected_for: Duration::ZERO,
            last_command: None,
        }
    }

    /// Open the board link
    ///
    /// A failure is logged and leaves the loop disconnected; cycles keep
    /// running and hold their last values.
    pub fn start(&mut self) -> LinkState {
        if !self.link.is_open() {
            self.open_link();
        }
        self.refresh_link_state()
    }

    fn open_link(&mut self) {
        match self.link.open(&self.address, self.port) {
            Ok(()) => info!("Opened motor link at {}:{}", self.address, self.port),
            Err(e) => error!(
                "Could not open motor link to {}:{}: {}",
                self.address, self.port, e
            ),
        }
    }

    fn refresh_link_state(&mut self) -> LinkState {
        let state = if self.link.is_open() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
        if state != self.link_state {
            match state {
                LinkState::Connected => info!("Motor link connected"),
                LinkState::Disconnected => {
                    warn!("Motor link disconnected, holding last joint state")
                }
            }
            self.disconnected_for = Duration::ZERO;
            self.link_state = state;
        }
        state
    }

    /// Pull the latest encoder frame into the joint states
    ///
    /// Without a connected link or a ready frame the joints keep their
    /// previous values.
    pub fn read(&mut self) {
        if self.refresh_link_state() == LinkState::Disconnected {
            return;
        }
        match self.link.read_sensor_frame() {
            Ok(Some(frame)) => fuse_frame(&mut self.joints, &frame, self.wheel_diameter),
            Ok(None) => debug!("No sensor frame ready, holding joint state"),
            Err(e) => warn!("Failed to read sensor frame: {}", e),
        }
    }

    /// Run both side controllers and send the mixed command to the board
    pub fn write(&mut self, dt: Duration) {
        if self.refresh_link_state() == LinkState::Disconnected {
            self.maybe_reconnect(dt);
            return;
        }

        let left = self.side_correction(Side::Left, dt);
        let right = self.side_correction(Side::Right, dt);

        let left = angular_to_linear(left, self.wheel_diameter);
        let right = angular_to_linear(right, self.wheel_diameter);

        let command = mix(left, right, self.max_speed);
        match self.link.send_actuator_command(command) {
            Ok(()) => self.last_command = Some(command),
            Err(e) => warn!("Failed to send actuator command: {}", e),
        }
    }

    /// `read` followed by `write`
    pub fn cycle(&mut self, dt: Duration) {
        self.read();
        self.write(dt);
    }

    fn side_correction(&mut self, side: Side, dt: Duration) -> f64 {
        let (commanded, rear, front, pid) = match side {
            Side::Left => (Wheel::RearLeft, Wheel::RearLeft, Wheel::FrontLeft, &mut self.left),
            Side::Right => (
                Wheel::RearRight,
                Wheel::RearRight,
                Wheel::FrontRight,
                &mut self.right,
            ),
        };
        let command = self.joints[commanded.index()].velocity_command;
        let measured =
            (self.joints[rear.index()].velocity + self.joints[front.index()].velocity) / 2.0;

        let correction = pid.update(command, measured, dt);
        debug!(
            "{:?}: correction {:.4} rad/s, command {:.4}, measured {:.4}, error {:.4}, i gain {}",
            pid.side(),
            correction,
            command,
            measured,
            command - measured,
            pid.gains().i_gain
        );
        correction
    }

    fn maybe_reconnect(&mut self, dt: Duration) {
        let ReconnectPolicy::Every(interval) = self.reconnect else {
            return;
        };
        self.disconnected_for += dt;
        if self.disconnected_for >= interval {
            self.disconnected_for = Duration::ZERO;
            info!("Retrying motor link at {}:{}", self.address, self.port);
            self.open_link();
            self.refresh_link_state();
        }
    }

    /// Set one wheel's commanded velocity (rad/s)
    ///
    /// Each side's controller tracks the rear wheel's command
    /// (`RearLeft`, `RearRight`). Setting a front wheel alone changes its
    /// stored command but not what the base does; use `set_side_commands`.
    pub fn set_velocity_command(&mut self, wheel: Wheel, velocity: f64) {
        self.joints[wheel.index()].velocity_command = velocity;
    }

    /// Set the commanded velocity (rad/s) of both wheels on each side
    pub fn set_side_commands(&mut self, left: f64, right: f64) {
        self.set_velocity_command(Wheel::RearLeft, left);
        self.set_velocity_command(Wheel::FrontLeft, left);
        self.set_velocity_command(Wheel::RearRight, right);
        self.set_velocity_command(Wheel::FrontRight, right);
    }

    pub fn joints(&self) -> &[JointState; WHEEL_COUNT] {
        &self.joints
    }

    pub fn joint(&self, wheel: Wheel) -> &JointState {
        &self.joints[wheel.index()]
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    /// Last command the board accepted
    pub fn last_command(&self) -> Option<ActuatorCommand> {
        self.last_command
    }

    pub fn pid(&self, side: Side) -> &VelocityPid {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}
