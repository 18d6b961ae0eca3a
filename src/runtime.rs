// Fixed-rate host loop with command watchdog

use std::time::{Duration, Instant};
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::config::{BaseConfig, TOPIC_CMD_WHEELS, TOPIC_HEALTH, TOPIC_STATE_JOINTS};
use crate::messages::{JointStateMsg, RuntimeHealth, WheelCommand};
use crate::motor::{ControlLoop, LinkState, MotorLink, Wheel, ZenohLink};

pub struct Runtime {
    latest_cmd: Option<WheelCommand>,
    cmd_received_at: Instant,
    cmd_timeout: Duration,
    cmd_stale: bool,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new(cmd_timeout: Duration) -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            cmd_timeout,
            cmd_stale: true, // Start stale until first cmd
            health: RuntimeHealth::CmdStale,
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming command
    fn on_command(&mut self, cmd: WheelCommand) {
        debug!("Received command: {:?}", &cmd);
        self.on_command_at(cmd, Instant::now());
    }

    fn on_command_at(&mut self, cmd: WheelCommand, now: Instant) {
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = now;
    }

    /// Wheel command to apply this cycle, after the watchdog
    fn effective_command(&mut self, now: Instant) -> WheelCommand {
        let cmd_age = now.saturating_duration_since(self.cmd_received_at);

        match self.latest_cmd {
            Some(cmd) if cmd_age <= self.cmd_timeout => {
                self.cmd_stale = false;
                cmd
            }
            Some(_) => {
                // Watchdog triggered - stop the robot
                if !self.cmd_stale {
                    warn!("Command stale ({:?} old), stopping robot", cmd_age);
                }
                self.cmd_stale = true;
                WheelCommand::default()
            }
            None => {
                // No command ever received
                self.cmd_stale = true;
                WheelCommand::default()
            }
        }
    }

    /// Apply the watchdog-filtered command and run one control cycle
    pub fn step<L: MotorLink>(&mut self, control: &mut ControlLoop<L>, now: Instant, dt: Duration) {
        let cmd = self.effective_command(now);
        control.set_side_commands(cmd.left, cmd.right);
        control.cycle(dt);

        self.health = if control.link_state() == LinkState::Disconnected {
            RuntimeHealth::LinkDown
        } else if self.cmd_stale {
            RuntimeHealth::CmdStale
        } else {
            RuntimeHealth::Ok
        };
    }
}

/// Control tick that never bursts to catch up after a slow cycle
fn control_interval(period: Duration) -> Interval {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}

pub async fn run(config: BaseConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_WHEELS).await?;
    let pub_joints = session.declare_publisher(TOPIC_STATE_JOINTS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let link = ZenohLink::new().with_frame_timeout(config.frame_timeout());
    let mut control = ControlLoop::new(link, &config);
    control.start();

    let mut runtime = Runtime::new(config.cmd_timeout());
    let mut tick = control_interval(config.loop_period());

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        config.loop_hz, config.cmd_timeout_ms
    );
    info!("Subscribed to: {}", TOPIC_CMD_WHEELS);
    info!("Publishing to: {}, {}", TOPIC_STATE_JOINTS, TOPIC_HEALTH);

    // First tick completes immediately; measure dt from it
    tick.tick().await;
    let mut last_tick = Instant::now();
    loop {
        tick.tick().await;
        let now = Instant::now();
        let dt = now - last_tick;
        last_tick = now;

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<WheelCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd);
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Watchdog, encoder read, PID and actuation
        runtime.step(&mut control, now, dt);

        // 3. Publish joint state
        let joints: Vec<JointStateMsg> = Wheel::ALL
            .iter()
            .map(|&wheel| JointStateMsg::new(wheel, control.joint(wheel)))
            .collect();
        let joints_json = serde_json::to_string(&joints)?;
        pub_joints.put(joints_json).await?;

        // 4. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::MockLink;

    const DT: Duration = Duration::from_millis(20);

    #[test]
    fn test_starts_stale() {
        let mut runtime = Runtime::new(Duration::from_millis(250));
        let cmd = runtime.effective_command(Instant::now());
        assert_eq!(cmd, WheelCommand::default());
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
    }

    #[test]
    fn test_fresh_command_passes_through() {
        let mut runtime = Runtime::new(Duration::from_millis(250));
        let t0 = Instant::now();
        let cmd = WheelCommand { left: 1.0, right: 2.0 };
        runtime.on_command_at(cmd, t0);

        let applied = runtime.effective_command(t0 + Duration::from_millis(100));
        assert_eq!(applied, cmd);
    }

    #[test]
    fn test_stale_command_is_zeroed() {
        let mut runtime = Runtime::new(Duration::from_millis(250));
        let t0 = Instant::now();
        runtime.on_command_at(WheelCommand { left: 1.0, right: 1.0 }, t0);

        let applied = runtime.effective_command(t0 + Duration::from_millis(300));
        assert_eq!(applied, WheelCommand::default());
    }

    #[test]
    fn test_step_applies_command_to_all_wheels() {
        let probe = MockLink::connected();
        let mut control = ControlLoop::new(probe.clone(), &BaseConfig::default());
        let mut runtime = Runtime::new(Duration::from_millis(250));
        let t0 = Instant::now();
        runtime.on_command_at(WheelCommand { left: 1.5, right: -1.5 }, t0);

        runtime.step(&mut control, t0, DT);
        assert_eq!(control.joint(Wheel::FrontLeft).velocity_command, 1.5);
        assert_eq!(control.joint(Wheel::RearRight).velocity_command, -1.5);
        assert_eq!(probe.sent_commands().len(), 1);
        assert_eq!(runtime.health(), RuntimeHealth::Ok);
    }

    #[test]
    fn test_step_zeroes_stale_command() {
        let probe = MockLink::connected();
        let mut control = ControlLoop::new(probe.clone(), &BaseConfig::default());
        let mut runtime = Runtime::new(Duration::from_millis(250));
        let t0 = Instant::now();
        runtime.on_command_at(WheelCommand { left: 2.0, right: 2.0 }, t0);

        runtime.step(&mut control, t0 + Duration::from_millis(300), DT);
        assert_eq!(control.joint(Wheel::RearLeft).velocity_command, 0.0);
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
    }

    #[tokio::test]
    async fn test_control_interval_does_not_burst() {
        let tick = control_interval(Duration::from_millis(20));
        assert_eq!(tick.missed_tick_behavior(), MissedTickBehavior::Delay);
        assert_eq!(tick.period(), Duration::from_millis(20));
    }

    #[test]
    fn test_link_down_health() {
        let probe = MockLink::new();
        let mut control = ControlLoop::new(probe.clone(), &BaseConfig::default());
        let mut runtime = Runtime::new(Duration::from_millis(250));
        let t0 = Instant::now();
        runtime.on_command_at(WheelCommand { left: 1.0, right: 1.0 }, t0);

        runtime.step(&mut control, t0, DT);
        assert_eq!(runtime.health(), RuntimeHealth::LinkDown);

        probe.set_open(true);
        runtime.step(&mut control, t0 + DT, DT);
        assert_eq!(runtime.health(), RuntimeHealth::Ok);
    }

    #[test]
    fn test_drop_after_connect_reports_link_down() {
        let probe = MockLink::connected();
        let mut control = ControlLoop::new(probe.clone(), &BaseConfig::default());
        let mut runtime = Runtime::new(Duration::from_millis(250));
        let t0 = Instant::now();
        runtime.on_command_at(WheelCommand { left: 1.0, right: 1.0 }, t0);

        runtime.step(&mut control, t0, DT);
        assert_eq!(runtime.health(), RuntimeHealth::Ok);

        probe.set_open(false);
        runtime.step(&mut control, t0 + DT, DT);
        assert_eq!(runtime.health(), RuntimeHealth::LinkDown);
        assert_eq!(probe.sent_commands().len(), 1);
    }
}
