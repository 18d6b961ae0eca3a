// Zenoh bridge to the Jaguar motor board
//
// The board side of the bridge publishes encoder frames and consumes
// forward/turn commands, both as JSON:
//   jaguar/hw/encoders -> SensorFrame
//   jaguar/hw/motor    <- ActuatorCommand
//
// A zenoh session stays up when the bridge goes away, so liveness is judged
// from the encoder stream: no frame for `frame_timeout` closes the link.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use zenoh::Wait;
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::{Publisher, Subscriber};
use zenoh::sample::Sample;

use super::{ActuatorCommand, LinkError, MotorLink, Result, SensorFrame};
use crate::config::{TOPIC_HW_ENCODERS, TOPIC_HW_MOTOR};

/// Default time without an encoder frame before the link is closed
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(10);

/// Motor link carried over a zenoh session connected to the board bridge
pub struct ZenohLink {
    encoder_topic: String,
    motor_topic: String,
    frame_timeout: Duration,
    io: Option<BridgeIo>,
}

// Field order matters: declarations drop before the session
struct BridgeIo {
    encoders: Subscriber<FifoChannelHandler<Sample>>,
    motor: Publisher<'static>,
    watchdog: FrameWatchdog,
    _session: zenoh::Session,
}

/// Tracks how long the encoder stream has been silent
#[derive(Debug, Clone, Copy)]
struct FrameWatchdog {
    timeout: Duration,
    last_frame_at: Instant,
}

impl FrameWatchdog {
    fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_frame_at: now,
        }
    }

    fn feed(&mut self, now: Instant) {
        self.last_frame_at = now;
    }

    /// Silence so far, if it has exceeded the timeout
    fn expired(&self, now: Instant) -> Option<Duration> {
        let silent = now.saturating_duration_since(self.last_frame_at);
        (silent > self.timeout).then_some(silent)
    }
}

impl ZenohLink {
    /// Create a closed link using the default bridge topics
    pub fn new() -> Self {
        Self::with_topics(TOPIC_HW_ENCODERS, TOPIC_HW_MOTOR)
    }

    /// Create a closed link with custom topics
    pub fn with_topics(encoder_topic: &str, motor_topic: &str) -> Self {
        Self {
            encoder_topic: encoder_topic.to_string(),
            motor_topic: motor_topic.to_string(),
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            io: None,
        }
    }

    /// Set how long the encoder stream may stay silent before the link closes
    pub fn with_frame_timeout(mut self, frame_timeout: Duration) -> Self {
        self.frame_timeout = frame_timeout;
        self
    }

    fn connect(
        &self,
        endpoint: &str,
    ) -> std::result::Result<BridgeIo, Box<dyn std::error::Error + Send + Sync>> {
        let mut config = zenoh::Config::default();
        config.insert_json5("mode", r#""client""#)?;
        config.insert_json5("connect/endpoints", &format!(r#"["{}"]"#, endpoint))?;

        let session = zenoh::open(config).wait()?;
        let encoders = session
            .declare_subscriber(self.encoder_topic.clone())
            .wait()?;
        let motor = session.declare_publisher(self.motor_topic.clone()).wait()?;

        Ok(BridgeIo {
            encoders,
            motor,
            watchdog: FrameWatchdog::new(self.frame_timeout, Instant::now()),
            _session: session,
        })
    }

    fn close(&mut self, reason: &LinkError) {
        if self.io.take().is_some() {
            warn!("Closing motor link: {}", reason);
        }
    }
}

impl Default for ZenohLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorLink for ZenohLink {
    fn is_open(&self) -> bool {
        self.io.is_some()
    }

    fn open(&mut self, address: &str, port: u16) -> Result<()> {
        let endpoint = format!("tcp/{}:{}", address, port);
        info!("Opening motor link at {}", endpoint);

        let io = self.connect(&endpoint).map_err(|e| LinkError::Open {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        self.io = Some(io);

        info!(
            "Motor link open: reading {}, writing {}",
            self.encoder_topic, self.motor_topic
        );
        Ok(())
    }

    fn read_sensor_frame(&mut self) -> Result<Option<SensorFrame>> {
        let io = self.io.as_mut().ok_or(LinkError::NotOpen)?;

        // Drain everything pending, keep the latest frame
        let mut latest = None;
        let mut last_error = None;
        let mut received = false;
        let mut transport_error = None;
        loop {
            match io.encoders.try_recv() {
                Ok(Some(sample)) => {
                    received = true;
                    let payload = sample.payload().to_bytes();
                    match serde_json::from_slice::<SensorFrame>(&payload) {
                        Ok(frame) => latest = Some(frame),
                        Err(e) => {
                            warn!("Failed to parse sensor frame: {}", e);
                            last_error = Some(e);
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    transport_error = Some(LinkError::Transport(e.to_string()));
                    break;
                }
            }
        }

        let now = Instant::now();
        if received {
            io.watchdog.feed(now);
        }
        let failure =
            transport_error.or_else(|| io.watchdog.expired(now).map(LinkError::Silent));
        if let Some(err) = failure {
            self.close(&err);
            return Err(err);
        }

        match (latest, last_error) {
            (None, Some(e)) => Err(LinkError::Decode(e)),
            (frame, _) => Ok(frame),
        }
    }

    fn send_actuator_command(&mut self, command: ActuatorCommand) -> Result<()> {
        let io = self.io.as_ref().ok_or(LinkError::NotOpen)?;
        let payload = serde_json::to_string(&command).map_err(LinkError::Encode)?;
        debug!("Sending actuator command: {}", payload);
        let sent = io
            .motor
            .put(payload)
            .wait()
            .map_err(|e| LinkError::Transport(e.to_string()));
        if let Err(err) = &sent {
            self.close(err);
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_link_is_closed() {
        let link = ZenohLink::new();
        assert!(!link.is_open());
        assert_eq!(link.frame_timeout, DEFAULT_FRAME_TIMEOUT);
    }

    #[test]
    fn test_io_on_closed_link_fails() {
        let mut link = ZenohLink::with_topics("test/encoders", "test/motor");
        assert!(matches!(link.read_sensor_frame(), Err(LinkError::NotOpen)));
        assert!(matches!(
            link.send_actuator_command(ActuatorCommand::pwm(16384, 16384)),
            Err(LinkError::NotOpen)
        ));
    }

    #[test]
    fn test_frame_timeout_override() {
        let link = ZenohLink::new().with_frame_timeout(Duration::from_millis(500));
        assert_eq!(link.frame_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_watchdog_expires_after_silence() {
        let t0 = Instant::now();
        let watchdog = FrameWatchdog::new(Duration::from_secs(1), t0);

        assert_eq!(watchdog.expired(t0), None);
        assert_eq!(watchdog.expired(t0 + Duration::from_secs(1)), None);
        assert_eq!(
            watchdog.expired(t0 + Duration::from_millis(1500)),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_watchdog_fed_by_frames() {
        let t0 = Instant::now();
        let mut watchdog = FrameWatchdog::new(Duration::from_secs(1), t0);

        watchdog.feed(t0 + Duration::from_millis(900));
        assert_eq!(watchdog.expired(t0 + Duration::from_millis(1500)), None);
        assert!(watchdog.expired(t0 + Duration::from_millis(2000)).is_some());
    }
}
