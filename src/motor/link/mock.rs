// Mock link for testing

use super::{ActuatorCommand, LinkError, MotorLink, Result, SensorFrame};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory motor link
///
/// Clones share state, so a test can keep one handle to inject frames and
/// inspect commands while the control loop owns another.
#[derive(Clone, Default)]
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
}

#[derive(Default)]
struct MockLinkInner {
    open: bool,
    refuse_open: bool,
    open_attempts: usize,
    endpoint: Option<(String, u16)>,
    frames: VecDeque<SensorFrame>,
    sent: Vec<ActuatorCommand>,
}

impl MockLink {
    /// Create a closed mock link
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock link that is already open
    pub fn connected() -> Self {
        let link = Self::new();
        link.set_open(true);
        link
    }

    fn lock(&self) -> MutexGuard<'_, MockLinkInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Force the link open or closed (simulates a drop or recovery)
    pub fn set_open(&self, open: bool) {
        self.lock().open = open;
    }

    /// Make subsequent `open` calls fail
    pub fn refuse_open(&self, refuse: bool) {
        self.lock().refuse_open = refuse;
    }

    /// Queue a frame for the next read
    pub fn inject_frame(&self, frame: SensorFrame) {
        self.lock().frames.push_back(frame);
    }

    /// All actuator commands sent so far
    pub fn sent_commands(&self) -> Vec<ActuatorCommand> {
        self.lock().sent.clone()
    }

    /// Most recent actuator command
    pub fn last_command(&self) -> Option<ActuatorCommand> {
        self.lock().sent.last().copied()
    }

    /// Number of times `open` was called
    pub fn open_attempts(&self) -> usize {
        self.lock().open_attempts
    }

    /// Address and port of the last successful open
    pub fn endpoint(&self) -> Option<(String, u16)> {
        self.lock().endpoint.clone()
    }
}

impl MotorLink for MockLink {
    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn open(&mut self, address: &str, port: u16) -> Result<()> {
        let mut inner = self.lock();
        inner.open_attempts += 1;
        if inner.refuse_open {
            return Err(LinkError::Open {
                endpoint: format!("{}:{}", address, port),
                reason: "connection refused".to_string(),
            });
        }
        inner.open = true;
        inner.endpoint = Some((address.to_string(), port));
        Ok(())
    }

    fn read_sensor_frame(&mut self) -> Result<Option<SensorFrame>> {
        let mut inner = self.lock();
        if !inner.open {
            return Err(LinkError::NotOpen);
        }
        Ok(inner.frames.pop_front())
    }

    fn send_actuator_command(&mut self, command: ActuatorCommand) -> Result<()> {
        let mut inner = self.lock();
        if !inner.open {
            return Err(LinkError::NotOpen);
        }
        inner.sent.push(command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let probe = MockLink::connected();
        let mut link = probe.clone();
        link.send_actuator_command(ActuatorCommand::pwm(1, 2)).unwrap();
        assert_eq!(probe.last_command(), Some(ActuatorCommand::pwm(1, 2)));
    }

    #[test]
    fn test_closed_link_rejects_io() {
        let mut link = MockLink::new();
        assert!(matches!(link.read_sensor_frame(), Err(LinkError::NotOpen)));
        assert!(matches!(
            link.send_actuator_command(ActuatorCommand::pwm(0, 0)),
            Err(LinkError::NotOpen)
        ));
    }

    #[test]
    fn test_refused_open() {
        let mut link = MockLink::new();
        link.refuse_open(true);
        assert!(link.open("10.0.0.1", 10001).is_err());
        assert!(!link.is_open());
        assert_eq!(link.open_attempts(), 1);

        link.refuse_open(false);
        link.open("10.0.0.1", 10001).unwrap();
        assert!(link.is_open());
        assert_eq!(link.endpoint(), Some(("10.0.0.1".to_string(), 10001)));
    }

    #[test]
    fn test_frames_are_read_in_order() {
        let mut link = MockLink::connected();
        let mut first = SensorFrame::default();
        first.channels[0].encoder_pos = 1;
        let mut second = SensorFrame::default();
        second.channels[0].encoder_pos = 2;
        link.inject_frame(first);
        link.inject_frame(second);

        assert_eq!(link.read_sensor_frame().unwrap(), Some(first));
        assert_eq!(link.read_sensor_frame().unwrap(), Some(second));
        assert_eq!(link.read_sensor_frame().unwrap(), None);
    }
}
