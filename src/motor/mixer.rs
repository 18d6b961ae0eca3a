// Differential drive mixing for the Jaguar motor board
// Left/right linear speeds -> offset-binary forward/turn PWM command.

use super::link::ActuatorCommand;

/// Zero point of the offset-binary actuator encoding
pub const ACTUATOR_CENTER: f64 = 16384.0;

/// Largest value the board accepts on either axis
pub const ACTUATOR_MAX: u16 = 32767;

/// Scale both sides down together so neither exceeds `max_speed`
///
/// Keeps the left/right ratio, and with it the turning radius.
pub fn limit_differential_speed(left: f64, right: f64, max_speed: f64) -> (f64, f64) {
    let large_speed = left.abs().max(right.abs());

    if large_speed > max_speed {
        let scale = max_speed / large_speed;
        (left * scale, right * scale)
    } else {
        (left, right)
    }
}

/// Map a signed speed-like quantity onto the board's 0..=32767 range
fn to_offset_binary(value: f64) -> u16 {
    // Non-finite input maps to stop, not to a rail
    if !value.is_finite() {
        return ACTUATOR_CENTER as u16;
    }
    let raw = (value * ACTUATOR_CENTER + ACTUATOR_CENTER).round();

    // Saturate rather than wrap
    raw.clamp(0.0, f64::from(ACTUATOR_MAX)) as u16
}

/// Convert left/right linear speeds (m/s) to a forward/turn PWM command
pub fn mix(left: f64, right: f64, max_speed: f64) -> ActuatorCommand {
    let (left, right) = limit_differential_speed(left, right, max_speed);

    let linear_speed = (left + right) * 0.5;
    let differential_speed = left - right;

    // The board's forward axis is inverted
    ActuatorCommand::pwm(
        to_offset_binary(-linear_speed),
        to_offset_binary(differential_speed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_is_centered() {
        let cmd = mix(0.0, 0.0, 2.0);
        assert_eq!(cmd.forward, 16384);
        assert_eq!(cmd.turn, 16384);
    }

    #[test]
    fn test_limit_preserves_ratio() {
        let (left, right) = limit_differential_speed(3.0, 1.0, 2.0);
        assert!((left - 2.0).abs() < 1e-12);
        assert!((right - 2.0 / 3.0).abs() < 1e-12);
        assert!((left / right - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_limit_uses_largest_magnitude() {
        let (left, right) = limit_differential_speed(-4.0, 1.0, 2.0);
        assert!((left + 2.0).abs() < 1e-12);
        assert!((right - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_within_limit_untouched() {
        assert_eq!(limit_differential_speed(1.5, -2.0, 2.0), (1.5, -2.0));
    }

    #[test]
    fn test_forward_lowers_forward_axis() {
        let cmd = mix(0.5, 0.5, 2.0);
        assert_eq!(cmd.forward, 8192);
        assert_eq!(cmd.turn, 16384);
    }

    #[test]
    fn test_turn_axis() {
        // left faster than right -> positive differential
        let cmd = mix(0.25, -0.25, 2.0);
        assert_eq!(cmd.forward, 16384);
        assert_eq!(cmd.turn, 16384 + 8192);
    }

    #[test]
    fn test_saturates_at_bounds() {
        let cmd = mix(-2.0, -2.0, 2.0);
        assert_eq!(cmd.forward, ACTUATOR_MAX);
        let cmd = mix(2.0, 2.0, 2.0);
        assert_eq!(cmd.forward, 0);
        let cmd = mix(2.0, -2.0, 2.0);
        assert_eq!(cmd.turn, ACTUATOR_MAX);
        let cmd = mix(-2.0, 2.0, 2.0);
        assert_eq!(cmd.turn, 0);
    }

    #[test]
    fn test_rounds_to_nearest() {
        // 1e-4 * 16384 = 1.6384 -> rounds to 2
        let cmd = mix(1e-4, -1e-4, 2.0);
        assert_eq!(cmd.turn, 16384 + 3);
        assert_eq!(to_offset_binary(1e-4), 16386);
    }

    #[test]
    fn test_non_finite_speed_is_neutral() {
        assert_eq!(to_offset_binary(f64::NAN), 16384);
        assert_eq!(to_offset_binary(f64::INFINITY), 16384);
        assert_eq!(to_offset_binary(f64::NEG_INFINITY), 16384);

        let cmd = mix(f64::NAN, 0.5, 2.0);
        assert_eq!(cmd, ActuatorCommand::pwm(16384, 16384));
        let cmd = mix(f64::INFINITY, f64::INFINITY, 2.0);
        assert_eq!(cmd, ActuatorCommand::pwm(16384, 16384));
    }
}
