// Linear <-> angular conversion for the Jaguar wheels
// The motor board reports and accepts travel in metres; joints are in radians.

/// Default wheel diameter including the track (metres)
pub const DEFAULT_WHEEL_DIAMETER: f64 = 0.27;

/// Convert linear travel (m or m/s) to wheel angle (rad or rad/s)
pub fn linear_to_angular(travel: f64, wheel_diameter: f64) -> f64 {
    travel / wheel_diameter * 2.0
}

/// Convert wheel angle (rad or rad/s) to linear travel (m or m/s)
pub fn angular_to_linear(angle: f64, wheel_diameter: f64) -> f64 {
    angle * wheel_diameter / 2.0
}
