// Per-side velocity PID for the Jaguar base
//
// Gains are re-derived from the base gains every cycle:
// - near-zero command: no integral action, accumulator cleared (no windup at rest)
// - near-zero error: no proportional action (no chatter while tracking)

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Commands below this magnitude (rad/s) disable integral action
pub const NEAR_ZERO_COMMAND: f64 = 0.5;

/// Errors below this magnitude (rad/s) disable proportional action
pub const NEAR_ZERO_ERROR: f64 = 0.1;

/// PID gains with integral term limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub p_gain: f64,
    pub i_gain: f64,
    pub d_gain: f64,
    /// Lower bound of the integral term's contribution
    pub i_min: f64,
    /// Upper bound of the integral term's contribution
    pub i_max: f64,
    /// Also bound the accumulator itself, not just its contribution
    pub antiwindup: bool,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            p_gain: 0.5,
            i_gain: 0.1,
            d_gain: 0.0,
            i_min: -1.0,
            i_max: 1.0,
            antiwindup: false,
        }
    }
}

/// Gains to use this cycle, derived from the (never mutated) base gains
pub fn derive_gains(base: &PidGains, command: f64, error: f64) -> PidGains {
    let mut gains = *base;
    if command.abs() < NEAR_ZERO_COMMAND {
        gains.i_gain = 0.0;
    }
    if error.abs() < NEAR_ZERO_ERROR {
        gains.p_gain = 0.0;
    }
    gains
}

/// Which side of the base a controller drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Velocity controller for one side of the base
#[derive(Debug, Clone)]
pub struct VelocityPid {
    side: Side,
    base: PidGains,
    gains: PidGains,
    integral: f64,
    last_error: f64,
}

impl VelocityPid {
    pub fn new(side: Side, base: PidGains) -> Self {
        Self {
            side,
            base,
            gains: base,
            integral: 0.0,
            last_error: 0.0,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Gains loaded at startup
    pub fn base_gains(&self) -> PidGains {
        self.base
    }

    /// Gains selected for the most recent update
    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Accumulated error integral
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Clear the integral accumulator and error history
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }

    /// Velocity correction (rad/s) for a commanded and measured velocity
    ///
    /// Applies the gain regimes before computing: a near-zero command resets
    /// the controller and drops integral action, a near-zero error drops
    /// proportional action.
    pub fn update(&mut self, command: f64, measured: f64, dt: Duration) -> f64 {
        let error = command - measured;
        if command.abs() < NEAR_ZERO_COMMAND {
            self.reset();
        }
        self.gains = derive_gains(&self.base, command, error);
        self.compute_command(error, dt)
    }

    /// Standard PID step with the currently selected gains
    ///
    /// Returns 0 without touching state when `dt` is zero or the error is not finite.
    pub fn compute_command(&mut self, error: f64, dt: Duration) -> f64 {
        let dt = dt.as_secs_f64();
        if dt <= 0.0 || !error.is_finite() {
            return 0.0;
        }
        let gains = self.gains;

        let derivative = (error - self.last_error) / dt;
        self.last_error = error;

        let p_term = gains.p_gain * error;

        // No integration while integral action is off, so the accumulator stays cleared
        if gains.i_gain != 0.0 {
            self.integral += dt * error;
            if gains.antiwindup {
                let a = gains.i_min / gains.i_gain;
                let b = gains.i_max / gains.i_gain;
                self.integral = self.integral.max(a.min(b)).min(a.max(b));
            }
        }
        let i_term = (gains.i_gain * self.integral).max(gains.i_min).min(gains.i_max);

        let d_term = gains.d_gain * derivative;

        p_term + i_term + d_term
    }
}
