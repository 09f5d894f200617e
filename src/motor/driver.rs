// Single-motor actuation interface
//
// The runtime never touches raw pins; a hardware integration implements
// `ActuatorDriver` on top of whatever GPIO/PWM stack the board uses.

use serde::Serialize;
use tracing::debug;

/// Rotation direction of one motor. Speed is always a non-negative
/// magnitude; direction is never encoded as a sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

/// Errors raised by a motor driver implementation.
#[derive(Debug, thiserror::Error)]
pub enum ActuationError {
    #[error("motor hardware not ready")]
    HardwareNotReady,

    #[error("driver rejected command: {0}")]
    Rejected(String),
}

/// Capability interface for one motor's direction and power control.
///
/// Implementations must be non-blocking (or bounded-latency) because the
/// controller holds its lock across a direction + power write pair.
pub trait ActuatorDriver: Send {
    fn set_direction(&mut self, direction: Direction) -> Result<(), ActuationError>;

    /// Set the power level, `magnitude` in `[0, 1]`.
    fn set_power(&mut self, magnitude: f32) -> Result<(), ActuationError>;

    fn stop(&mut self) -> Result<(), ActuationError>;
}

/// Software stand-in for a motor, used when no hardware is attached.
#[derive(Debug, Default)]
pub struct SimMotor {
    label: &'static str,
    direction: Option<Direction>,
    power: f32,
}

impl SimMotor {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            direction: None,
            power: 0.0,
        }
    }
}

impl ActuatorDriver for SimMotor {
    fn set_direction(&mut self, direction: Direction) -> Result<(), ActuationError> {
        self.direction = Some(direction);
        debug!("sim motor {}: direction {:?}", self.label, direction);
        Ok(())
    }

    fn set_power(&mut self, magnitude: f32) -> Result<(), ActuationError> {
        self.power = magnitude;
        debug!("sim motor {}: power {:.2}", self.label, magnitude);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActuationError> {
        self.power = 0.0;
        debug!("sim motor {}: stopped", self.label);
        Ok(())
    }
}
