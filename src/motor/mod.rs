// Motor actuation layer
//
// Provides:
// - The per-motor `ActuatorDriver` capability interface
// - `DualMotorController`, the locked differential-drive command surface

mod controller;
pub mod driver;

pub use controller::{ActuatorState, DualMotorController, MotorCommand};
pub use driver::{ActuationError, ActuatorDriver, Direction, SimMotor};
