// Control loops: perception sample -> decision -> actuation, once per tick.
//
// Each loop exposes an explicit `tick(now)` so an external scheduler owns the
// cadence and tests can drive the state machines with synthetic time and
// perception sequences.

mod vision;
mod voice;

pub use vision::{AvoidanceLoop, Phase};
pub use voice::{VoiceCommand, VoiceLoop, parse_utterance};

use serde::Serialize;

use crate::motor::ActuationError;
use crate::perception::PerceptionError;

/// Outcome of one tick's evaluation, consumed immediately by the controller
/// and echoed into telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    SpinLeft,
    SpinRight,
    Stop,
}

/// Tick-level fault. Perception faults are recoverable (the loop has already
/// issued a safety stop); actuation faults are fatal to the loop.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Perception(#[from] PerceptionError),

    #[error(transparent)]
    Actuation(#[from] ActuationError),
}
