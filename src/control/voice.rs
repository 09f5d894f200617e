// Voice command loop
//
// Single-state loop with a quiet-timeout guard: recognized keywords map to
// drive commands, any speech at all resets the silence timer, and prolonged
// silence forces exactly one stop per timeout period.

use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::{ControlError, Decision};
use crate::config::{ConfigError, VoiceParams};
use crate::motor::DualMotorController;
use crate::perception::UtteranceSource;
use crate::telemetry::{self, TelemetryEvent, TelemetrySink};

/// Commands the voice grammar can produce. A separate type from `Decision`
/// so the apply path has no arms for vision-only maneuvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl From<VoiceCommand> for Decision {
    fn from(command: VoiceCommand) -> Self {
        match command {
            VoiceCommand::Forward => Decision::Forward,
            VoiceCommand::Backward => Decision::Backward,
            VoiceCommand::Left => Decision::SpinLeft,
            VoiceCommand::Right => Decision::SpinRight,
            VoiceCommand::Stop => Decision::Stop,
        }
    }
}

/// Map free text to a drive command by first-match substring priority:
/// forward, back, left, right, stop. The fixed order keeps multi-keyword
/// utterances ("turn back and go forward") deterministic.
pub fn parse_utterance(text: &str) -> Option<VoiceCommand> {
    if text.contains("forward") {
        Some(VoiceCommand::Forward)
    } else if text.contains("back") {
        Some(VoiceCommand::Backward)
    } else if text.contains("left") {
        Some(VoiceCommand::Left)
    } else if text.contains("right") {
        Some(VoiceCommand::Right)
    } else if text.contains("stop") {
        Some(VoiceCommand::Stop)
    } else {
        None
    }
}

pub struct VoiceLoop<S> {
    source: S,
    motors: Arc<DualMotorController>,
    telemetry: Arc<dyn TelemetrySink>,
    params: VoiceParams,
    last_command_at: Instant,
}

impl<S: UtteranceSource> VoiceLoop<S> {
    pub fn new(
        source: S,
        motors: Arc<DualMotorController>,
        telemetry: Arc<dyn TelemetrySink>,
        params: VoiceParams,
        start: Instant,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            source,
            motors,
            telemetry,
            params,
            last_command_at: start,
        })
    }

    /// Run one tick at time `now`: poll for a completed utterance, apply any
    /// recognized command, then enforce the quiet timeout.
    pub fn tick(&mut self, now: Instant) -> Result<(), ControlError> {
        let utterance = match self.source.sample_utterance(self.params.buffer_hint) {
            Ok(utterance) => utterance,
            Err(e) => {
                self.motors.stop()?;
                return Err(e.into());
            }
        };

        if let Some(text) = utterance {
            let text = text.trim().to_lowercase();
            if !text.is_empty() {
                info!("heard: {text}");
                // Presence of speech resets the silence timer even when it
                // maps to no command.
                self.last_command_at = now;

                if let Some(command) = parse_utterance(&text) {
                    self.apply(command)?;
                    self.telemetry.record(TelemetryEvent::Decision {
                        decision: command.into(),
                        timestamp_ms: telemetry::now_ms(),
                    });
                }
            }
        }

        if now.duration_since(self.last_command_at) > self.params.quiet_timeout {
            info!("quiet timeout, stopping");
            self.motors.stop()?;
            // Reset so continuous silence yields one stop per period, not
            // one per tick.
            self.last_command_at = now;
            self.telemetry.record(TelemetryEvent::QuietStop {
                timestamp_ms: telemetry::now_ms(),
            });
        }
        Ok(())
    }

    fn apply(&self, command: VoiceCommand) -> Result<(), ControlError> {
        let speed = self.params.speed;
        match command {
            VoiceCommand::Forward => self.motors.forward(speed)?,
            VoiceCommand::Backward => self.motors.backward(speed)?,
            VoiceCommand::Left => self.motors.spin_left(speed)?,
            VoiceCommand::Right => self.motors.spin_right(speed)?,
            VoiceCommand::Stop => self.motors.stop()?,
        }
        Ok(())
    }
}
