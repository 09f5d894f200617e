// Obstacle-avoidance loop
//
// Two-phase state machine. While `Turning`, new occupancy readings are
// ignored until the turn window expires; otherwise a blocked path triggers a
// stop plus a randomly-directed turn, and a clear path drives forward.

use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{ControlError, Decision};
use crate::config::{ConfigError, VisionParams};
use crate::motor::DualMotorController;
use crate::perception::{OccupancySensor, RegionOfInterest};
use crate::telemetry::{self, TelemetryEvent, TelemetrySink};

/// Maneuver phase. Only this loop ever mutates it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Scanning,
    Turning { started_at: Instant },
}

pub struct AvoidanceLoop<S, R> {
    sensor: S,
    roi: RegionOfInterest,
    motors: Arc<DualMotorController>,
    telemetry: Arc<dyn TelemetrySink>,
    params: VisionParams,
    phase: Phase,
    rng: R,
}

impl<S: OccupancySensor, R: Rng> AvoidanceLoop<S, R> {
    pub fn new(
        sensor: S,
        roi: RegionOfInterest,
        motors: Arc<DualMotorController>,
        telemetry: Arc<dyn TelemetrySink>,
        params: VisionParams,
        rng: R,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            sensor,
            roi,
            motors,
            telemetry,
            params,
            phase: Phase::Scanning,
            rng,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run one control tick at time `now`.
    ///
    /// A perception fault stops the motors and surfaces to the caller; the
    /// loop itself stays usable for the next tick.
    pub fn tick(&mut self, now: Instant) -> Result<(), ControlError> {
        let pixels = match self.sensor.sample_occupancy(&self.roi) {
            Ok(pixels) => pixels,
            Err(e) => {
                self.motors.stop()?;
                return Err(e.into());
            }
        };

        if let Phase::Turning { started_at } = self.phase {
            if now.duration_since(started_at) < self.params.turn_duration {
                // Maneuver still in progress; don't let a noisy mid-turn
                // frame interrupt it.
                debug!("turning, {pixels} occupancy pixels ignored");
                return Ok(());
            }
            self.phase = Phase::Scanning;
        }

        if pixels > self.params.avoid_threshold {
            info!("obstacle detected ({pixels} pixels), turning");
            self.motors.stop()?;

            let decision = if self.rng.gen_bool(0.5) {
                self.motors.turn_left(self.params.turn_speed)?;
                Decision::TurnLeft
            } else {
                self.motors.turn_right(self.params.turn_speed)?;
                Decision::TurnRight
            };
            self.phase = Phase::Turning { started_at: now };
            self.telemetry.record(TelemetryEvent::Decision {
                decision,
                timestamp_ms: telemetry::now_ms(),
            });
        } else {
            debug!("path clear ({pixels} pixels), moving forward");
            self.motors.forward(self.params.forward_speed)?;
        }
        Ok(())
    }
}
