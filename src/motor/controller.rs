// Differential-drive motor controller
//
// The only component allowed to emit hardware commands. A left/right command
// pair is applied as a unit under a single lock so concurrent control loops
// never observe or produce a torn pair.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use super::driver::{ActuationError, ActuatorDriver, Direction};
use crate::telemetry::{self, TelemetryEvent, TelemetrySink};

/// Commanded speed and direction for one side of the drivetrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorCommand {
    pub speed: f32,
    pub direction: Direction,
}

impl MotorCommand {
    pub const STOPPED: MotorCommand = MotorCommand {
        speed: 0.0,
        direction: Direction::Forward,
    };
}

/// Last command pair applied to the drivetrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorState {
    pub left: MotorCommand,
    pub right: MotorCommand,
}

impl ActuatorState {
    pub const STOPPED: ActuatorState = ActuatorState {
        left: MotorCommand::STOPPED,
        right: MotorCommand::STOPPED,
    };
}

struct Inner {
    left: Box<dyn ActuatorDriver>,
    right: Box<dyn ActuatorDriver>,
    state: ActuatorState,
}

/// Thread-safe controller for a two-motor differential-drive base.
///
/// Every state-changing call is serialized against every other one; the lock
/// is held only while a command pair is being applied, never across a
/// perception read.
pub struct DualMotorController {
    inner: Mutex<Inner>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl DualMotorController {
    pub fn new(
        left: Box<dyn ActuatorDriver>,
        right: Box<dyn ActuatorDriver>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                left,
                right,
                state: ActuatorState::STOPPED,
            }),
            telemetry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves only stale cached state;
        // recover the guard rather than poisoning the whole drivetrain.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stop both motors and clear the cached speeds. Idempotent.
    pub fn stop(&self) -> Result<(), ActuationError> {
        let mut inner = self.lock();
        let left_res = inner.left.stop();
        let right_res = inner.right.stop();
        inner.state = ActuatorState::STOPPED;
        if left_res.is_ok() && right_res.is_ok() {
            // Emitted under the lock so events stay in apply order; the
            // sink is non-blocking by contract.
            self.emit_actuation(ActuatorState::STOPPED);
        }
        drop(inner);

        left_res?;
        right_res?;

        info!("motors stopped");
        Ok(())
    }

    /// Apply a full command pair: direction then power, left before right,
    /// all under the lock.
    ///
    /// Speeds must be pre-clamped to `[0, 1]`; out-of-range values are a
    /// programming error in the caller. On a driver fault mid-apply the
    /// controller refuses to leave a half-applied pair: both sides get a
    /// best-effort stop, the cached state reads stopped, and the fault is
    /// propagated.
    pub fn drive(
        &self,
        left_speed: f32,
        left_dir: Direction,
        right_speed: f32,
        right_dir: Direction,
    ) -> Result<(), ActuationError> {
        debug_assert!((0.0..=1.0).contains(&left_speed), "left speed out of range");
        debug_assert!(
            (0.0..=1.0).contains(&right_speed),
            "right speed out of range"
        );

        let state = ActuatorState {
            left: MotorCommand {
                speed: left_speed,
                direction: left_dir,
            },
            right: MotorCommand {
                speed: right_speed,
                direction: right_dir,
            },
        };

        let mut inner = self.lock();
        let applied: Result<(), ActuationError> = (|| {
            inner.left.set_direction(left_dir)?;
            inner.left.set_power(left_speed)?;
            inner.right.set_direction(right_dir)?;
            inner.right.set_power(right_speed)?;
            Ok(())
        })();

        match applied {
            Ok(()) => {
                inner.state = state;
                // Emitted under the lock so concurrent callers can't record
                // events out of apply order; the sink is non-blocking by
                // contract.
                self.emit_actuation(state);
                drop(inner);
                info!(
                    "motors L:{:.2}({:?}) R:{:.2}({:?})",
                    left_speed, left_dir, right_speed, right_dir
                );
                Ok(())
            }
            Err(e) => {
                // Half-applied direction/speed pairs are a safety hazard.
                if inner.left.stop().is_err() || inner.right.stop().is_err() {
                    warn!("failed to stop motors after partial drive command");
                }
                inner.state = ActuatorState::STOPPED;
                Err(e)
            }
        }
    }

    /// Drive both sides straight ahead.
    pub fn forward(&self, speed: f32) -> Result<(), ActuationError> {
        self.drive(speed, Direction::Forward, speed, Direction::Forward)
    }

    /// Drive both sides in reverse.
    pub fn backward(&self, speed: f32) -> Result<(), ActuationError> {
        self.drive(speed, Direction::Backward, speed, Direction::Backward)
    }

    /// Arc left: inner (left) side at half speed in reverse, right side at
    /// full `speed` forward. The asymmetry gives an in-place-biased arc the
    /// drivetrain can actually follow rather than a point turn.
    pub fn turn_left(&self, speed: f32) -> Result<(), ActuationError> {
        self.drive(speed * 0.5, Direction::Backward, speed, Direction::Forward)
    }

    /// Arc right, mirror of `turn_left`.
    pub fn turn_right(&self, speed: f32) -> Result<(), ActuationError> {
        self.drive(speed, Direction::Forward, speed * 0.5, Direction::Backward)
    }

    /// Point turn left at equal speed on both sides.
    pub fn spin_left(&self, speed: f32) -> Result<(), ActuationError> {
        self.drive(speed, Direction::Backward, speed, Direction::Forward)
    }

    /// Point turn right at equal speed on both sides.
    pub fn spin_right(&self, speed: f32) -> Result<(), ActuationError> {
        self.drive(speed, Direction::Forward, speed, Direction::Backward)
    }

    /// Snapshot of the last applied command pair.
    pub fn state(&self) -> ActuatorState {
        self.lock().state
    }

    fn emit_actuation(&self, state: ActuatorState) {
        self.telemetry.record(TelemetryEvent::Actuation {
            left_speed: state.left.speed,
            left_dir: state.left.direction,
            right_speed: state.right.speed,
            right_dir: state.right.direction,
            timestamp_ms: telemetry::now_ms(),
        });
    }
}

impl Drop for DualMotorController {
    fn drop(&mut self) {
        // Safety measure: never leave the drivetrain running on teardown.
        if self.stop().is_err() {
            warn!("failed to stop motors on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MemorySink;
    use std::sync::Arc;

    /// Records every driver call for assertions.
    #[derive(Default)]
    struct RecordingMotor {
        ops: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingMotor {
        fn pair() -> (Box<dyn ActuatorDriver>, Box<dyn ActuatorDriver>, Arc<Mutex<Vec<String>>>) {
            let ops = Arc::new(Mutex::new(Vec::new()));
            let left = RecordingMotor { ops: ops.clone() };
            let right = RecordingMotor { ops: ops.clone() };
            (Box::new(left), Box::new(right), ops)
        }
    }

    impl ActuatorDriver for RecordingMotor {
        fn set_direction(&mut self, direction: Direction) -> Result<(), ActuationError> {
            self.ops.lock().unwrap().push(format!("dir {direction:?}"));
            Ok(())
        }

        fn set_power(&mut self, magnitude: f32) -> Result<(), ActuationError> {
            self.ops.lock().unwrap().push(format!("pwr {magnitude:.2}"));
            Ok(())
        }

        fn stop(&mut self) -> Result<(), ActuationError> {
            self.ops.lock().unwrap().push("stop".into());
            Ok(())
        }
    }

    /// Fails every power write once `ok_writes` is exhausted.
    struct FlakyMotor {
        ok_writes: u32,
    }

    impl ActuatorDriver for FlakyMotor {
        fn set_direction(&mut self, _: Direction) -> Result<(), ActuationError> {
            Ok(())
        }

        fn set_power(&mut self, _: f32) -> Result<(), ActuationError> {
            if self.ok_writes == 0 {
                return Err(ActuationError::HardwareNotReady);
            }
            self.ok_writes -= 1;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), ActuationError> {
            Ok(())
        }
    }

    fn controller_with_sink() -> (DualMotorController, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let (left, right, _) = RecordingMotor::pair();
        (DualMotorController::new(left, right, sink.clone()), sink)
    }

    #[test]
    fn drive_round_trips_through_state() {
        let (motors, _) = controller_with_sink();
        motors
            .drive(0.4, Direction::Forward, 0.9, Direction::Backward)
            .unwrap();

        let state = motors.state();
        assert_eq!(state.left.speed, 0.4);
        assert_eq!(state.left.direction, Direction::Forward);
        assert_eq!(state.right.speed, 0.9);
        assert_eq!(state.right.direction, Direction::Backward);
    }

    #[test]
    fn drive_applies_left_before_right() {
        let sink = Arc::new(MemorySink::default());
        let (left, right, ops) = RecordingMotor::pair();
        let motors = DualMotorController::new(left, right, sink);
        motors
            .drive(0.5, Direction::Forward, 0.5, Direction::Forward)
            .unwrap();

        let ops = ops.lock().unwrap();
        assert_eq!(
            *ops,
            vec!["dir Forward", "pwr 0.50", "dir Forward", "pwr 0.50"]
        );
    }

    #[test]
    fn stop_is_idempotent() {
        let (motors, _) = controller_with_sink();
        motors.forward(0.75).unwrap();

        motors.stop().unwrap();
        let once = motors.state();
        motors.stop().unwrap();
        motors.stop().unwrap();

        assert_eq!(motors.state(), once);
        assert_eq!(once, ActuatorState::STOPPED);
    }

    #[test]
    fn turn_primitives_use_half_speed_inner_side() {
        let (motors, _) = controller_with_sink();

        motors.turn_left(0.6).unwrap();
        let state = motors.state();
        assert!((state.left.speed - 0.3).abs() < 1e-6);
        assert_eq!(state.left.direction, Direction::Backward);
        assert_eq!(state.right.speed, 0.6);
        assert_eq!(state.right.direction, Direction::Forward);

        motors.turn_right(0.6).unwrap();
        let state = motors.state();
        assert_eq!(state.left.speed, 0.6);
        assert_eq!(state.left.direction, Direction::Forward);
        assert!((state.right.speed - 0.3).abs() < 1e-6);
        assert_eq!(state.right.direction, Direction::Backward);
    }

    #[test]
    fn spin_primitives_use_equal_opposite_sides() {
        let (motors, _) = controller_with_sink();
        motors.spin_left(0.35).unwrap();

        let state = motors.state();
        assert_eq!(state.left.speed, 0.35);
        assert_eq!(state.left.direction, Direction::Backward);
        assert_eq!(state.right.speed, 0.35);
        assert_eq!(state.right.direction, Direction::Forward);
    }

    #[test]
    fn partial_drive_failure_reports_error_and_reads_stopped() {
        let sink = Arc::new(MemorySink::default());
        let motors = DualMotorController::new(
            Box::new(FlakyMotor { ok_writes: 1 }),
            Box::new(FlakyMotor { ok_writes: 0 }),
            sink,
        );

        let result = motors.drive(0.5, Direction::Forward, 0.5, Direction::Forward);
        assert!(matches!(result, Err(ActuationError::HardwareNotReady)));
        assert_eq!(motors.state(), ActuatorState::STOPPED);
    }

    /// Forwards actuation events into the same log the motors write to.
    struct OpsSink {
        ops: Arc<Mutex<Vec<String>>>,
    }

    impl TelemetrySink for OpsSink {
        fn record(&self, event: TelemetryEvent) {
            if let TelemetryEvent::Actuation { left_speed, .. } = event {
                self.ops.lock().unwrap().push(format!("evt {left_speed:.2}"));
            }
        }
    }

    #[test]
    fn telemetry_stays_in_apply_order_under_contention() {
        let (left, right, ops) = RecordingMotor::pair();
        let motors = Arc::new(DualMotorController::new(
            left,
            right,
            Arc::new(OpsSink { ops: ops.clone() }),
        ));

        let spawn_driver = |speed: f32| {
            let motors = motors.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    motors.forward(speed).unwrap();
                }
            })
        };
        let a = spawn_driver(0.1);
        let b = spawn_driver(0.2);
        a.join().unwrap();
        b.join().unwrap();

        // Each drive must appear as one uninterrupted group ending with its
        // own event: dir, pwr, dir, pwr, evt, all at one speed.
        let ops = ops.lock().unwrap();
        assert_eq!(ops.len(), 100 * 5);
        for group in ops.chunks(5) {
            let speed = &group[1][4..];
            assert_eq!(group[0], "dir Forward");
            assert_eq!(group[2], "dir Forward");
            assert_eq!(group[3], group[1]);
            assert_eq!(group[4], format!("evt {speed}"));
        }
    }

    #[test]
    fn every_state_change_emits_one_actuation_event() {
        let (motors, sink) = controller_with_sink();
        motors.forward(0.75).unwrap();
        motors.stop().unwrap();

        let events = sink.events();
        // forward, explicit stop (the drop-time stop fires after the test)
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            TelemetryEvent::Actuation {
                left_speed,
                right_speed,
                ..
            } if left_speed == 0.75 && right_speed == 0.75
        ));
    }
}
