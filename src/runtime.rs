// Fixed-cadence control loops with guaranteed stop on every exit path.
//
// One tokio task per control loop; both loops share the same
// DualMotorController. A perception fault is absorbed tick-locally (the loop
// has already issued its safety stop); an actuation fault tears the whole
// runtime down, stopping the motors first.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::{self, VisionParams, VoiceParams};
use crate::control::{AvoidanceLoop, ControlError, VoiceLoop};
use crate::motor::{DualMotorController, SimMotor};
use crate::perception::{
    ChannelUtterances, OccupancySensor, RegionOfInterest, SyntheticOccupancy, UtteranceSource,
};
use crate::telemetry::{self, LogSink, TelemetryEvent, TelemetrySink};

type RuntimeError = Box<dyn std::error::Error + Send + Sync>;

/// Which control loop(s) to run. Both variants may drive the same
/// controller concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    Vision,
    Voice,
    Both,
}

pub async fn run(mode: Mode) -> Result<(), RuntimeError> {
    let sink: Arc<dyn TelemetrySink> = Arc::new(LogSink);
    let motors = Arc::new(DualMotorController::new(
        Box::new(SimMotor::new("left")),
        Box::new(SimMotor::new("right")),
        sink.clone(),
    ));

    // Ensure a known state before the loops start issuing commands
    motors.stop()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: JoinSet<Result<(), ControlError>> = JoinSet::new();

    if matches!(mode, Mode::Vision | Mode::Both) {
        // Clear path with a simulated obstacle every few seconds
        let sensor = SyntheticOccupancy::new(6 * config::LOOP_HZ, 800, 8000);
        let vision = AvoidanceLoop::new(
            sensor,
            RegionOfInterest::default(),
            motors.clone(),
            sink.clone(),
            VisionParams::default(),
            SmallRng::from_entropy(),
        )?;
        tasks.spawn(run_vision(
            vision,
            motors.clone(),
            sink.clone(),
            shutdown_rx.clone(),
        ));
    }

    if matches!(mode, Mode::Voice | Mode::Both) {
        let (tx, rx) = std::sync::mpsc::channel();
        tokio::spawn(feed_stdin_utterances(tx));
        let voice = VoiceLoop::new(
            ChannelUtterances::new(rx),
            motors.clone(),
            sink.clone(),
            VoiceParams::default(),
            Instant::now(),
        )?;
        tasks.spawn(run_voice(
            voice,
            motors.clone(),
            sink.clone(),
            shutdown_rx.clone(),
        ));
    }

    info!(
        "runtime started: {:?} mode, {} Hz loop, {:?} quiet timeout",
        mode,
        config::LOOP_HZ,
        config::QUIET_TIMEOUT
    );

    let mut first_err: Option<RuntimeError> = None;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
        Some(res) = tasks.join_next() => {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => first_err = Some(e.into()),
                Err(e) => first_err = Some(e.into()),
            }
        }
    }

    let _ = shutdown_tx.send(true);
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) if first_err.is_none() => first_err = Some(e.into()),
            Err(e) if first_err.is_none() => first_err = Some(e.into()),
            _ => {}
        }
    }

    // Final stop regardless of how the loops ended
    motors.stop()?;
    info!("runtime stopped");

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn run_vision<S, R>(
    mut vision: AvoidanceLoop<S, R>,
    motors: Arc<DualMotorController>,
    sink: Arc<dyn TelemetrySink>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ControlError>
where
    S: OccupancySensor + 'static,
    R: Rng + Send + 'static,
{
    let mut tick = interval(Duration::from_millis(1000 / config::LOOP_HZ));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(e) = handle_tick(vision.tick(Instant::now()), &motors, &sink) {
                    return Err(e);
                }
            }
        }
    }
    motors.stop()?;
    Ok(())
}

async fn run_voice<S>(
    mut voice: VoiceLoop<S>,
    motors: Arc<DualMotorController>,
    sink: Arc<dyn TelemetrySink>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ControlError>
where
    S: UtteranceSource + 'static,
{
    let mut tick = interval(Duration::from_millis(1000 / config::LOOP_HZ));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(e) = handle_tick(voice.tick(Instant::now()), &motors, &sink) {
                    return Err(e);
                }
            }
        }
    }
    motors.stop()?;
    Ok(())
}

/// Absorb tick-local perception faults; escalate actuation faults after a
/// final stop attempt.
fn handle_tick(
    result: Result<(), ControlError>,
    motors: &DualMotorController,
    sink: &Arc<dyn TelemetrySink>,
) -> Result<(), ControlError> {
    match result {
        Ok(()) => Ok(()),
        Err(ControlError::Perception(e)) => {
            // The loop already issued its safety stop
            warn!("perception fault, continuing: {e}");
            sink.record(TelemetryEvent::Fault {
                detail: e.to_string(),
                timestamp_ms: telemetry::now_ms(),
            });
            Ok(())
        }
        Err(e @ ControlError::Actuation(_)) => {
            error!("actuator unreachable, shutting down: {e}");
            if motors.stop().is_err() {
                warn!("final stop attempt failed");
            }
            Err(e)
        }
    }
}

/// Treat stdin lines as recognized utterances so the voice loop is drivable
/// without a microphone.
async fn feed_stdin_utterances(tx: std::sync::mpsc::Sender<String>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}
