// Perception capability interfaces
//
// The control loops consume discrete signals, one per tick. Real sensors
// (camera thresholding, speech recognition) live behind these traits; both
// calls must have bounded latency so ticks keep a fixed cadence.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, TryRecvError};

/// Pixel rectangle sampled for obstacle occupancy, `x0..x1` by `y0..y1`.
#[derive(Debug, Clone, Copy)]
pub struct RegionOfInterest {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        // Front-facing band of a 640x480 frame
        Self {
            x0: 160,
            y0: 200,
            x1: 480,
            y1: 480,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PerceptionError {
    #[error("perception read timed out")]
    Timeout,

    #[error("sensor fault: {0}")]
    Device(String),
}

/// Obstacle-occupancy sampler: foreground pixel count inside the region.
pub trait OccupancySensor: Send {
    fn sample_occupancy(&mut self, roi: &RegionOfInterest) -> Result<u32, PerceptionError>;
}

/// Recognized-speech sampler. Returns `None` while no complete utterance is
/// buffered; never blocks past one window of `buffer_hint` samples.
pub trait UtteranceSource: Send {
    fn sample_utterance(&mut self, buffer_hint: usize)
    -> Result<Option<String>, PerceptionError>;
}

/// Scripted occupancy pattern for running the binary without a camera:
/// a clear path with a simulated obstacle every `period` ticks.
pub struct SyntheticOccupancy {
    tick: u64,
    period: u64,
    clear: u32,
    blocked: u32,
}

impl SyntheticOccupancy {
    pub fn new(period: u64, clear: u32, blocked: u32) -> Self {
        Self {
            tick: 0,
            period,
            clear,
            blocked,
        }
    }
}

impl OccupancySensor for SyntheticOccupancy {
    fn sample_occupancy(&mut self, _roi: &RegionOfInterest) -> Result<u32, PerceptionError> {
        self.tick += 1;
        if self.tick % self.period == 0 {
            Ok(self.blocked)
        } else {
            Ok(self.clear)
        }
    }
}

/// Utterance source backed by a channel, polled without blocking. The
/// runtime feeds it from stdin lines; tests feed it directly.
pub struct ChannelUtterances {
    rx: Receiver<String>,
}

impl ChannelUtterances {
    pub fn new(rx: Receiver<String>) -> Self {
        Self { rx }
    }
}

impl UtteranceSource for ChannelUtterances {
    fn sample_utterance(
        &mut self,
        _buffer_hint: usize,
    ) -> Result<Option<String>, PerceptionError> {
        match self.rx.try_recv() {
            Ok(text) => Ok(Some(text)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(PerceptionError::Device("utterance channel closed".into()))
            }
        }
    }
}

/// Fixed utterance sequence for tests.
pub struct ScriptedUtterances {
    script: VecDeque<Option<String>>,
}

impl ScriptedUtterances {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl UtteranceSource for ScriptedUtterances {
    fn sample_utterance(
        &mut self,
        _buffer_hint: usize,
    ) -> Result<Option<String>, PerceptionError> {
        Ok(self.script.pop_front().unwrap_or(None))
    }
}
