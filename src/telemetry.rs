// Telemetry event types and sink abstraction
//
// One event per actuation change and per control decision. Sinks must never
// block the control loops; the channel sink drops events when the consumer
// falls behind.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::control::Decision;
use crate::motor::Direction;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Applied motor command pair.
    Actuation {
        left_speed: f32,
        left_dir: Direction,
        right_speed: f32,
        right_dir: Direction,
        timestamp_ms: u64,
    },
    /// Control decision taken this tick.
    Decision {
        decision: Decision,
        timestamp_ms: u64,
    },
    /// Safety stop fired after prolonged silence.
    QuietStop { timestamp_ms: u64 },
    /// Tick-local fault absorbed by a loop.
    Fault {
        detail: String,
        timestamp_ms: u64,
    },
}

/// Milliseconds since the Unix epoch, for event timestamps.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Destination for telemetry events. Implementations must not block and
/// must not call back into the motor controller (events can be recorded
/// while its lock is held).
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Emits each event as a JSON line through the tracing subscriber.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn record(&self, event: TelemetryEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "telemetry", "{json}"),
            Err(e) => warn!("failed to serialize telemetry event: {e}"),
        }
    }
}

/// Forwards events into a bounded channel, dropping on overflow so the
/// control loops are never back-pressured by a slow consumer.
pub struct ChannelSink {
    tx: mpsc::Sender<TelemetryEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelSink {
    fn record(&self, event: TelemetryEvent) {
        if self.tx.try_send(event).is_err() {
            warn!("telemetry channel full, dropping event");
        }
    }
}

/// Collects events in memory for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink(pub std::sync::Mutex<Vec<TelemetryEvent>>);

#[cfg(test)]
impl MemorySink {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.0.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TelemetrySink for MemorySink {
    fn record(&self, event: TelemetryEvent) {
        self.0.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actuation_event_serializes_with_tag() {
        let event = TelemetryEvent::Actuation {
            left_speed: 0.75,
            left_dir: Direction::Forward,
            right_speed: 0.75,
            right_dir: Direction::Forward,
            timestamp_ms: 1234,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"actuation\""));
        assert!(json.contains("\"left_dir\":\"forward\""));
        assert!(json.contains("\"timestamp_ms\":1234"));
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.record(TelemetryEvent::QuietStop { timestamp_ms: 1 });
        sink.record(TelemetryEvent::QuietStop { timestamp_ms: 2 });

        let first = rx.try_recv().unwrap();
        assert!(matches!(first, TelemetryEvent::QuietStop { timestamp_ms: 1 }));
        assert!(rx.try_recv().is_err());
    }
}
