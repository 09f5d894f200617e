// Loop timing and driving parameters
use std::time::Duration;

// Control loop frequency (ticks per second)
pub const LOOP_HZ: u64 = 20;

// Cruise speed on a clear path
pub const FORWARD_SPEED: f32 = 0.75;

// Pivot-side speed during an avoidance arc
pub const TURN_SPEED: f32 = 0.65;

// Occupancy count above which the path is considered blocked
pub const AVOID_THRESHOLD: u32 = 5000;

// How long an avoidance turn runs before the loop re-evaluates
pub const TURN_DURATION: Duration = Duration::from_millis(600);

// Speed used for all voice-commanded movements
pub const VOICE_SPEED: f32 = 0.35;

// Silence duration before the voice loop forces a stop
pub const QUIET_TIMEOUT: Duration = Duration::from_secs(10);

// Audio window size hint passed to the utterance source
pub const AUDIO_BUFFER_HINT: usize = 4000;

/// Parameter validation errors, raised once at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be in [0, 1], got {value}")]
    SpeedOutOfRange { name: &'static str, value: f32 },

    #[error("{name} must be non-zero")]
    ZeroDuration { name: &'static str },

    #[error("avoid_threshold must be non-zero")]
    ZeroThreshold,
}

fn check_speed(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::SpeedOutOfRange { name, value })
    }
}

/// Tunables for the obstacle-avoidance loop.
#[derive(Debug, Clone)]
pub struct VisionParams {
    pub forward_speed: f32,
    pub turn_speed: f32,
    pub avoid_threshold: u32,
    pub turn_duration: Duration,
}

impl Default for VisionParams {
    fn default() -> Self {
        Self {
            forward_speed: FORWARD_SPEED,
            turn_speed: TURN_SPEED,
            avoid_threshold: AVOID_THRESHOLD,
            turn_duration: TURN_DURATION,
        }
    }
}

impl VisionParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_speed("forward_speed", self.forward_speed)?;
        check_speed("turn_speed", self.turn_speed)?;
        if self.avoid_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.turn_duration.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: "turn_duration",
            });
        }
        Ok(())
    }
}

/// Tunables for the voice command loop.
#[derive(Debug, Clone)]
pub struct VoiceParams {
    pub speed: f32,
    pub quiet_timeout: Duration,
    pub buffer_hint: usize,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            speed: VOICE_SPEED,
            quiet_timeout: QUIET_TIMEOUT,
            buffer_hint: AUDIO_BUFFER_HINT,
        }
    }
}

impl VoiceParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_speed("speed", self.speed)?;
        if self.quiet_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: "quiet_timeout",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(VisionParams::default().validate().is_ok());
        assert!(VoiceParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_speed() {
        let params = VisionParams {
            turn_speed: 1.3,
            ..VisionParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::SpeedOutOfRange {
                name: "turn_speed",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_threshold() {
        let params = VisionParams {
            avoid_threshold: 0,
            ..VisionParams::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::ZeroThreshold)));
    }

    #[test]
    fn rejects_zero_quiet_timeout() {
        let params = VoiceParams {
            quiet_timeout: Duration::ZERO,
            ..VoiceParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::ZeroDuration {
                name: "quiet_timeout"
            })
        ));
    }
}
