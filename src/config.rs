// Player configuration
// Loaded from RON; every field has a default so partial files are fine

use crate::messaging::bus::DEFAULT_BUS_CAPACITY;
use crate::messaging::queue::DEFAULT_QUEUE_CAPACITY;
use crate::sequencer::timeline::{SCHEDULE_AHEAD_TIME, Tempo, UPDATE_MULTIPLIER};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Scheduler and runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Song tempo
    pub bpm: f64,

    /// Look-ahead window in seconds
    pub schedule_ahead_time: f64,

    /// Timer period in milliseconds
    pub lookahead_ms: u64,

    /// `on_update` calls per note tick
    pub update_multiplier: u32,

    /// Also buffer events for pull-mode consumers
    pub use_event_queue: bool,

    /// Event bus ring buffer size
    pub bus_capacity: usize,

    /// Undrained events the pull-mode queue keeps before dropping new ones
    pub queue_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            schedule_ahead_time: SCHEDULE_AHEAD_TIME,
            lookahead_ms: 15,
            update_multiplier: UPDATE_MULTIPLIER,
            use_event_queue: false,
            bus_capacity: DEFAULT_BUS_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a RON document
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_ron_str(&source)?;
        log::debug!("Loaded player config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !Tempo::is_valid_bpm(self.bpm) {
            return Err(ConfigError::Invalid(format!(
                "bpm {} outside {}..={}",
                self.bpm,
                Tempo::MIN_BPM,
                Tempo::MAX_BPM
            )));
        }
        if self.schedule_ahead_time.is_nan() || self.schedule_ahead_time <= 0.0 {
            return Err(ConfigError::Invalid(
                "schedule_ahead_time must be positive".to_string(),
            ));
        }
        if self.lookahead_ms == 0 {
            return Err(ConfigError::Invalid(
                "lookahead_ms must be positive".to_string(),
            ));
        }
        if self.update_multiplier == 0 {
            return Err(ConfigError::Invalid(
                "update_multiplier must be at least 1".to_string(),
            ));
        }
        if self.bus_capacity == 0 {
            return Err(ConfigError::Invalid(
                "bus_capacity must be positive".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Tempo for `bpm`, clamped into the valid range; NaN falls back to the default
    pub fn tempo(&self) -> Tempo {
        if self.bpm.is_nan() {
            return Tempo::default();
        }
        Tempo::new(self.bpm.clamp(Tempo::MIN_BPM, Tempo::MAX_BPM))
    }

    /// Copy with `bpm` replaced, validated
    pub fn with_bpm(&self, bpm: f64) -> Result<Self, ConfigError> {
        let config = Self {
            bpm,
            ..self.clone()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn lookahead(&self) -> Duration {
        Duration::from_millis(self.lookahead_ms)
    }
}
