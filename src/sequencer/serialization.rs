// Pattern and song persistence
// Patterns travel delta-encoded (JSON for interchange, RON for song files)

use crate::config::{ConfigError, PlayerConfig};
use crate::instrument::InstrumentId;
use crate::sequencer::SlotId;
use crate::sequencer::event::TimedEvent;
use crate::sequencer::pattern::Pattern;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    Ron(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ron::Error> for SerializationError {
    fn from(err: ron::Error) -> Self {
        SerializationError::Ron(err.to_string())
    }
}

impl From<ron::error::SpannedError> for SerializationError {
    fn from(err: ron::error::SpannedError) -> Self {
        SerializationError::Ron(err.to_string())
    }
}

/// On-disk pattern: events as deltas from the previous event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternData {
    pub events: Vec<TimedEvent>,
    pub instrument_id: InstrumentId,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub play_once: bool,
}

impl From<&Pattern> for PatternData {
    fn from(pattern: &Pattern) -> Self {
        Self {
            events: pattern.to_deltas(),
            instrument_id: pattern.instrument_id,
            play_once: pattern.play_once,
        }
    }
}

impl From<PatternData> for Pattern {
    fn from(data: PatternData) -> Self {
        Pattern::from_deltas(&data.events, data.instrument_id).with_play_once(data.play_once)
    }
}

/// Serialize a pattern to delta-encoded JSON
pub fn pattern_to_json(pattern: &Pattern) -> Result<String, SerializationError> {
    Ok(serde_json::to_string(&PatternData::from(pattern))?)
}

/// Deserialize a pattern from delta-encoded JSON
pub fn pattern_from_json(json: &str) -> Result<Pattern, SerializationError> {
    let data: PatternData = serde_json::from_str(json)?;
    Ok(data.into())
}

/// One track slot in a song file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongSlot {
    pub slot_id: SlotId,
    pub pattern: PatternData,
}

/// A whole arrangement: tempo plus the pattern in each slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongFile {
    pub bpm: f64,
    #[serde(default)]
    pub slots: Vec<SongSlot>,
}

impl SongFile {
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm,
            slots: Vec::new(),
        }
    }

    pub fn with_slot(mut self, slot_id: SlotId, pattern: &Pattern) -> Self {
        self.slots.push(SongSlot {
            slot_id,
            pattern: pattern.into(),
        });
        self
    }

    /// Slot patterns in file order
    pub fn patterns(&self) -> Vec<(SlotId, Pattern)> {
        self.slots
            .iter()
            .map(|slot| (slot.slot_id, slot.pattern.clone().into()))
            .collect()
    }

    /// `base` with the song's tempo, validated
    pub fn player_config(&self, base: &PlayerConfig) -> Result<PlayerConfig, ConfigError> {
        base.with_bpm(self.bpm)
    }

    pub fn to_ron(&self) -> Result<String, SerializationError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn from_ron(source: &str) -> Result<Self, SerializationError> {
        Ok(ron::from_str(source)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SerializationError> {
        std::fs::write(path.as_ref(), self.to_ron()?)?;
        log::debug!("Saved song to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SerializationError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_ron(&source)
    }
}
