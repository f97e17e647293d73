// Sequencer module
// Pattern model, musical clock, look-ahead scheduler and its playback runtime

pub mod event;
pub mod note;
pub mod pattern;
pub mod player;
pub mod scheduler;
pub mod serialization;
pub mod timeline;
pub mod transport;

pub use event::{Event, Pitch, Tick, TimedEvent, absolute_to_delta, delta_to_absolute};
pub use note::{EditorNote, notes_to_pattern};
pub use pattern::{Pattern, combine, concat, padded_length, repeat, silence, time_shift};
pub use player::MusicPlayer;
pub use scheduler::{PlaybackState, Scheduler};
pub use timeline::{MusicalClock, Tempo};
pub use transport::{SharedState, TransportState};

use crate::audio::ClockError;
use crate::config::ConfigError;
use thiserror::Error;

/// Track slot address
pub type SlotId = u32;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Audio clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Invalid player configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start scheduler thread: {0}")]
    Thread(String),
}

pub type PlayerResult<T> = Result<T, PlayerError>;
