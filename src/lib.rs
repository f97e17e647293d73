// Lookahead Sequencer - Library exports for the demo, tests and benchmarks

pub mod audio;
pub mod config;
pub mod instrument;
pub mod messaging;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::{AudioClock, ClockError, ManualClock, SystemClock};
pub use config::{ConfigError, PlayerConfig};
pub use instrument::{
    Arpeggiator, DrumMachine, DrumVoice, EventRecorder, Instrument, InstrumentId, ScheduledEvent,
    SongContext,
};
pub use messaging::{EventBus, EventKind, EventQueue, EventSink, PlayerEvent, Subscription};
pub use sequencer::serialization::{SerializationError, SongFile, pattern_from_json, pattern_to_json};
pub use sequencer::{
    EditorNote, Event, MusicPlayer, Pattern, PlayerError, PlayerResult, Scheduler, SlotId, Tempo,
    TimedEvent, TransportState, combine, concat, notes_to_pattern, repeat, silence, time_shift,
};
