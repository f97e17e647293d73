// Timeline - Musical clock and tempo
// Maps note ticks onto audio-clock seconds

use std::fmt;
use std::time::Duration;

/// Note ticks per beat (a note tick is a sixteenth note in 4/4)
pub const NOTES_PER_BEAT: u64 = 4;

/// `on_update` polls per note tick
pub const UPDATE_MULTIPLIER: u32 = 8;

/// How far ahead of the audio clock events are dispatched (seconds)
pub const SCHEDULE_AHEAD_TIME: f64 = 0.05;

/// Default period of the scheduler timer
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_millis(15);

/// NoteOffs are dispatched this long before the next note tick (seconds)
pub const NOTE_OFF_EPSILON: f64 = 0.00001;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub const MIN_BPM: f64 = 20.0;
    pub const MAX_BPM: f64 = 999.0;

    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Self {
        assert!(
            Self::is_valid_bpm(bpm),
            "BPM must be between 20 and 999"
        );
        Self { bpm }
    }

    pub fn is_valid_bpm(bpm: f64) -> bool {
        (Self::MIN_BPM..=Self::MAX_BPM).contains(&bpm)
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one note tick in seconds
    pub fn note_increment(&self) -> f64 {
        self.beat_duration_seconds() / NOTES_PER_BEAT as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// The transport's position: which note tick is next, and when it is due
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicalClock {
    /// Index of the next note tick to schedule
    pub current_note: u64,
    /// Audio-clock time (seconds) at which `current_note` is due
    pub next_note_time: f64,
}

impl MusicalClock {
    pub fn new() -> Self {
        Self {
            current_note: 0,
            next_note_time: 0.0,
        }
    }

    /// Move to the next note tick
    pub fn advance(&mut self, note_increment: f64) {
        self.next_note_time += note_increment;
        self.current_note += 1;
    }

    /// Whether the current note tick starts a beat
    pub fn is_beat(&self) -> bool {
        self.current_note % NOTES_PER_BEAT == 0
    }

    /// Beat containing the current note tick
    pub fn beat_index(&self) -> u64 {
        self.current_note / NOTES_PER_BEAT
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for MusicalClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_creation() {
        let tempo = Tempo::new(120.0);
        assert_eq!(tempo.bpm(), 120.0);
        assert_eq!(tempo.beat_duration_seconds(), 0.5);
        assert_eq!(tempo.note_increment(), 0.125);
    }

    #[test]
    #[should_panic]
    fn test_tempo_out_of_range() {
        Tempo::new(5.0);
    }

    #[test]
    fn test_tempo_display() {
        assert_eq!(Tempo::new(140.0).to_string(), "140.0 BPM");
    }

    #[test]
    fn test_clock_advance() {
        let mut clock = MusicalClock::new();
        assert!(clock.is_beat());

        clock.advance(0.125);
        assert_eq!(clock.current_note, 1);
        assert_eq!(clock.next_note_time, 0.125);
        assert!(!clock.is_beat());

        for _ in 0..3 {
            clock.advance(0.125);
        }
        assert!(clock.is_beat());
        assert_eq!(clock.beat_index(), 1);

        clock.reset();
        assert_eq!(clock, MusicalClock::new());
    }
}
