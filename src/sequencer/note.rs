// Editor notes
// Piano-roll notes (start + duration) and their conversion into patterns

use crate::instrument::{INSTRUMENT_DRUMS, InstrumentId};
use crate::sequencer::event::{Event, Pitch, Tick, TimedEvent};
use crate::sequencer::pattern::{DEFAULT_PATTERN_LENGTH, GRID_UNIT, Pattern, round_up_to_multiple_of};
use serde::{Deserialize, Serialize};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A note as drawn in a piano roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorNote {
    /// MIDI pitch (60 = C4)
    pub pitch: Pitch,

    /// Start in note ticks
    pub start: Tick,

    /// Length in note ticks
    pub duration: Tick,

    /// Glide into `pitch` instead of retriggering
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub portamento: bool,
}

impl EditorNote {
    pub fn new(pitch: Pitch, start: Tick, duration: Tick) -> Self {
        Self {
            pitch,
            start,
            duration,
            portamento: false,
        }
    }

    pub fn glide(pitch: Pitch, start: Tick, duration: Tick) -> Self {
        Self {
            portamento: true,
            ..Self::new(pitch, start, duration)
        }
    }

    /// First tick after the note
    pub fn end(&self) -> Tick {
        self.start + self.duration
    }

    /// Note name (e.g. "C4", "A#5")
    pub fn note_name(&self) -> String {
        midi_to_named_key(self.pitch)
    }
}

/// Convert piano-roll notes into a playable pattern
///
/// Drum patterns get no NoteOffs: drum voices are one-shots.
pub fn notes_to_pattern(notes: &[EditorNote], instrument_id: InstrumentId) -> Pattern {
    let skip_note_off = instrument_id == INSTRUMENT_DRUMS;
    let mut events = Vec::with_capacity(notes.len() * 2);

    for note in notes {
        if note.portamento {
            events.push(TimedEvent::new(
                note.start,
                Event::portamento(note.pitch, note.duration),
            ));
            continue;
        }

        events.push(TimedEvent::new(note.start, Event::note_on(note.pitch)));
        if !skip_note_off {
            // Released just before the next tick by the scheduler
            events.push(TimedEvent::new(note.end().saturating_sub(1), Event::NoteOff));
        }
    }

    // Stable: simultaneous events keep their insertion order
    events.sort_by_key(|timed| timed.time);

    Pattern::new(events, instrument_id)
}

/// Loop length shown by the editor for `notes`
pub fn editor_padded_length(notes: &[EditorNote]) -> Tick {
    match notes.iter().map(EditorNote::end).max() {
        Some(end) if end > 0 => round_up_to_multiple_of(end, GRID_UNIT),
        _ => DEFAULT_PATTERN_LENGTH,
    }
}

/// Parse a key name like "C4", "F#3" or "A-1"
pub fn named_key_to_midi(name: &str) -> Option<Pitch> {
    let split = name.find(|c: char| c == '-' || c.is_ascii_digit())?;
    let (key, octave) = name.split_at(split);

    let index = NOTE_NAMES.iter().position(|n| *n == key)? as Pitch;
    let octave: Pitch = octave.parse().ok()?;

    Some((octave + 1) * 12 + index)
}

/// Key name for a MIDI pitch (60 = "C4")
pub fn midi_to_named_key(pitch: Pitch) -> String {
    let octave = pitch.div_euclid(12) - 1;
    let index = pitch.rem_euclid(12) as usize;

    format!("{}{}", NOTE_NAMES[index], octave)
}
