// Sequencer event types
// Pattern-level instrument commands and their delta/absolute timing encodings

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semitone pitch (MIDI numbering, 60 = C4)
pub type Pitch = i32;

/// Time in note ticks (quarter-beat subdivisions)
pub type Tick = u32;

const TAG_NOTE_ON: i64 = 0;
const TAG_NOTE_OFF: i64 = 1;
const TAG_SET_PORTAMENTO: i64 = 2;
const TAG_NOOP: i64 = 3;

/// Instrument command carried by a pattern
///
/// On the wire an event is a compact array whose first element is the tag:
/// `[0, pitch]`, `[1]`, `[2, pitch, glide]`, `[3]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<i64>", try_from = "Vec<i64>")]
pub enum Event {
    NoteOn { pitch: Pitch },
    NoteOff,
    /// Glide from the current pitch to `pitch` over `glide` note ticks
    SetPortamento { pitch: Pitch, glide: Tick },
    /// Declares elapsed time without content
    NoOp,
}

impl Event {
    pub fn note_on(pitch: Pitch) -> Self {
        Event::NoteOn { pitch }
    }

    pub fn portamento(pitch: Pitch, glide: Tick) -> Self {
        Event::SetPortamento { pitch, glide }
    }

    pub fn is_note_off(&self) -> bool {
        matches!(self, Event::NoteOff)
    }
}

impl From<Event> for Vec<i64> {
    fn from(event: Event) -> Self {
        match event {
            Event::NoteOn { pitch } => vec![TAG_NOTE_ON, pitch as i64],
            Event::NoteOff => vec![TAG_NOTE_OFF],
            Event::SetPortamento { pitch, glide } => {
                vec![TAG_SET_PORTAMENTO, pitch as i64, glide as i64]
            }
            Event::NoOp => vec![TAG_NOOP],
        }
    }
}

impl TryFrom<Vec<i64>> for Event {
    type Error = String;

    fn try_from(raw: Vec<i64>) -> Result<Self, Self::Error> {
        let arg = |index: usize| {
            raw.get(index)
                .copied()
                .ok_or_else(|| format!("event {:?} is missing argument {}", raw, index))
        };

        match raw.first().copied() {
            Some(TAG_NOTE_ON) => Ok(Event::NoteOn {
                pitch: arg(1)? as Pitch,
            }),
            Some(TAG_NOTE_OFF) => Ok(Event::NoteOff),
            Some(TAG_SET_PORTAMENTO) => {
                let glide = arg(2)?;
                if glide < 0 {
                    return Err(format!("negative portamento glide {}", glide));
                }
                Ok(Event::SetPortamento {
                    pitch: arg(1)? as Pitch,
                    glide: glide as Tick,
                })
            }
            Some(TAG_NOOP) => Ok(Event::NoOp),
            Some(tag) => Err(format!("unknown event tag {}", tag)),
            None => Err("empty event".to_string()),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::NoteOn { pitch } => write!(f, "NoteOn({})", pitch),
            Event::NoteOff => write!(f, "NoteOff"),
            Event::SetPortamento { pitch, glide } => {
                write!(f, "SetPortamento({}, {})", pitch, glide)
            }
            Event::NoOp => write!(f, "NoOp"),
        }
    }
}

/// An event positioned in pattern time
///
/// `time` is either a delta from the previous event or an absolute offset
/// from the pattern start, depending on the pipeline stage. Serialized as a
/// `[time, event]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(Tick, Event)", into = "(Tick, Event)")]
pub struct TimedEvent {
    pub time: Tick,
    pub event: Event,
}

impl TimedEvent {
    pub fn new(time: Tick, event: Event) -> Self {
        Self { time, event }
    }
}

impl From<(Tick, Event)> for TimedEvent {
    fn from((time, event): (Tick, Event)) -> Self {
        Self { time, event }
    }
}

impl From<TimedEvent> for (Tick, Event) {
    fn from(timed: TimedEvent) -> Self {
        (timed.time, timed.event)
    }
}

/// Convert delta-encoded events to absolute offsets (running sum)
pub fn delta_to_absolute(events: &[TimedEvent]) -> Vec<TimedEvent> {
    let mut total: Tick = 0;

    events
        .iter()
        .map(|timed| {
            total += timed.time;
            TimedEvent::new(total, timed.event)
        })
        .collect()
}

/// Convert absolute offsets to delta encoding (running difference)
///
/// Absolute offsets must be non-decreasing.
pub fn absolute_to_delta(events: &[TimedEvent]) -> Vec<TimedEvent> {
    let mut last: Tick = 0;

    events
        .iter()
        .map(|timed| {
            debug_assert!(
                timed.time >= last,
                "absolute event times must be non-decreasing ({} after {})",
                timed.time,
                last
            );
            let delta = timed.time.saturating_sub(last);
            last = timed.time;
            TimedEvent::new(delta, timed.event)
        })
        .collect()
}
