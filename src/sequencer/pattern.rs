// Pattern - Loopable sequence of timed instrument events
// A pattern is routed to one instrument slot and loops on a 16-tick grid

use crate::instrument::InstrumentId;
use crate::sequencer::event::{Event, Tick, TimedEvent, absolute_to_delta, delta_to_absolute};
use serde::{Deserialize, Serialize};

/// Loop lengths are rounded up to a multiple of this many note ticks
pub const GRID_UNIT: Tick = 16;

/// Loop length of a pattern without events
pub const DEFAULT_PATTERN_LENGTH: Tick = 16;

/// Round `value` up to the nearest multiple of `multiple`
pub fn round_up_to_multiple_of(value: Tick, multiple: Tick) -> Tick {
    value.div_ceil(multiple) * multiple
}

/// Length of a pattern whose last event sits at `last_event_time`
///
/// A pattern whose only events sit at tick 0 has length 0: it takes no room
/// in `concat`/`repeat`. The scheduler still loops it every grid unit.
pub fn padded_length(last_event_time: Option<Tick>) -> Tick {
    match last_event_time {
        None => DEFAULT_PATTERN_LENGTH,
        Some(time) => round_up_to_multiple_of(time, GRID_UNIT),
    }
}

/// A sequence of events in absolute time, routed to one instrument
///
/// Patterns are values: every transform below returns a new pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    /// Events with absolute offsets, non-decreasing
    pub events: Vec<TimedEvent>,

    /// Instrument slot receiving this pattern's commands
    pub instrument_id: InstrumentId,

    /// Do not rewind the cursor when the transport wraps the loop
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub play_once: bool,
}

impl Pattern {
    /// Create a pattern from events already in absolute time
    pub fn new(events: Vec<TimedEvent>, instrument_id: InstrumentId) -> Self {
        Self {
            events,
            instrument_id,
            play_once: false,
        }
    }

    /// Create a pattern without events
    pub fn empty(instrument_id: InstrumentId) -> Self {
        Self::new(Vec::new(), instrument_id)
    }

    /// Create a pattern from delta-encoded events
    pub fn from_deltas(deltas: &[TimedEvent], instrument_id: InstrumentId) -> Self {
        Self::new(delta_to_absolute(deltas), instrument_id)
    }

    /// Events re-encoded as deltas (for storage)
    pub fn to_deltas(&self) -> Vec<TimedEvent> {
        absolute_to_delta(&self.events)
    }

    pub fn with_play_once(mut self, play_once: bool) -> Self {
        self.play_once = play_once;
        self
    }

    pub fn with_instrument(mut self, instrument_id: InstrumentId) -> Self {
        self.instrument_id = instrument_id;
        self
    }

    /// Check if pattern has no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Absolute time of the last event
    pub fn last_event_time(&self) -> Option<Tick> {
        self.events.last().map(|timed| timed.time)
    }

    /// Loop length in note ticks
    pub fn padded_length(&self) -> Tick {
        padded_length(self.last_event_time())
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::empty(0)
    }
}

/// Shift every event of `pattern` later by `offset` ticks
pub fn time_shift(offset: Tick, pattern: &Pattern) -> Pattern {
    Pattern {
        events: pattern
            .events
            .iter()
            .map(|timed| TimedEvent::new(timed.time + offset, timed.event))
            .collect(),
        ..pattern.clone()
    }
}

/// Lay patterns end to end, each starting at the padded end of the previous
///
/// The result is routed to `instrument_id` whatever the inputs were routed to.
pub fn concat(instrument_id: InstrumentId, patterns: &[Pattern]) -> Pattern {
    let mut events = Vec::with_capacity(patterns.iter().map(Pattern::event_count).sum());
    let mut total: Tick = 0;

    for pattern in patterns {
        events.extend(time_shift(total, pattern).events);
        total += pattern.padded_length();
    }

    Pattern::new(events, instrument_id)
}

/// `times` back-to-back copies of `pattern` at padded-length spacing
pub fn repeat(times: usize, pattern: &Pattern) -> Pattern {
    let length = pattern.padded_length();
    let mut events = Vec::with_capacity(pattern.event_count() * times);

    for i in 0..times {
        events.extend(time_shift(length * i as Tick, pattern).events);
    }

    Pattern {
        events,
        ..pattern.clone()
    }
}

/// Merge patterns into one time-sorted sequence
///
/// Events at equal times keep their input order. The result takes the first
/// pattern's routing and `play_once` flag; merging nothing yields an empty
/// pattern on slot 0.
pub fn combine(patterns: &[Pattern]) -> Pattern {
    let Some(first) = patterns.first() else {
        return Pattern::default();
    };

    let mut events: Vec<TimedEvent> = patterns
        .iter()
        .flat_map(|pattern| pattern.events.iter().copied())
        .collect();

    // sort_by_key is stable, which keeps tie order
    events.sort_by_key(|timed| timed.time);

    Pattern {
        events,
        ..first.clone()
    }
}

/// Spacer of `duration` grid units
pub fn silence(duration: usize) -> Pattern {
    let silent_beat = Pattern::new(vec![TimedEvent::new(1, Event::NoOp)], 0);
    repeat(duration, &silent_beat)
}
