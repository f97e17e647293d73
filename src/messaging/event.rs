// Player events - what the scheduler tells observers

use crate::instrument::InstrumentId;
use crate::sequencer::SlotId;
use crate::sequencer::event::{Event, Tick};

/// Listener categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Beat,
    Instrument,
    PatternAdvance,
}

/// A scheduler event stamped with the audio time it refers to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    /// Start of a beat (every fourth note tick)
    Beat { beat: u64, time: f64 },

    /// A pattern event dispatched to an instrument
    Instrument {
        slot_id: SlotId,
        instrument_id: InstrumentId,
        event: Event,
        time: f64,
    },

    /// A slot's position within its own loop
    PatternAdvance {
        slot_id: SlotId,
        pattern_time: Tick,
        time: f64,
    },
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::Beat { .. } => EventKind::Beat,
            PlayerEvent::Instrument { .. } => EventKind::Instrument,
            PlayerEvent::PatternAdvance { .. } => EventKind::PatternAdvance,
        }
    }

    /// Audio time (seconds) the event refers to
    pub fn time(&self) -> f64 {
        match *self {
            PlayerEvent::Beat { time, .. }
            | PlayerEvent::Instrument { time, .. }
            | PlayerEvent::PatternAdvance { time, .. } => time,
        }
    }

    pub fn slot_id(&self) -> Option<SlotId> {
        match *self {
            PlayerEvent::Beat { .. } => None,
            PlayerEvent::Instrument { slot_id, .. }
            | PlayerEvent::PatternAdvance { slot_id, .. } => Some(slot_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let beat = PlayerEvent::Beat { beat: 3, time: 1.5 };
        assert_eq!(beat.kind(), EventKind::Beat);
        assert_eq!(beat.time(), 1.5);
        assert_eq!(beat.slot_id(), None);

        let note = PlayerEvent::Instrument {
            slot_id: 2,
            instrument_id: 4,
            event: Event::NoteOff,
            time: 0.25,
        };
        assert_eq!(note.kind(), EventKind::Instrument);
        assert_eq!(note.slot_id(), Some(2));

        let advance = PlayerEvent::PatternAdvance {
            slot_id: 1,
            pattern_time: 7,
            time: 0.875,
        };
        assert_eq!(advance.kind(), EventKind::PatternAdvance);
        assert_eq!(advance.time(), 0.875);
    }
}
