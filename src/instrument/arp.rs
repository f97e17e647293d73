// Arpeggiator - decorator cycling a held note through interval offsets
// Drives the wrapped instrument from `on_update`

use crate::instrument::{Instrument, ScheduledEvent, SongContext};
use crate::sequencer::event::{Event, Pitch};

/// Root, minor third, fifth
pub const MINOR_ARP: [Pitch; 3] = [0, 3, 7];

/// Wraps an instrument and turns held notes into arpeggios
pub struct Arpeggiator<I: Instrument> {
    inner: I,
    note_offsets: Vec<Pitch>,
    /// Length of each arpeggio step (seconds)
    note_length: f64,

    start_time: Option<f64>,
    end_time: Option<f64>,
    root_note: Pitch,
}

impl<I: Instrument> Arpeggiator<I> {
    pub fn new(inner: I, note_offsets: Vec<Pitch>, note_length: f64) -> Self {
        assert!(!note_offsets.is_empty(), "Arpeggio needs at least one offset");
        assert!(note_length > 0.0, "Arpeggio note length must be > 0");

        Self {
            inner,
            note_offsets,
            note_length,
            start_time: None,
            end_time: None,
            root_note: 0,
        }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// Whether a held note is currently being arpeggiated
    pub fn is_active(&self) -> bool {
        self.start_time.is_some()
    }
}

impl<I: Instrument> Instrument for Arpeggiator<I> {
    fn schedule_event(&mut self, scheduled: ScheduledEvent, ctx: &SongContext) {
        match scheduled.event {
            Event::NoteOn { pitch } => {
                self.start_time = Some(scheduled.time);
                self.root_note = pitch;
            }
            Event::NoteOff => {
                self.end_time = Some(scheduled.time);
                self.inner
                    .schedule_event(ScheduledEvent::new(scheduled.time, Event::NoteOff), ctx);
            }
            Event::SetPortamento { pitch, .. } => {
                self.root_note = pitch;
            }
            Event::NoOp => {}
        }
    }

    fn on_update(&mut self, now: f64, ctx: &SongContext) {
        let Some(start_time) = self.start_time else {
            return;
        };

        if let Some(end_time) = self.end_time {
            if end_time >= start_time {
                self.start_time = None;
                self.end_time = None;
                return;
            }
        }

        let step = ((now - start_time).max(0.0) / self.note_length).floor() as usize;
        let offset = self.note_offsets[step % self.note_offsets.len()];

        self.inner.schedule_event(
            ScheduledEvent::new(now, Event::note_on(self.root_note + offset)),
            ctx,
        );
        self.inner
            .schedule_event(ScheduledEvent::new(now + self.note_length, Event::NoteOff), ctx);
    }

    fn on_stop(&mut self, now: f64) {
        self.start_time = None;
        self.inner.on_stop(now);
    }
}
