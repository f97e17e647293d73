// Instrument contract
// Every synthesis unit driven by the scheduler implements `Instrument`

pub mod arp;
pub mod drum_machine;
pub mod recorder;

pub use arp::{Arpeggiator, MINOR_ARP};
pub use drum_machine::{DrumMachine, DrumVoice};
pub use recorder::{EventRecorder, InstrumentCall, RecorderLog};

use crate::sequencer::event::{Event, Pitch};

/// Index of an instrument in the scheduler's rack
pub type InstrumentId = usize;

pub const INSTRUMENT_PWM_LEAD: InstrumentId = 0;
pub const INSTRUMENT_REESE: InstrumentId = 1;
pub const INSTRUMENT_PWM_LEAD_ARP: InstrumentId = 2;
pub const INSTRUMENT_DRUMS: InstrumentId = 3;
pub const INSTRUMENT_PAD: InstrumentId = 4;

pub const INSTRUMENT_IDS: [InstrumentId; 5] = [
    INSTRUMENT_PWM_LEAD,
    INSTRUMENT_REESE,
    INSTRUMENT_PWM_LEAD_ARP,
    INSTRUMENT_DRUMS,
    INSTRUMENT_PAD,
];

/// Song-wide values passed along with every instrument call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SongContext {
    pub bpm: f64,
}

impl SongContext {
    pub fn new(bpm: f64) -> Self {
        Self { bpm }
    }
}

/// An event pinned to an absolute audio-clock time (seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    pub time: f64,
    pub event: Event,
}

impl ScheduledEvent {
    pub fn new(time: f64, event: Event) -> Self {
        Self { time, event }
    }
}

/// Contract between the scheduler and a synthesis unit
///
/// Events arrive ahead of their audio time; implementations schedule
/// parameter changes rather than acting immediately.
pub trait Instrument: Send {
    /// Schedule `scheduled.event` to take effect at `scheduled.time`
    fn schedule_event(&mut self, scheduled: ScheduledEvent, ctx: &SongContext);

    /// Polled several times per note tick for units needing continuous
    /// modulation (arpeggios, ramps). Does nothing by default.
    fn on_update(&mut self, _now: f64, _ctx: &SongContext) {}

    /// Cancel everything pending and go silent at `now`. Must be idempotent.
    fn on_stop(&mut self, now: f64);
}

impl<I: Instrument + ?Sized> Instrument for Box<I> {
    fn schedule_event(&mut self, scheduled: ScheduledEvent, ctx: &SongContext) {
        (**self).schedule_event(scheduled, ctx)
    }

    fn on_update(&mut self, now: f64, ctx: &SongContext) {
        (**self).on_update(now, ctx)
    }

    fn on_stop(&mut self, now: f64) {
        (**self).on_stop(now)
    }
}

const ROOT_A4: f64 = 440.0;

/// Convert a MIDI pitch to frequency in Hz (A4 = 69 = 440 Hz)
pub fn midi_to_freq(pitch: Pitch) -> f64 {
    ROOT_A4 * 2f64.powf((pitch - 69) as f64 / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_to_freq() {
        assert!((midi_to_freq(69) - 440.0).abs() < 1e-9);
        assert!((midi_to_freq(81) - 880.0).abs() < 1e-9);
        assert!((midi_to_freq(60) - 261.6256).abs() < 1e-3);
    }

    #[test]
    fn test_boxed_instrument_forwards() {
        let recorder = EventRecorder::new("boxed");
        let log = recorder.log();
        let mut boxed: Box<dyn Instrument> = Box::new(recorder.with_updates(true));
        let ctx = SongContext::new(120.0);

        boxed.schedule_event(ScheduledEvent::new(1.0, Event::note_on(60)), &ctx);
        boxed.on_update(1.5, &ctx);
        boxed.on_stop(2.0);

        assert_eq!(
            log.calls(),
            vec![
                InstrumentCall::Schedule(ScheduledEvent::new(1.0, Event::note_on(60))),
                InstrumentCall::Update(1.5),
                InstrumentCall::Stop(2.0),
            ]
        );
    }
}
