// Recording instrument
// Keeps every call it receives; stands in for a synth in headless runs and tests

use crate::instrument::drum_machine::DrumVoice;
use crate::instrument::{Instrument, ScheduledEvent, SongContext};
use std::sync::{Arc, Mutex, PoisonError};

/// One call received by an `EventRecorder`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstrumentCall {
    Schedule(ScheduledEvent),
    Update(f64),
    Stop(f64),
    /// Drum voice hit
    Trigger(f64),
}

/// Shared handle to a recorder's call log
#[derive(Debug, Clone, Default)]
pub struct RecorderLog {
    calls: Arc<Mutex<Vec<InstrumentCall>>>,
}

impl RecorderLog {
    fn push(&self, call: InstrumentCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Snapshot of all calls so far
    pub fn calls(&self) -> Vec<InstrumentCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Only the scheduled events, in arrival order
    pub fn scheduled(&self) -> Vec<ScheduledEvent> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                InstrumentCall::Schedule(scheduled) => Some(scheduled),
                _ => None,
            })
            .collect()
    }

    pub fn stop_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, InstrumentCall::Stop(_)))
            .count()
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Instrument that records what it is asked to play
pub struct EventRecorder {
    name: String,
    log: RecorderLog,
    record_updates: bool,
}

impl EventRecorder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: RecorderLog::default(),
            record_updates: false,
        }
    }

    /// Also record `on_update` polls (there are many per note tick)
    pub fn with_updates(mut self, record_updates: bool) -> Self {
        self.record_updates = record_updates;
        self
    }

    pub fn log(&self) -> RecorderLog {
        self.log.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Instrument for EventRecorder {
    fn schedule_event(&mut self, scheduled: ScheduledEvent, _ctx: &SongContext) {
        log::trace!("{}: {} at {:.5}", self.name, scheduled.event, scheduled.time);
        self.log.push(InstrumentCall::Schedule(scheduled));
    }

    fn on_update(&mut self, now: f64, _ctx: &SongContext) {
        if self.record_updates {
            self.log.push(InstrumentCall::Update(now));
        }
    }

    fn on_stop(&mut self, now: f64) {
        log::trace!("{}: stop at {:.5}", self.name, now);
        self.log.push(InstrumentCall::Stop(now));
    }
}

impl DrumVoice for EventRecorder {
    fn schedule_play(&mut self, now: f64) {
        log::trace!("{}: hit at {:.5}", self.name, now);
        self.log.push(InstrumentCall::Trigger(now));
    }

    fn on_stop(&mut self, now: f64) {
        self.log.push(InstrumentCall::Stop(now));
    }
}
