// Scheduler - look-ahead pattern clock
//
// Each `tick` schedules every note tick that falls inside the look-ahead
// window: due pattern events go to instruments ahead of their audio time and
// are republished to the event sinks with the same timestamps.
//
// The scheduler is synchronous and never reads a clock itself; the caller
// passes the current audio time in. `MusicPlayer` drives it from a timer thread.

use crate::config::PlayerConfig;
use crate::instrument::{Instrument, InstrumentId, ScheduledEvent, SongContext};
use crate::messaging::{EventSink, PlayerEvent};
use crate::sequencer::{PlayerResult, SlotId};
use crate::sequencer::event::Tick;
use crate::sequencer::pattern::{GRID_UNIT, Pattern};
use crate::sequencer::timeline::{MusicalClock, NOTE_OFF_EPSILON, Tempo};
use crate::sequencer::transport::{SharedState, TransportState};
use std::sync::Arc;

/// Read cursor of one track slot
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pattern: Pattern,
    /// Index of the next event to dispatch
    offset: usize,
    /// Cached loop length of `pattern`
    length: Tick,
}

/// Loop length the cursor wraps on; never zero
fn loop_length(pattern: &Pattern) -> Tick {
    pattern.padded_length().max(GRID_UNIT)
}

impl PlaybackState {
    fn new(pattern: Pattern, current_note: u64) -> Self {
        let length = loop_length(&pattern);
        Self {
            offset: (current_note % length as u64) as usize,
            pattern,
            length,
        }
    }

    /// Swap in a new pattern, keeping the cursor's relative position
    fn replace(&mut self, pattern: Pattern) {
        self.length = loop_length(&pattern);
        self.pattern = pattern;
        self.offset %= self.length as usize;
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> Tick {
        self.length
    }
}

/// Look-ahead pattern scheduler
pub struct Scheduler {
    tempo: Tempo,
    ctx: SongContext,
    schedule_ahead_time: f64,
    update_multiplier: u32,

    clock: MusicalClock,
    /// Insertion-ordered track slots
    slots: Vec<(SlotId, PlaybackState)>,
    instruments: Vec<Box<dyn Instrument>>,
    sinks: Vec<Arc<dyn EventSink>>,
    shared: Arc<SharedState>,
}

impl Scheduler {
    /// Build a stopped scheduler; fails if `config` does not validate
    pub fn new(
        config: &PlayerConfig,
        instruments: Vec<Box<dyn Instrument>>,
        shared: Arc<SharedState>,
    ) -> PlayerResult<Self> {
        config.validate()?;
        let tempo = config.tempo();

        Ok(Self {
            tempo,
            ctx: SongContext::new(tempo.bpm()),
            schedule_ahead_time: config.schedule_ahead_time,
            update_multiplier: config.update_multiplier.max(1),
            clock: MusicalClock::new(),
            slots: Vec::new(),
            instruments,
            sinks: Vec::new(),
            shared,
        })
    }

    /// Publish events to `sink` as well
    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn shared_state(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn context(&self) -> &SongContext {
        &self.ctx
    }

    /// Seconds per note tick
    pub fn note_increment(&self) -> f64 {
        self.tempo.note_increment()
    }

    pub fn current_note_index(&self) -> u64 {
        self.clock.current_note
    }

    pub fn next_note_time(&self) -> f64 {
        self.clock.next_note_time
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }

    /// Slot ids in insertion (dispatch) order
    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.slots.iter().map(|(id, _)| *id).collect()
    }

    pub fn playback_state(&self, slot_id: SlotId) -> Option<&PlaybackState> {
        self.slots
            .iter()
            .find(|(id, _)| *id == slot_id)
            .map(|(_, state)| state)
    }

    fn playback_state_mut(&mut self, slot_id: SlotId) -> Option<&mut PlaybackState> {
        self.slots
            .iter_mut()
            .find(|(id, _)| *id == slot_id)
            .map(|(_, state)| state)
    }

    /// Install `pattern` in `slot_id`
    ///
    /// An existing slot keeps its cursor (folded into the new length); a new
    /// slot starts in phase with the transport.
    pub fn set_pattern(&mut self, slot_id: SlotId, pattern: Pattern) {
        let current_note = self.clock.current_note;

        match self.playback_state_mut(slot_id) {
            Some(state) => {
                state.replace(pattern);
                log::debug!(
                    "Slot {}: pattern replaced (length {}, cursor {})",
                    slot_id,
                    state.length,
                    state.offset
                );
            }
            None => {
                let state = PlaybackState::new(pattern, current_note);
                log::debug!(
                    "Slot {}: pattern added (length {}, cursor {})",
                    slot_id,
                    state.length,
                    state.offset
                );
                self.slots.push((slot_id, state));
            }
        }
    }

    /// Route `slot_id`'s pattern to another instrument. Unknown slots are ignored.
    pub fn set_pattern_instrument(&mut self, slot_id: SlotId, instrument_id: InstrumentId) {
        if let Some(state) = self.playback_state_mut(slot_id) {
            state.pattern.instrument_id = instrument_id;
        }
    }

    /// Enter `Playing` with the next note tick due at `audio_now`
    pub fn start_at(&mut self, audio_now: f64) {
        self.clock.next_note_time = audio_now;
        self.shared.set_state(TransportState::Playing);
    }

    /// Stop advancing; clock and cursors are kept
    pub fn pause(&mut self) {
        self.shared.set_state(TransportState::Paused);
        for sink in &self.sinks {
            sink.cancel_pending();
        }
    }

    /// Silence everything and rewind to the top
    pub fn stop(&mut self, audio_now: f64) {
        self.shared.set_state(TransportState::Stopped);
        for sink in &self.sinks {
            sink.cancel_pending();
        }

        for instrument in self.instruments.iter_mut() {
            instrument.on_stop(audio_now);
        }

        for (slot_id, state) in self.slots.iter_mut() {
            state.offset = 0;
            let event = PlayerEvent::PatternAdvance {
                slot_id: *slot_id,
                pattern_time: 0,
                time: audio_now,
            };
            for sink in &self.sinks {
                sink.emit(event, audio_now);
            }
        }

        self.clock.reset();
    }

    /// Schedule every note tick due before `audio_now + schedule_ahead_time`
    ///
    /// Returns the number of note ticks processed.
    pub fn tick(&mut self, audio_now: f64) -> usize {
        let horizon = audio_now + self.schedule_ahead_time;
        let mut processed = 0;

        while self.shared.is_playing() && self.clock.next_note_time < horizon {
            self.process_note(audio_now);
            processed += 1;
        }

        processed
    }

    /// Run one note tick unconditionally and advance the clock
    pub fn process_note(&mut self, audio_now: f64) {
        let Self {
            tempo,
            ctx,
            update_multiplier,
            clock,
            slots,
            instruments,
            sinks,
            shared,
            ..
        } = self;

        let emit = |event: PlayerEvent| {
            for sink in sinks.iter() {
                sink.emit(event, audio_now);
            }
        };

        let note_increment = tempo.note_increment();
        let current_note = clock.current_note;
        let note_time = clock.next_note_time;

        if clock.is_beat() {
            emit(PlayerEvent::Beat {
                beat: clock.beat_index(),
                time: note_time,
            });
        }

        let solo = shared.solo_slot();

        for (slot_id, state) in slots.iter_mut() {
            if state.pattern.events.is_empty() {
                continue;
            }

            let wrapped = (current_note % state.length as u64) as Tick;

            if wrapped == 0 && !state.pattern.play_once {
                state.offset = 0;
            }

            if solo.is_some_and(|solo| solo != *slot_id) {
                continue;
            }

            while let Some(timed) = state.pattern.events.get(state.offset) {
                if timed.time > wrapped {
                    break;
                }

                let time_offset = if timed.event.is_note_off() {
                    note_increment - NOTE_OFF_EPSILON
                } else {
                    0.0
                };
                let time = note_time + time_offset;
                let instrument_id = state.pattern.instrument_id;

                match instruments.get_mut(instrument_id) {
                    Some(instrument) => {
                        instrument.schedule_event(ScheduledEvent::new(time, timed.event), ctx)
                    }
                    None => log::warn!(
                        "Slot {}: no instrument {} for {}",
                        slot_id,
                        instrument_id,
                        timed.event
                    ),
                }

                log::trace!("Slot {}: {} at {:.5}", slot_id, timed.event, time);
                emit(PlayerEvent::Instrument {
                    slot_id: *slot_id,
                    instrument_id,
                    event: timed.event,
                    time,
                });

                state.offset += 1;
            }

            emit(PlayerEvent::PatternAdvance {
                slot_id: *slot_id,
                pattern_time: wrapped,
                time: note_time,
            });
        }

        let update_increment = note_increment / *update_multiplier as f64;
        for i in 0..*update_multiplier {
            let time = note_time + update_increment * i as f64;
            for instrument in instruments.iter_mut() {
                instrument.on_update(time, ctx);
            }
        }

        clock.advance(note_increment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{EventRecorder, InstrumentCall, RecorderLog};
    use crate::messaging::EventQueue;
    use crate::sequencer::PlayerError;
    use crate::sequencer::event::{Event, TimedEvent};

    const NOTE: f64 = 0.125;

    fn scheduler(instruments: usize) -> (Scheduler, Vec<RecorderLog>, Arc<EventQueue>) {
        let recorders: Vec<EventRecorder> = (0..instruments)
            .map(|i| EventRecorder::new(format!("inst{}", i)))
            .collect();
        let logs = recorders.iter().map(EventRecorder::log).collect();
        let rack = recorders
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn Instrument>)
            .collect();

        let mut scheduler =
            Scheduler::new(&PlayerConfig::default(), rack, SharedState::new()).unwrap();
        let queue = Arc::new(EventQueue::new());
        scheduler.add_sink(queue.clone());
        (scheduler, logs, queue)
    }

    fn note_on_off() -> Pattern {
        Pattern::new(
            vec![
                TimedEvent::new(0, Event::note_on(60)),
                TimedEvent::new(4, Event::NoteOff),
            ],
            0,
        )
    }

    #[test]
    fn test_tick_fills_lookahead_window() {
        let (mut scheduler, _, queue) = scheduler(1);
        scheduler.start_at(0.0);

        // 0.0 < 0.05 only
        assert_eq!(scheduler.tick(0.0), 1);
        // next ticks at 0.125 .. 1.0 are all < 1.05
        assert_eq!(scheduler.tick(1.0), 8);
        assert_eq!(scheduler.current_note_index(), 9);
        assert!((scheduler.next_note_time() - 9.0 * NOTE).abs() < 1e-9);

        let beats: Vec<u64> = queue
            .drain_all()
            .into_iter()
            .filter_map(|e| match e {
                PlayerEvent::Beat { beat, .. } => Some(beat),
                _ => None,
            })
            .collect();
        assert_eq!(beats, vec![0, 1, 2]);
    }

    #[test]
    fn test_tick_does_nothing_when_not_playing() {
        let (mut scheduler, _, queue) = scheduler(1);
        assert_eq!(scheduler.tick(10.0), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_note_on_off_scenario() {
        let (mut scheduler, logs, _) = scheduler(1);
        scheduler.set_pattern(0, note_on_off());
        assert_eq!(scheduler.playback_state(0).unwrap().length(), 16);

        for _ in 0..17 {
            scheduler.process_note(0.0);
        }

        let scheduled = logs[0].scheduled();
        assert_eq!(scheduled.len(), 3);
        assert_eq!(scheduled[0], ScheduledEvent::new(0.0, Event::note_on(60)));
        assert_eq!(scheduled[1].event, Event::NoteOff);
        assert!((scheduled[1].time - (5.0 * NOTE - NOTE_OFF_EPSILON)).abs() < 1e-12);
        assert_eq!(scheduled[2], ScheduledEvent::new(16.0 * NOTE, Event::note_on(60)));
    }

    #[test]
    fn test_loop_returns_cursor_to_zero() {
        let (mut scheduler, _, _) = scheduler(1);
        scheduler.set_pattern(0, note_on_off());

        for _ in 0..16 {
            scheduler.process_note(0.0);
        }
        assert_eq!(scheduler.playback_state(0).unwrap().offset(), 2);

        scheduler.process_note(0.0);
        // Rewound at the wrap, then NoteOn at 0 consumed again
        assert_eq!(scheduler.playback_state(0).unwrap().offset(), 1);
    }

    #[test]
    fn test_play_once_does_not_rewind() {
        let (mut scheduler, logs, _) = scheduler(1);
        scheduler.set_pattern(0, note_on_off().with_play_once(true));

        for _ in 0..40 {
            scheduler.process_note(0.0);
        }

        assert_eq!(logs[0].scheduled().len(), 2);
    }

    #[test]
    fn test_empty_pattern_is_skipped() {
        let (mut scheduler, _, queue) = scheduler(1);
        scheduler.set_pattern(5, Pattern::empty(0));

        scheduler.process_note(0.0);

        assert!(
            queue
                .drain_all()
                .iter()
                .all(|e| !matches!(e, PlayerEvent::PatternAdvance { .. }))
        );
    }

    #[test]
    fn test_note_off_after_note_on_at_same_slot_time() {
        let (mut scheduler, logs, _) = scheduler(1);
        scheduler.set_pattern(
            0,
            Pattern::new(
                vec![
                    TimedEvent::new(2, Event::note_on(60)),
                    TimedEvent::new(2, Event::NoteOff),
                ],
                0,
            ),
        );

        for _ in 0..3 {
            scheduler.process_note(0.0);
        }

        let scheduled = logs[0].scheduled();
        assert!(scheduled[1].time > scheduled[0].time);
        assert!(scheduled[1].time < 3.0 * NOTE);
    }

    #[test]
    fn test_solo_gates_dispatch_only() {
        let (mut scheduler, logs, queue) = scheduler(2);
        scheduler.set_pattern(0, note_on_off());
        scheduler.set_pattern(1, note_on_off().with_instrument(1));
        scheduler.shared_state().set_solo_slot(Some(1));

        for _ in 0..16 {
            scheduler.process_note(0.0);
        }

        assert!(logs[0].scheduled().is_empty());
        assert_eq!(logs[1].scheduled().len(), 2);

        let events = queue.drain_all();
        assert!(events.iter().all(|e| match e {
            PlayerEvent::Instrument { slot_id, .. } => *slot_id == 1,
            _ => true,
        }));
        let advances = |slot| {
            events
                .iter()
                .filter(|e| {
                    matches!(e, PlayerEvent::PatternAdvance { slot_id, .. } if *slot_id == slot)
                })
                .count()
        };
        assert_eq!(advances(0), 16);
        assert_eq!(advances(1), 16);
    }

    #[test]
    fn test_unsolo_at_loop_top() {
        let (mut scheduler, logs, _) = scheduler(2);
        scheduler.set_pattern(0, note_on_off());
        scheduler.set_pattern(1, note_on_off().with_instrument(1));
        let shared = scheduler.shared_state();

        shared.set_solo_slot(Some(1));
        for _ in 0..16 {
            scheduler.process_note(0.0);
        }
        shared.set_solo_slot(None);

        // The loop reset still applied, so released slot 0 picks up at the top
        scheduler.process_note(0.0);
        assert_eq!(
            logs[0].scheduled(),
            vec![ScheduledEvent::new(16.0 * NOTE, Event::note_on(60))]
        );
        assert_eq!(scheduler.playback_state(0).unwrap().offset(), 1);
    }

    #[test]
    fn test_set_pattern_preserves_cursor() {
        let (mut scheduler, _, _) = scheduler(1);
        let ten_events = Pattern::new(
            (0..10).map(|t| TimedEvent::new(t, Event::note_on(60))).collect(),
            0,
        );
        scheduler.set_pattern(2, ten_events);

        for _ in 0..5 {
            scheduler.process_note(0.0);
        }
        assert_eq!(scheduler.playback_state(2).unwrap().offset(), 5);

        let longer = Pattern::new(vec![TimedEvent::new(20, Event::NoteOff)], 0);
        scheduler.set_pattern(2, longer);

        let state = scheduler.playback_state(2).unwrap();
        assert_eq!(state.length(), 32);
        assert_eq!(state.offset(), 5);
    }

    #[test]
    fn test_new_slot_starts_in_phase() {
        let (mut scheduler, _, _) = scheduler(1);
        for _ in 0..21 {
            scheduler.process_note(0.0);
        }

        scheduler.set_pattern(7, note_on_off());

        assert_eq!(scheduler.playback_state(7).unwrap().offset(), 5);
        assert_eq!(scheduler.slot_ids(), vec![7]);
    }

    #[test]
    fn test_set_pattern_instrument() {
        let (mut scheduler, logs, _) = scheduler(2);
        scheduler.set_pattern(0, note_on_off());
        scheduler.set_pattern_instrument(0, 1);
        scheduler.set_pattern_instrument(42, 1);

        scheduler.process_note(0.0);

        assert!(logs[0].scheduled().is_empty());
        assert_eq!(logs[1].scheduled().len(), 1);
        assert_eq!(scheduler.slot_ids(), vec![0]);
    }

    #[test]
    fn test_missing_instrument_still_advances() {
        let (mut scheduler, _, queue) = scheduler(1);
        scheduler.set_pattern(0, note_on_off().with_instrument(9));

        scheduler.process_note(0.0);

        assert_eq!(scheduler.playback_state(0).unwrap().offset(), 1);
        assert!(queue.drain_all().iter().any(|e| matches!(
            e,
            PlayerEvent::Instrument {
                instrument_id: 9,
                ..
            }
        )));
    }

    #[test]
    fn test_emission_order_within_tick() {
        let (mut scheduler, _, queue) = scheduler(2);
        scheduler.set_pattern(3, note_on_off());
        scheduler.set_pattern(1, note_on_off().with_instrument(1));

        scheduler.process_note(0.0);

        let events = queue.drain_all();
        assert!(matches!(events[0], PlayerEvent::Beat { beat: 0, .. }));
        let slots: Vec<SlotId> = events[1..].iter().filter_map(|e| e.slot_id()).collect();
        assert_eq!(slots, vec![3, 3, 1, 1]);
    }

    #[test]
    fn test_updates_subdivide_note_tick() {
        let recorder = EventRecorder::new("arp").with_updates(true);
        let log = recorder.log();
        let mut scheduler = Scheduler::new(
            &PlayerConfig::default(),
            vec![Box::new(recorder)],
            SharedState::new(),
        )
        .unwrap();

        scheduler.process_note(0.0);

        let updates: Vec<f64> = log
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                InstrumentCall::Update(t) => Some(t),
                _ => None,
            })
            .collect();
        let expected: Vec<f64> = (0..8).map(|i| i as f64 * NOTE / 8.0).collect();
        assert_eq!(updates, expected);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let nan_bpm = PlayerConfig {
            bpm: f64::NAN,
            ..PlayerConfig::default()
        };
        let negative_window = PlayerConfig {
            schedule_ahead_time: -0.05,
            ..PlayerConfig::default()
        };

        for config in [nan_bpm, negative_window] {
            let result = Scheduler::new(&config, Vec::new(), SharedState::new());
            assert!(matches!(result, Err(PlayerError::Config(_))));
        }
    }

    #[test]
    fn test_downbeat_only_pattern_loops_on_grid_unit() {
        let (mut scheduler, logs, _) = scheduler(1);
        let hit = Pattern::new(vec![TimedEvent::new(0, Event::note_on(60))], 0);
        assert_eq!(hit.padded_length(), 0);

        scheduler.set_pattern(0, hit.clone());
        assert_eq!(scheduler.playback_state(0).unwrap().length(), GRID_UNIT);

        for _ in 0..17 {
            scheduler.process_note(0.0);
        }
        let times: Vec<f64> = logs[0].scheduled().iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.0, 16.0 * NOTE]);

        // Hot swap goes through the same floor
        scheduler.set_pattern(0, hit);
        assert_eq!(scheduler.playback_state(0).unwrap().length(), GRID_UNIT);
    }

    #[test]
    fn test_stop_rewinds_everything() {
        let (mut scheduler, logs, queue) = scheduler(1);
        scheduler.set_pattern(0, note_on_off());
        scheduler.start_at(0.0);
        scheduler.tick(1.0);
        queue.clear();

        scheduler.stop(1.0);

        assert_eq!(scheduler.current_note_index(), 0);
        assert_eq!(scheduler.next_note_time(), 0.0);
        assert_eq!(scheduler.playback_state(0).unwrap().offset(), 0);
        assert_eq!(logs[0].stop_count(), 1);
        assert!(!scheduler.is_playing());
        assert_eq!(
            queue.drain_all(),
            vec![PlayerEvent::PatternAdvance {
                slot_id: 0,
                pattern_time: 0,
                time: 1.0,
            }]
        );
    }

    #[test]
    fn test_pause_keeps_position() {
        let (mut scheduler, _, _) = scheduler(1);
        scheduler.set_pattern(0, note_on_off());
        scheduler.start_at(0.0);
        scheduler.tick(0.5);
        let (note, time) = (scheduler.current_note_index(), scheduler.next_note_time());

        scheduler.pause();
        assert_eq!(scheduler.tick(5.0), 0);
        assert_eq!(scheduler.current_note_index(), note);
        assert_eq!(scheduler.next_note_time(), time);
        assert_eq!(scheduler.playback_state(0).unwrap().offset(), 2);
    }
}
