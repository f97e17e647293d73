// Music Player - runtime around the look-ahead scheduler
//
// Owns the audio clock, the event bus and a timer thread that calls
// `Scheduler::tick` every `lookahead` while playing. All transport methods
// block until the transition is complete: once `pause` returns, no further
// tick runs.

use crate::audio::AudioClock;
use crate::config::PlayerConfig;
use crate::instrument::{Instrument, InstrumentId};
use crate::messaging::{EventBus, EventKind, EventQueue, PlayerEvent, Subscription};
use crate::sequencer::pattern::Pattern;
use crate::sequencer::scheduler::{PlaybackState, Scheduler};
use crate::sequencer::transport::{SharedState, TransportState};
use crate::sequencer::{PlayerError, PlayerResult, SlotId};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn lock(scheduler: &Mutex<Scheduler>) -> MutexGuard<'_, Scheduler> {
    scheduler.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the running timer thread
struct TimerHandle {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl TimerHandle {
    fn spawn(
        scheduler: Arc<Mutex<Scheduler>>,
        clock: Arc<dyn AudioClock>,
        period: Duration,
    ) -> PlayerResult<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("sequencer-timer".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // Stop signal, or the player went away
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let mut scheduler = lock(&scheduler);
                    if !scheduler.is_playing() {
                        break;
                    }
                    scheduler.tick(clock.now());
                }
                log::trace!("Timer thread exiting");
            })
            .map_err(|e| PlayerError::Thread(e.to_string()))?;

        Ok(Self { stop_tx, thread })
    }

    fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.thread.join().is_err() {
            log::error!("Timer thread panicked");
        }
    }
}

/// Pattern player: transport control, pattern editing and event subscription
pub struct MusicPlayer {
    scheduler: Arc<Mutex<Scheduler>>,
    clock: Arc<dyn AudioClock>,
    shared: Arc<SharedState>,
    bus: Arc<EventBus>,
    queue: Option<Arc<EventQueue>>,
    lookahead: Duration,
    timer: Option<TimerHandle>,
}

impl MusicPlayer {
    /// Build a stopped player driving `instruments` (indexed by `InstrumentId`)
    pub fn new(
        config: &PlayerConfig,
        clock: Arc<dyn AudioClock>,
        instruments: Vec<Box<dyn Instrument>>,
    ) -> PlayerResult<Self> {
        config.validate()?;

        let shared = SharedState::new();
        let bus = Arc::new(EventBus::with_capacity(config.bus_capacity));
        let mut scheduler = Scheduler::new(config, instruments, Arc::clone(&shared))?;
        scheduler.add_sink(bus.clone());

        let queue = if config.use_event_queue {
            let queue = Arc::new(EventQueue::with_capacity(config.queue_capacity));
            scheduler.add_sink(queue.clone());
            Some(queue)
        } else {
            None
        };

        log::info!(
            "Music player ready: {} ({} instruments, lookahead {:?})",
            scheduler.tempo(),
            scheduler.instrument_count(),
            config.lookahead()
        );

        Ok(Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            clock,
            shared,
            bus,
            queue,
            lookahead: config.lookahead(),
            timer: None,
        })
    }

    /// Begin or resume playback
    ///
    /// The clock is resumed first; if that fails the player stays where it was.
    pub fn start(&mut self) -> PlayerResult<()> {
        if self.shared.is_playing() {
            return Ok(());
        }

        self.clock.resume()?;

        {
            let mut scheduler = lock(&self.scheduler);
            let now = self.clock.now();
            scheduler.start_at(now);
            scheduler.tick(now);
        }

        match TimerHandle::spawn(
            Arc::clone(&self.scheduler),
            Arc::clone(&self.clock),
            self.lookahead,
        ) {
            Ok(timer) => self.timer = Some(timer),
            Err(e) => {
                lock(&self.scheduler).pause();
                return Err(e);
            }
        }

        log::info!("Playback started at {:.3}s", self.clock.now());
        Ok(())
    }

    /// Halt playback, keeping position
    pub fn pause(&mut self) -> PlayerResult<()> {
        if !self.shared.is_playing() {
            return Ok(());
        }

        lock(&self.scheduler).pause();
        self.stop_timer();
        self.clock.suspend()?;

        log::info!("Playback paused");
        Ok(())
    }

    /// Halt playback, silence instruments and rewind to the top
    pub fn stop(&mut self) -> PlayerResult<()> {
        self.pause()?;

        if let Some(queue) = &self.queue {
            queue.clear();
        }
        lock(&self.scheduler).stop(self.clock.now());

        log::info!("Playback stopped");
        Ok(())
    }

    pub fn toggle(&mut self) -> PlayerResult<()> {
        if self.shared.is_playing() {
            self.pause()
        } else {
            self.start()
        }
    }

    pub fn state(&self) -> TransportState {
        self.shared.state()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    /// Install or hot-swap the pattern in `slot_id`
    pub fn set_pattern(&self, slot_id: SlotId, pattern: Pattern) {
        lock(&self.scheduler).set_pattern(slot_id, pattern);
    }

    pub fn set_pattern_instrument(&self, slot_id: SlotId, instrument_id: InstrumentId) {
        lock(&self.scheduler).set_pattern_instrument(slot_id, instrument_id);
    }

    /// Subscribe to one kind of player event
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.bus.on(kind, listener)
    }

    /// Pull-mode event buffer, if enabled in the config
    ///
    /// Only `stop` clears it. While playing, the host must drain it (usually
    /// `drain_due` once per frame); past `queue_capacity` undrained events,
    /// new events are dropped with a warning.
    pub fn event_queue(&self) -> Option<Arc<EventQueue>> {
        self.queue.clone()
    }

    pub fn set_solo(&self, slot_id: Option<SlotId>) {
        self.shared.set_solo_slot(slot_id);
    }

    pub fn solo(&self) -> Option<SlotId> {
        self.shared.solo_slot()
    }

    /// Solo `slot_id`, or clear the solo if it is already soloed
    pub fn toggle_solo(&self, slot_id: SlotId) -> Option<SlotId> {
        self.shared.toggle_solo(slot_id)
    }

    pub fn shared_state(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    pub fn clock(&self) -> Arc<dyn AudioClock> {
        Arc::clone(&self.clock)
    }

    pub fn current_note_index(&self) -> u64 {
        lock(&self.scheduler).current_note_index()
    }

    pub fn next_note_time(&self) -> f64 {
        lock(&self.scheduler).next_note_time()
    }

    pub fn slot_ids(&self) -> Vec<SlotId> {
        lock(&self.scheduler).slot_ids()
    }

    pub fn playback_state(&self, slot_id: SlotId) -> Option<PlaybackState> {
        lock(&self.scheduler).playback_state(slot_id).cloned()
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
    }
}

impl Drop for MusicPlayer {
    fn drop(&mut self) {
        if self.shared.is_playing() {
            lock(&self.scheduler).pause();
        }
        self.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ClockError, ManualClock};
    use crate::instrument::EventRecorder;
    use crate::sequencer::event::{Event, TimedEvent};

    fn player(clock: Arc<ManualClock>) -> (MusicPlayer, crate::instrument::RecorderLog) {
        let recorder = EventRecorder::new("lead");
        let log = recorder.log();
        let config = PlayerConfig {
            use_event_queue: true,
            ..PlayerConfig::default()
        };
        let player = MusicPlayer::new(&config, clock, vec![Box::new(recorder)]).unwrap();
        (player, log)
    }

    fn pattern() -> Pattern {
        Pattern::new(
            vec![
                TimedEvent::new(0, Event::note_on(60)),
                TimedEvent::new(4, Event::NoteOff),
            ],
            0,
        )
    }

    #[test]
    fn test_start_ticks_immediately() {
        let clock = Arc::new(ManualClock::new());
        let (mut player, log) = player(clock.clone());
        player.set_pattern(0, pattern());

        player.start().unwrap();

        assert_eq!(player.state(), TransportState::Playing);
        assert_eq!(log.scheduled().len(), 1);
        assert_eq!(player.current_note_index(), 1);
        player.stop().unwrap();
    }

    #[test]
    fn test_start_twice_is_noop() {
        let clock = Arc::new(ManualClock::new());
        let (mut player, _) = player(clock);

        player.start().unwrap();
        let note = player.current_note_index();
        player.start().unwrap();

        assert_eq!(player.current_note_index(), note);
        player.pause().unwrap();
    }

    #[test]
    fn test_resume_failure_keeps_state() {
        let clock = Arc::new(ManualClock::new());
        clock.set_resume_failure(true);
        let (mut player, log) = player(clock);
        player.set_pattern(0, pattern());

        let result = player.start();

        assert!(matches!(
            result,
            Err(PlayerError::Clock(ClockError::Resume(_)))
        ));
        assert_eq!(player.state(), TransportState::Stopped);
        assert!(log.scheduled().is_empty());
    }

    #[test]
    fn test_stop_from_pause_rewinds() {
        let clock = Arc::new(ManualClock::new());
        let (mut player, log) = player(clock.clone());
        player.set_pattern(0, pattern());

        player.start().unwrap();
        player.pause().unwrap();
        assert_eq!(player.state(), TransportState::Paused);

        player.stop().unwrap();

        assert_eq!(player.state(), TransportState::Stopped);
        assert_eq!(player.current_note_index(), 0);
        assert_eq!(player.playback_state(0).unwrap().offset(), 0);
        assert_eq!(log.stop_count(), 1);

        // Only the zero-time advance survives the stop
        let queued = player.event_queue().unwrap().drain_all();
        assert_eq!(
            queued,
            vec![PlayerEvent::PatternAdvance {
                slot_id: 0,
                pattern_time: 0,
                time: 0.0,
            }]
        );
    }

    #[test]
    fn test_toggle() {
        let clock = Arc::new(ManualClock::new());
        let (mut player, _) = player(clock);

        player.toggle().unwrap();
        assert!(player.is_playing());
        player.toggle().unwrap();
        assert_eq!(player.state(), TransportState::Paused);
    }

    #[test]
    fn test_toggle_solo() {
        let clock = Arc::new(ManualClock::new());
        let (player, _) = player(clock);

        assert_eq!(player.toggle_solo(3), Some(3));
        assert_eq!(player.solo(), Some(3));
        assert_eq!(player.toggle_solo(3), None);
        player.set_solo(Some(1));
        assert_eq!(player.shared_state().solo_slot(), Some(1));
    }

    #[test]
    fn test_undrained_queue_is_capped() {
        let clock = Arc::new(ManualClock::new());
        let config = PlayerConfig {
            use_event_queue: true,
            queue_capacity: 3,
            ..PlayerConfig::default()
        };
        let recorder = EventRecorder::new("lead");
        let mut player =
            MusicPlayer::new(&config, clock.clone(), vec![Box::new(recorder)]).unwrap();
        player.set_pattern(0, pattern());
        let queue = player.event_queue().unwrap();
        assert_eq!(queue.capacity(), 3);

        // Beat, Instrument, PatternAdvance
        player.start().unwrap();
        assert_eq!(queue.len(), 3);

        player.pause().unwrap();
        clock.set(1.0);
        player.start().unwrap();
        player.pause().unwrap();

        assert_eq!(queue.len(), 3);
        assert!(queue.drain_all().iter().all(|event| event.time() == 0.0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PlayerConfig {
            update_multiplier: 0,
            ..PlayerConfig::default()
        };
        let result = MusicPlayer::new(&config, Arc::new(ManualClock::new()), Vec::new());

        assert!(matches!(result, Err(PlayerError::Config(_))));
    }
}
