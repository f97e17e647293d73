// Pull-mode event queue
// For hosts with their own render loop: drain what is due once per frame

use crate::messaging::bus::EventSink;
use crate::messaging::event::PlayerEvent;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of undrained events a queue holds
pub const DEFAULT_QUEUE_CAPACITY: usize = 16384;

#[derive(Debug, Default)]
struct QueueState {
    events: Vec<PlayerEvent>,
    /// Set while events are being dropped, so a stalled consumer logs once
    overflowing: bool,
}

/// Buffers emitted events until a consumer drains them
///
/// Holds at most `capacity` events. Once full, new events are dropped with a
/// warning until the consumer drains; queued events are never evicted.
#[derive(Debug)]
pub struct EventQueue {
    state: Mutex<QueueState>,
    capacity: usize,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `event`; returns false if the queue is full and it was dropped
    pub fn push(&self, event: PlayerEvent) -> bool {
        let mut state = self.state();
        if state.events.len() >= self.capacity {
            if !state.overflowing {
                log::warn!(
                    "Event queue: {} events undrained, dropping new events from {:?}",
                    self.capacity,
                    event.kind()
                );
                state.overflowing = true;
            }
            return false;
        }
        state.overflowing = false;
        state.events.push(event);
        true
    }

    /// Remove and return every event with `time <= now`, in emission order
    ///
    /// Events that are not yet due stay queued in their original order.
    pub fn drain_due(&self, now: f64) -> Vec<PlayerEvent> {
        let mut state = self.state();
        let (due, pending): (Vec<PlayerEvent>, Vec<PlayerEvent>) =
            state.events.drain(..).partition(|event| event.time() <= now);
        state.events = pending;
        due
    }

    /// Remove and return everything
    pub fn drain_all(&self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.state().events)
    }

    pub fn clear(&self) {
        self.state().events.clear();
    }

    pub fn len(&self) -> usize {
        self.state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().events.is_empty()
    }
}

impl EventSink for EventQueue {
    fn emit(&self, event: PlayerEvent, _audio_now: f64) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beat(beat: u64, time: f64) -> PlayerEvent {
        PlayerEvent::Beat { beat, time }
    }

    #[test]
    fn test_drain_due_keeps_order() {
        let queue = EventQueue::new();
        queue.push(beat(0, 0.0));
        queue.push(beat(1, 0.6));
        queue.push(beat(2, 0.2));
        queue.push(beat(3, 0.5));

        let due = queue.drain_due(0.5);

        assert_eq!(due, vec![beat(0, 0.0), beat(2, 0.2), beat(3, 0.5)]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_due(1.0), vec![beat(1, 0.6)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_nothing_due() {
        let queue = EventQueue::new();
        queue.emit(beat(0, 2.0), 0.0);

        assert!(queue.drain_due(1.0).is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_full_queue_drops_new_events() {
        let queue = EventQueue::with_capacity(2);

        assert!(queue.push(beat(0, 0.0)));
        assert!(queue.push(beat(1, 0.5)));
        for i in 2..10 {
            assert!(!queue.push(beat(i, i as f64)));
        }

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain_due(0.0), vec![beat(0, 0.0)]);

        // Draining makes room again
        assert!(queue.push(beat(10, 1.0)));
        assert_eq!(queue.drain_all(), vec![beat(1, 0.5), beat(10, 1.0)]);
    }

    #[test]
    fn test_drain_all_and_clear() {
        let queue = EventQueue::new();
        queue.push(beat(0, 5.0));
        queue.push(beat(1, 6.0));

        assert_eq!(queue.drain_all().len(), 2);
        assert!(queue.is_empty());

        queue.push(beat(2, 7.0));
        queue.clear();
        assert!(queue.is_empty());
    }
}
