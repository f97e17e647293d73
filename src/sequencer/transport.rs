// Transport - Playback state shared between control callers and the timer thread

use crate::sequencer::SlotId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Transport state (play/pause/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Clock and cursors at zero
    #[default]
    Stopped,
    Playing,
    /// Not advancing, but clock and cursors are kept for resuming
    Paused,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::Paused)
    }
}

const NO_SOLO: u64 = u64::MAX;

/// Shared transport flags
/// Thread-safe via atomics; the solo slot is last-writer-wins
#[derive(Debug)]
pub struct SharedState {
    playing: AtomicBool,
    paused: AtomicBool,
    solo_slot: AtomicU64,
}

impl SharedState {
    /// Create new shared state
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get current transport state
    pub fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Acquire) {
            TransportState::Playing
        } else if self.paused.load(Ordering::Acquire) {
            TransportState::Paused
        } else {
            TransportState::Stopped
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, state: TransportState) {
        self.paused
            .store(state == TransportState::Paused, Ordering::Release);
        self.playing.store(state.is_playing(), Ordering::Release);
    }

    /// Slot whose events are exclusively dispatched, if any
    pub fn solo_slot(&self) -> Option<SlotId> {
        match self.solo_slot.load(Ordering::Relaxed) {
            NO_SOLO => None,
            slot => Some(slot as SlotId),
        }
    }

    pub fn set_solo_slot(&self, slot: Option<SlotId>) {
        let raw = slot.map_or(NO_SOLO, u64::from);
        self.solo_slot.store(raw, Ordering::Relaxed);
    }

    /// Solo `slot`, or clear solo if `slot` is already soloed
    pub fn toggle_solo(&self, slot: SlotId) -> Option<SlotId> {
        let next = if self.solo_slot() == Some(slot) {
            None
        } else {
            Some(slot)
        };
        self.set_solo_slot(next);
        next
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            solo_slot: AtomicU64::new(NO_SOLO),
        }
    }
}
