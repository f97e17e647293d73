// Audio clock abstraction
// "Now" in audio time, plus the ability to suspend and resume that time

use crate::audio::{ClockError, ClockResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A source of audio-domain time in seconds
///
/// Time only moves while the clock is resumed. Implementations are shared
/// between the control thread and the scheduler's timer thread.
pub trait AudioClock: Send + Sync {
    /// Current audio time in seconds
    fn now(&self) -> f64;

    /// Start (or continue) advancing time
    fn resume(&self) -> ClockResult<()>;

    /// Freeze time
    fn suspend(&self) -> ClockResult<()>;

    fn is_running(&self) -> bool;
}

/// Clock that only moves when told to
///
/// Deterministic stand-in for an audio device in tests and offline renders.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// f64 bits
    now: AtomicU64,
    running: AtomicBool,
    fail_resume: AtomicBool,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to `seconds`
    pub fn set(&self, seconds: f64) {
        self.now.store(seconds.to_bits(), Ordering::Release);
    }

    /// Move time forward by `seconds`
    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }

    /// Make every following `resume` fail, as an unplugged device would
    pub fn set_resume_failure(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::Release);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.now.load(Ordering::Acquire))
    }

    fn resume(&self) -> ClockResult<()> {
        if self.fail_resume.load(Ordering::Acquire) {
            return Err(ClockError::Resume("manual clock refused to resume".to_string()));
        }
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn suspend(&self) -> ClockResult<()> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct SystemClockState {
    /// Time accumulated over previous running spans
    elapsed: Duration,
    /// Start of the current running span
    running_since: Option<Instant>,
}

/// Wall-clock backed audio time
///
/// Starts suspended at zero and, like an audio context, does not advance while
/// suspended.
#[derive(Debug, Default)]
pub struct SystemClock {
    state: Mutex<SystemClockState>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SystemClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        let state = self.state();
        let running = state
            .running_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        (state.elapsed + running).as_secs_f64()
    }

    fn resume(&self) -> ClockResult<()> {
        let mut state = self.state();
        if state.running_since.is_none() {
            state.running_since = Some(Instant::now());
        }
        Ok(())
    }

    fn suspend(&self) -> ClockResult<()> {
        let mut state = self.state();
        if let Some(since) = state.running_since.take() {
            state.elapsed += since.elapsed();
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.state().running_since.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), 0.0);
        assert!(!clock.is_running());

        clock.advance(0.25);
        clock.advance(0.25);
        assert_eq!(clock.now(), 0.5);

        clock.resume().unwrap();
        assert!(clock.is_running());
        clock.suspend().unwrap();
        assert!(!clock.is_running());
    }

    #[test]
    fn test_manual_clock_resume_failure() {
        let clock = ManualClock::new();
        clock.set_resume_failure(true);

        assert!(matches!(clock.resume(), Err(ClockError::Resume(_))));
        assert!(!clock.is_running());

        clock.set_resume_failure(false);
        assert!(clock.resume().is_ok());
    }

    #[test]
    fn test_system_clock_frozen_while_suspended() {
        let clock = SystemClock::new();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.now(), 0.0);

        clock.resume().unwrap();
        thread::sleep(Duration::from_millis(10));
        clock.suspend().unwrap();

        let frozen = clock.now();
        assert!(frozen >= 0.010);

        thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.now(), frozen);
    }

    #[test]
    fn test_system_clock_resume_is_idempotent() {
        let clock = SystemClock::new();
        clock.resume().unwrap();
        thread::sleep(Duration::from_millis(5));
        let before = clock.now();

        clock.resume().unwrap();
        assert!(clock.now() >= before);
        assert!(clock.is_running());
    }
}
