// Audio clock sources the scheduler runs against

pub mod clock;
#[cfg(feature = "device-clock")]
pub mod device_clock;

pub use clock::{AudioClock, ManualClock, SystemClock};
#[cfg(feature = "device-clock")]
pub use device_clock::DeviceClock;

use thiserror::Error;

/// Audio clock errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClockError {
    #[error("Audio device unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to resume audio clock: {0}")]
    Resume(String),

    #[error("Failed to suspend audio clock: {0}")]
    Suspend(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}

pub type ClockResult<T> = Result<T, ClockError>;
