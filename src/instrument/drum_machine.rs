// Drum machine - routes NoteOn pitches to individual percussion voices

use crate::instrument::{Instrument, ScheduledEvent, SongContext};
use crate::sequencer::event::{Event, Pitch};

/// C4; voice `n` answers to pitch `ROOT_NOTE + n`
pub const ROOT_NOTE: Pitch = 60;

pub const KICK: Pitch = ROOT_NOTE;
pub const SNARE: Pitch = ROOT_NOTE + 1;
pub const PICCOLO: Pitch = ROOT_NOTE + 2;
pub const HIHAT: Pitch = ROOT_NOTE + 3;
pub const HIHAT_LONG: Pitch = ROOT_NOTE + 4;
pub const KICK_TIGHT: Pitch = ROOT_NOTE + 5;

/// A one-shot percussion sound
pub trait DrumVoice: Send {
    /// Start the hit at `now`
    fn schedule_play(&mut self, now: f64);

    /// Cancel pending hits and silence at `now`
    fn on_stop(&mut self, now: f64);
}

/// Multiplexes a pattern's NoteOns onto a bank of drum voices
pub struct DrumMachine {
    voices: Vec<Box<dyn DrumVoice>>,
}

impl DrumMachine {
    /// Voices are indexed from `ROOT_NOTE` upwards
    pub fn new(voices: Vec<Box<dyn DrumVoice>>) -> Self {
        Self { voices }
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    fn voice_for(&mut self, pitch: Pitch) -> Option<&mut Box<dyn DrumVoice>> {
        let index = usize::try_from(pitch - ROOT_NOTE).ok()?;
        self.voices.get_mut(index)
    }
}

impl Instrument for DrumMachine {
    fn schedule_event(&mut self, scheduled: ScheduledEvent, _ctx: &SongContext) {
        // Drums are one-shots; only NoteOn matters
        if let Event::NoteOn { pitch } = scheduled.event {
            match self.voice_for(pitch) {
                Some(voice) => voice.schedule_play(scheduled.time),
                None => log::trace!("Drum machine: no voice for pitch {}", pitch),
            }
        }
    }

    fn on_stop(&mut self, now: f64) {
        for voice in self.voices.iter_mut() {
            DrumVoice::on_stop(voice.as_mut(), now);
        }
    }
}
