// Lookahead Sequencer - demo player
//
// Usage: lookahead_sequencer [config.ron] [--song song.ron] [--seconds N]
//
// Plays a short drum/bass/lead arrangement on the system clock with recording
// instruments and logs what the scheduler emits. A song file's tempo replaces
// the config's bpm. Set RUST_LOG=debug (or trace) to see every dispatched event.

use lookahead_sequencer::instrument::drum_machine::{HIHAT, KICK, SNARE};
use lookahead_sequencer::instrument::{
    Arpeggiator, DrumMachine, DrumVoice, EventRecorder, INSTRUMENT_DRUMS, INSTRUMENT_IDS,
    INSTRUMENT_PWM_LEAD, INSTRUMENT_PWM_LEAD_ARP, INSTRUMENT_REESE, Instrument, MINOR_ARP,
};
use lookahead_sequencer::sequencer::note::EditorNote;
use lookahead_sequencer::{
    EventKind, MusicPlayer, Pattern, PlayerConfig, PlayerEvent, SlotId, SongFile, SystemClock,
    TimedEvent, combine, concat, notes_to_pattern, repeat, silence, time_shift,
};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PLAY_SECONDS: u64 = 4;

struct Args {
    config: Option<String>,
    song: Option<String>,
    seconds: u64,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        song: None,
        seconds: DEFAULT_PLAY_SECONDS,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--song" => args.song = Some(iter.next().ok_or("--song needs a path")?),
            "--seconds" => {
                let value = iter.next().ok_or("--seconds needs a value")?;
                args.seconds = value
                    .parse()
                    .map_err(|_| format!("invalid --seconds value: {}", value))?;
            }
            path => args.config = Some(path.to_string()),
        }
    }

    Ok(args)
}

/// One recorder per instrument slot; drums and arp wrap recorders too
fn build_rack() -> Vec<Box<dyn Instrument>> {
    INSTRUMENT_IDS
        .iter()
        .map(|&id| -> Box<dyn Instrument> {
            match id {
                INSTRUMENT_DRUMS => {
                    let voices: Vec<Box<dyn DrumVoice>> = ["kick", "snare", "piccolo", "hihat"]
                        .iter()
                        .map(|name| Box::new(EventRecorder::new(*name)) as Box<dyn DrumVoice>)
                        .collect();
                    Box::new(DrumMachine::new(voices))
                }
                INSTRUMENT_PWM_LEAD_ARP => Box::new(Arpeggiator::new(
                    EventRecorder::new("arp lead"),
                    MINOR_ARP.to_vec(),
                    0.25,
                )),
                _ => Box::new(EventRecorder::new(format!("instrument {}", id))),
            }
        })
        .collect()
}

/// Four bars: drums throughout, bass from bar two, lead answering in bar four
fn demo_song() -> Vec<(SlotId, Pattern)> {
    let hits = |pitch, times: &[u32]| {
        Pattern::new(
            times
                .iter()
                .map(|&t| TimedEvent::new(t, lookahead_sequencer::Event::note_on(pitch)))
                .collect(),
            INSTRUMENT_DRUMS,
        )
    };
    let beat = combine(&[
        hits(KICK, &[0, 8]),
        hits(SNARE, &[4, 12]),
        hits(HIHAT, &[0, 2, 4, 6, 8, 10, 12, 14]),
    ]);
    let drums = repeat(4, &beat);

    let bass_bar = notes_to_pattern(
        &[
            EditorNote::new(36, 0, 3),
            EditorNote::new(36, 4, 3),
            EditorNote::glide(43, 8, 2),
            EditorNote::new(39, 12, 4),
        ],
        INSTRUMENT_REESE,
    );
    let bass = concat(INSTRUMENT_REESE, &[silence(1), repeat(3, &bass_bar)]);

    let lead_phrase = notes_to_pattern(
        &[EditorNote::new(72, 0, 4), EditorNote::new(75, 4, 8)],
        INSTRUMENT_PWM_LEAD,
    );
    let lead = time_shift(48, &lead_phrase).with_play_once(true);

    vec![(0, drums), (1, bass), (2, lead)]
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };
    let song = match &args.song {
        Some(path) => {
            let song = SongFile::load(path)?;
            config = song.player_config(&config)?;
            log::info!("Loaded {} at {} bpm", path, song.bpm);
            song.patterns()
        }
        None => demo_song(),
    };

    let clock = Arc::new(SystemClock::new());
    let mut player = MusicPlayer::new(&config, clock, build_rack())?;

    for (slot_id, pattern) in song {
        log::info!(
            "Slot {}: {} events, {} ticks",
            slot_id,
            pattern.event_count(),
            pattern.padded_length()
        );
        player.set_pattern(slot_id, pattern);
    }

    let _beats = player.on(EventKind::Beat, |event| {
        if let PlayerEvent::Beat { beat, time } = event {
            log::info!("Beat {} at {:.3}s", beat, time);
        }
    });
    let _notes = player.on(EventKind::Instrument, |event| {
        if let PlayerEvent::Instrument {
            slot_id,
            event,
            time,
            ..
        } = event
        {
            log::debug!("Slot {}: {} at {:.3}s", slot_id, event, time);
        }
    });

    player.start()?;
    std::thread::sleep(Duration::from_secs(args.seconds));
    player.stop()?;

    // Let the bus flush the zero-time advances
    std::thread::sleep(Duration::from_millis(50));
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
