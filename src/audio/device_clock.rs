// Device clock - audio time read off a real output stream
//
// The stream renders silence; its callback counts frames, and audio time is
// frames rendered / sample rate. Resume and suspend map onto stream play and
// pause.
//
// Note: on macOS (CoreAudio) the cpal Stream is not Send, so the stream lives
// on its own worker thread and is driven through a command channel.

use crate::audio::{AudioClock, ClockError, ClockResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

enum StreamCommand {
    Play(Sender<ClockResult<()>>),
    Pause(Sender<ClockResult<()>>),
    Shutdown,
}

/// Audio clock driven by the default output device
pub struct DeviceClock {
    frames: Arc<AtomicU64>,
    sample_rate: f64,
    running: AtomicBool,
    control: Mutex<Sender<StreamCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl DeviceClock {
    /// Open the default output device (initially suspended)
    pub fn open_default() -> ClockResult<Self> {
        let frames = Arc::new(AtomicU64::new(0));
        let (control_tx, control_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker_frames = Arc::clone(&frames);
        let worker = thread::Builder::new()
            .name("device-clock".to_string())
            .spawn(move || {
                let stream = match build_stream(&worker_frames) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                for command in control_rx {
                    match command {
                        StreamCommand::Play(ack) => {
                            let _ = ack.send(
                                stream
                                    .play()
                                    .map_err(|e| ClockError::Resume(e.to_string())),
                            );
                        }
                        StreamCommand::Pause(ack) => {
                            let _ = ack.send(
                                stream
                                    .pause()
                                    .map_err(|e| ClockError::Suspend(e.to_string())),
                            );
                        }
                        StreamCommand::Shutdown => break,
                    }
                }
            })
            .map_err(|e| ClockError::Unavailable(e.to_string()))?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| ClockError::Unavailable("device clock worker exited".to_string()))??;

        log::info!("Device clock opened at {} Hz", sample_rate);

        Ok(Self {
            frames,
            sample_rate,
            running: AtomicBool::new(false),
            control: Mutex::new(control_tx),
            worker: Some(worker),
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Frames rendered so far
    pub fn current_frame(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn request(&self, make: fn(Sender<ClockResult<()>>) -> StreamCommand) -> ClockResult<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(make(ack_tx))
            .map_err(|_| ClockError::Stream("device clock worker is gone".to_string()))?;
        ack_rx
            .recv()
            .map_err(|_| ClockError::Stream("device clock worker is gone".to_string()))?
    }
}

impl AudioClock for DeviceClock {
    fn now(&self) -> f64 {
        self.current_frame() as f64 / self.sample_rate
    }

    fn resume(&self) -> ClockResult<()> {
        self.request(StreamCommand::Play)?;
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn suspend(&self) -> ClockResult<()> {
        self.request(StreamCommand::Pause)?;
        self.running.store(false, Ordering::Release);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for DeviceClock {
    fn drop(&mut self) {
        let _ = self
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(StreamCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn build_stream(frames: &Arc<AtomicU64>) -> ClockResult<(Stream, f64)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| ClockError::Unavailable("No audio device found".to_string()))?;

    log::info!(
        "Device clock: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported_config = device
        .default_output_config()
        .map_err(|e| ClockError::Unavailable(format!("Configuration error: {}", e)))?;

    let sample_format = supported_config.sample_format();
    let sample_rate = supported_config.sample_rate().0 as f64;
    let channels = supported_config.channels() as usize;
    let config: StreamConfig = supported_config.into();

    let stream = match sample_format {
        SampleFormat::F32 => build_silent_stream::<f32>(&device, &config, channels, frames),
        SampleFormat::I16 => build_silent_stream::<i16>(&device, &config, channels, frames),
        SampleFormat::U16 => build_silent_stream::<u16>(&device, &config, channels, frames),
        other => Err(ClockError::Unavailable(format!(
            "Unsupported sample format: {:?}. Supported formats: F32, I16, U16",
            other
        ))),
    }?;

    // Some hosts start streams on creation; the clock starts suspended
    if let Err(e) = stream.pause() {
        log::debug!("Device clock: initial pause failed: {}", e);
    }

    Ok((stream, sample_rate))
}

fn build_silent_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    frames: &Arc<AtomicU64>,
) -> ClockResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let frames = Arc::clone(frames);
    let channels = channels.max(1);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = T::EQUILIBRIUM;
                }
                frames.fetch_add((data.len() / channels) as u64, Ordering::Relaxed);
            },
            |err| log::error!("Device clock stream error: {}", err),
            None,
        )
        .map_err(|e| ClockError::Stream(e.to_string()))
}
