//! Audio output using cpal.
//!
//! One dedicated thread owns the output stream (cpal streams are not
//! `Send`) and runs the decode loop:
//! - Receives commands from the engine handle
//! - Decodes, resamples and remaps the active resource
//! - Feeds chunks to the output callback
//! - Reports progress, end of media and decode failures
//!
//! Only this thread changes the engine status; the handle only sends
//! commands and adjusts volume.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::PlayerError;
use super::decoder::{AudioDecoder, remap_channels};
use super::resampler::Resampler;
use super::state::{EngineCommand, EngineState, EngineStatus};
use crate::backend::local::{LoadId, MediaEvent, MediaEventKind};

/// Decoded chunks buffered ahead of the output callback
const CHUNK_BUFFER: usize = 8;

/// Handle to the output thread.
pub struct AudioOutput {
    command_tx: Sender<EngineCommand>,
    _thread: JoinHandle<()>,
}

impl AudioOutput {
    /// Open the default output device and start the output thread.
    ///
    /// Blocks until the device is open.
    pub fn start(
        state: Arc<RwLock<EngineState>>,
        events_tx: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Self, PlayerError> {
        let (command_tx, command_rx) = bounded::<EngineCommand>(32);
        let (init_tx, init_rx) = bounded::<Result<(), PlayerError>>(1);

        let thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let (audio_tx, audio_rx) = bounded::<AudioChunk>(CHUNK_BUFFER);
                let output = match open_output(Arc::clone(&state), audio_rx) {
                    Ok(output) => {
                        let _ = init_tx.send(Ok(()));
                        output
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                let mut ctx = DecodeContext::new(output.channels, output.sample_rate, events_tx);
                ctx.run(&state, &command_rx, &audio_tx);
                drop(output);
                tracing::debug!("Audio output thread stopped");
            })
            .map_err(|e| PlayerError::AudioInit(e.to_string()))?;

        init_rx
            .recv()
            .map_err(|_| PlayerError::AudioInit("audio thread exited during startup".to_string()))??;

        Ok(Self {
            command_tx,
            _thread: thread,
        })
    }

    pub fn send(&self, command: EngineCommand) -> Result<(), PlayerError> {
        self.command_tx
            .send(command)
            .map_err(|_| PlayerError::ChannelClosed)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        let _ = self.command_tx.send(EngineCommand::Shutdown);
    }
}

struct OpenOutput {
    _stream: Stream,
    channels: u16,
    sample_rate: u32,
}

fn open_output(
    state: Arc<RwLock<EngineState>>,
    audio_rx: Receiver<AudioChunk>,
) -> Result<OpenOutput, PlayerError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlayerError::AudioInit("No output device found".to_string()))?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    tracing::info!("Using audio device: {}", device_name);

    let supported_config = device
        .default_output_config()
        .map_err(|e| PlayerError::AudioInit(e.to_string()))?;

    let sample_rate = supported_config.sample_rate().0;
    let channels = supported_config.channels();
    tracing::debug!("Audio format: {}Hz, {} channels", sample_rate, channels);

    let config = StreamConfig {
        channels,
        sample_rate: supported_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match supported_config.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, audio_rx, state),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, audio_rx, state),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, audio_rx, state),
        format => {
            return Err(PlayerError::AudioInit(format!(
                "Unsupported sample format: {:?}",
                format
            )));
        }
    }
    .map_err(|e| PlayerError::AudioInit(e.to_string()))?;

    stream
        .play()
        .map_err(|e| PlayerError::AudioInit(e.to_string()))?;

    Ok(OpenOutput {
        _stream: stream,
        channels,
        sample_rate,
    })
}

/// A chunk of output-ready samples.
struct AudioChunk {
    load_id: LoadId,
    samples: Vec<f32>,
    timestamp: Duration,
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    audio_rx: Receiver<AudioChunk>,
    state: Arc<RwLock<EngineState>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let silence = T::from_sample(0.0f32);
    let mut current: Option<(AudioChunk, usize)> = None;

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let (volume, audible, active) = {
                let s = state.read();
                (s.volume, s.status.is_audible(), s.load_id)
            };

            if !audible {
                data.fill(silence);
                return;
            }

            let mut out = 0;
            while out < data.len() {
                if current
                    .as_ref()
                    .is_some_and(|(chunk, _)| Some(chunk.load_id) != active)
                {
                    current = None;
                }

                if current.is_none() {
                    match audio_rx.try_recv() {
                        // Left over from a replaced resource
                        Ok(chunk) if Some(chunk.load_id) != active => continue,
                        Ok(chunk) => {
                            state.write().position = chunk.timestamp;
                            current = Some((chunk, 0));
                        }
                        Err(_) => {
                            state.write().underruns += 1;
                            data[out..].fill(silence);
                            return;
                        }
                    }
                }

                let Some((chunk, pos)) = current.as_mut() else {
                    continue;
                };
                let n = (chunk.samples.len() - *pos).min(data.len() - out);
                for (dst, src) in data[out..out + n]
                    .iter_mut()
                    .zip(&chunk.samples[*pos..*pos + n])
                {
                    *dst = T::from_sample(src * volume);
                }
                *pos += n;
                out += n;

                let finished = *pos >= chunk.samples.len();
                if finished {
                    current = None;
                }
            }
        },
        |err| {
            tracing::error!("Audio stream error: {}", err);
        },
        None,
    )
}

/// The decoder thread's view of the active resource.
struct DecodeContext {
    decoder: Option<Box<AudioDecoder>>,
    resampler: Option<Resampler>,
    load_id: Option<LoadId>,
    /// Decoding reached end of stream; only buffered audio is left
    finished: bool,
    last_progress_secs: Option<u64>,
    output_channels: u16,
    output_rate: u32,
    events_tx: mpsc::UnboundedSender<MediaEvent>,
}

impl DecodeContext {
    fn new(output_channels: u16, output_rate: u32, events_tx: mpsc::UnboundedSender<MediaEvent>) -> Self {
        Self {
            decoder: None,
            resampler: None,
            load_id: None,
            finished: false,
            last_progress_secs: None,
            output_channels,
            output_rate,
            events_tx,
        }
    }

    fn run(
        &mut self,
        state: &RwLock<EngineState>,
        command_rx: &Receiver<EngineCommand>,
        audio_tx: &Sender<AudioChunk>,
    ) {
        loop {
            let status = state.read().status;

            // Block on commands when nothing is running, poll otherwise
            let command = if status.is_audible() {
                match command_rx.try_recv() {
                    Ok(cmd) => Some(cmd),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match command_rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                }
            };

            if let Some(cmd) = command
                && !self.handle_command(cmd, state)
            {
                break;
            }

            let status = state.read().status;
            match status {
                EngineStatus::Playing => {
                    if !self.decode_and_send(audio_tx, state) {
                        break;
                    }
                }
                EngineStatus::Draining => self.check_drained(audio_tx, state),
                _ => {}
            }
        }
    }

    /// Handle a command, returning whether to keep running.
    fn handle_command(&mut self, cmd: EngineCommand, state: &RwLock<EngineState>) -> bool {
        match cmd {
            EngineCommand::Load { load_id, decoder } => {
                self.resampler =
                    match Resampler::new(decoder.sample_rate(), self.output_rate, self.output_channels) {
                        Ok(r) => Some(r),
                        Err(e) => {
                            tracing::warn!("{}; playing at source rate", e);
                            None
                        }
                    };
                let mut s = state.write();
                s.status = EngineStatus::Loaded;
                s.load_id = Some(load_id);
                s.position = Duration::ZERO;
                s.duration = decoder.duration();
                self.decoder = Some(decoder);
                self.load_id = Some(load_id);
                self.finished = false;
                self.last_progress_secs = None;
            }
            EngineCommand::Play => {
                let mut s = state.write();
                match s.status {
                    EngineStatus::Loaded | EngineStatus::Paused => {
                        s.status = EngineStatus::Playing;
                    }
                    EngineStatus::Stopped => tracing::warn!("Play with nothing loaded"),
                    EngineStatus::Playing | EngineStatus::Draining => {}
                }
            }
            EngineCommand::Pause => {
                let mut s = state.write();
                if s.status.is_audible() {
                    s.status = EngineStatus::Paused;
                }
            }
            EngineCommand::Resume => {
                let mut s = state.write();
                if s.status == EngineStatus::Paused {
                    s.status = if self.finished {
                        EngineStatus::Draining
                    } else {
                        EngineStatus::Playing
                    };
                }
            }
            EngineCommand::Stop => {
                self.unload(state);
            }
            EngineCommand::Shutdown => return false,
        }
        true
    }

    fn unload(&mut self, state: &RwLock<EngineState>) {
        self.decoder = None;
        self.resampler = None;
        self.load_id = None;
        self.finished = false;
        let mut s = state.write();
        s.status = EngineStatus::Stopped;
        s.load_id = None;
    }

    fn emit(&self, kind: MediaEventKind) {
        if let Some(load_id) = self.load_id {
            let _ = self.events_tx.send(MediaEvent { load_id, kind });
        }
    }

    /// Decode the next chunk and send it to the output. Returns false if
    /// the output is gone.
    fn decode_and_send(&mut self, audio_tx: &Sender<AudioChunk>, state: &RwLock<EngineState>) -> bool {
        let (Some(dec), Some(load_id)) = (self.decoder.as_mut(), self.load_id) else {
            state.write().status = EngineStatus::Stopped;
            return true;
        };

        match dec.decode_next() {
            Ok(Some(frame)) => {
                let source_channels = dec.channels();
                let secs = frame.timestamp.as_secs();
                let duration = dec.duration();

                let samples = remap_channels(&frame.samples, source_channels, self.output_channels);
                let samples = match self.resampler.as_mut() {
                    Some(r) => r.process(&samples),
                    None => samples,
                };

                if self.last_progress_secs != Some(secs) {
                    self.last_progress_secs = Some(secs);
                    self.emit(MediaEventKind::Progress {
                        position: frame.timestamp,
                        duration,
                    });
                }

                if samples.is_empty() {
                    return true;
                }
                audio_tx
                    .send(AudioChunk {
                        load_id,
                        samples,
                        timestamp: frame.timestamp,
                    })
                    .is_ok()
            }
            Ok(None) => {
                let tail = self.resampler.as_mut().map(Resampler::flush).unwrap_or_default();
                let timestamp = state.read().duration;
                if !tail.is_empty()
                    && audio_tx
                        .send(AudioChunk {
                            load_id,
                            samples: tail,
                            timestamp,
                        })
                        .is_err()
                {
                    return false;
                }
                self.finished = true;
                state.write().status = EngineStatus::Draining;
                true
            }
            Err(e) => {
                tracing::warn!("Decode error: {}", e);
                self.emit(MediaEventKind::Failed(e.to_string()));
                self.unload(state);
                true
            }
        }
    }

    /// Report the end once the output has consumed everything buffered.
    fn check_drained(&mut self, audio_tx: &Sender<AudioChunk>, state: &RwLock<EngineState>) {
        if !audio_tx.is_empty() {
            thread::sleep(Duration::from_millis(10));
            return;
        }
        // Let the callback finish the chunk it holds
        thread::sleep(Duration::from_millis(100));
        tracing::debug!("Playback finished");
        self.emit(MediaEventKind::Ended);
        self.unload(state);
    }
}
