use crate::config::DeviceSpec;
use crate::error::{AudioError, Result};
use crate::mixer::decode::{decode_wav, remix_channels};
use crate::mixer::midi::{Score, parse_smf};
use crate::mixer::render::{MixCommand, MixState};
use crate::mixer::resampler::ChunkResampler;
use crate::mixer::{Channel, LoopMode, Mixer};
use crate::music::MusicFormat;
use crate::position::{Position, StereoGains};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A sound converted to the device's rate and channel layout.
#[derive(Debug, Clone)]
pub struct CpalChunk {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl CpalChunk {
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        Duration::from_secs_f64(frames as f64 / self.sample_rate.max(1) as f64)
    }
}

/// A parsed score ready to be started.
#[derive(Debug, Clone)]
pub struct CpalMusic {
    score: Arc<Score>,
}

impl CpalMusic {
    pub fn score(&self) -> &Score {
        &self.score
    }
}

#[derive(Debug, Clone, Copy)]
struct OutputFormat {
    sample_rate: u32,
    channels: u16,
}

/// [`Mixer`] on top of the default cpal output device.
///
/// The cpal stream lives on a dedicated audio thread, so the mixer itself
/// only holds the command sender, the channel flags and the thread handle
/// and can be moved between threads. A channel is busy from the moment a
/// chunk is started on it until the audio callback has played the chunk to
/// the end.
pub struct CpalMixer {
    output: Option<OutputFormat>,
    busy: Arc<[AtomicBool]>,
    commands: Option<Sender<MixCommand>>,
    shutdown: Option<Sender<()>>,
    audio_thread: Option<JoinHandle<()>>,
}

impl CpalMixer {
    pub fn new() -> Self {
        Self {
            output: None,
            busy: Arc::from(Vec::new()),
            commands: None,
            shutdown: None,
            audio_thread: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.audio_thread.is_some()
    }

    /// The rate the device actually runs at, once open.
    pub fn sample_rate(&self) -> Option<u32> {
        self.output.map(|output| output.sample_rate)
    }

    fn output(&self) -> Result<OutputFormat> {
        self.output
            .ok_or_else(|| AudioError::Init("audio device is not open".to_string()))
    }

    fn send(&self, command: MixCommand) -> Result<()> {
        let sender = self
            .commands
            .as_ref()
            .ok_or_else(|| AudioError::Init("audio device is not open".to_string()))?;
        sender
            .send(command)
            .map_err(|e| AudioError::Playback(format!("failed to send mixer command: {}", e)))
    }

    fn claim_channel(&self) -> Option<usize> {
        self.busy.iter().position(|flag| {
            flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    /// Body of the audio thread: owns the stream until shutdown is signalled
    /// or its sender is dropped.
    fn run_audio_thread(
        spec: DeviceSpec,
        busy: Arc<[AtomicBool]>,
        commands: Receiver<MixCommand>,
        ready: Sender<Result<OutputFormat>>,
        shutdown: Receiver<()>,
    ) {
        let stream = match Self::start_stream(&spec, busy, commands) {
            Ok((stream, output)) => {
                let _ = ready.send(Ok(output));
                stream
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        let _ = shutdown.recv();
        drop(stream);
        log::debug!("Audio thread stopped");
    }

    fn start_stream(
        spec: &DeviceSpec,
        busy: Arc<[AtomicBool]>,
        commands: Receiver<MixCommand>,
    ) -> Result<(cpal::Stream, OutputFormat)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::Init("no default output device available".into()))?;

        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::Init(format!("failed to get default config: {}", e)))?;
        let sample_format = default_config.sample_format();

        let requested = cpal::StreamConfig {
            channels: spec.channels,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(spec.buffer_frames),
        };

        let state = MixState::new(
            requested.channels,
            spec.sample_rate,
            busy.clone(),
            commands.clone(),
        );

        let (stream, config) =
            match Self::build_stream(&device, &requested, sample_format, state) {
                Ok(stream) => (stream, requested),
                Err(e) => {
                    // let the device pick its own format, like an "allow any change" open
                    let fallback: cpal::StreamConfig = default_config.config();
                    log::warn!(
                        "Requested {} Hz / {} ch not available ({}), using {} Hz / {} ch",
                        spec.sample_rate,
                        spec.channels,
                        e,
                        fallback.sample_rate.0,
                        fallback.channels
                    );
                    let state = MixState::new(
                        fallback.channels,
                        fallback.sample_rate.0,
                        busy.clone(),
                        commands,
                    );
                    let stream = Self::build_stream(&device, &fallback, sample_format, state)?;
                    (stream, fallback)
                }
            };

        stream
            .play()
            .map_err(|e| AudioError::Init(format!("failed to start stream: {}", e)))?;

        log::info!(
            "Audio device open: {} Hz, {} channels, {} mixer channels",
            config.sample_rate.0,
            config.channels,
            busy.len()
        );

        Ok((
            stream,
            OutputFormat {
                sample_rate: config.sample_rate.0,
                channels: config.channels,
            },
        ))
    }

    fn build_stream(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
        state: MixState,
    ) -> Result<cpal::Stream> {
        match sample_format {
            cpal::SampleFormat::F32 => Self::create_stream::<f32>(device, config, state),
            cpal::SampleFormat::I16 => Self::create_stream::<i16>(device, config, state),
            cpal::SampleFormat::U16 => Self::create_stream::<u16>(device, config, state),
            cpal::SampleFormat::U8 => Self::create_stream::<u8>(device, config, state),
            other => Err(AudioError::Init(format!(
                "unsupported sample format {:?}",
                other
            ))),
        }
    }

    fn create_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut state: MixState,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let mut scratch: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    state.render(&mut scratch);
                    for (out, sample) in data.iter_mut().zip(&scratch) {
                        *out = T::from_sample(*sample);
                    }
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::Init(format!("failed to build stream: {}", e)))
    }
}

impl Default for CpalMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer for CpalMixer {
    type Chunk = CpalChunk;
    type Music = CpalMusic;

    fn open_device(&mut self, spec: &DeviceSpec) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let busy: Arc<[AtomicBool]> = (0..spec.mix_channels.max(1))
            .map(|_| AtomicBool::new(false))
            .collect();

        let (sender, receiver) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let spec = *spec;
        let thread_busy = busy.clone();
        let handle = thread::Builder::new()
            .name("retrosound-audio".to_string())
            .spawn(move || {
                Self::run_audio_thread(spec, thread_busy, receiver, ready_tx, shutdown_rx)
            })
            .map_err(|e| AudioError::Init(format!("failed to spawn audio thread: {}", e)))?;

        let output = match ready_rx.recv() {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(AudioError::Init(
                    "audio thread exited before the stream started".to_string(),
                ));
            }
        };

        self.output = Some(output);
        self.busy = busy;
        self.commands = Some(sender);
        self.shutdown = Some(shutdown_tx);
        self.audio_thread = Some(handle);
        Ok(())
    }

    fn load_chunk(&mut self, wav: &[u8]) -> Result<Self::Chunk> {
        let output = self.output()?;
        let pcm = decode_wav(wav)?;

        let remixed = remix_channels(&pcm.samples, pcm.channels, output.channels);
        let resampler =
            ChunkResampler::new(pcm.sample_rate, output.sample_rate, output.channels, None)?;
        let samples = resampler.resample_interleaved(&remixed)?;

        log::debug!(
            "Mixer: decoded chunk {} Hz x{} -> {} frames at {} Hz",
            pcm.sample_rate,
            pcm.channels,
            samples.len() / output.channels.max(1) as usize,
            output.sample_rate
        );

        Ok(CpalChunk {
            samples: samples.into(),
            sample_rate: output.sample_rate,
            channels: output.channels,
        })
    }

    fn load_music(&mut self, stream: &[u8], format: MusicFormat) -> Result<Self::Music> {
        match format {
            MusicFormat::Midi => Ok(CpalMusic {
                score: Arc::new(parse_smf(stream)?),
            }),
        }
    }

    fn play_chunk(&mut self, chunk: &Self::Chunk, loops: LoopMode) -> Result<Channel> {
        if !self.is_open() {
            return Err(AudioError::Playback("audio device is not open".to_string()));
        }
        let channel = self
            .claim_channel()
            .ok_or_else(|| AudioError::Playback("no free channels available".to_string()))?;

        if let Err(e) = self.send(MixCommand::Play {
            channel,
            samples: chunk.samples.clone(),
            loops,
        }) {
            self.busy[channel].store(false, Ordering::Release);
            return Err(e);
        }
        Ok(Channel(channel))
    }

    fn set_position(&mut self, channel: Channel, angle: i16, distance: u8) -> Result<()> {
        if channel.0 >= self.busy.len() {
            return Err(AudioError::Position(format!("invalid channel {}", channel)));
        }
        let gains = StereoGains::from_position(Position {
            angle,
            distance,
        });
        self.send(MixCommand::SetGains {
            channel: channel.0,
            gains,
        })
    }

    fn fade_in_music(
        &mut self,
        music: &Self::Music,
        loops: LoopMode,
        fade_in: Duration,
    ) -> Result<()> {
        let output = self.output()?;
        let fade_frames = (fade_in.as_secs_f64() * output.sample_rate as f64) as u64;
        self.send(MixCommand::StartMusic {
            score: music.score.clone(),
            loops,
            fade_frames,
        })
    }

    fn playing(&self) -> usize {
        self.busy
            .iter()
            .filter(|flag| flag.load(Ordering::Acquire))
            .count()
    }

    fn close_device(&mut self) {
        if let Some(sender) = self.commands.take() {
            let _ = sender.send(MixCommand::StopAll);
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.audio_thread.take() {
            if handle.join().is_err() {
                log::error!("Audio thread panicked");
            }
            log::info!("Audio device closed");
        }
        for flag in self.busy.iter() {
            flag.store(false, Ordering::Release);
        }
        self.output = None;
    }
}

impl Drop for CpalMixer {
    fn drop(&mut self) {
        self.close_device();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_mixer_refuses_work() {
        let mut mixer = CpalMixer::new();
        let wav = crate::sound::SoundAsset::mono_u8("DSPISTOL", vec![128; 16], 11025).to_wav();

        assert!(matches!(mixer.load_chunk(&wav), Err(AudioError::Init(_))));
        assert_eq!(mixer.playing(), 0);
        assert!(mixer.set_position(Channel(0), 90, 10).is_err());
        assert!(mixer.sample_rate().is_none());
    }

    #[test]
    fn test_music_loads_without_device() {
        let mut mixer = CpalMixer::new();
        let music = mixer
            .load_music(&crate::mixer::midi::tests::one_note(), MusicFormat::Midi)
            .unwrap();
        assert_eq!(music.score().events().len(), 2);
        assert!(matches!(
            mixer.load_music(b"junk", MusicFormat::Midi),
            Err(AudioError::MidiLoad(_))
        ));
    }

    #[test]
    fn test_close_without_open_is_harmless() {
        let mut mixer = CpalMixer::new();
        mixer.close_device();
        mixer.close_device();
        assert!(!mixer.is_open());
    }
}
