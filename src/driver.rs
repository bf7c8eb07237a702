use crate::cache::ChunkCache;
use crate::config::DriverConfig;
use crate::error::{AudioError, Result};
use crate::mixer::{CpalMixer, LoopMode, Mixer};
use crate::music::{Track, TrackStore};
use crate::position::Position;
use crate::sound::Sounds;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Lifecycle of an [`AudioDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Neither `init_audio` nor `init_music` has succeeded yet
    Uninitialized,
    /// The device is open and playback requests are accepted
    Initialized,
    /// `close` has run; every playback request fails with `DriverClosed`
    Closed,
}

/// Sound effect and music driver.
///
/// The driver resolves sound names to chunks through a lazily filled cache,
/// starts them on the mixer and forgets about them: it never tracks
/// individual channels. The only time it looks at the mixer again is on
/// [`close`](Self::close), where it waits a bounded amount of time for the
/// playing channels to finish.
///
/// All operations take `&mut self`. Share a driver between threads by
/// wrapping it in a `Mutex`.
pub struct AudioDriver<M: Mixer = CpalMixer> {
    mixer: M,
    config: DriverConfig,
    state: DriverState,
    sounds: Option<Arc<Sounds>>,
    tracks: Option<Arc<TrackStore>>,
    chunks: ChunkCache<M::Chunk>,
    current_music: Option<M::Music>,
    test_mode: bool,
}

impl AudioDriver<CpalMixer> {
    /// A driver playing through the default output device.
    pub fn with_default_device() -> Self {
        Self::new(CpalMixer::new())
    }
}

impl<M: Mixer> AudioDriver<M> {
    pub fn new(mixer: M) -> Self {
        Self::with_config(mixer, DriverConfig::default())
    }

    pub fn with_config(mixer: M, config: DriverConfig) -> Self {
        Self {
            mixer,
            config,
            state: DriverState::Uninitialized,
            sounds: None,
            tracks: None,
            chunks: ChunkCache::new(),
            current_music: None,
            test_mode: false,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == DriverState::Closed
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    /// Number of sounds decoded so far.
    pub fn cached_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn has_music(&self) -> bool {
        self.current_music.is_some()
    }

    /// In test mode `close` does not wait for playing channels.
    pub fn set_test_mode(&mut self, enabled: bool) {
        self.test_mode = enabled;
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    fn open_device(&mut self) -> Result<()> {
        match self.state {
            DriverState::Closed => return Err(AudioError::DriverClosed),
            DriverState::Initialized => return Ok(()),
            DriverState::Uninitialized => {}
        }

        let spec = self.config.device_spec();
        self.mixer.open_device(&spec).map_err(|e| {
            let reason = match e {
                AudioError::Init(reason) => reason,
                other => other.to_string(),
            };
            AudioError::Init(format!("failed to open audio device: {}", reason))
        })?;

        log::info!(
            "Audio driver initialized: {} Hz, {} channels, {} frame buffer",
            spec.sample_rate,
            spec.channels,
            spec.buffer_frames
        );
        self.state = DriverState::Initialized;
        Ok(())
    }

    /// Opens the device and binds the sound collection chunks are decoded from.
    ///
    /// Chunks decoded from a previously bound collection are dropped.
    pub fn init_audio(&mut self, sounds: Arc<Sounds>) -> Result<()> {
        self.open_device()?;
        log::debug!("Bound {} sounds", sounds.len());
        self.chunks.clear();
        self.sounds = Some(sounds);
        Ok(())
    }

    /// Opens the device if needed and binds the track store.
    pub fn init_music(&mut self, tracks: Arc<TrackStore>) -> Result<()> {
        self.open_device()?;
        log::debug!("Bound {} music tracks", tracks.len());
        self.tracks = Some(tracks);
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            DriverState::Initialized => Ok(()),
            DriverState::Closed => Err(AudioError::DriverClosed),
            DriverState::Uninitialized => Err(AudioError::NotInitialized),
        }
    }

    fn chunk(&mut self, name: &str) -> Result<Arc<M::Chunk>> {
        self.ensure_ready()?;
        let sounds = self.sounds.as_ref().ok_or(AudioError::NotInitialized)?;
        let mixer = &mut self.mixer;
        self.chunks
            .get_or_create(name, sounds, |wav| mixer.load_chunk(wav))
    }

    /// Plays a sound once at full volume.
    pub fn play(&mut self, name: &str) -> Result<()> {
        let chunk = self.chunk(name)?;
        self.mixer.play_chunk(&chunk, LoopMode::Once)?;
        Ok(())
    }

    /// Plays a sound once, positioned by `distance` and compass `angle`.
    ///
    /// The distance is clamped into `0..=255`. If positioning fails after
    /// the sound has started, the sound keeps playing unpositioned and the
    /// error is returned.
    pub fn play_at_position(&mut self, name: &str, distance: f32, angle: i16) -> Result<()> {
        let position = Position::new(distance, angle);
        let chunk = self.chunk(name)?;
        let channel = self.mixer.play_chunk(&chunk, LoopMode::Once)?;

        if let Err(e) = self
            .mixer
            .set_position(channel, position.angle, position.distance)
        {
            log::warn!("Failed to position {} on channel {}: {}", name, channel, e);
            return Err(match e {
                AudioError::Position(_) => e,
                other => AudioError::Position(other.to_string()),
            });
        }
        Ok(())
    }

    /// Loads `track` as the current music and fades it in, looping forever.
    ///
    /// The previous music is replaced only once the new score has loaded.
    pub fn play_music(&mut self, track: Option<&Track>) -> Result<()> {
        self.ensure_ready()?;
        let track = track.ok_or(AudioError::NilTrack)?;

        let music = self
            .mixer
            .load_music(track.stream(), track.format())
            .map_err(|e| match e {
                AudioError::MidiLoad(_) => e,
                other => AudioError::MidiLoad(other.to_string()),
            })?;

        log::debug!("Starting music {}", track.name());
        let music = self.current_music.insert(music);
        self.mixer
            .fade_in_music(music, LoopMode::Infinite, self.config.music_fade_in)
    }

    /// Plays the track called `name` from the store bound by `init_music`.
    pub fn play_track(&mut self, name: &str) -> Result<()> {
        self.ensure_ready()?;
        let tracks = self.tracks.clone().ok_or(AudioError::NotInitialized)?;
        let track = tracks
            .get(name)
            .ok_or_else(|| AudioError::TrackNotFound(name.to_string()))?;
        self.play_music(Some(track))
    }

    /// Waits for playing channels to finish, then releases the device.
    ///
    /// The wait ends when no channel is playing, when the fade-out window
    /// has passed, or immediately in test mode. The device is released in
    /// every case. Calling `close` again does nothing.
    pub fn close(&mut self) {
        match self.state {
            DriverState::Closed => return,
            DriverState::Uninitialized => {
                self.state = DriverState::Closed;
                return;
            }
            DriverState::Initialized => {}
        }

        self.drain();

        self.current_music = None;
        self.chunks.clear();
        self.mixer.close_device();
        self.state = DriverState::Closed;
        log::info!("Audio driver closed");
    }

    fn drain(&self) {
        let started = Instant::now();
        let interval = self.config.poll_interval();

        loop {
            let playing = self.mixer.playing();
            let elapsed = started.elapsed();
            if playing == 0 || self.test_mode || elapsed > self.config.fade_out {
                if playing > 0 {
                    log::info!(
                        "Stopping {} audio channels still playing after {:?}",
                        playing,
                        elapsed
                    );
                } else {
                    log::info!("All audio channels stopped after {:?}", elapsed);
                }
                return;
            }
            log::debug!("Waiting for {} audio channels to stop", playing);
            thread::sleep(interval);
        }
    }
}

impl<M: Mixer> Drop for AudioDriver<M> {
    fn drop(&mut self) {
        self.close();
    }
}
