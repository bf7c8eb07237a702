//! Scripted [`Mixer`] double for driver tests.

use crate::config::DeviceSpec;
use crate::error::{AudioError, Result};
use crate::mixer::{Channel, LoopMode, Mixer};
use crate::music::MusicFormat;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct FakeChunk {
    pub id: usize,
    pub wav_len: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct FakeMusic {
    pub id: usize,
}

/// Records every call and answers `playing()` from a script.
#[derive(Debug, Default)]
pub(crate) struct ScriptedMixer {
    pub open_specs: Vec<DeviceSpec>,
    pub closes: usize,
    pub decodes: usize,
    pub music_loads: usize,
    pub plays: Vec<(usize, LoopMode)>,
    pub positions: Vec<(Channel, i16, u8)>,
    pub fades: Vec<(usize, LoopMode, Duration)>,
    pub fail_open: bool,
    pub fail_play: bool,
    pub fail_position: bool,
    /// Counts returned by successive `playing()` calls; the last one repeats.
    playing_script: RefCell<VecDeque<usize>>,
    playing_polls: Cell<usize>,
}

impl ScriptedMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playing(counts: &[usize]) -> Self {
        let mixer = Self::new();
        mixer.playing_script.borrow_mut().extend(counts);
        mixer
    }

    pub fn playing_polls(&self) -> usize {
        self.playing_polls.get()
    }
}

impl Mixer for ScriptedMixer {
    type Chunk = FakeChunk;
    type Music = FakeMusic;

    fn open_device(&mut self, spec: &DeviceSpec) -> Result<()> {
        if self.fail_open {
            return Err(AudioError::Init("no audio device".to_string()));
        }
        self.open_specs.push(*spec);
        Ok(())
    }

    fn load_chunk(&mut self, wav: &[u8]) -> Result<Self::Chunk> {
        if !wav.starts_with(b"RIFF") {
            return Err(AudioError::Decode("missing RIFF header".to_string()));
        }
        self.decodes += 1;
        Ok(FakeChunk {
            id: self.decodes,
            wav_len: wav.len(),
        })
    }

    fn load_music(&mut self, stream: &[u8], _format: MusicFormat) -> Result<Self::Music> {
        if !stream.starts_with(b"MThd") {
            return Err(AudioError::MidiLoad("missing MThd header".to_string()));
        }
        self.music_loads += 1;
        Ok(FakeMusic {
            id: self.music_loads,
        })
    }

    fn play_chunk(&mut self, chunk: &Self::Chunk, loops: LoopMode) -> Result<Channel> {
        if self.fail_play {
            return Err(AudioError::Playback("no free channels available".to_string()));
        }
        self.plays.push((chunk.id, loops));
        Ok(Channel(self.plays.len() - 1))
    }

    fn set_position(&mut self, channel: Channel, angle: i16, distance: u8) -> Result<()> {
        if self.fail_position {
            return Err(AudioError::Position(format!("invalid channel {}", channel)));
        }
        self.positions.push((channel, angle, distance));
        Ok(())
    }

    fn fade_in_music(
        &mut self,
        music: &Self::Music,
        loops: LoopMode,
        fade_in: Duration,
    ) -> Result<()> {
        self.fades.push((music.id, loops, fade_in));
        Ok(())
    }

    fn playing(&self) -> usize {
        self.playing_polls.set(self.playing_polls.get() + 1);
        let mut script = self.playing_script.borrow_mut();
        if script.len() > 1 {
            script.pop_front().unwrap_or(0)
        } else {
            script.front().copied().unwrap_or(0)
        }
    }

    fn close_device(&mut self) {
        self.closes += 1;
    }
}
