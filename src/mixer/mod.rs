//! The mixer capability the driver plays through.
//!
//! [`Mixer`] is the seam between the driver and whatever actually owns the
//! audio device. [`CpalMixer`] is the bundled implementation; tests use a
//! scripted double.

mod decode;
mod device;
pub(crate) mod midi;
mod render;
mod resampler;
#[cfg(test)]
pub(crate) mod testing;

pub use device::{CpalChunk, CpalMixer, CpalMusic};
pub use midi::{Score, ScoreEvent, TimedEvent, parse_smf};

use crate::config::DeviceSpec;
use crate::error::Result;
use crate::music::MusicFormat;
use std::fmt;
use std::time::Duration;

/// Opaque handle of one mixer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(pub usize);

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How often a chunk or score repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Play exactly once
    #[default]
    Once,
    /// Restart from the beginning until stopped
    Infinite,
}

/// Device and mixing capabilities consumed by [`crate::AudioDriver`].
///
/// Every call returns once the request is accepted, not once the audio has
/// been heard. Playback happens on the implementation's own thread.
pub trait Mixer {
    /// A decoded, playback-ready sound.
    type Chunk;
    /// A loaded music score.
    type Music;

    /// Opens the output device. Opening an already open device succeeds.
    fn open_device(&mut self, spec: &DeviceSpec) -> Result<()>;

    /// Decodes a WAV byte stream into a chunk.
    fn load_chunk(&mut self, wav: &[u8]) -> Result<Self::Chunk>;

    /// Loads a music score from memory using a format hint.
    fn load_music(&mut self, stream: &[u8], format: MusicFormat) -> Result<Self::Music>;

    /// Starts a chunk on the first free channel and returns that channel.
    fn play_chunk(&mut self, chunk: &Self::Chunk, loops: LoopMode) -> Result<Channel>;

    /// Positions a playing channel. `angle` is a compass bearing in degrees,
    /// `distance` runs from 0 (at the listener) to 255 (far away).
    fn set_position(&mut self, channel: Channel, angle: i16, distance: u8) -> Result<()>;

    /// Replaces the current music with `music` and fades it in.
    fn fade_in_music(&mut self, music: &Self::Music, loops: LoopMode, fade_in: Duration)
    -> Result<()>;

    /// Number of channels that are still playing.
    fn playing(&self) -> usize;

    /// Stops everything and releases the device.
    fn close_device(&mut self);
}
