//! # retrosound
//!
//! Sound effect and music driver for a classic game engine.
//!
//! Sounds come from the game's asset collection as raw PCM. The driver turns
//! each one into a playable chunk the first time it is asked for and keeps
//! it for the rest of the session. Music comes as MIDI scores which are
//! faded in and looped.
//!
//! ## Quick Start
//!
//! ```no_run
//! use retrosound::*;
//! use std::sync::Arc;
//!
//! let sounds: Sounds = [SoundAsset::mono_u8("DSPISTOL", vec![128; 1102], 11025)]
//!     .into_iter()
//!     .collect();
//!
//! let mut driver = AudioDriver::with_default_device();
//! driver.init_audio(Arc::new(sounds))?;
//!
//! // Full volume
//! driver.play("DSPISTOL")?;
//!
//! // 64 units away, to the listener's right
//! driver.play_at_position("DSPISTOL", 64.0, 90)?;
//!
//! // Waits up to a second for playing sounds, then releases the device
//! driver.close();
//! # Ok::<(), AudioError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`AudioDriver`]**: Caches chunks, starts sounds and music, owns the close sequence
//! - **[`Mixer`]**: The mixer capability the driver plays through
//! - **[`CpalMixer`]**: Mixer on the default output device
//! - **[`Position`]**: Distance and compass angle of a positioned sound
//! - **[`DriverConfig`]**: Device format, fade-out window and music fade-in

pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod mixer;
pub mod music;
pub mod position;
pub mod sound;

pub use cache::ChunkCache;
pub use config::{DeviceSpec, DriverConfig};
pub use driver::{AudioDriver, DriverState};
pub use error::{AudioError, Result};
pub use mixer::{Channel, CpalMixer, LoopMode, Mixer};
pub use music::{MusicFormat, Track, TrackStore};
pub use position::{MAX_DISTANCE, Position, StereoGains, clamp_distance};
pub use sound::{SampleFormat, SoundAsset, Sounds};
