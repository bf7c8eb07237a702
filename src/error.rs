//! Error types for retrosound

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio init error: {0}")]
    Init(String),

    #[error("{0} not found")]
    SoundNotFound(String),

    #[error("Track {0} not found")]
    TrackNotFound(String),

    #[error("Could not load WAV: {0}")]
    Decode(String),

    #[error("Could not load MIDI: {0}")]
    MidiLoad(String),

    #[error("No music track given")]
    NilTrack,

    #[error("Audio driver is closed")]
    DriverClosed,

    #[error("Audio driver is not initialized")]
    NotInitialized,

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Positioning error: {0}")]
    Position(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        assert_eq!(
            AudioError::SoundNotFound("DSPISTOL".into()).to_string(),
            "DSPISTOL not found"
        );
        assert_eq!(AudioError::NilTrack.to_string(), "No music track given");
        assert!(
            AudioError::MidiLoad("bad header".into())
                .to_string()
                .contains("bad header")
        );
    }
}
