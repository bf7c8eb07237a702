//! Music tracks and the store they are resolved from

use std::collections::HashMap;

/// Format hint passed to the mixer when a score is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum MusicFormat {
    /// Standard MIDI File (format 0 or 1)
    #[default]
    Midi,
}

/// A music track whose score is held in memory.
#[derive(Debug, Clone)]
pub struct Track {
    name: String,
    stream: Vec<u8>,
    format: MusicFormat,
}

impl Track {
    pub fn new(name: impl Into<String>, stream: Vec<u8>, format: MusicFormat) -> Self {
        Self {
            name: name.into(),
            stream,
            format,
        }
    }

    pub fn midi(name: impl Into<String>, stream: Vec<u8>) -> Self {
        Self::new(name, stream, MusicFormat::Midi)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw score bytes.
    pub fn stream(&self) -> &[u8] {
        &self.stream
    }

    pub fn format(&self) -> MusicFormat {
        self.format
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackStore {
    tracks: HashMap<String, Track>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, track: Track) -> Option<Track> {
        self.tracks.insert(track.name.clone(), track)
    }

    pub fn get(&self, name: &str) -> Option<&Track> {
        self.tracks.get(name)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl FromIterator<Track> for TrackStore {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        let mut store = Self::new();
        for track in iter {
            store.insert(track);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_replaces_same_name() {
        let mut store = TrackStore::new();
        assert!(store.insert(Track::midi("D_E1M1", vec![1])).is_none());
        let old = store.insert(Track::midi("D_E1M1", vec![2])).unwrap();

        assert_eq!(old.stream(), &[1]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("D_E1M1").unwrap().stream(), &[2]);
        assert_eq!(store.get("D_E1M1").unwrap().format(), MusicFormat::Midi);
    }
}
