//! Lazily decoded sound chunks, keyed by sound name

use crate::error::{AudioError, Result};
use crate::sound::Sounds;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps sound names to decoded chunks.
///
/// A name is decoded the first time it is requested; every later request
/// returns the same `Arc`. Failed lookups and failed decodes leave the cache
/// untouched, so a later request tries again.
#[derive(Debug)]
pub struct ChunkCache<C> {
    chunks: HashMap<String, Arc<C>>,
}

impl<C> ChunkCache<C> {
    pub fn new() -> Self {
        Self {
            chunks: HashMap::new(),
        }
    }

    /// Returns the cached chunk for `name`, decoding it from `sounds` with
    /// `decode` on a miss. `decode` receives the WAV encoding of the asset.
    pub fn get_or_create<F>(&mut self, name: &str, sounds: &Sounds, decode: F) -> Result<Arc<C>>
    where
        F: FnOnce(&[u8]) -> Result<C>,
    {
        if let Some(chunk) = self.chunks.get(name) {
            log::debug!("Chunk cache hit: {}", name);
            return Ok(chunk.clone());
        }

        let asset = sounds
            .get(name)
            .ok_or_else(|| AudioError::SoundNotFound(name.to_string()))?;

        log::debug!(
            "Chunk cache miss: decoding {} ({} Hz, {} frames)",
            name,
            asset.sample_rate(),
            asset.total_frames()
        );

        let chunk = Arc::new(decode(&asset.to_wav())?);
        self.chunks.insert(name.to_string(), chunk.clone());
        Ok(chunk)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<C>> {
        self.chunks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chunks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

impl<C> Default for ChunkCache<C> {
    fn default() -> Self {
        Self::new()
    }
}
