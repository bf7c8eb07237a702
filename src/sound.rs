//! Sound effect assets and the WAV encoder that feeds them to a mixer

use crate::error::Result;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

/// PCM sample layout of a [`SoundAsset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 8-bit unsigned, silence at 128
    U8,
    /// 16-bit signed little-endian
    S16,
}

impl SampleFormat {
    pub fn bits_per_sample(self) -> u16 {
        match self {
            Self::U8 => 8,
            Self::S16 => 16,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits_per_sample() as usize / 8
    }
}

/// A named, immutable block of raw PCM.
#[derive(Debug, Clone)]
pub struct SoundAsset {
    name: String,
    samples: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
}

impl SoundAsset {
    pub fn new(
        name: impl Into<String>,
        samples: Vec<u8>,
        sample_rate: u32,
        channels: u16,
        format: SampleFormat,
    ) -> Self {
        Self {
            name: name.into(),
            samples,
            sample_rate,
            channels: channels.max(1),
            format,
        }
    }

    /// Mono 8-bit unsigned PCM, the layout of classic game sound lumps.
    pub fn mono_u8(name: impl Into<String>, samples: Vec<u8>, sample_rate: u32) -> Self {
        Self::new(name, samples, sample_rate, 1, SampleFormat::U8)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    fn block_align(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }

    pub fn total_frames(&self) -> usize {
        self.samples.len() / self.block_align()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_frames() as f64 / self.sample_rate as f64)
    }

    /// Encodes the asset as a canonical 44-byte-header RIFF/WAVE stream.
    ///
    /// A trailing partial frame is dropped so the data chunk always holds
    /// whole frames.
    pub fn to_wav(&self) -> Vec<u8> {
        let block_align = self.block_align();
        let data = &self.samples[..self.total_frames() * block_align];
        let data_len = data.len() as u32;
        let byte_rate = self.sample_rate * block_align as u32;

        let mut wav = Vec::with_capacity(44 + data.len());
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&self.channels.to_le_bytes());
        wav.extend_from_slice(&self.sample_rate.to_le_bytes());
        wav.extend_from_slice(&byte_rate.to_le_bytes());
        wav.extend_from_slice(&(block_align as u16).to_le_bytes());
        wav.extend_from_slice(&self.format.bits_per_sample().to_le_bytes());

        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.extend_from_slice(data);
        wav
    }

    /// Writes the WAV encoding of the asset into `writer`.
    pub fn write_wav<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_wav())?;
        Ok(())
    }
}

/// Name-keyed collection of sound assets.
#[derive(Debug, Clone, Default)]
pub struct Sounds {
    assets: HashMap<String, SoundAsset>,
}

impl Sounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an asset, replacing any asset with the same name.
    pub fn insert(&mut self, asset: SoundAsset) -> Option<SoundAsset> {
        self.assets.insert(asset.name.clone(), asset)
    }

    pub fn get(&self, name: &str) -> Option<&SoundAsset> {
        self.assets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }
}

impl FromIterator<SoundAsset> for Sounds {
    fn from_iter<I: IntoIterator<Item = SoundAsset>>(iter: I) -> Self {
        let mut sounds = Self::new();
        for asset in iter {
            sounds.insert(asset);
        }
        sounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_wav_header_for_mono_u8() {
        let asset = SoundAsset::mono_u8("DSPISTOL", vec![128; 100], 11025);
        let wav = asset.to_wav();

        assert_eq!(wav.len(), 144);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(read_u32(&wav, 4), 136);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(read_u16(&wav, 20), 1);
        assert_eq!(read_u16(&wav, 22), 1);
        assert_eq!(read_u32(&wav, 24), 11025);
        assert_eq!(read_u32(&wav, 28), 11025);
        assert_eq!(read_u16(&wav, 32), 1);
        assert_eq!(read_u16(&wav, 34), 8);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(read_u32(&wav, 40), 100);
    }

    #[test]
    fn test_wav_drops_partial_frame() {
        let asset = SoundAsset::new("stereo", vec![0; 7], 22050, 2, SampleFormat::S16);
        assert_eq!(asset.total_frames(), 1);

        let wav = asset.to_wav();
        assert_eq!(read_u32(&wav, 28), 22050 * 4);
        assert_eq!(read_u16(&wav, 32), 4);
        assert_eq!(read_u32(&wav, 40), 4);
        assert_eq!(wav.len(), 48);
    }

    #[test]
    fn test_write_wav_matches_to_wav() {
        let asset = SoundAsset::mono_u8("DSITMBK", vec![1, 2, 3], 22050);
        let mut out = Vec::new();
        asset.write_wav(&mut out).unwrap();
        assert_eq!(out, asset.to_wav());
    }

    #[test]
    fn test_duration() {
        let asset = SoundAsset::mono_u8("half", vec![128; 11025], 22050);
        assert_eq!(asset.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_collection_lookup() {
        let sounds: Sounds = [
            SoundAsset::mono_u8("DSITMBK", vec![128; 4], 22050),
            SoundAsset::mono_u8("DSPISTOL", vec![128; 4], 11025),
        ]
        .into_iter()
        .collect();

        assert_eq!(sounds.len(), 2);
        assert!(sounds.contains("DSPISTOL"));
        assert_eq!(sounds.get("DSPISTOL").unwrap().sample_rate(), 11025);
        assert!(sounds.get("UNKNOWN_NAME").is_none());
    }
}
