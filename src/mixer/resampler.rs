use crate::error::{AudioError, Result};
use rubato::{FftFixedIn, Resampler};

/// Converts decoded chunks to the device sample rate.
pub(crate) struct ChunkResampler {
    source_sample_rate: u32,
    target_sample_rate: u32,
    channels: u16,
    chunk_size: usize,
}

impl ChunkResampler {
    pub fn new(
        source_sample_rate: u32,
        target_sample_rate: u32,
        channels: u16,
        chunk_size: Option<usize>,
    ) -> Result<Self> {
        if source_sample_rate == 0 || target_sample_rate == 0 {
            return Err(AudioError::Decode(
                "sample rates must be greater than 0".to_string(),
            ));
        }

        if channels == 0 {
            return Err(AudioError::Decode(
                "channel count must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            source_sample_rate,
            target_sample_rate,
            channels,
            chunk_size: chunk_size.unwrap_or(1024),
        })
    }

    /// Number of output frames produced for `frames` input frames.
    pub fn output_frames(&self, frames: usize) -> usize {
        let (from, to) = (
            self.source_sample_rate as usize,
            self.target_sample_rate as usize,
        );
        (frames * to).div_ceil(from)
    }

    /// Resamples interleaved PCM, compensating for the resampler delay so the
    /// output starts with the first input frame.
    pub fn resample_interleaved(&self, interleaved: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate || interleaved.is_empty() {
            return Ok(interleaved.to_vec());
        }

        let channels = self.channels as usize;
        let frames = interleaved.len() / channels;

        let planar: Vec<Vec<f32>> = (0..channels)
            .map(|ch| {
                interleaved
                    .chunks_exact(channels)
                    .map(|frame| frame[ch])
                    .collect()
            })
            .collect();

        let mut resampler = FftFixedIn::<f32>::new(
            self.source_sample_rate as usize,
            self.target_sample_rate as usize,
            self.chunk_size,
            2, // sub_chunks
            channels,
        )
        .map_err(|e| AudioError::Decode(format!("failed to create resampler: {}", e)))?;

        let delay = resampler.output_delay();
        let wanted = self.output_frames(frames);
        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted + delay); channels];
        let mut input_index = 0;

        // Keep feeding silence past the end until the delayed tail is flushed
        while output[0].len() < wanted + delay {
            let chunk_frames = resampler.input_frames_next();
            let waves_in: Vec<Vec<f32>> = planar
                .iter()
                .map(|channel| {
                    let mut chunk = vec![0.0f32; chunk_frames];
                    if input_index < frames {
                        let end = (input_index + chunk_frames).min(frames);
                        chunk[..end - input_index].copy_from_slice(&channel[input_index..end]);
                    }
                    chunk
                })
                .collect();
            input_index += chunk_frames;

            let waves_out = resampler
                .process(&waves_in, None)
                .map_err(|e| AudioError::Decode(format!("resampling error: {}", e)))?;

            for (out, wave) in output.iter_mut().zip(waves_out) {
                out.extend_from_slice(&wave);
            }
        }

        let mut interleaved_out = Vec::with_capacity(wanted * channels);
        for frame_idx in delay..delay + wanted {
            for channel in &output {
                interleaved_out.push(channel[frame_idx]);
            }
        }

        Ok(interleaved_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleven_khz_sound_fits_device_rate() {
        // an 11 kHz effect played on the 22 kHz device
        let resampler = ChunkResampler::new(11025, 22050, 1, None).unwrap();
        let input: Vec<f32> = (0..1102).map(|i| (i as f32 * 0.1).sin() * 0.5).collect();

        let output = resampler.resample_interleaved(&input).unwrap();
        assert_eq!(output.len(), 2204);
        assert!(output.iter().all(|s| s.abs() <= 1.0));

        // a chunk with no rate cannot be resampled
        assert!(matches!(
            ChunkResampler::new(0, 22050, 1, None),
            Err(AudioError::Decode(_))
        ));
    }

    #[test]
    fn test_same_rate_is_passthrough() {
        let resampler = ChunkResampler::new(22050, 22050, 1, None).unwrap();
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resampler.resample_interleaved(&samples).unwrap(), samples);
    }

    #[test]
    fn test_upsampling_doubles_length() {
        let resampler = ChunkResampler::new(11025, 22050, 2, Some(256)).unwrap();
        let input: Vec<f32> = (0..1000)
            .flat_map(|i| {
                let s = (i as f32 * 0.05).sin() * 0.5;
                [s, -s]
            })
            .collect();

        let output = resampler.resample_interleaved(&input).unwrap();
        assert_eq!(output.len(), 2000 * 2);
        assert!(output.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_output_frame_count_rounds_up() {
        let resampler = ChunkResampler::new(22050, 48000, 1, None).unwrap();
        assert_eq!(resampler.output_frames(22050), 48000);
        assert_eq!(resampler.output_frames(1), 3);
    }
}
