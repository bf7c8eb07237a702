use crate::error::{AudioError, Result};
use std::io::Cursor;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Interleaved f32 PCM as it came out of the decoder.
#[derive(Debug, Clone)]
pub(crate) struct DecodedPcm {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decodes an in-memory WAV stream with Symphonia.
pub(crate) fn decode_wav(bytes: &[u8]) -> Result<DecodedPcm> {
    let source = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Decode(format!("failed to probe stream: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| AudioError::Decode("no default audio track".to_string()))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("sample rate not found".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| AudioError::Decode("channel count not found".to_string()))?
        .count() as u16;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("failed to create decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break, // end-of-stream
            Err(e) => {
                return Err(AudioError::Decode(format!("error reading packet: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::IoError(_)) => break,
            Err(Error::DecodeError(_)) => continue, // recoverable corruption
            Err(e) => {
                return Err(AudioError::Decode(format!("error decoding packet: {}", e)));
            }
        };

        let spec = *decoded.spec();
        let mut tmp = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        tmp.copy_interleaved_ref(decoded);
        samples.extend_from_slice(tmp.samples());
    }

    Ok(DecodedPcm {
        samples,
        sample_rate,
        channels,
    })
}

/// Converts interleaved PCM between channel counts.
///
/// Mono is copied to every output channel. Downmixing averages the source
/// frame. Other conversions keep the first channels and pad with silence.
pub(crate) fn remix_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let (from, to) = (from.max(1) as usize, to.max(1) as usize);
    if from == to {
        return samples.to_vec();
    }

    let frames = samples.chunks_exact(from);
    let mut out = Vec::with_capacity(frames.len() * to);

    for frame in frames {
        if from == 1 {
            out.extend(std::iter::repeat_n(frame[0], to));
        } else if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            out.extend((0..to).map(|ch| frame.get(ch).copied().unwrap_or(0.0)));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::{SampleFormat, SoundAsset};

    #[test]
    fn test_decode_u8_wav() {
        let asset = SoundAsset::mono_u8("DSPISTOL", vec![128, 255, 0, 128], 11025);
        let pcm = decode_wav(&asset.to_wav()).unwrap();

        assert_eq!(pcm.sample_rate, 11025);
        assert_eq!(pcm.channels, 1);
        assert_eq!(pcm.samples.len(), 4);
        assert!(pcm.samples[0].abs() < 0.01);
        assert!(pcm.samples[1] > 0.9);
        assert!(pcm.samples[2] < -0.9);
    }

    #[test]
    fn test_decode_s16_stereo_wav() {
        let mut data = Vec::new();
        for sample in [i16::MAX, i16::MIN, 0, 0] {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        let asset = SoundAsset::new("stereo", data, 22050, 2, SampleFormat::S16);
        let pcm = decode_wav(&asset.to_wav()).unwrap();

        assert_eq!(pcm.channels, 2);
        assert_eq!(pcm.sample_rate, 22050);
        assert_eq!(pcm.samples.len(), 4);
        assert!(pcm.samples[0] > 0.99);
        assert!(pcm.samples[1] < -0.99);
    }

    #[test]
    fn test_malformed_bytes_fail_to_decode() {
        let err = decode_wav(b"definitely not a riff stream").unwrap_err();
        assert!(matches!(err, AudioError::Decode(_)));
    }

    #[test]
    fn test_remix_mono_to_stereo() {
        assert_eq!(remix_channels(&[0.1, 0.2], 1, 2), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_remix_stereo_to_mono() {
        assert_eq!(remix_channels(&[0.5, 0.25, 1.0, 0.0], 2, 1), vec![0.375, 0.5]);
    }

    #[test]
    fn test_remix_same_layout_is_copy() {
        let samples = [0.1, 0.2, 0.3, 0.4];
        assert_eq!(remix_channels(&samples, 2, 2), samples.to_vec());
    }
}
