use retrosound::{SoundAsset, Sounds, Track};

/// A short descending chirp, 22 kHz unsigned 8-bit.
fn chirp(name: &str) -> SoundAsset {
    let rate = 22050;
    let frames = rate as usize / 4;
    let samples = (0..frames)
        .map(|i| {
            let t = i as f32 / rate as f32;
            let freq = 1200.0 - 3000.0 * t;
            let value = (2.0 * std::f32::consts::PI * freq * t).sin();
            let envelope = 1.0 - i as f32 / frames as f32;
            (128.0 + 100.0 * value * envelope) as u8
        })
        .collect();
    SoundAsset::mono_u8(name, samples, rate)
}

/// A burst of decaying noise, 11 kHz unsigned 8-bit.
fn shot(name: &str) -> SoundAsset {
    let rate = 11025;
    let frames = rate as usize / 3;
    let mut seed: u32 = 0x1234_5678;
    let samples = (0..frames)
        .map(|i| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let noise = (seed & 0xff) as f32 - 128.0;
            let envelope = (-(i as f32) / (frames as f32 / 6.0)).exp();
            (128.0 + noise * envelope) as u8
        })
        .collect();
    SoundAsset::mono_u8(name, samples, rate)
}

pub fn sounds() -> Sounds {
    [chirp("DSITMBK"), shot("DSPISTOL")].into_iter().collect()
}

fn vlq(mut value: u32, out: &mut Vec<u8>) {
    let mut bytes = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    out.extend(bytes.iter().rev());
}

/// A single-track SMF playing `notes` as quarter notes at 140 bpm.
fn score(notes: &[u8]) -> Vec<u8> {
    let quarter = 96u32;
    let mut track = Vec::new();

    // tempo
    track.extend_from_slice(&[0x00, 0xff, 0x51, 0x03]);
    track.extend_from_slice(&(60_000_000u32 / 140).to_be_bytes()[1..]);

    for &key in notes {
        vlq(0, &mut track);
        track.extend_from_slice(&[0x90, key, 0x60]);
        vlq(quarter, &mut track);
        track.extend_from_slice(&[0x80, key, 0x00]);
    }
    track.extend_from_slice(&[0x00, 0xff, 0x2f, 0x00]);

    let mut smf = Vec::new();
    smf.extend_from_slice(b"MThd");
    smf.extend_from_slice(&6u32.to_be_bytes());
    smf.extend_from_slice(&0u16.to_be_bytes());
    smf.extend_from_slice(&1u16.to_be_bytes());
    smf.extend_from_slice(&(quarter as u16).to_be_bytes());
    smf.extend_from_slice(b"MTrk");
    smf.extend_from_slice(&(track.len() as u32).to_be_bytes());
    smf.extend_from_slice(&track);
    smf
}

pub fn theme() -> Track {
    Track::midi("D_DEMO", score(&[52, 52, 64, 52, 52, 62, 52, 52, 60, 52, 52, 58, 59, 60]))
}
