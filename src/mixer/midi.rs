//! Standard MIDI File reader and a small tone renderer for it.
//!
//! The renderer plays every melodic note as a triangle wave. It exists so
//! that scores are audible through [`super::CpalMixer`]; it is not a
//! General MIDI synthesizer.

use crate::error::{AudioError, Result};
use crate::mixer::LoopMode;
use std::sync::Arc;

const DEFAULT_TEMPO_US: u32 = 500_000;
const PERCUSSION_CHANNEL: u8 = 9;
const MAX_POLYPHONY: usize = 32;
const NOTE_GAIN: f32 = 0.12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8 },
    AllNotesOff { channel: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    /// Seconds from the start of the score
    pub at: f64,
    pub event: ScoreEvent,
}

/// A parsed score: note events on a single timeline.
#[derive(Debug, Clone, Default)]
pub struct Score {
    events: Vec<TimedEvent>,
    length: f64,
}

impl Score {
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    /// Length in seconds, up to the last event of the longest track.
    pub fn length(&self) -> f64 {
        self.length
    }
}

enum RawEvent {
    Note(ScoreEvent),
    Tempo(u32),
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn peek(&self) -> Result<u8> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or_else(|| truncated(self.pos))
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Variable-length quantity, at most four bytes.
    fn vlq(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..4 {
            let byte = self.u8()?;
            value = (value << 7) | (byte & 0x7f) as u32;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(AudioError::MidiLoad(format!(
            "variable-length value too long at byte {}",
            self.pos
        )))
    }
}

fn truncated(pos: usize) -> AudioError {
    AudioError::MidiLoad(format!("unexpected end of data at byte {}", pos))
}

/// Parses a Standard MIDI File (format 0 or 1, metrical timing).
pub fn parse_smf(bytes: &[u8]) -> Result<Score> {
    let mut reader = Reader::new(bytes);

    if reader.take(4).map_err(|_| not_midi())? != b"MThd" {
        return Err(not_midi());
    }
    let header_len = reader.u32()? as usize;
    if header_len < 6 {
        return Err(AudioError::MidiLoad("header chunk too short".to_string()));
    }
    let format = reader.u16()?;
    let track_count = reader.u16()?;
    let division = reader.u16()?;
    reader.take(header_len - 6)?;

    if format > 2 {
        return Err(AudioError::MidiLoad(format!("unknown format {}", format)));
    }
    if division & 0x8000 != 0 {
        return Err(AudioError::MidiLoad(
            "SMPTE time division is not supported".to_string(),
        ));
    }
    if division == 0 {
        return Err(AudioError::MidiLoad("zero ticks per quarter note".to_string()));
    }

    let mut timeline: Vec<(u64, RawEvent)> = Vec::new();
    let mut end_tick = 0u64;
    let mut tracks_read = 0u16;

    while tracks_read < track_count && !reader.is_empty() {
        let id = reader.take(4)?;
        let len = reader.u32()? as usize;
        let body = reader.take(len)?;
        if id != b"MTrk" {
            // unknown chunks are skipped
            continue;
        }
        let track_end = parse_track(body, &mut timeline)?;
        end_tick = end_tick.max(track_end);
        tracks_read += 1;
    }

    if tracks_read < track_count {
        return Err(AudioError::MidiLoad(format!(
            "expected {} tracks, found {}",
            track_count, tracks_read
        )));
    }

    // stable sort keeps per-track order for equal ticks
    timeline.sort_by_key(|(tick, _)| *tick);

    let ticks_per_quarter = division as f64;
    let mut tempo = DEFAULT_TEMPO_US;
    let mut last_tick = 0u64;
    let mut seconds = 0.0f64;
    let mut events = Vec::with_capacity(timeline.len());

    let advance = |tick: u64, tempo: u32, last_tick: &mut u64, seconds: &mut f64| {
        *seconds += (tick - *last_tick) as f64 * tempo as f64 / 1_000_000.0 / ticks_per_quarter;
        *last_tick = tick;
    };

    for (tick, raw) in timeline {
        advance(tick, tempo, &mut last_tick, &mut seconds);
        match raw {
            RawEvent::Tempo(us) => tempo = us.max(1),
            RawEvent::Note(event) => events.push(TimedEvent { at: seconds, event }),
        }
    }
    advance(end_tick.max(last_tick), tempo, &mut last_tick, &mut seconds);

    Ok(Score {
        events,
        length: seconds,
    })
}

fn not_midi() -> AudioError {
    AudioError::MidiLoad("not a Standard MIDI File (missing MThd)".to_string())
}

/// Appends the track's events to `timeline` and returns the tick of its end.
fn parse_track(body: &[u8], timeline: &mut Vec<(u64, RawEvent)>) -> Result<u64> {
    let mut reader = Reader::new(body);
    let mut tick = 0u64;
    let mut running_status: Option<u8> = None;

    while !reader.is_empty() {
        tick += reader.vlq()? as u64;

        let status = if reader.peek()? & 0x80 != 0 {
            reader.u8()?
        } else {
            running_status
                .ok_or_else(|| AudioError::MidiLoad("data byte without status".to_string()))?
        };

        match status {
            0xff => {
                let kind = reader.u8()?;
                let len = reader.vlq()? as usize;
                let data = reader.take(len)?;
                match kind {
                    0x2f => break,
                    0x51 if data.len() == 3 => {
                        let us = u32::from_be_bytes([0, data[0], data[1], data[2]]);
                        timeline.push((tick, RawEvent::Tempo(us)));
                    }
                    _ => {}
                }
            }
            0xf0 | 0xf7 => {
                let len = reader.vlq()? as usize;
                reader.take(len)?;
            }
            0xf1..=0xfe => {
                return Err(AudioError::MidiLoad(format!(
                    "system message {:#04x} inside a track",
                    status
                )));
            }
            _ => {
                running_status = Some(status);
                let channel = status & 0x0f;
                match status & 0xf0 {
                    0x80 => {
                        let key = reader.u8()?;
                        reader.u8()?;
                        timeline.push((tick, RawEvent::Note(ScoreEvent::NoteOff { channel, key })));
                    }
                    0x90 => {
                        let key = reader.u8()?;
                        let velocity = reader.u8()?;
                        let event = if velocity == 0 {
                            ScoreEvent::NoteOff { channel, key }
                        } else {
                            ScoreEvent::NoteOn {
                                channel,
                                key,
                                velocity,
                            }
                        };
                        timeline.push((tick, RawEvent::Note(event)));
                    }
                    0xb0 => {
                        let controller = reader.u8()?;
                        reader.u8()?;
                        if controller == 120 || controller == 123 {
                            timeline.push((tick, RawEvent::Note(ScoreEvent::AllNotesOff { channel })));
                        }
                    }
                    0xa0 | 0xe0 => {
                        reader.take(2)?;
                    }
                    _ => {
                        // 0xc0 program change, 0xd0 channel pressure
                        reader.u8()?;
                    }
                }
            }
        }
    }

    Ok(tick)
}

#[derive(Debug, Clone)]
struct Tone {
    channel: u8,
    key: u8,
    amplitude: f32,
    phase: f32,
    step: f32,
}

/// Renders a [`Score`] in real time.
#[derive(Debug)]
pub(crate) struct ScorePlayer {
    score: Arc<Score>,
    loops: LoopMode,
    sample_rate: u32,
    frame: u64,
    next_event: usize,
    tones: Vec<Tone>,
    fade_frames: u64,
    finished: bool,
}

impl ScorePlayer {
    pub fn new(score: Arc<Score>, loops: LoopMode, sample_rate: u32, fade_frames: u64) -> Self {
        let finished = score.length <= 0.0;
        Self {
            score,
            loops,
            sample_rate: sample_rate.max(1),
            frame: 0,
            next_event: 0,
            tones: Vec::with_capacity(MAX_POLYPHONY),
            fade_frames,
            finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn apply(&mut self, event: ScoreEvent) {
        match event {
            ScoreEvent::NoteOn { channel, .. } if channel == PERCUSSION_CHANNEL => {}
            ScoreEvent::NoteOn {
                channel,
                key,
                velocity,
            } => {
                if self.tones.len() == MAX_POLYPHONY {
                    self.tones.remove(0);
                }
                let frequency = 440.0 * 2f32.powf((key as f32 - 69.0) / 12.0);
                self.tones.push(Tone {
                    channel,
                    key,
                    amplitude: velocity as f32 / 127.0 * NOTE_GAIN,
                    phase: 0.0,
                    step: frequency / self.sample_rate as f32,
                });
            }
            ScoreEvent::NoteOff { channel, key } => {
                self.tones
                    .retain(|tone| !(tone.channel == channel && tone.key == key));
            }
            ScoreEvent::AllNotesOff { channel } => {
                self.tones.retain(|tone| tone.channel != channel);
            }
        }
    }

    fn restart(&mut self) {
        // the fade only applies to the first pass
        self.fade_frames = 0;
        self.frame = 0;
        self.next_event = 0;
        self.tones.clear();
    }

    /// Mixes the score into an interleaved buffer.
    pub fn render(&mut self, buffer: &mut [f32], channels: usize) {
        let channels = channels.max(1);

        for frame in buffer.chunks_exact_mut(channels) {
            if self.finished {
                return;
            }

            let now = self.frame as f64 / self.sample_rate as f64;
            while let Some(timed) = self.score.events.get(self.next_event).copied() {
                if timed.at > now {
                    break;
                }
                self.apply(timed.event);
                self.next_event += 1;
            }

            let mut sample = 0.0f32;
            for tone in &mut self.tones {
                // triangle wave in [-1, 1]
                sample += (4.0 * (tone.phase - 0.5).abs() - 1.0) * tone.amplitude;
                tone.phase = (tone.phase + tone.step).fract();
            }

            let fade = self.fade_gain();
            for out in frame.iter_mut() {
                *out += sample * fade;
            }

            self.frame += 1;

            if self.next_event >= self.score.events.len() && now >= self.score.length {
                match self.loops {
                    LoopMode::Infinite => self.restart(),
                    LoopMode::Once => {
                        self.finished = true;
                        self.tones.clear();
                    }
                }
            }
        }
    }

    fn fade_gain(&self) -> f32 {
        if self.fade_frames == 0 || self.frame >= self.fade_frames {
            1.0
        } else {
            self.frame as f32 / self.fade_frames as f32
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a format 0 file with one track holding `events` (raw bytes
    /// after the MTrk length, end-of-track appended).
    pub(crate) fn smf(division: u16, events: &[u8]) -> Vec<u8> {
        let mut track = events.to_vec();
        track.extend_from_slice(&[0x00, 0xff, 0x2f, 0x00]);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&division.to_be_bytes());
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&track);
        bytes
    }

    /// Middle C held for one quarter note at 120 bpm.
    pub(crate) fn one_note() -> Vec<u8> {
        smf(96, &[0x00, 0x90, 60, 100, 0x60, 0x80, 60, 0])
    }

    #[test]
    fn test_parse_single_note() {
        let score = parse_smf(&one_note()).unwrap();
        assert_eq!(score.events().len(), 2);
        assert_eq!(score.events()[0].at, 0.0);
        assert_eq!(
            score.events()[0].event,
            ScoreEvent::NoteOn {
                channel: 0,
                key: 60,
                velocity: 100
            }
        );
        assert!((score.events()[1].at - 0.5).abs() < 1e-9);
        assert!((score.length() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_running_status_and_zero_velocity() {
        // note on, then running-status note on with velocity 0
        let score = parse_smf(&smf(96, &[0x00, 0x91, 64, 90, 0x30, 64, 0])).unwrap();
        assert_eq!(
            score.events()[1].event,
            ScoreEvent::NoteOff { channel: 1, key: 64 }
        );
        assert!((score.events()[1].at - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_change_scales_time() {
        // 1 second per quarter note
        let score = parse_smf(&smf(
            96,
            &[0x00, 0xff, 0x51, 0x03, 0x0f, 0x42, 0x40, 0x00, 0x90, 60, 100, 0x60, 0x80, 60, 0],
        ))
        .unwrap();
        assert!((score.events()[1].at - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_non_midi() {
        assert!(matches!(
            parse_smf(b"RIFF....WAVE").unwrap_err(),
            AudioError::MidiLoad(_)
        ));
        assert!(matches!(parse_smf(b"").unwrap_err(), AudioError::MidiLoad(_)));
    }

    #[test]
    fn test_rejects_truncated_track() {
        let mut bytes = one_note();
        bytes.truncate(bytes.len() - 6);
        assert!(matches!(
            parse_smf(&bytes).unwrap_err(),
            AudioError::MidiLoad(_)
        ));
    }

    #[test]
    fn test_rejects_smpte_division() {
        assert!(parse_smf(&smf(0xe728, &[])).is_err());
    }

    #[test]
    fn test_player_fades_in() {
        let score = Arc::new(parse_smf(&one_note()).unwrap());
        let mut player = ScorePlayer::new(score, LoopMode::Once, 1000, 100);

        let mut buffer = vec![0.0f32; 200 * 2];
        player.render(&mut buffer, 2);

        let early = buffer[2..20].iter().map(|s| s.abs()).fold(0.0, f32::max);
        let late = buffer[300..400].iter().map(|s| s.abs()).fold(0.0, f32::max);
        assert!(late > 0.0);
        assert!(early < late);
    }

    #[test]
    fn test_player_once_finishes_and_infinite_does_not() {
        let score = Arc::new(parse_smf(&one_note()).unwrap());

        let mut once = ScorePlayer::new(score.clone(), LoopMode::Once, 1000, 0);
        let mut buffer = vec![0.0f32; 2000];
        once.render(&mut buffer, 1);
        assert!(once.is_finished());

        let mut forever = ScorePlayer::new(score, LoopMode::Infinite, 1000, 0);
        let mut buffer = vec![0.0f32; 2000];
        forever.render(&mut buffer, 1);
        assert!(!forever.is_finished());
        assert!(buffer[1500..].iter().any(|s| *s != 0.0));
    }

    #[test]
    fn test_empty_score_is_finished() {
        let score = Arc::new(parse_smf(&smf(96, &[])).unwrap());
        let player = ScorePlayer::new(score, LoopMode::Infinite, 1000, 0);
        assert!(player.is_finished());
    }
}
