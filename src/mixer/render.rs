// Audio-thread side of CpalMixer: channel voices, music and the command queue.

use crate::mixer::LoopMode;
use crate::mixer::midi::{Score, ScorePlayer};
use crate::position::StereoGains;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Requests sent from the control thread to the audio callback.
#[derive(Debug)]
pub(crate) enum MixCommand {
    Play {
        channel: usize,
        samples: Arc<[f32]>,
        loops: LoopMode,
    },
    SetGains {
        channel: usize,
        gains: StereoGains,
    },
    StartMusic {
        score: Arc<Score>,
        loops: LoopMode,
        fade_frames: u64,
    },
    StopAll,
}

/// One chunk playing on one channel.
#[derive(Debug)]
struct Voice {
    samples: Arc<[f32]>,
    cursor: usize,
    loops: LoopMode,
    gains: StereoGains,
}

impl Voice {
    /// Mixes the voice into `buffer`. Returns false once the voice is done.
    fn mix_into(&mut self, buffer: &mut [f32], channels: usize) -> bool {
        if self.samples.len() < channels {
            return false;
        }

        for frame in buffer.chunks_exact_mut(channels) {
            if self.cursor + channels > self.samples.len() {
                match self.loops {
                    LoopMode::Infinite => self.cursor = 0,
                    LoopMode::Once => return false,
                }
            }

            let source = &self.samples[self.cursor..self.cursor + channels];
            let mut mixed = [0.0f32; 8];
            let width = channels.min(mixed.len());
            mixed[..width].copy_from_slice(&source[..width]);
            self.gains.apply(&mut mixed[..width]);

            for (out, sample) in frame.iter_mut().zip(&mixed[..width]) {
                *out += *sample;
            }
            self.cursor += channels;
        }

        self.loops == LoopMode::Infinite || self.cursor + channels <= self.samples.len()
    }
}

/// Everything the audio callback owns.
pub(crate) struct MixState {
    channels: usize,
    sample_rate: u32,
    voices: Vec<Option<Voice>>,
    busy: Arc<[AtomicBool]>,
    music: Option<ScorePlayer>,
    commands: Receiver<MixCommand>,
}

impl MixState {
    pub fn new(
        channels: u16,
        sample_rate: u32,
        busy: Arc<[AtomicBool]>,
        commands: Receiver<MixCommand>,
    ) -> Self {
        Self {
            channels: channels.max(1) as usize,
            sample_rate,
            voices: (0..busy.len()).map(|_| None).collect(),
            busy,
            music: None,
            commands,
        }
    }

    fn handle(&mut self, command: MixCommand) {
        match command {
            MixCommand::Play {
                channel,
                samples,
                loops,
            } => {
                if let Some(slot) = self.voices.get_mut(channel) {
                    *slot = Some(Voice {
                        samples,
                        cursor: 0,
                        loops,
                        gains: StereoGains::UNITY,
                    });
                }
            }
            MixCommand::SetGains { channel, gains } => {
                if let Some(Some(voice)) = self.voices.get_mut(channel) {
                    voice.gains = gains;
                }
            }
            MixCommand::StartMusic {
                score,
                loops,
                fade_frames,
            } => {
                self.music = Some(ScorePlayer::new(score, loops, self.sample_rate, fade_frames));
            }
            MixCommand::StopAll => {
                for (slot, busy) in self.voices.iter_mut().zip(self.busy.iter()) {
                    *slot = None;
                    busy.store(false, Ordering::Release);
                }
                self.music = None;
            }
        }
    }

    /// Fills `buffer` with the next block of mixed output.
    pub fn render(&mut self, buffer: &mut [f32]) {
        while let Ok(command) = self.commands.try_recv() {
            self.handle(command);
        }

        buffer.fill(0.0);

        for (slot, busy) in self.voices.iter_mut().zip(self.busy.iter()) {
            let Some(voice) = slot else {
                continue;
            };
            if !voice.mix_into(buffer, self.channels) {
                log::trace!("Mixer: voice finished");
                *slot = None;
                busy.store(false, Ordering::Release);
            }
        }

        if let Some(music) = &mut self.music {
            music.render(buffer, self.channels);
            if music.is_finished() {
                self.music = None;
            }
        }

        for sample in buffer.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    #[cfg(test)]
    pub fn has_music(&self) -> bool {
        self.music.is_some()
    }
}
