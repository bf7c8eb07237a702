//! Configuration for retrosound

use std::time::Duration;

/// Driver configuration. The defaults are the values a classic 22 kHz
/// sound driver runs with.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Device buffer size in frames
    pub buffer_frames: u32,
    /// Number of mixer channels (concurrent sound effects)
    pub mix_channels: usize,
    /// Upper bound for the shutdown drain
    pub fade_out: Duration,
    /// The drain polls every `fade_out / poll_divisor`
    pub poll_divisor: u32,
    pub music_fade_in: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            channels: 2,
            buffer_frames: 4096,
            mix_channels: 8,
            fade_out: Duration::from_secs(1),
            poll_divisor: 10,
            music_fade_in: Duration::from_millis(1000),
        }
    }
}

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_frames = frames;
        self
    }

    pub fn mix_channels(mut self, count: usize) -> Self {
        self.mix_channels = count;
        self
    }

    pub fn fade_out(mut self, duration: Duration) -> Self {
        self.fade_out = duration;
        self
    }

    pub fn poll_divisor(mut self, divisor: u32) -> Self {
        self.poll_divisor = divisor;
        self
    }

    pub fn music_fade_in(mut self, duration: Duration) -> Self {
        self.music_fade_in = duration;
        self
    }

    /// Sleep between two drain polls. Never zero.
    pub fn poll_interval(&self) -> Duration {
        (self.fade_out / self.poll_divisor.max(1)).max(Duration::from_millis(1))
    }

    pub fn device_spec(&self) -> DeviceSpec {
        DeviceSpec {
            sample_rate: self.sample_rate,
            channels: self.channels,
            buffer_frames: self.buffer_frames,
            mix_channels: self.mix_channels,
        }
    }
}

/// Parameters handed to [`crate::mixer::Mixer::open_device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_frames: u32,
    pub mix_channels: usize,
}

impl Default for DeviceSpec {
    fn default() -> Self {
        DriverConfig::default().device_spec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.sample_rate, 22050);
        assert_eq!(config.channels, 2);
        assert_eq!(config.buffer_frames, 4096);
        assert_eq!(config.fade_out, Duration::from_secs(1));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.music_fade_in, Duration::from_millis(1000));
    }

    #[test]
    fn test_poll_interval_is_never_zero() {
        let config = DriverConfig::new()
            .fade_out(Duration::ZERO)
            .poll_divisor(0);
        assert!(config.poll_interval() > Duration::ZERO);
    }

    #[test]
    fn test_device_spec_follows_builder() {
        let spec = DriverConfig::new()
            .sample_rate(11025)
            .channels(1)
            .mix_channels(4)
            .device_spec();
        assert_eq!(spec.sample_rate, 11025);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.mix_channels, 4);
        assert_eq!(spec.buffer_frames, 4096);
    }
}
