//! Engine configuration.
//!
//! The output clock runs at a single sample rate and channel layout; every
//! track is validated against these values rather than converted.

use serde::{Deserialize, Serialize};

use crate::utils::errors::ConfigError;

/// What the controller does once the current track has fully drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndOfTrackPolicy {
    /// Transition to `Stopped`.
    Stop,
    /// Start the next catalog entry, wrapping to the first after the last.
    #[default]
    Advance,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output clock rate in Hz. Tracks at any other rate are rejected.
    pub sample_rate: u32,
    /// Channel count accepted from sources. The sink receives the first channel.
    pub channels: u16,
    /// Capacity of each of the two stream buffers, in samples.
    pub buffer_samples: usize,
    /// Fixed output gain in Q8.8 (256 = unity).
    pub gain_q8: u16,
    /// Resolution of the output sink; values span `0..2^dac_bits`.
    pub dac_bits: u8,
    pub end_of_track: EndOfTrackPolicy,
    /// Consecutive zero-byte reads tolerated by the frame decoder before the
    /// stream is considered ended.
    pub eof_retry_limit: u32,
    /// Consecutive corrupt frames tolerated before the track is ended.
    pub max_consecutive_decode_errors: u32,
    /// Initial volume in percent.
    pub volume: u8,
    /// Increment applied by `VolumeUp`/`VolumeDown`.
    pub volume_step: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            channels: 1,
            buffer_samples: 2304,
            gain_q8: 256,
            dac_bits: 10,
            end_of_track: EndOfTrackPolicy::Advance,
            eof_retry_limit: 3,
            max_consecutive_decode_errors: 8,
            volume: 50,
            volume_step: 5,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if !(1..=2).contains(&self.channels) {
            return Err(ConfigError::InvalidChannels(self.channels));
        }
        if !(1..=16).contains(&self.dac_bits) {
            return Err(ConfigError::InvalidDacBits(self.dac_bits));
        }
        if self.buffer_samples < self.channels as usize {
            return Err(ConfigError::BufferTooSmall {
                capacity: self.buffer_samples,
                channels: self.channels,
            });
        }
        if self.volume > 100 {
            return Err(ConfigError::InvalidVolume(self.volume));
        }
        Ok(())
    }

    /// Buffer capacity rounded down to a whole number of frames.
    pub fn frame_aligned_capacity(&self) -> usize {
        let stride = self.channels.max(1) as usize;
        self.buffer_samples / stride * stride
    }

    /// Duration of one stream buffer at the output rate.
    pub fn buffer_duration(&self) -> std::time::Duration {
        let frames = self.frame_aligned_capacity() / self.channels.max(1) as usize;
        std::time::Duration::from_secs_f64(frames as f64 / self.sample_rate.max(1) as f64)
    }
}
