//! Analysis engine configuration and constants.

use crate::error::{AnalyzerError, Result};

/// Stimulus drive level selector
///
/// Lets the same engine probe small-signal and large-signal behavior of
/// the path under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PseudoLevel {
    /// Small-signal drive (0.1 × global gain)
    #[default]
    Lo = 0,
    /// Large-signal drive (1.0 × global gain)
    Hi = 1,
}

impl PseudoLevel {
    /// Amplitude fraction before global gain is applied
    pub fn amplitude(self) -> f32 {
        match self {
            Self::Lo => 0.1,
            Self::Hi => 1.0,
        }
    }

    /// Short lowercase name, used for profile file names
    pub fn name(self) -> &'static str {
        match self {
            Self::Lo => "lo",
            Self::Hi => "hi",
        }
    }

    /// Decode from the wire byte; any non-zero byte is `Hi`
    pub fn from_byte(byte: u8) -> Self {
        if byte == 0 {
            Self::Lo
        } else {
            Self::Hi
        }
    }
}

/// Real-time engine configuration
///
/// Injected at construction so the engine can run against synthetic
/// sample rates in tests.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Audio sample rate (Hz)
    pub sample_rate_hz: f32,

    /// Global stimulus gain (linear, multiplies the pseudo-level amplitude)
    pub global_gain: f32,

    /// Capacity of each message ring (bytes)
    pub ring_capacity_bytes: usize,

    /// Minimum capture window length (seconds)
    /// Rounded up to a power-of-two sample count
    pub capture_secs: f32,

    /// Release time constant of the level meters (seconds)
    pub meter_release_secs: f32,

    /// Output envelope level below which a new stimulus may start (linear)
    pub silence_threshold: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48000.0,
            global_gain: 1.0,
            ring_capacity_bytes: analysis_constants::RING_CAPACITY_BYTES,
            capture_secs: 0.5,
            meter_release_secs: 50e-3,
            silence_threshold: analysis_constants::SILENCE_THRESHOLD,
        }
    }
}

impl AnalyzerConfig {
    /// Create a configuration for the given sample rate, other fields default
    pub fn with_sample_rate(sample_rate_hz: f32) -> Self {
        Self {
            sample_rate_hz,
            ..Self::default()
        }
    }

    /// Capture and transform length N (power of two)
    pub fn fft_size(&self) -> usize {
        let samples = (self.capture_secs * self.sample_rate_hz).ceil() as usize;
        samples.max(2).next_power_of_two()
    }

    /// Nearest transform bin for a frequency, clamped to the Nyquist bin
    pub fn hz_to_bin(&self, hz: f32) -> usize {
        let n = self.fft_size();
        let bin = (n as f64 * f64::from(hz) / f64::from(self.sample_rate_hz)).round();
        // Negative and NaN requests saturate to bin 0
        (bin as usize).min(n / 2)
    }

    /// Center frequency of a transform bin (Hz)
    pub fn bin_to_hz(&self, bin: usize) -> f32 {
        (bin as f64 * f64::from(self.sample_rate_hz) / self.fft_size() as f64) as f32
    }

    /// Meter release time expressed in samples
    pub fn meter_release_samples(&self) -> f32 {
        self.meter_release_secs * self.sample_rate_hz
    }

    /// Stimulus amplitude for a pseudo-level, including global gain
    pub fn amplitude(&self, level: PseudoLevel) -> f32 {
        level.amplitude() * self.global_gain
    }

    /// Validate configuration (positive rates, ring large enough, etc.)
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(AnalyzerError::invalid_config(format!(
                "sample rate must be > 0, got {}",
                self.sample_rate_hz
            )));
        }
        if !(self.global_gain.is_finite() && self.global_gain > 0.0) {
            return Err(AnalyzerError::invalid_config(format!(
                "global gain must be > 0, got {}",
                self.global_gain
            )));
        }
        if !(self.capture_secs.is_finite() && self.capture_secs > 0.0) {
            return Err(AnalyzerError::invalid_config(format!(
                "capture length must be > 0 s, got {}",
                self.capture_secs
            )));
        }
        if !(self.meter_release_secs.is_finite() && self.meter_release_secs > 0.0) {
            return Err(AnalyzerError::invalid_config(format!(
                "meter release must be > 0 s, got {}",
                self.meter_release_secs
            )));
        }
        if !(self.silence_threshold.is_finite() && self.silence_threshold > 0.0) {
            return Err(AnalyzerError::invalid_config(format!(
                "silence threshold must be > 0, got {}",
                self.silence_threshold
            )));
        }
        let largest = crate::audio::messages::MAX_MESSAGE_SIZE;
        if self.ring_capacity_bytes < largest {
            return Err(AnalyzerError::invalid_config(format!(
                "ring capacity must hold at least one {largest}-byte message, got {}",
                self.ring_capacity_bytes
            )));
        }
        Ok(())
    }
}

/// Analysis constants shared by the engine and the sweep
pub mod analysis_constants {
    /// Lowest swept frequency (Hz)
    pub const FREQ_RANGE_MIN_HZ: f32 = 10.0;

    /// Highest swept frequency (Hz)
    pub const FREQ_RANGE_MAX_HZ: f32 = 21000.0;

    /// Points per sweep and level
    pub const SWEEP_LENGTH: usize = 128;

    /// Output envelope level treated as silence
    pub const SILENCE_THRESHOLD: f32 = 1e-4;

    /// Message ring capacity (bytes)
    pub const RING_CAPACITY_BYTES: usize = 8192;
}
