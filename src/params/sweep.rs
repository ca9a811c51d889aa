//! Sweep configuration.

use super::analysis::{analysis_constants, PseudoLevel};
use crate::error::{AnalyzerError, Result};

/// Which pseudo-levels a sweep measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelSelection {
    Lo,
    Hi,
    /// Lo first, then Hi
    #[default]
    Both,
}

impl LevelSelection {
    /// Levels in measurement order
    pub fn levels(self) -> &'static [PseudoLevel] {
        match self {
            Self::Lo => &[PseudoLevel::Lo],
            Self::Hi => &[PseudoLevel::Hi],
            Self::Both => &[PseudoLevel::Lo, PseudoLevel::Hi],
        }
    }
}

/// Frequency sweep parameters
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Lowest measured frequency (Hz)
    pub freq_min_hz: f32,

    /// Highest measured frequency (Hz)
    pub freq_max_hz: f32,

    /// Log-spaced points per level
    pub points: usize,

    /// Control tick period (milliseconds)
    /// 50 = 20 Hz polling rate
    pub tick_interval_ms: u64,

    /// Sleep between attempts when the inbound ring is full (milliseconds)
    pub send_retry_ms: u64,

    /// Measured levels
    pub levels: LevelSelection,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            freq_min_hz: analysis_constants::FREQ_RANGE_MIN_HZ,
            freq_max_hz: analysis_constants::FREQ_RANGE_MAX_HZ,
            points: analysis_constants::SWEEP_LENGTH,
            tick_interval_ms: 50,
            send_retry_ms: 10,
            levels: LevelSelection::Both,
        }
    }
}

impl SweepConfig {
    /// Total number of measurements in one sweep
    pub fn total_steps(&self) -> usize {
        self.points * self.levels.levels().len()
    }

    /// Validate configuration (range ordering, point count)
    pub fn validate(&self) -> Result<()> {
        if self.points < 2 {
            return Err(AnalyzerError::invalid_config(format!(
                "sweep needs at least 2 points, got {}",
                self.points
            )));
        }
        if !(self.freq_min_hz.is_finite() && self.freq_min_hz > 0.0) {
            return Err(AnalyzerError::invalid_config(format!(
                "minimum frequency must be > 0 Hz, got {}",
                self.freq_min_hz
            )));
        }
        if !(self.freq_max_hz.is_finite() && self.freq_max_hz > self.freq_min_hz) {
            return Err(AnalyzerError::invalid_config(format!(
                "maximum frequency must exceed {} Hz, got {}",
                self.freq_min_hz, self.freq_max_hz
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sweep_covers_both_levels() {
        let config = SweepConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.total_steps(), 256);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let config = SweepConfig {
            freq_min_hz: 1000.0,
            freq_max_hz: 100.0,
            ..SweepConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
