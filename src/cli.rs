//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::params::{analysis_constants, AnalyzerConfig, LevelSelection, SweepConfig};

/// Levels accepted by `--level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    Lo,
    Hi,
    Both,
}

impl From<LevelArg> for LevelSelection {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::Lo => LevelSelection::Lo,
            LevelArg::Hi => LevelSelection::Hi,
            LevelArg::Both => LevelSelection::Both,
        }
    }
}

/// Where the measured signal comes from
#[derive(Debug, Clone, PartialEq)]
pub enum HostSelection {
    /// Default audio input and output devices
    Device,
    /// Simulated wire
    Loopback,
    /// Simulated FIR path loaded from an impulse-response WAV
    Simulate(PathBuf),
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "response-analyzer")]
#[command(about = "Measures the frequency response of an audio path with stepped sine tones", long_about = None)]
pub struct Args {
    /// Directory the profile (lo.dat, hi.dat) is written to
    #[arg(value_name = "PROFILE_DIR", default_value = "response.profile")]
    pub output: PathBuf,

    /// Sample rate in Hz (defaults to the output device rate, or 48000 when simulated)
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Linear gain applied to the stimulus
    #[arg(long, default_value_t = 1.0)]
    pub gain: f32,

    /// Log-spaced measurement points per level
    #[arg(long, default_value_t = analysis_constants::SWEEP_LENGTH)]
    pub points: usize,

    /// Lowest measured frequency (Hz)
    #[arg(long, value_name = "HZ", default_value_t = analysis_constants::FREQ_RANGE_MIN_HZ)]
    pub min_freq: f32,

    /// Highest measured frequency (Hz)
    #[arg(long, value_name = "HZ", default_value_t = analysis_constants::FREQ_RANGE_MAX_HZ)]
    pub max_freq: f32,

    /// Pseudo-levels to measure
    #[arg(long, value_enum, default_value_t = LevelArg::Both)]
    pub level: LevelArg,

    /// Measure a simulated unity path instead of the audio devices
    #[arg(long, conflicts_with = "simulate")]
    pub loopback: bool,

    /// Measure a simulated path given by an impulse-response WAV file
    #[arg(long, value_name = "WAV")]
    pub simulate: Option<PathBuf>,

    /// Block size of the simulated host (frames)
    #[arg(long, value_name = "FRAMES", default_value_t = 256)]
    pub block_size: usize,

    /// Pace the simulated host in real time instead of running it flat out
    #[arg(long)]
    pub paced: bool,
}

impl Args {
    pub fn host(&self) -> HostSelection {
        match (&self.simulate, self.loopback) {
            (Some(path), _) => HostSelection::Simulate(path.clone()),
            (None, true) => HostSelection::Loopback,
            (None, false) => HostSelection::Device,
        }
    }

    /// Engine configuration at the given sample rate
    pub fn analyzer_config(&self, sample_rate_hz: f32) -> AnalyzerConfig {
        AnalyzerConfig {
            global_gain: self.gain,
            ..AnalyzerConfig::with_sample_rate(sample_rate_hz)
        }
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            freq_min_hz: self.min_freq,
            freq_max_hz: self.max_freq,
            points: self.points,
            levels: self.level.into(),
            ..SweepConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_devices_and_both_levels() {
        let args = Args::parse_from(["response-analyzer"]);
        assert_eq!(args.host(), HostSelection::Device);
        assert_eq!(args.output, PathBuf::from("response.profile"));

        let sweep = args.sweep_config();
        assert_eq!(sweep.points, 128);
        assert_eq!(sweep.levels, LevelSelection::Both);
        assert_eq!(sweep.freq_min_hz, 10.0);
        assert_eq!(sweep.freq_max_hz, 21000.0);
    }

    #[test]
    fn test_simulate_selects_fir_host() {
        let args = Args::parse_from([
            "response-analyzer",
            "--simulate",
            "ir.wav",
            "--level",
            "hi",
            "--gain",
            "0.5",
            "out.profile",
        ]);
        assert_eq!(args.host(), HostSelection::Simulate(PathBuf::from("ir.wav")));
        assert_eq!(args.sweep_config().levels, LevelSelection::Hi);

        let config = args.analyzer_config(44100.0);
        assert_eq!(config.sample_rate_hz, 44100.0);
        assert_eq!(config.global_gain, 0.5);
    }

    #[test]
    fn test_loopback_conflicts_with_simulate() {
        let result = Args::try_parse_from([
            "response-analyzer",
            "--loopback",
            "--simulate",
            "ir.wav",
        ]);
        assert!(result.is_err());
    }
}
