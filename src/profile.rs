//! Measured response profiles and their on-disk format.
//!
//! A profile directory holds one `<level>.dat` file per pseudo-level, one
//! line per frequency point: `frequency magnitude phase`, magnitude as a
//! linear ratio and phase in radians, all in scientific notation.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use rustfft::num_complex::Complex32;
use tracing::info;

use crate::error::Result;
use crate::params::PseudoLevel;

/// Responses of one sweep at both pseudo-levels
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    frequencies: Vec<f32>,
    lo: Vec<Complex32>,
    hi: Vec<Complex32>,
}

impl Profile {
    /// Empty profile over the given frequency points (responses zero)
    pub fn new(frequencies: Vec<f32>) -> Self {
        let points = frequencies.len();
        Self {
            frequencies,
            lo: vec![Complex32::new(0.0, 0.0); points],
            hi: vec![Complex32::new(0.0, 0.0); points],
        }
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    pub fn responses(&self, level: PseudoLevel) -> &[Complex32] {
        match level {
            PseudoLevel::Lo => &self.lo,
            PseudoLevel::Hi => &self.hi,
        }
    }

    /// Store one measured point. Out-of-range indices are ignored.
    pub fn set(&mut self, level: PseudoLevel, index: usize, frequency: f32, response: Complex32) {
        if index >= self.len() {
            return;
        }
        self.frequencies[index] = frequency;
        let responses = match level {
            PseudoLevel::Lo => &mut self.lo,
            PseudoLevel::Hi => &mut self.hi,
        };
        responses[index] = response;
    }

    /// Write one level's curve
    pub fn write_curve<W: Write>(&self, level: PseudoLevel, mut out: W) -> io::Result<()> {
        for (&frequency, response) in self.frequencies.iter().zip(self.responses(level)) {
            writeln!(
                out,
                "{} {} {}",
                format_scientific(f64::from(frequency)),
                format_scientific(f64::from(response.norm())),
                format_scientific(f64::from(response.arg())),
            )?;
        }
        out.flush()
    }

    /// Create `dir` and write `lo.dat` and `hi.dat` into it
    pub fn write_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for level in [PseudoLevel::Lo, PseudoLevel::Hi] {
            let path = dir.join(format!("{}.dat", level.name()));
            let file = File::create(&path)?;
            self.write_curve(level, BufWriter::new(file))?;
            info!(path = %path.display(), points = self.len(), "wrote profile curve");
        }
        Ok(())
    }
}

/// Magnitude in decibels
pub fn magnitude_db(response: Complex32) -> f32 {
    20.0 * response.norm().log10()
}

/// Format with 10 fractional digits and a signed two-digit exponent (`1.0000000000e+01`)
pub fn format_scientific(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let formatted = format!("{value:.10e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_scientific_matches_c_style() {
        assert_eq!(format_scientific(10.0), "1.0000000000e+01");
        assert_eq!(format_scientific(0.0), "0.0000000000e+00");
        assert_eq!(format_scientific(-0.00125), "-1.2500000000e-03");
        assert_eq!(format_scientific(21000.0), "2.1000000000e+04");
        assert_eq!(format_scientific(1e-120), "1.0000000000e-120");
    }

    #[test]
    fn test_magnitude_db() {
        assert!((magnitude_db(Complex32::new(0.0, 1.0))).abs() < 1e-6);
        assert!((magnitude_db(Complex32::new(0.1, 0.0)) + 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_write_dir_creates_both_levels() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("speaker.profile");

        let mut profile = Profile::new(vec![100.0, 1000.0]);
        profile.set(PseudoLevel::Hi, 1, 1000.5, Complex32::new(0.0, -2.0));
        profile.write_dir(&target).unwrap();

        let hi = std::fs::read_to_string(target.join("hi.dat")).unwrap();
        let lines: Vec<&str> = hi.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "1.0000000000e+02 0.0000000000e+00 0.0000000000e+00");
        let fields: Vec<f64> = lines[1].split(' ').map(|f| f.parse().unwrap()).collect();
        assert!((fields[0] - 1000.5).abs() < 1e-9);
        assert!((fields[1] - 2.0).abs() < 1e-6);
        assert!((fields[2] + std::f64::consts::FRAC_PI_2).abs() < 1e-6);

        let lo = std::fs::read_to_string(target.join("lo.dat")).unwrap();
        assert!(lo.lines().next().unwrap().starts_with("1.0000000000e+02 "));
        assert!(lo.lines().nth(1).unwrap().starts_with("1.0005000000e+03 "));
    }
}
