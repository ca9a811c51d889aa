//! Single-bin frequency response estimation from a captured window.

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex32;
use std::f32::consts::PI;
use std::sync::Arc;

/// Window, transform and normalize one capture buffer
///
/// All buffers and the transform plan are allocated in [`SpectralEstimator::new`];
/// [`SpectralEstimator::estimate`] runs without allocating.
pub struct SpectralEstimator {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Box<[f32]>,
    real: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectralEstimator {
    /// Plan a real-to-complex transform of `fft_size` points
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let window = (0..fft_size).map(|i| hann_window(i, fft_size)).collect();
        let real = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Self {
            fft,
            window,
            real,
            spectrum,
            scratch,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Complex response at `bin`, referenced to the known stimulus.
    ///
    /// `capture` holds exactly `fft_size` input samples. The stimulus was a
    /// cosine of `amplitude` whose phase (in cycles) was `starting_phase` at
    /// the first captured sample.
    ///
    /// The bin is scaled by `4/N`: a factor 2 for the one-sided spectrum of
    /// a real signal and a factor 2 for the Hann window's mean of 0.5. The DC
    /// and Nyquist bins have no mirror image and are scaled by `2/N`.
    pub fn estimate(
        &mut self,
        capture: &[f32],
        bin: usize,
        amplitude: f32,
        starting_phase: f32,
    ) -> Complex32 {
        let n = self.fft_size();
        debug_assert_eq!(capture.len(), n);

        for ((dst, &sample), &w) in self.real.iter_mut().zip(capture).zip(self.window.iter()) {
            *dst = sample * w;
        }

        self.fft
            .process_with_scratch(&mut self.real, &mut self.spectrum, &mut self.scratch)
            .expect("transform buffers sized at construction");

        let one_sided = if bin == 0 || bin == n / 2 { 2.0 } else { 4.0 };
        let h_out = self.spectrum[bin] * (one_sided / n as f32);
        let h_in = Complex32::from_polar(amplitude, 2.0 * PI * starting_phase);
        h_out / h_in
    }
}

/// Hann window function for FFT analysis
pub fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(n: usize, bin: usize, amplitude: f32, phase: f32) -> Vec<f32> {
        (0..n)
            .map(|i| {
                let cycles = (bin * i % n) as f32 / n as f32 + phase;
                amplitude * (2.0 * PI * cycles).cos()
            })
            .collect()
    }

    #[test]
    fn test_hann_window() {
        let size = 1024;

        // Hann window should be 0 at edges, 1 at center
        assert!((hann_window(0, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size - 1, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_unity_response_on_bin_centered_tone() {
        let n = 4096;
        let mut estimator = SpectralEstimator::new(n);
        let capture = tone(n, 100, 0.1, 0.0);

        let response = estimator.estimate(&capture, 100, 0.1, 0.0);
        assert!((response.norm() - 1.0).abs() < 1e-2, "|H| = {}", response.norm());
        assert!(response.arg().abs() < 1e-2, "arg H = {}", response.arg());
    }

    #[test]
    fn test_reference_phase_is_removed() {
        let n = 4096;
        let mut estimator = SpectralEstimator::new(n);
        let capture = tone(n, 300, 1.0, 0.125);

        let response = estimator.estimate(&capture, 300, 1.0, 0.125);
        assert!((response.norm() - 1.0).abs() < 1e-2);
        assert!(response.arg().abs() < 1e-2);
    }

    #[test]
    fn test_gain_and_phase_shift_are_measured() {
        let n = 4096;
        let mut estimator = SpectralEstimator::new(n);
        // Path halves the amplitude and delays by a quarter cycle
        let capture = tone(n, 256, 0.5, -0.25);

        let response = estimator.estimate(&capture, 256, 1.0, 0.0);
        assert!((response.norm() - 0.5).abs() < 1e-2);
        assert!((response.arg() + PI / 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_edge_bins_are_not_doubled() {
        let n = 4096;
        let mut estimator = SpectralEstimator::new(n);

        let dc = estimator.estimate(&tone(n, 0, 0.5, 0.0), 0, 0.5, 0.0);
        assert!((dc.norm() - 1.0).abs() < 1e-2, "DC |H| = {}", dc.norm());

        let nyquist = estimator.estimate(&tone(n, n / 2, 0.5, 0.0), n / 2, 0.5, 0.0);
        assert!((nyquist.norm() - 1.0).abs() < 1e-2, "Nyquist |H| = {}", nyquist.norm());
        assert!(nyquist.arg().abs() < 1e-2);
    }
}
