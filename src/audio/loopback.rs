//! Offline host: drives the engine through a simulated signal path.
//!
//! Each block's input is the path's response to the previous block's
//! output, which models the one block of latency a duplex audio device
//! adds between playback and capture.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rustfft::num_complex::Complex32;
use tracing::{info, warn};

use super::messages::Message;
use super::processor::{AudioProcessor, ProcessorHandle};
use crate::error::{AnalyzerError, Result};
use crate::params::PseudoLevel;

/// A simulated device under test
pub trait SignalPath: Send {
    /// Map one block of stimulus to the path's output. Both slices have the same length.
    fn process(&mut self, stimulus: &[f32], response: &mut [f32]);
}

/// Wire: output equals input
#[derive(Debug, Default, Clone, Copy)]
pub struct UnityPath;

impl SignalPath for UnityPath {
    fn process(&mut self, stimulus: &[f32], response: &mut [f32]) {
        response.copy_from_slice(stimulus);
    }
}

/// Linear gain followed by a whole-sample delay
#[derive(Debug, Clone)]
pub struct GainDelayPath {
    gain: f32,
    line: Vec<f32>,
    pos: usize,
}

impl GainDelayPath {
    pub fn new(gain: f32, delay_samples: usize) -> Self {
        Self {
            gain,
            line: vec![0.0; delay_samples],
            pos: 0,
        }
    }
}

impl SignalPath for GainDelayPath {
    fn process(&mut self, stimulus: &[f32], response: &mut [f32]) {
        if self.line.is_empty() {
            for (dst, &x) in response.iter_mut().zip(stimulus) {
                *dst = self.gain * x;
            }
            return;
        }
        for (dst, &x) in response.iter_mut().zip(stimulus) {
            *dst = self.gain * self.line[self.pos];
            self.line[self.pos] = x;
            self.pos = (self.pos + 1) % self.line.len();
        }
    }
}

/// Direct-form FIR filter, typically a measured impulse response
#[derive(Debug, Clone)]
pub struct FirPath {
    taps: Vec<f32>,
    history: Vec<f32>,
    pos: usize,
}

impl FirPath {
    pub fn new(taps: Vec<f32>) -> Result<Self> {
        if taps.is_empty() {
            return Err(AnalyzerError::invalid_config("impulse response has no taps"));
        }
        let history = vec![0.0; taps.len()];
        Ok(Self {
            taps,
            history,
            pos: 0,
        })
    }

    /// Load the first channel of a WAV file as filter taps
    pub fn from_wav(path: impl AsRef<Path>, sample_rate_hz: f32) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<Vec<f32>, hound::Error>>()?
            }
        };
        let taps: Vec<f32> = samples.into_iter().step_by(channels).collect();

        if spec.sample_rate as f32 != sample_rate_hz {
            warn!(
                path = %path.display(),
                file_rate = spec.sample_rate,
                sample_rate_hz,
                "impulse response sample rate differs from analysis rate"
            );
        }
        info!(path = %path.display(), taps = taps.len(), "loaded impulse response");

        Self::new(taps)
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }
}

impl SignalPath for FirPath {
    fn process(&mut self, stimulus: &[f32], response: &mut [f32]) {
        let len = self.taps.len();
        for (dst, &x) in response.iter_mut().zip(stimulus) {
            self.history[self.pos] = x;
            let mut acc = 0.0f32;
            let mut index = self.pos;
            for &tap in &self.taps {
                acc += tap * self.history[index];
                index = if index == 0 { len - 1 } else { index - 1 };
            }
            *dst = acc;
            self.pos = (self.pos + 1) % len;
        }
    }
}

/// Block-by-block driver for an [`AudioProcessor`] and a simulated path
pub struct LoopbackHost<P: SignalPath> {
    processor: AudioProcessor,
    path: P,
    /// Output of the previous block
    played: Vec<f32>,
    captured: Vec<f32>,
    output: Vec<f32>,
}

impl<P: SignalPath> LoopbackHost<P> {
    pub fn new(processor: AudioProcessor, path: P, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            processor,
            path,
            played: vec![0.0; block_size],
            captured: vec![0.0; block_size],
            output: vec![0.0; block_size],
        }
    }

    pub fn block_size(&self) -> usize {
        self.output.len()
    }

    pub fn processor(&self) -> &AudioProcessor {
        &self.processor
    }

    /// Run one block
    pub fn run_block(&mut self) {
        self.path.process(&self.played, &mut self.captured);
        self.processor.process(&self.captured, &mut self.output);
        std::mem::swap(&mut self.played, &mut self.output);
    }

    pub fn run_blocks(&mut self, blocks: usize) {
        for _ in 0..blocks {
            self.run_block();
        }
    }

    /// Request one frequency and run blocks until the reply arrives.
    ///
    /// Returns the bin-quantized frequency and the measured response.
    pub fn measure(
        &mut self,
        handle: &mut ProcessorHandle,
        frequency: f32,
        level: PseudoLevel,
        max_blocks: usize,
    ) -> Result<(f32, Complex32)> {
        handle.send_message(&Message::RequestAnalyzeFrequency { frequency, level })?;
        for _ in 0..max_blocks {
            self.run_block();
            if let Some(Message::NotifyFrequencyAnalysis {
                frequency,
                response,
                ..
            }) = handle.receive_message()
            {
                return Ok((frequency, response));
            }
        }
        Err(AnalyzerError::Stalled { blocks: max_blocks })
    }
}

impl<P: SignalPath + 'static> LoopbackHost<P> {
    /// Run the host on its own thread until the returned handle is stopped or dropped.
    ///
    /// With `paced`, each block waits for its real-time duration.
    pub fn spawn(mut self, paced: bool) -> Result<LoopbackThread> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_flag);
        let sample_rate = self.processor.config().sample_rate_hz;
        let block_period = Duration::from_secs_f64(self.block_size() as f64 / f64::from(sample_rate));

        let thread = thread::Builder::new()
            .name("loopback-host".into())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    self.run_block();
                    if paced {
                        thread::sleep(block_period);
                    } else {
                        thread::yield_now();
                    }
                }
                self.processor
            })
            .map_err(|e| AnalyzerError::stream(format!("failed to spawn loopback thread: {e}")))?;

        info!(paced, "loopback host started");
        Ok(LoopbackThread {
            stop_flag,
            thread: Some(thread),
        })
    }
}

/// Keeps a spawned [`LoopbackHost`] running
pub struct LoopbackThread {
    stop_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<AudioProcessor>>,
}

impl LoopbackThread {
    /// Stop the host and hand back the processor
    pub fn stop(mut self) -> Option<AudioProcessor> {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.thread.take().and_then(|t| t.join().ok())
    }
}

impl Drop for LoopbackThread {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
