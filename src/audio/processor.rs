//! Real-time analysis engine and its control-side handle.
//!
//! [`AudioProcessor::process`] is the audio callback body: it never blocks,
//! locks or allocates. Everything it shares with the control thread goes
//! through two SPSC message rings and a pair of atomic level meters, all
//! created together in [`AudioProcessor::new`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use super::fft::SpectralEstimator;
use super::follower::EnvelopeFollower;
use super::messages::{self, size_of, Message, MessageTag};
use super::ring_buffer::{ring_buffer, RingConsumer, RingProducer};
use crate::error::{AnalyzerError, Result};
use crate::params::{AnalyzerConfig, PseudoLevel};

/// Latest envelope levels, written by the callback and read by the control thread
#[derive(Debug, Default)]
struct LevelMeters {
    input: AtomicU32,
    output: AtomicU32,
}

impl LevelMeters {
    fn store(&self, input: f32, output: f32) {
        self.input.store(input.to_bits(), Ordering::Relaxed);
        self.output.store(output.to_bits(), Ordering::Relaxed);
    }

    fn input(&self) -> f32 {
        f32::from_bits(self.input.load(Ordering::Relaxed))
    }

    fn output(&self) -> f32 {
        f32::from_bits(self.output.load(Ordering::Relaxed))
    }
}

/// Real-time side of the analyzer
pub struct AudioProcessor {
    config: AnalyzerConfig,
    inbound: RingConsumer,
    outbound: RingProducer,
    meters: Arc<LevelMeters>,

    in_follower: EnvelopeFollower,
    out_follower: EnvelopeFollower,
    in_level: f32,
    out_level: f32,

    active: bool,
    can_start: bool,
    has_finished: bool,
    level: PseudoLevel,
    /// Transform bin of the stimulus
    bin: usize,
    /// Stimulus frequency (cycles per sample)
    freq: f32,
    /// Oscillator phase (cycles, in [0, 1))
    phase: f32,
    starting_phase: f32,

    capture: Box<[f32]>,
    capture_fill: usize,
    estimator: SpectralEstimator,
}

/// Control side of the analyzer
pub struct ProcessorHandle {
    inbound: RingProducer,
    outbound: RingConsumer,
    meters: Arc<LevelMeters>,
    fft_size: usize,
    send_retry: Duration,
}

impl AudioProcessor {
    /// Allocate the engine and its rings, returning both halves.
    ///
    /// All memory the callback will ever use is allocated here.
    pub fn new(config: AnalyzerConfig) -> Result<(Self, ProcessorHandle)> {
        config.validate()?;

        let fft_size = config.fft_size();
        let release = config.meter_release_samples();
        let (inbound_tx, inbound_rx) = ring_buffer(config.ring_capacity_bytes);
        let (outbound_tx, outbound_rx) = ring_buffer(config.ring_capacity_bytes);
        let meters = Arc::new(LevelMeters::default());

        info!(
            sample_rate_hz = config.sample_rate_hz,
            fft_size,
            ring_capacity = config.ring_capacity_bytes,
            "analysis engine created"
        );

        let handle = ProcessorHandle {
            inbound: inbound_tx,
            outbound: outbound_rx,
            meters: Arc::clone(&meters),
            fft_size,
            send_retry: Duration::from_millis(10),
        };

        let processor = Self {
            inbound: inbound_rx,
            outbound: outbound_tx,
            meters,
            in_follower: EnvelopeFollower::new(release),
            out_follower: EnvelopeFollower::new(release),
            in_level: 0.0,
            out_level: 0.0,
            active: false,
            can_start: false,
            has_finished: false,
            level: PseudoLevel::Lo,
            bin: 0,
            freq: 0.0,
            phase: 0.0,
            starting_phase: 0.0,
            capture: vec![0.0; fft_size].into_boxed_slice(),
            capture_fill: 0,
            estimator: SpectralEstimator::new(fft_size),
            config,
        };

        Ok((processor, handle))
    }

    /// Process one block. `output` is always fully overwritten.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        output.fill(0.0);

        self.handle_messages();

        if self.active {
            if self.can_start {
                self.collect(input);
                if !self.has_finished && self.capture_fill == self.capture.len() {
                    self.report();
                }
            }

            // Wait for the previous tone to die out before starting a new one
            if !self.can_start && self.out_level < self.config.silence_threshold {
                self.can_start = true;
                self.starting_phase = self.phase;
            }

            if self.can_start {
                self.generate(output);
            }
        }

        self.update_levels(input, output);
    }

    fn handle_messages(&mut self) {
        while let Some(msg) = messages::receive(&mut self.inbound) {
            self.apply(msg);
        }
    }

    fn apply(&mut self, msg: Message) {
        match msg {
            Message::RequestAnalyzeFrequency { frequency, level } => {
                let n = self.capture.len();
                self.active = true;
                self.can_start = false;
                self.has_finished = false;
                self.level = level;
                self.bin = self.config.hz_to_bin(frequency);
                self.freq = self.bin as f32 / n as f32;
                self.phase = 0.0;
                self.starting_phase = 0.0;
                self.capture_fill = 0;
            }
            Message::RequestStop => {
                self.active = false;
            }
            Message::NotifyFrequencyAnalysis { .. } => {
                unreachable!("engine received its own notification");
            }
        }
    }

    fn generate(&mut self, output: &mut [f32]) {
        let f = self.freq;
        let amplitude = self.config.amplitude(self.level);
        let mut p = self.phase;
        for sample in output.iter_mut() {
            *sample = amplitude * (2.0 * std::f32::consts::PI * p).cos();
            p += f;
            p -= p.trunc();
        }
        self.phase = p;
    }

    fn collect(&mut self, input: &[f32]) {
        let remaining = self.capture.len() - self.capture_fill;
        let take = input.len().min(remaining);
        self.capture[self.capture_fill..self.capture_fill + take].copy_from_slice(&input[..take]);
        self.capture_fill += take;
    }

    /// Compute and enqueue the response, unless the outbound ring is full
    fn report(&mut self) {
        if self.outbound.size_free() < size_of(MessageTag::NotifyFrequencyAnalysis) {
            return;
        }
        let amplitude = self.config.amplitude(self.level);
        let response =
            self.estimator
                .estimate(&self.capture, self.bin, amplitude, self.starting_phase);
        let msg = Message::NotifyFrequencyAnalysis {
            frequency: self.generated_frequency_hz(),
            level: self.level,
            response,
        };
        if messages::send(&mut self.outbound, &msg) {
            self.has_finished = true;
        }
    }

    fn update_levels(&mut self, input: &[f32], output: &[f32]) {
        self.in_level = self.in_follower.process_block(input);
        self.out_level = self.out_follower.process_block(output);
        self.meters.store(self.in_level, self.out_level);
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn fft_size(&self) -> usize {
        self.capture.len()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once the output has been silent since the last request
    pub fn can_start(&self) -> bool {
        self.can_start
    }

    /// True once the response for the current request has been enqueued
    pub fn has_finished(&self) -> bool {
        self.has_finished
    }

    pub fn capture_fill(&self) -> usize {
        self.capture_fill
    }

    /// Transform bin of the current stimulus
    pub fn generated_bin(&self) -> usize {
        self.bin
    }

    /// Bin-quantized stimulus frequency (Hz)
    pub fn generated_frequency_hz(&self) -> f32 {
        self.config.bin_to_hz(self.bin)
    }

    pub fn input_level(&self) -> f32 {
        self.in_level
    }

    pub fn output_level(&self) -> f32 {
        self.out_level
    }
}

impl ProcessorHandle {
    /// Enqueue a request, sleeping and retrying while the inbound ring is full.
    ///
    /// Only request messages are accepted; notifications are rejected here
    /// rather than reaching the audio thread.
    pub fn send_message(&mut self, msg: &Message) -> Result<()> {
        if !msg.is_request() {
            return Err(AnalyzerError::NotARequest(msg.tag()));
        }
        let mut attempts = 0u32;
        while !messages::send(&mut self.inbound, msg) {
            if attempts == 0 {
                debug!(?msg, "inbound ring full, retrying");
            }
            attempts += 1;
            thread::sleep(self.send_retry);
        }
        if attempts > 0 {
            debug!(attempts, "request enqueued after retrying");
        }
        Ok(())
    }

    /// Dequeue one reply, if any
    pub fn receive_message(&mut self) -> Option<Message> {
        messages::receive(&mut self.outbound)
    }

    /// Latest input envelope (linear)
    pub fn input_level(&self) -> f32 {
        self.meters.input()
    }

    /// Latest output envelope (linear)
    pub fn output_level(&self) -> f32 {
        self.meters.output()
    }

    /// Capture and transform length
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Set the sleep between retries in [`ProcessorHandle::send_message`]
    pub fn set_send_retry(&mut self, retry: Duration) {
        self.send_retry = retry;
    }
}
