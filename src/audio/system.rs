//! Audio device binding: runs the analysis engine inside cpal's callbacks.
//!
//! cpal delivers capture and playback through separate streams. The input
//! callback forwards channel 0 through a byte ring (samples as raw `f32`
//! bytes); the output callback pulls one block of it, runs
//! [`AudioProcessor::process`] and writes the mono result to every output
//! channel. Neither callback locks or allocates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::processor::AudioProcessor;
use super::ring_buffer::{ring_buffer, RingConsumer, RingProducer};
use crate::error::{AnalyzerError, Result};

/// Frames handled per engine call; longer device buffers are split
const MAX_CHUNK_FRAMES: usize = 4096;

/// Seconds of capture the sample ring can hold
const SAMPLE_RING_SECS: f32 = 0.5;

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// Dropout counters, written by the callbacks
#[derive(Debug, Default)]
struct StreamStats {
    overruns: AtomicU64,
    underruns: AtomicU64,
}

/// Running duplex audio session (streams stop when dropped)
pub struct AudioSystem {
    /// Capture stream (kept alive)
    _input_stream: cpal::Stream,

    /// Playback stream (kept alive)
    _output_stream: cpal::Stream,

    stats: Arc<StreamStats>,
}

/// Default sample rate of the default output device
pub fn default_output_sample_rate() -> Result<u32> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AnalyzerError::device("no audio output device found"))?;
    let config = device
        .default_output_config()
        .map_err(|e| AnalyzerError::device(format!("failed to get output config: {e}")))?;
    Ok(config.sample_rate().0)
}

impl AudioSystem {
    /// Open the default input and output devices and start processing
    pub fn start(processor: AudioProcessor) -> Result<Self> {
        let sample_rate = processor.config().sample_rate_hz.round() as u32;

        let host = cpal::default_host();
        let input_device = host
            .default_input_device()
            .ok_or_else(|| AnalyzerError::device("no audio input device found"))?;
        let output_device = host
            .default_output_device()
            .ok_or_else(|| AnalyzerError::device("no audio output device found"))?;

        let input_channels = input_device
            .default_input_config()
            .map_err(|e| AnalyzerError::device(format!("failed to get input config: {e}")))?
            .channels();
        let output_channels = output_device
            .default_output_config()
            .map_err(|e| AnalyzerError::device(format!("failed to get output config: {e}")))?
            .channels();

        info!(
            input = %input_device.name().unwrap_or_else(|_| "Unknown".to_string()),
            output = %output_device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            input_channels,
            output_channels,
            "opening audio devices"
        );

        let ring_bytes = (SAMPLE_RING_SECS * sample_rate as f32) as usize * SAMPLE_BYTES;
        let (sample_tx, sample_rx) = ring_buffer(ring_bytes.max(MAX_CHUNK_FRAMES * SAMPLE_BYTES));
        let stats = Arc::new(StreamStats::default());

        let input_config = cpal::StreamConfig {
            channels: input_channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let output_config = cpal::StreamConfig {
            channels: output_channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut capture = CaptureForwarder::new(sample_tx, usize::from(input_channels), Arc::clone(&stats));
        let input_stream = input_device
            .build_input_stream(
                &input_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| capture.forward(data),
                |err| error!(error = %err, "audio input stream error"),
                None,
            )
            .map_err(|e| AnalyzerError::stream(format!("failed to build input stream: {e}")))?;

        let mut playback = PlaybackDriver::new(
            processor,
            sample_rx,
            usize::from(output_channels),
            Arc::clone(&stats),
        );
        let output_stream = output_device
            .build_output_stream(
                &output_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| playback.render(data),
                |err| error!(error = %err, "audio output stream error"),
                None,
            )
            .map_err(|e| AnalyzerError::stream(format!("failed to build output stream: {e}")))?;

        input_stream
            .play()
            .map_err(|e| AnalyzerError::stream(format!("failed to start input stream: {e}")))?;
        output_stream
            .play()
            .map_err(|e| AnalyzerError::stream(format!("failed to start output stream: {e}")))?;
        info!("audio streams started");

        Ok(Self {
            _input_stream: input_stream,
            _output_stream: output_stream,
            stats,
        })
    }

    /// Capture callbacks whose samples did not fit in the sample ring
    pub fn overruns(&self) -> u64 {
        self.stats.overruns.load(Ordering::Relaxed)
    }

    /// Playback blocks that found less captured input than they needed
    pub fn underruns(&self) -> u64 {
        self.stats.underruns.load(Ordering::Relaxed)
    }
}

/// Input callback state: de-interleaves channel 0 into the sample ring
struct CaptureForwarder {
    ring: RingProducer,
    channels: usize,
    scratch: Vec<f32>,
    stats: Arc<StreamStats>,
}

impl CaptureForwarder {
    fn new(ring: RingProducer, channels: usize, stats: Arc<StreamStats>) -> Self {
        Self {
            ring,
            channels: channels.max(1),
            scratch: vec![0.0; MAX_CHUNK_FRAMES],
            stats,
        }
    }

    fn forward(&mut self, data: &[f32]) {
        for chunk in data.chunks(self.channels * MAX_CHUNK_FRAMES) {
            let frames = chunk.len() / self.channels;
            for (dst, frame) in self.scratch.iter_mut().zip(chunk.chunks_exact(self.channels)) {
                *dst = frame[0];
            }
            if !self.ring.put(bytemuck::cast_slice(&self.scratch[..frames])) {
                self.stats.overruns.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Output callback state: owns the engine
struct PlaybackDriver {
    processor: AudioProcessor,
    ring: RingConsumer,
    channels: usize,
    input: Vec<f32>,
    output: Vec<f32>,
    stats: Arc<StreamStats>,
}

impl PlaybackDriver {
    fn new(
        processor: AudioProcessor,
        ring: RingConsumer,
        channels: usize,
        stats: Arc<StreamStats>,
    ) -> Self {
        Self {
            processor,
            ring,
            channels: channels.max(1),
            input: vec![0.0; MAX_CHUNK_FRAMES],
            output: vec![0.0; MAX_CHUNK_FRAMES],
            stats,
        }
    }

    fn render(&mut self, data: &mut [f32]) {
        for chunk in data.chunks_mut(self.channels * MAX_CHUNK_FRAMES) {
            let frames = chunk.len() / self.channels;

            let available = (self.ring.size_used() / SAMPLE_BYTES).min(frames);
            self.ring
                .get(bytemuck::cast_slice_mut(&mut self.input[..available]));
            if available < frames {
                self.input[available..frames].fill(0.0);
                self.stats.underruns.fetch_add(1, Ordering::Relaxed);
            }

            self.processor
                .process(&self.input[..frames], &mut self.output[..frames]);

            for (frame, &sample) in chunk.chunks_exact_mut(self.channels).zip(&self.output[..frames]) {
                frame.fill(sample);
            }
        }
    }
}
