//! Control-side sweep: one frequency request at a time, polled on a fixed tick.

use std::thread;
use std::time::Duration;

use rustfft::num_complex::Complex32;
use tracing::{debug, info, warn};

use crate::audio::{Message, ProcessorHandle};
use crate::error::Result;
use crate::params::{PseudoLevel, SweepConfig};
use crate::profile::{magnitude_db, Profile};

/// `points` logarithmically spaced frequencies from `min_hz` to `max_hz` inclusive
pub fn log_spaced(min_hz: f32, max_hz: f32, points: usize) -> Vec<f32> {
    let lx1 = f64::from(min_hz).log10();
    let lx2 = f64::from(max_hz).log10();
    let last = points.saturating_sub(1).max(1) as f64;
    (0..points)
        .map(|i| {
            let r = i as f64 / last;
            10f64.powf(lx1 + r * (lx2 - lx1)) as f32
        })
        .collect()
}

/// One recorded measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepProgress {
    /// Measurements completed so far
    pub completed: usize,
    /// Measurements in the whole sweep
    pub total: usize,
    /// Bin-quantized frequency that was measured (Hz)
    pub frequency_hz: f32,
    pub level: PseudoLevel,
    pub magnitude_db: f32,
    pub phase_rad: f32,
}

impl SweepProgress {
    /// Fraction complete in [0, 1]
    pub fn fraction(&self) -> f32 {
        self.completed as f32 / self.total.max(1) as f32
    }
}

/// Sweep state: which point and level come next, and what was measured
#[derive(Debug, Clone)]
pub struct Sweep {
    config: SweepConfig,
    requested: Vec<f32>,
    profile: Profile,
    level_index: usize,
    index: usize,
    completed: usize,
}

impl Sweep {
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;
        let requested = log_spaced(config.freq_min_hz, config.freq_max_hz, config.points);
        let profile = Profile::new(requested.clone());
        Ok(Self {
            config,
            requested,
            profile,
            level_index: 0,
            index: 0,
            completed: 0,
        })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.config.total_steps()
    }

    /// Level of the next measurement
    pub fn current_level(&self) -> Option<PseudoLevel> {
        self.config.levels.levels().get(self.level_index).copied()
    }

    /// Request for the next point, or `None` once every point is measured
    pub fn next_request(&self) -> Option<Message> {
        if self.is_complete() {
            return None;
        }
        Some(Message::RequestAnalyzeFrequency {
            frequency: self.requested[self.index],
            level: self.current_level()?,
        })
    }

    /// Record the reply to the outstanding request and advance.
    ///
    /// Replies for a level other than the outstanding one are stale and
    /// return `None`.
    pub fn record(
        &mut self,
        frequency_hz: f32,
        level: PseudoLevel,
        response: Complex32,
    ) -> Option<SweepProgress> {
        if self.current_level() != Some(level) {
            warn!(?level, frequency_hz, "ignoring reply for a level not being measured");
            return None;
        }

        self.profile.set(level, self.index, frequency_hz, response);
        self.completed += 1;
        self.index += 1;
        if self.index == self.config.points {
            self.index = 0;
            self.level_index += 1;
        }

        Some(SweepProgress {
            completed: self.completed,
            total: self.config.total_steps(),
            frequency_hz,
            level,
            magnitude_db: magnitude_db(response),
            phase_rad: response.arg(),
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn into_profile(self) -> Profile {
        self.profile
    }
}

/// Drive a whole sweep through the engine, then stop it.
///
/// Polls for replies every `tick_interval_ms` and calls `on_step` after each
/// recorded point. There is no timeout: a silent engine stalls the sweep.
pub fn run_sweep(
    handle: &mut ProcessorHandle,
    sweep: &mut Sweep,
    mut on_step: impl FnMut(&SweepProgress),
) -> Result<()> {
    let tick = Duration::from_millis(sweep.config().tick_interval_ms);
    handle.set_send_retry(Duration::from_millis(sweep.config().send_retry_ms));

    info!(
        points = sweep.config().points,
        total = sweep.config().total_steps(),
        fft_size = handle.fft_size(),
        "sweep started"
    );

    while let Some(request) = sweep.next_request() {
        handle.send_message(&request)?;
        if let Message::RequestAnalyzeFrequency { frequency, level } = request {
            debug!(frequency, ?level, "requested frequency");
        }

        'poll: loop {
            thread::sleep(tick);
            while let Some(msg) = handle.receive_message() {
                match msg {
                    Message::NotifyFrequencyAnalysis {
                        frequency,
                        level,
                        response,
                    } => {
                        if let Some(progress) = sweep.record(frequency, level, response) {
                            on_step(&progress);
                            break 'poll;
                        }
                    }
                    other => unreachable!("engine sent a request message: {other:?}"),
                }
            }
            debug!(
                input_level = handle.input_level(),
                output_level = handle.output_level(),
                "waiting for analysis"
            );
        }
    }

    handle.send_message(&Message::RequestStop)?;
    info!("sweep finished");
    Ok(())
}
