//! response-analyzer - stepped-sine frequency response measurement
//!
//! Plays one bin-centered tone at a time through the audio path under test,
//! captures what comes back and writes the complex response per frequency
//! to a profile directory.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use response_analyzer::audio::{
    default_output_sample_rate, AudioProcessor, AudioSystem, FirPath, LoopbackHost,
    ProcessorHandle, SignalPath, UnityPath,
};
use response_analyzer::cli::{Args, HostSelection};
use response_analyzer::error::Result;
use response_analyzer::params::AnalyzerConfig;
use response_analyzer::profile::Profile;
use response_analyzer::sweep::{run_sweep, Sweep, SweepProgress};

/// Sample rate of the simulated hosts when none is given
const SIMULATED_SAMPLE_RATE_HZ: u32 = 48000;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "response_analyzer=info".into()),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "measurement failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let host = args.host();
    let sample_rate = match (args.sample_rate, &host) {
        (Some(rate), _) => rate,
        (None, HostSelection::Device) => default_output_sample_rate()?,
        (None, _) => SIMULATED_SAMPLE_RATE_HZ,
    };

    let config = args.analyzer_config(sample_rate as f32);
    let mut sweep = Sweep::new(args.sweep_config())?;
    let (processor, mut handle) = AudioProcessor::new(config.clone())?;

    info!(
        sample_rate,
        fft_size = handle.fft_size(),
        bin_width_hz = config.bin_to_hz(1),
        points = sweep.config().points,
        "starting measurement"
    );

    match host {
        HostSelection::Device => {
            let system = AudioSystem::start(processor)?;
            run_sweep(&mut handle, &mut sweep, report_progress)?;
            info!(
                overruns = system.overruns(),
                underruns = system.underruns(),
                "audio streams closing"
            );
        }
        HostSelection::Loopback => {
            measure_simulated(args, processor, UnityPath, &mut handle, &mut sweep)?;
        }
        HostSelection::Simulate(path) => {
            let fir = FirPath::from_wav(&path, config.sample_rate_hz)?;
            measure_simulated(args, processor, fir, &mut handle, &mut sweep)?;
        }
    }

    write_profile(args, &config, sweep.into_profile())
}

fn measure_simulated<P: SignalPath + 'static>(
    args: &Args,
    processor: AudioProcessor,
    path: P,
    handle: &mut ProcessorHandle,
    sweep: &mut Sweep,
) -> Result<()> {
    let host = LoopbackHost::new(processor, path, args.block_size).spawn(args.paced)?;
    let result = run_sweep(handle, sweep, report_progress);
    host.stop();
    result
}

fn report_progress(progress: &SweepProgress) {
    info!(
        "[{:3.0}%] {:>9.2} Hz {:?}: {:>7.2} dB {:>6.3} rad",
        progress.fraction() * 100.0,
        progress.frequency_hz,
        progress.level,
        progress.magnitude_db,
        progress.phase_rad,
    );
}

fn write_profile(args: &Args, config: &AnalyzerConfig, profile: Profile) -> Result<()> {
    profile.write_dir(&args.output)?;
    info!(
        dir = %args.output.display(),
        points = profile.len(),
        sample_rate_hz = config.sample_rate_hz,
        "profile saved"
    );
    Ok(())
}
