use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use prosody_telemetry::config::AppConfig;
use prosody_telemetry::detector::{Capabilities, DetectorKind, DetectorSelector};
use prosody_telemetry::engine::PitchEngine;
use prosody_telemetry::fixtures::{load_wav, write_wav, Synthetic};
use prosody_telemetry::offline::OfflineRunner;
use prosody_telemetry::telemetry::TelemetryCollector;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "prosody_cli",
    about = "Offline and live harness for the pitch & prosody telemetry engine"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// JSON configuration file; missing sections use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the offline pipeline over a WAV file and print the report
    Analyze {
        #[arg(long)]
        wav: PathBuf,
        /// Pitch source for every hop
        #[arg(long, value_enum, default_value_t = PitchSource::Detector)]
        pitch: PitchSource,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Include every per-hop update in the report
        #[arg(long)]
        frames: bool,
    },
    /// Render a synthetic test signal to a WAV file
    Synth {
        #[arg(long, value_enum)]
        pattern: Pattern,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 220.0)]
        hz: f32,
        /// End frequency for glides
        #[arg(long, default_value_t = 440.0)]
        to_hz: f32,
        #[arg(long, default_value_t = 1000)]
        ms: u32,
        #[arg(long, default_value_t = 48_000)]
        sample_rate: u32,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Probe host capabilities and report which detector would run
    Capabilities {
        /// Pretend the host lacks an isolated shared-memory context
        #[arg(long)]
        no_isolation: bool,
        /// Pretend SIMD is unavailable
        #[arg(long)]
        no_simd: bool,
        /// Tone fed through the selected detector as a smoke test
        #[arg(long, default_value_t = 220.0)]
        probe_hz: f32,
    },
    /// Capture from the default microphone and print updates as JSON lines
    Live {
        #[arg(long, default_value_t = 5)]
        seconds: u64,
        #[arg(long, value_enum, default_value_t = PitchSource::Detector)]
        pitch: PitchSource,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PitchSource {
    /// Detector chosen from the host capabilities
    Detector,
    /// The frame analyzer's own autocorrelation estimate
    Analyzer,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Pattern {
    Sine,
    Glide,
    Noise,
    Silence,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    }
    .sanitized();

    match cli.command {
        Commands::Analyze {
            wav,
            pitch,
            output,
            frames,
        } => run_analyze(config, wav, pitch, output, frames),
        Commands::Synth {
            pattern,
            out,
            hz,
            to_hz,
            ms,
            sample_rate,
            seed,
        } => {
            let signal = match pattern {
                Pattern::Sine => Synthetic::Sine { hz },
                Pattern::Glide => Synthetic::Glide {
                    from_hz: hz,
                    to_hz,
                },
                Pattern::Noise => Synthetic::Noise { seed },
                Pattern::Silence => Synthetic::Silence,
            };
            run_synth(signal, out, sample_rate, ms)
        }
        Commands::Capabilities {
            no_isolation,
            no_simd,
            probe_hz,
        } => run_capabilities(config, no_isolation, no_simd, probe_hz),
        Commands::Live { seconds, pitch } => run_live(config, seconds, pitch),
    }
}

fn run_analyze(
    config: AppConfig,
    wav: PathBuf,
    pitch: PitchSource,
    output_path: Option<PathBuf>,
    include_frames: bool,
) -> Result<ExitCode> {
    let clip = load_wav(&wav)?;
    let mut runner = OfflineRunner::new(config);
    if pitch == PitchSource::Detector {
        runner = runner.with_detector(DetectorSelector::standard(), Capabilities::probe_native());
    }
    let mut report = runner
        .run(&clip)
        .with_context(|| format!("analyzing {}", wav.display()))?;
    if !include_frames {
        report.frames.clear();
    }

    let json = serde_json::to_string_pretty(&report)?;
    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(ExitCode::from(0))
}

fn run_synth(signal: Synthetic, out: PathBuf, sample_rate: u32, ms: u32) -> Result<ExitCode> {
    let clip = signal.render(sample_rate, ms);
    write_wav(&out, &clip)?;
    println!(
        "{}",
        serde_json::to_string(&SynthPayload {
            signal,
            path: out.display().to_string(),
            sample_rate,
            samples: clip.samples.len(),
        })?
    );
    Ok(ExitCode::from(0))
}

fn run_capabilities(
    config: AppConfig,
    no_isolation: bool,
    no_simd: bool,
    probe_hz: f32,
) -> Result<ExitCode> {
    let mut capabilities = Capabilities::probe_native();
    if no_isolation {
        capabilities.cross_origin_isolated = false;
        capabilities.shared_array_buffer = false;
    }
    if no_simd {
        capabilities.wasm_simd = false;
    }

    let collector = Arc::new(TelemetryCollector::new(16, 16));
    let mut selection = DetectorSelector::standard()
        .with_collector(Arc::clone(&collector))
        .select(&capabilities, &config.detector);

    let sample_rate = config.engine.input_sample_rate;
    let probe = Synthetic::Sine { hz: probe_hz }.render(sample_rate, 100);
    let mut engine = PitchEngine::new(config.engine.clone());
    let output = engine.process_samples(selection.detector.as_mut(), &probe.samples, sample_rate);

    let payload = CapabilitiesPayload {
        capabilities,
        supports_neural: capabilities.supports_neural(),
        selected: selection.kind,
        reason: selection.reason.describe(),
        probe_hz,
        probe_pitch_hz: output.raw.pitch_hz,
        probe_confidence: output.raw.confidence,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(ExitCode::from(0))
}

#[cfg(feature = "capture")]
fn run_live(config: AppConfig, seconds: u64, pitch: PitchSource) -> Result<ExitCode> {
    use futures::StreamExt;
    use prosody_telemetry::pipeline::PipelineHandle;
    use std::time::Duration;

    let collector = Arc::new(TelemetryCollector::new(256, 256));
    let mut events = collector.stream();
    let selection = (pitch == PitchSource::Detector).then(|| {
        DetectorSelector::standard()
            .with_collector(Arc::clone(&collector))
            .select(&Capabilities::probe_native(), &config.detector)
    });
    let handle = PipelineHandle::start(&config, Arc::clone(&collector), selection)
        .context("starting live capture")?;
    let mut updates = handle.subscribe();
    tracing::info!("Capturing at {} Hz for {}s", handle.sample_rate(), seconds);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building runtime")?;

    runtime.block_on(async {
        let deadline = tokio::time::sleep(Duration::from_secs(seconds));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                update = updates.recv() => match update {
                    Ok(update) => println!("{}", serde_json::to_string(&update)?),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Skipped {} updates", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                Some(Ok(event)) = events.next() => {
                    eprintln!("{}", serde_json::to_string(&event)?);
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    })?;

    let summary = handle.stop().context("stopping live capture")?;
    eprintln!(
        "Processed {} frames ({} overruns)",
        summary.frames, summary.overruns
    );
    Ok(ExitCode::from(0))
}

#[cfg(not(feature = "capture"))]
fn run_live(_config: AppConfig, _seconds: u64, _pitch: PitchSource) -> Result<ExitCode> {
    anyhow::bail!("live capture requires building with `--features capture`")
}

#[derive(Serialize)]
struct SynthPayload {
    signal: Synthetic,
    path: String,
    sample_rate: u32,
    samples: usize,
}

#[derive(Serialize)]
struct CapabilitiesPayload {
    capabilities: Capabilities,
    supports_neural: bool,
    selected: DetectorKind,
    reason: String,
    probe_hz: f32,
    probe_pitch_hz: Option<f32>,
    probe_confidence: f32,
}
