//! Fixture utilities for offline runs and the CLI harness.
//!
//! Loads PCM WAV input (any channel count, mixed down to mono), writes
//! float WAV output, and renders deterministic synthetic signals so tests
//! and CI runs do not depend on audio assets.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Peak amplitude of rendered tones
const SYNTH_AMPLITUDE: f32 = 0.5;

/// Mono PCM samples with their rate
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Synthetic test signals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum Synthetic {
    Sine { hz: f32 },
    /// Exponential sweep, constant cents per second
    Glide { from_hz: f32, to_hz: f32 },
    /// Uniform white noise at half scale
    Noise { seed: u64 },
    Silence,
}

impl Synthetic {
    pub fn render(&self, sample_rate: u32, duration_ms: u32) -> PcmClip {
        let len = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
        let sr = sample_rate.max(1) as f64;

        let samples = match *self {
            Synthetic::Sine { hz } => (0..len)
                .map(|i| {
                    let phase = 2.0 * std::f64::consts::PI * hz as f64 * i as f64 / sr;
                    SYNTH_AMPLITUDE * phase.sin() as f32
                })
                .collect(),
            Synthetic::Glide { from_hz, to_hz } => {
                let from = from_hz.max(1.0) as f64;
                let ratio = to_hz.max(1.0) as f64 / from;
                let total = (len.max(1)) as f64;
                let mut phase = 0.0_f64;
                (0..len)
                    .map(|i| {
                        let hz = from * ratio.powf(i as f64 / total);
                        let sample = SYNTH_AMPLITUDE * phase.sin() as f32;
                        phase += 2.0 * std::f64::consts::PI * hz / sr;
                        sample
                    })
                    .collect()
            }
            Synthetic::Noise { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..len)
                    .map(|_| rng.gen_range(-SYNTH_AMPLITUDE..SYNTH_AMPLITUDE))
                    .collect()
            }
            Synthetic::Silence => vec![0.0; len],
        };

        PcmClip::new(samples, sample_rate)
    }
}

/// Decode a WAV file, mixing every channel down to mono
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<PcmClip> {
    let path = path.as_ref();
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample.clamp(2, 32) - 1)) - 1) as f32;
            match spec.bits_per_sample {
                8 | 16 => reader
                    .samples::<i16>()
                    .map(|sample| sample.map(|v| v as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                other => {
                    return Err(anyhow!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    log::debug!(
        "[Fixtures] Loaded {} ({} Hz, {} ch, {} mono samples)",
        path.display(),
        spec.sample_rate,
        channels,
        samples.len()
    );

    Ok(PcmClip::new(samples, spec.sample_rate))
}

/// Write a mono 32-bit float WAV
pub fn write_wav<P: AsRef<Path>>(path: P, clip: &PcmClip) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for &sample in &clip.samples {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}
