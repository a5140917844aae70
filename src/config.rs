//! Configuration management for dynamic parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. Analyzer, engine and
//! prosody parameters can be adjusted via the config file. Values are
//! clamped into their valid ranges by [`AppConfig::sanitized`] before any
//! component consumes them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analyzer: AnalyzerConfig,
    pub brightness: BrightnessConfig,
    pub detector: DetectorConfig,
    pub engine: EngineConfig,
    pub prosody: ProsodyConfig,
    pub expressiveness: ExpressivenessConfig,
    pub transport: TransportConfig,
}

/// Per-hop frame analyzer parameters (audio thread)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Working sample rate in Hz
    pub sample_rate: u32,
    /// Analysis window length in samples (power of two)
    pub frame_size: usize,
    /// Hop between successive frames in samples
    pub hop: usize,
    /// Lowest pitch searched by the autocorrelation lag range
    pub min_hz: f32,
    /// Highest pitch searched by the autocorrelation lag range
    pub max_hz: f32,
    /// RMS below which a frame is treated as silence
    pub voicing_rms: f32,
    /// Normalized correlation required before a lag counts as a pitch
    pub min_clarity: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            frame_size: 2048,
            hop: 512,
            min_hz: 60.0,
            max_hz: 1000.0,
            voicing_rms: 0.01,
            min_clarity: 0.5,
        }
    }
}

/// Brightness (spectral centroid) analyzer parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessConfig {
    /// DFT window length in samples
    pub window: usize,
    /// Overlap between successive windows (0.75 = emit every window/4 samples)
    pub overlap: f32,
    /// Centroid mapped to brightness 0.0
    pub min_centroid_hz: f32,
    /// Centroid mapped to brightness 1.0
    pub max_centroid_hz: f32,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            window: 1024,
            overlap: 0.75,
            min_centroid_hz: 200.0,
            max_centroid_hz: 4000.0,
        }
    }
}

/// Pitch detector parameters shared by both detector variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// ONNX model for the neural detector; `None` disables the neural path
    pub model_path: Option<String>,
    /// Rate the neural model was trained at
    pub model_sample_rate: u32,
    /// Number of output bins produced by the model
    pub bins: usize,
    /// Frequency of the first output bin
    pub bin_min_hz: f32,
    /// Frequency of the last output bin
    pub bin_max_hz: f32,
    /// Softmax peak below which the neural detector reports no pitch
    pub confidence_gate: f32,
    /// Search range of the autocorrelation detector
    pub min_hz: f32,
    pub max_hz: f32,
    /// Normalized correlation required by the autocorrelation detector
    pub min_clarity: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_sample_rate: 16_000,
            bins: 360,
            bin_min_hz: 50.0,
            bin_max_hz: 2000.0,
            confidence_gate: 0.5,
            min_hz: 60.0,
            max_hz: 1000.0,
            min_clarity: 0.5,
        }
    }
}

/// Kalman filter constants (semitone space)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Process variance Q (semitones^2 per hop)
    pub q_semitones2: f32,
    /// Measurement variance R (semitones^2)
    pub r_semitones2: f32,
    /// Hops after an onset that run with the boosted fast-lock gain
    pub fast_lock_frames: u32,
    /// Multiplier applied to R while fast-lock is active
    pub fast_lock_r_scale: f32,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            q_semitones2: 0.05,
            r_semitones2: 0.5,
            fast_lock_frames: 6,
            fast_lock_r_scale: 0.1,
        }
    }
}

/// Post-detection smoothing engine parameters (consumer thread)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate of the raw samples handed to the engine; follows `analyzer.sample_rate`
    pub input_sample_rate: u32,
    /// Canonical rate detectors run at; follows `detector.model_sample_rate`
    pub model_sample_rate: u32,
    /// Hop duration in seconds; follows `analyzer.hop / analyzer.sample_rate`
    pub hop_sec: f64,
    /// Median filter length (odd)
    pub median_window: usize,
    pub kalman: KalmanConfig,
    /// Detector confidence below which a hop is unvoiced
    pub confidence_gate: f32,
    /// Log-domain EMA coefficient for the baseline pitch
    pub baseline_alpha: f32,
    /// EMA coefficient for the jitter metric
    pub jitter_alpha: f32,
    /// Unvoiced hops during which the last value keeps decaying before going silent
    pub decay_frames: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 48_000,
            model_sample_rate: 16_000,
            hop_sec: 512.0 / 48_000.0,
            median_window: 5,
            kalman: KalmanConfig::default(),
            confidence_gate: 0.5,
            baseline_alpha: 0.01,
            jitter_alpha: 0.2,
            decay_frames: 8,
        }
    }
}

/// Windowed prosody classifier thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProsodyConfig {
    /// Trailing window length in milliseconds
    pub window_ms: f64,
    /// Voiced duration required before a label is produced
    pub min_voiced_ms: f64,
    /// Slope at or above which the contour is rising (cents/sec)
    pub rise_cents_per_sec: f32,
    /// Slope at or below which the contour is falling (cents/sec, negative)
    pub fall_cents_per_sec: f32,
    /// EMA coefficient applied across successive classifications
    pub ema_alpha: f32,
    /// Voiced samples required before a label is produced
    pub min_samples: usize,
}

impl Default for ProsodyConfig {
    fn default() -> Self {
        Self {
            window_ms: 1500.0,
            min_voiced_ms: 300.0,
            rise_cents_per_sec: 150.0,
            fall_cents_per_sec: -150.0,
            ema_alpha: 0.5,
            min_samples: 8,
        }
    }
}

/// Expressiveness statistic parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressivenessConfig {
    /// Spread (cents) that maps to a full score
    pub ref_spread_cents: f32,
    /// Sample count below which the score is penalized
    pub min_samples: usize,
}

impl Default for ExpressivenessConfig {
    fn default() -> Self {
        Self {
            ref_spread_cents: 300.0,
            min_samples: 10,
        }
    }
}

/// Ring transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Usable slots in the telemetry ring
    pub capacity: usize,
    /// Packed values per record
    pub values_per_frame: usize,
    /// Consumer poll interval in milliseconds
    pub drain_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            values_per_frame: crate::transport::frame::VALUES_PER_FRAME,
            drain_interval_ms: 16,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Returns
    /// The parsed configuration, or defaults (with a warning) when the file
    /// is missing or its JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Strict JSON parse; missing sections fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Clamp every numeric field into its valid range.
    ///
    /// The engine's rates and hop duration are derived from the analyzer and
    /// detector sections, so the copies can never disagree.
    pub fn sanitized(mut self) -> Self {
        let a = &mut self.analyzer;
        a.sample_rate = a.sample_rate.max(8_000);
        a.frame_size = a.frame_size.clamp(256, 16_384).next_power_of_two();
        a.hop = a.hop.clamp(1, a.frame_size);
        (a.min_hz, a.max_hz) = pitch_range(a.min_hz, a.max_hz, a.sample_rate);
        a.voicing_rms = a.voicing_rms.max(0.0);
        a.min_clarity = a.min_clarity.clamp(0.0, 1.0);
        let (sample_rate, hop) = (a.sample_rate, a.hop);

        let b = &mut self.brightness;
        b.window = b.window.clamp(64, 8192);
        b.overlap = b.overlap.clamp(0.0, 0.95);
        b.min_centroid_hz = b.min_centroid_hz.max(0.0);
        b.max_centroid_hz = b.max_centroid_hz.max(b.min_centroid_hz + 1.0);

        let d = &mut self.detector;
        d.model_sample_rate = d.model_sample_rate.max(8_000);
        d.bins = d.bins.max(2);
        d.bin_min_hz = d.bin_min_hz.max(1.0);
        d.bin_max_hz = d.bin_max_hz.max(d.bin_min_hz + 1.0);
        d.confidence_gate = d.confidence_gate.clamp(0.0, 1.0);
        (d.min_hz, d.max_hz) = pitch_range(d.min_hz, d.max_hz, d.model_sample_rate);
        d.min_clarity = d.min_clarity.clamp(0.0, 1.0);
        let model_sample_rate = d.model_sample_rate;

        let e = &mut self.engine;
        e.input_sample_rate = sample_rate;
        e.model_sample_rate = model_sample_rate;
        e.hop_sec = hop as f64 / sample_rate as f64;
        e.median_window = e.median_window.clamp(1, 15);
        if e.median_window % 2 == 0 {
            e.median_window += 1;
        }
        e.kalman.q_semitones2 = e.kalman.q_semitones2.max(1e-6);
        e.kalman.r_semitones2 = e.kalman.r_semitones2.max(1e-6);
        e.kalman.fast_lock_r_scale = e.kalman.fast_lock_r_scale.clamp(1e-3, 1.0);
        e.confidence_gate = e.confidence_gate.clamp(0.0, 1.0);
        e.baseline_alpha = e.baseline_alpha.clamp(0.0, 1.0);
        e.jitter_alpha = e.jitter_alpha.clamp(0.0, 1.0);

        let p = &mut self.prosody;
        p.window_ms = p.window_ms.max(1.0);
        p.min_voiced_ms = p.min_voiced_ms.max(0.0);
        p.ema_alpha = p.ema_alpha.clamp(0.0, 1.0);
        p.min_samples = p.min_samples.max(2);
        p.fall_cents_per_sec = p.fall_cents_per_sec.min(0.0);
        p.rise_cents_per_sec = p.rise_cents_per_sec.max(0.0);

        let x = &mut self.expressiveness;
        x.ref_spread_cents = x.ref_spread_cents.max(1e-3);
        x.min_samples = x.min_samples.max(1);

        let t = &mut self.transport;
        t.capacity = t.capacity.max(2);
        t.drain_interval_ms = t.drain_interval_ms.clamp(1, 1000);

        self
    }
}

/// Pitch search range with 20 Hz ≤ min < max ≤ sample_rate / 4
///
/// Callers guarantee `sample_rate >= 8000`.
fn pitch_range(min_hz: f32, max_hz: f32, sample_rate: u32) -> (f32, f32) {
    let ceiling = sample_rate as f32 / 4.0;
    let min_hz = if min_hz.is_finite() { min_hz } else { 20.0 };
    let min_hz = min_hz.clamp(20.0, ceiling - 1.0);
    let max_hz = if max_hz.is_finite() { max_hz } else { ceiling };
    (min_hz, max_hz.clamp(min_hz + 1.0, ceiling))
}
