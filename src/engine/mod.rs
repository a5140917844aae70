//! Post-detection smoothing engine.
//!
//! Advanced once per hop on the consumer thread:
//!
//! 1. Gate: low confidence or no pitch makes the hop unvoiced
//! 2. Median filter over recent raw Hz
//! 3. Semitone transform (absolute scale, A4 = 0)
//! 4. Slow log-domain baseline EMA
//! 5. Kalman filter with fast-lock after every onset
//! 6. Jitter EMA of the absolute hop-to-hop filtered delta
//!
//! Unvoiced hops: for up to `decay_frames` hops the last baseline-relative
//! value halves every hop and is still emitted, then output goes silent and
//! the median window is cleared. Every unvoiced hop arms fast-lock for the
//! next onset.

use serde::{Deserialize, Serialize};

use crate::audio::resample::resample_linear_into;
use crate::config::EngineConfig;
use crate::detector::{PitchDetector, PitchDetectorOutput};

pub mod kalman;
pub mod median;

pub use kalman::KalmanState;
pub use median::MedianFilter;

/// Reference for the absolute semitone scale
const A4_HZ: f32 = 440.0;

/// Per-hop decay applied to the relative pitch while unvoiced
const UNVOICED_DECAY: f32 = 0.5;

/// Hz → semitones relative to A4
pub fn hz_to_semitone(hz: f32) -> f32 {
    12.0 * (hz / A4_HZ).log2()
}

/// Semitones relative to A4 → Hz
pub fn semitone_to_hz(semitone: f32) -> f32 {
    A4_HZ * (semitone / 12.0).exp2()
}

/// Jitter and baseline exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub jitter_ema: f32,
    /// 0 until the first voiced hop
    pub baseline_hz: f32,
}

/// One hop of engine output; always a fresh value
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineOutput {
    pub pitch_hz: Option<f32>,
    pub semitone_rel: Option<f32>,
    /// The hop passed the confidence gate; false for decaying values
    pub voiced: bool,
    pub raw: PitchDetectorOutput,
    pub metrics: EngineMetrics,
}

impl EngineOutput {
    /// Smoothed pitch of a voiced hop; `None` during the decay tail
    pub fn voiced_pitch_hz(&self) -> Option<f32> {
        self.pitch_hz.filter(|_| self.voiced)
    }
}

/// Filter state, mutated only by [`PitchEngine::update`]
#[derive(Debug, Clone)]
pub struct EngineState {
    pub median: MedianFilter,
    /// `None` while not tracking; cleared on every unvoiced hop
    pub kalman: Option<KalmanState>,
    pub baseline_hz: Option<f32>,
    pub jitter_ema: f32,
    /// Consecutive unvoiced hops
    pub unvoiced_run: u32,
    last_semitone_rel: Option<f32>,
}

impl EngineState {
    fn new(median_window: usize) -> Self {
        Self {
            median: MedianFilter::new(median_window),
            kalman: None,
            baseline_hz: None,
            jitter_ema: 0.0,
            unvoiced_run: 0,
            last_semitone_rel: None,
        }
    }

    /// Whether the next voiced hop re-seeds the filter
    pub fn fast_lock_armed(&self) -> bool {
        self.kalman.is_none()
    }
}

pub struct PitchEngine {
    config: EngineConfig,
    state: EngineState,
    resampled: Vec<f32>,
}

impl PitchEngine {
    pub fn new(config: EngineConfig) -> Self {
        log::debug!(
            "[PitchEngine] median_window={} q={} r={} fast_lock_frames={} gate={}",
            config.median_window,
            config.kalman.q_semitones2,
            config.kalman.r_semitones2,
            config.kalman.fast_lock_frames,
            config.confidence_gate
        );
        Self {
            state: EngineState::new(config.median_window),
            config,
            resampled: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Clear all filter state (detector swap, stream restart)
    pub fn reset(&mut self) {
        self.state = EngineState::new(self.config.median_window);
    }

    /// Advance one hop
    pub fn update(&mut self, raw: PitchDetectorOutput) -> EngineOutput {
        let voiced = raw
            .pitch_hz
            .filter(|hz| hz.is_finite() && *hz > 0.0)
            .filter(|_| raw.confidence >= self.config.confidence_gate);

        let (pitch_hz, semitone_rel) = match voiced {
            Some(hz) => self.voiced_hop(hz),
            None => self.unvoiced_hop(),
        };

        EngineOutput {
            pitch_hz,
            semitone_rel,
            voiced: voiced.is_some(),
            raw,
            metrics: EngineMetrics {
                jitter_ema: self.state.jitter_ema,
                baseline_hz: self.state.baseline_hz.unwrap_or(0.0),
            },
        }
    }

    /// Run `detector` on `samples` (resampled to the model rate) and advance
    pub fn process_samples(
        &mut self,
        detector: &mut dyn PitchDetector,
        samples: &[f32],
        sample_rate: u32,
    ) -> EngineOutput {
        let model_rate = self.config.model_sample_rate;
        let raw = if sample_rate == model_rate {
            detector.process_frame(samples, sample_rate)
        } else {
            resample_linear_into(samples, sample_rate, model_rate, &mut self.resampled);
            detector.process_frame(&self.resampled, model_rate)
        };
        self.update(raw)
    }

    fn voiced_hop(&mut self, hz: f32) -> (Option<f32>, Option<f32>) {
        let state = &mut self.state;
        let kalman_config = &self.config.kalman;

        state.unvoiced_run = 0;
        let median_hz = state.median.push(hz);
        let measurement = hz_to_semitone(median_hz);

        let baseline_semitone = match state.baseline_hz {
            None => measurement,
            Some(baseline) => {
                let current = hz_to_semitone(baseline);
                current + self.config.baseline_alpha * (measurement - current)
            }
        };
        state.baseline_hz = Some(semitone_to_hz(baseline_semitone));

        let filtered = match state.kalman.as_mut() {
            Some(kalman) => {
                let previous = kalman.mean_semitone;
                let filtered = kalman.update(measurement, kalman_config);
                let delta = (filtered - previous).abs();
                let alpha = self.config.jitter_alpha;
                state.jitter_ema = (1.0 - alpha) * state.jitter_ema + alpha * delta;
                filtered
            }
            None => {
                // Onset: re-seed, no delta to measure yet
                state.kalman = Some(KalmanState::seeded(measurement, kalman_config.r_semitones2));
                measurement
            }
        };

        let relative = filtered - baseline_semitone;
        state.last_semitone_rel = Some(relative);
        (Some(semitone_to_hz(filtered)), Some(relative))
    }

    fn unvoiced_hop(&mut self) -> (Option<f32>, Option<f32>) {
        let state = &mut self.state;
        state.unvoiced_run = state.unvoiced_run.saturating_add(1);
        state.kalman = None;

        if state.unvoiced_run > self.config.decay_frames {
            state.median.clear();
            state.last_semitone_rel = None;
            return (None, None);
        }

        match (state.last_semitone_rel, state.baseline_hz) {
            (Some(relative), Some(baseline)) => {
                let decayed = relative * UNVOICED_DECAY;
                state.last_semitone_rel = Some(decayed);
                let pitch = semitone_to_hz(hz_to_semitone(baseline) + decayed);
                (Some(pitch), Some(decayed))
            }
            _ => (None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KalmanConfig;
    use crate::detector::{AutocorrelationDetector, DetectorKind};

    fn voiced(hz: f32) -> PitchDetectorOutput {
        PitchDetectorOutput::voiced(hz, 0.9)
    }

    #[test]
    fn test_semitone_conversions() {
        assert_eq!(hz_to_semitone(440.0), 0.0);
        assert!((hz_to_semitone(880.0) - 12.0).abs() < 1e-5);
        assert!((semitone_to_hz(hz_to_semitone(196.0)) - 196.0).abs() < 1e-3);
    }

    #[test]
    fn test_constant_pitch_converges() {
        let mut engine = PitchEngine::new(EngineConfig::default());
        let mut last = EngineOutput::default();
        for i in 0..200 {
            // Small alternating wobble around 220 Hz
            let hz = if i % 2 == 0 { 220.5 } else { 219.5 };
            last = engine.update(voiced(hz));
        }
        for _ in 0..200 {
            last = engine.update(voiced(220.0));
        }

        assert!(last.semitone_rel.unwrap().abs() < 0.05);
        assert!(last.metrics.jitter_ema < 1e-3);
        assert!((last.pitch_hz.unwrap() - 220.0).abs() < 0.5);
        assert!((last.metrics.baseline_hz - 220.0).abs() < 1.0);
    }

    #[test]
    fn test_first_voiced_hop_is_zero_relative() {
        let mut engine = PitchEngine::new(EngineConfig::default());
        let output = engine.update(voiced(300.0));
        assert_eq!(output.semitone_rel, Some(0.0));
        assert!((output.pitch_hz.unwrap() - 300.0).abs() < 1e-2);
        assert!((output.metrics.baseline_hz - 300.0).abs() < 1e-2);
    }

    #[test]
    fn test_low_confidence_is_gated() {
        let mut engine = PitchEngine::new(EngineConfig::default());
        let output = engine.update(PitchDetectorOutput::voiced(220.0, 0.2));
        assert_eq!(output.pitch_hz, None);
        assert_eq!(output.raw.pitch_hz, Some(220.0));
        assert!(engine.state().median.is_empty());
    }

    #[test]
    fn test_median_suppresses_octave_spike() {
        let mut engine = PitchEngine::new(EngineConfig::default());
        for _ in 0..20 {
            engine.update(voiced(220.0));
        }
        let output = engine.update(voiced(440.0));
        assert!((output.pitch_hz.unwrap() - 220.0).abs() < 0.5);
    }

    /// Hops after the step until the output is within half a semitone of target
    fn settling_hops(step_at: usize) -> usize {
        let config = EngineConfig {
            median_window: 1,
            kalman: KalmanConfig {
                fast_lock_frames: 20,
                ..KalmanConfig::default()
            },
            ..EngineConfig::default()
        };
        let mut engine = PitchEngine::new(config);
        for _ in 0..step_at {
            engine.update(voiced(200.0));
        }
        let target = hz_to_semitone(300.0);
        for hop in 1..=100 {
            let output = engine.update(voiced(300.0));
            if (hz_to_semitone(output.pitch_hz.unwrap()) - target).abs() < 0.5 {
                return hop;
            }
        }
        100
    }

    #[test]
    fn test_fast_lock_settles_faster_than_steady_state() {
        let during_lock = settling_hops(2);
        let steady = settling_hops(40);
        assert!(
            during_lock < steady,
            "fast-lock {} hops vs steady {} hops",
            during_lock,
            steady
        );
    }

    #[test]
    fn test_unvoiced_decays_then_goes_silent() {
        let config = EngineConfig::default();
        let decay_frames = config.decay_frames;
        let mut engine = PitchEngine::new(config);

        for _ in 0..50 {
            engine.update(voiced(200.0));
        }
        // Jump up so the relative value is clearly non-zero
        let mut last_rel = 0.0;
        for _ in 0..10 {
            last_rel = engine.update(voiced(260.0)).semitone_rel.unwrap();
        }
        assert!(last_rel > 1.0);

        let first = engine.update(PitchDetectorOutput::unvoiced());
        assert!((first.semitone_rel.unwrap() - last_rel * 0.5).abs() < 1e-5);
        assert!(engine.state().fast_lock_armed());

        let mut output = first;
        for _ in 1..decay_frames {
            output = engine.update(PitchDetectorOutput::unvoiced());
        }
        assert!(output.semitone_rel.unwrap().abs() < first.semitone_rel.unwrap());

        let silent = engine.update(PitchDetectorOutput::unvoiced());
        assert_eq!(silent.pitch_hz, None);
        assert_eq!(silent.semitone_rel, None);
        assert!(engine.state().median.is_empty());
    }

    #[test]
    fn test_onset_after_gap_reseeds() {
        let mut engine = PitchEngine::new(EngineConfig::default());
        for _ in 0..30 {
            engine.update(voiced(200.0));
        }
        for _ in 0..20 {
            engine.update(PitchDetectorOutput::unvoiced());
        }
        // Fresh median window and seeded filter: the new pitch is taken as-is
        let output = engine.update(voiced(330.0));
        assert!((output.pitch_hz.unwrap() - 330.0).abs() < 1e-2);
        assert_eq!(engine.state().kalman.unwrap().frames_since_lock, 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut engine = PitchEngine::new(EngineConfig::default());
        engine.update(voiced(220.0));
        engine.reset();
        assert!(engine.state().baseline_hz.is_none());
        assert!(engine.state().median.is_empty());
        assert_eq!(engine.state().jitter_ema, 0.0);
    }

    #[test]
    fn test_process_samples_resamples_for_detector() {
        let mut engine = PitchEngine::new(EngineConfig::default());
        let mut detector = AutocorrelationDetector::default();
        assert_eq!(detector.kind(), DetectorKind::Autocorrelation);

        let samples: Vec<f32> = (0..3072)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 250.0 * i as f32 / 48_000.0).sin())
            .collect();
        let output = engine.process_samples(&mut detector, &samples, 48_000);
        assert!((output.pitch_hz.unwrap() - 250.0).abs() < 3.0);
    }
}
