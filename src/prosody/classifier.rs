// Windowed prosody classifier
//
// Works on the trailing `window_ms` of F0 frames:
// 1. Keep voiced frames; voiced duration = voiced count × median frame interval
// 2. Too little evidence → insufficient_voiced, label flat, slope 0
// 3. Reference = median voiced F0; convert to cents
// 4. Slope = OLS of cents against seconds
// 5. Optional EMA across successive calls (stateful classifier only)
// 6. slope ≥ rise → rising, slope ≤ fall → falling, else flat (bounds inclusive)

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::stats;
use crate::config::ProsodyConfig;

/// One timestamped F0 sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProsodyFrame {
    pub t_ms: f64,
    pub f0_hz: Option<f32>,
}

impl ProsodyFrame {
    pub fn new(t_ms: f64, f0_hz: Option<f32>) -> Self {
        Self { t_ms, f0_hz }
    }

    /// F0 when present, finite and positive
    pub fn voiced_hz(&self) -> Option<f32> {
        self.f0_hz.filter(|hz| hz.is_finite() && *hz > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProsodyLabel {
    Rising,
    Falling,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProsodyResult {
    pub label: ProsodyLabel,
    pub slope_cents_per_sec: f32,
    pub voiced_ms: f64,
    pub sample_count: usize,
    pub ref_hz: f32,
    pub insufficient_voiced: bool,
}

impl ProsodyResult {
    fn insufficient(voiced_ms: f64, sample_count: usize, ref_hz: f32) -> Self {
        Self {
            label: ProsodyLabel::Flat,
            slope_cents_per_sec: 0.0,
            voiced_ms,
            sample_count,
            ref_hz,
            insufficient_voiced: true,
        }
    }
}

/// Map a slope onto a label; threshold equality counts as directional
pub fn label_for_slope(slope: f32, config: &ProsodyConfig) -> ProsodyLabel {
    if slope >= config.rise_cents_per_sec {
        ProsodyLabel::Rising
    } else if slope <= config.fall_cents_per_sec {
        ProsodyLabel::Falling
    } else {
        ProsodyLabel::Flat
    }
}

/// Classify a window of frames (oldest first) without any smoothing state
///
/// Frames older than `window_ms` before the newest frame are ignored.
pub fn classify_window(frames: &[ProsodyFrame], config: &ProsodyConfig) -> ProsodyResult {
    let Some(newest) = frames.last() else {
        return ProsodyResult::insufficient(0.0, 0, 0.0);
    };
    let start = newest.t_ms - config.window_ms;
    let window: Vec<ProsodyFrame> = frames.iter().copied().filter(|f| f.t_ms >= start).collect();

    let voiced: Vec<(f64, f32)> = window
        .iter()
        .filter_map(|f| f.voiced_hz().map(|hz| (f.t_ms, hz)))
        .collect();
    let sample_count = voiced.len();
    let voiced_ms = sample_count as f64 * median_interval_ms(&window);

    let hz: Vec<f32> = voiced.iter().map(|&(_, hz)| hz).collect();
    let ref_hz = stats::median(&hz).unwrap_or(0.0);

    if voiced_ms < config.min_voiced_ms || sample_count < config.min_samples {
        return ProsodyResult::insufficient(voiced_ms, sample_count, ref_hz);
    }

    let t0 = voiced[0].0;
    let seconds: Vec<f64> = voiced.iter().map(|&(t, _)| (t - t0) / 1000.0).collect();
    let cents: Vec<f64> = voiced
        .iter()
        .map(|&(_, hz)| 1200.0 * (hz as f64 / ref_hz as f64).log2())
        .collect();
    let slope = stats::ols_slope(&seconds, &cents).unwrap_or(0.0) as f32;

    ProsodyResult {
        label: label_for_slope(slope, config),
        slope_cents_per_sec: slope,
        voiced_ms,
        sample_count,
        ref_hz,
        insufficient_voiced: false,
    }
}

/// Median spacing between consecutive frames; 0 with fewer than two frames
fn median_interval_ms(window: &[ProsodyFrame]) -> f64 {
    let mut gaps: Vec<f64> = window
        .windows(2)
        .map(|pair| pair[1].t_ms - pair[0].t_ms)
        .filter(|gap| *gap >= 0.0)
        .collect();
    if gaps.is_empty() {
        return 0.0;
    }
    gaps.sort_by(f64::total_cmp);
    let mid = gaps.len() / 2;
    if gaps.len() % 2 == 1 {
        gaps[mid]
    } else {
        0.5 * (gaps[mid - 1] + gaps[mid])
    }
}

/// Stateful classifier over a growing, time-trimmed window
pub struct ProsodyClassifier {
    config: ProsodyConfig,
    frames: VecDeque<ProsodyFrame>,
    smoothed_slope: Option<f32>,
}

impl ProsodyClassifier {
    pub fn new(config: ProsodyConfig) -> Self {
        Self {
            config,
            frames: VecDeque::new(),
            smoothed_slope: None,
        }
    }

    pub fn config(&self) -> &ProsodyConfig {
        &self.config
    }

    /// Append a frame and drop frames that fell out of the window
    pub fn push(&mut self, frame: ProsodyFrame) {
        self.frames.push_back(frame);
        let start = frame.t_ms - self.config.window_ms;
        while self.frames.front().is_some_and(|f| f.t_ms < start) {
            self.frames.pop_front();
        }
    }

    /// Classify the current window, smoothing the slope across calls
    pub fn classify(&mut self) -> ProsodyResult {
        let mut result = classify_window(self.frames.make_contiguous(), &self.config);

        if result.insufficient_voiced {
            self.smoothed_slope = None;
            return result;
        }

        let alpha = self.config.ema_alpha;
        let slope = match self.smoothed_slope {
            None => result.slope_cents_per_sec,
            Some(previous) => previous + alpha * (result.slope_cents_per_sec - previous),
        };
        self.smoothed_slope = Some(slope);

        result.slope_cents_per_sec = slope;
        result.label = label_for_slope(slope, &self.config);
        result
    }

    pub fn frames(&self) -> impl Iterator<Item = &ProsodyFrame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.smoothed_slope = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frames every 10 ms with F0 = base · 2^(cents_per_sec · t / 1200)
    fn glide(base_hz: f32, cents_per_sec: f32, count: usize) -> Vec<ProsodyFrame> {
        (0..count)
            .map(|i| {
                let t_ms = i as f64 * 10.0;
                let cents = cents_per_sec * (t_ms as f32 / 1000.0);
                ProsodyFrame::new(t_ms, Some(base_hz * (cents / 1200.0).exp2()))
            })
            .collect()
    }

    #[test]
    fn test_rising_glide_is_rising() {
        let result = classify_window(&glide(200.0, 400.0, 100), &ProsodyConfig::default());
        assert_eq!(result.label, ProsodyLabel::Rising);
        assert!((result.slope_cents_per_sec - 400.0).abs() < 1.0);
        assert!(!result.insufficient_voiced);
        assert_eq!(result.sample_count, 100);
        assert!((result.voiced_ms - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_falling_glide_is_falling() {
        let result = classify_window(&glide(300.0, -400.0, 100), &ProsodyConfig::default());
        assert_eq!(result.label, ProsodyLabel::Falling);
    }

    #[test]
    fn test_flat_series_is_flat() {
        let result = classify_window(&glide(220.0, 0.0, 100), &ProsodyConfig::default());
        assert_eq!(result.label, ProsodyLabel::Flat);
        assert!(result.slope_cents_per_sec.abs() < 1e-3);
        assert!((result.ref_hz - 220.0).abs() < 1e-3);
    }

    #[test]
    fn test_short_voicing_is_insufficient_regardless_of_slope() {
        // 20 frames × 10 ms = 200 ms < 300 ms
        let result = classify_window(&glide(200.0, 5000.0, 20), &ProsodyConfig::default());
        assert!(result.insufficient_voiced);
        assert_eq!(result.label, ProsodyLabel::Flat);
        assert_eq!(result.slope_cents_per_sec, 0.0);
    }

    #[test]
    fn test_too_few_samples_is_insufficient() {
        let config = ProsodyConfig {
            min_voiced_ms: 0.0,
            ..ProsodyConfig::default()
        };
        let result = classify_window(&glide(200.0, 5000.0, 5), &config);
        assert!(result.insufficient_voiced);
    }

    #[test]
    fn test_threshold_equality_is_directional() {
        let config = ProsodyConfig::default();
        assert_eq!(label_for_slope(150.0, &config), ProsodyLabel::Rising);
        assert_eq!(label_for_slope(-150.0, &config), ProsodyLabel::Falling);
        assert_eq!(label_for_slope(149.9, &config), ProsodyLabel::Flat);
    }

    #[test]
    fn test_unvoiced_frames_do_not_count() {
        let mut frames = glide(200.0, 400.0, 100);
        for frame in frames.iter_mut().step_by(2) {
            frame.f0_hz = None;
        }
        let result = classify_window(&frames, &ProsodyConfig::default());
        assert_eq!(result.sample_count, 50);
        assert!((result.voiced_ms - 500.0).abs() < 1e-6);
        assert_eq!(result.label, ProsodyLabel::Rising);
    }

    #[test]
    fn test_push_trims_to_window() {
        let mut classifier = ProsodyClassifier::new(ProsodyConfig::default());
        for frame in glide(200.0, 0.0, 300) {
            classifier.push(frame);
        }
        // Newest at 2990 ms, window 1500 ms → frames from 1490 ms
        assert_eq!(classifier.len(), 151);
        assert_eq!(classifier.frames().next().unwrap().t_ms, 1490.0);
    }

    #[test]
    fn test_ema_smooths_across_calls() {
        let config = ProsodyConfig::default();
        let mut classifier = ProsodyClassifier::new(config.clone());
        for frame in glide(200.0, 0.0, 100) {
            classifier.push(frame);
        }
        let flat = classifier.classify();
        assert_eq!(flat.label, ProsodyLabel::Flat);

        // Replace the window with a steep rise; the EMA only moves halfway
        classifier.reset();
        let mut fresh = ProsodyClassifier::new(config);
        for frame in glide(200.0, 600.0, 100) {
            classifier.push(frame);
            fresh.push(frame);
        }
        let raw = fresh.classify().slope_cents_per_sec;
        let smoothed = classifier.classify().slope_cents_per_sec;
        assert!((smoothed - raw).abs() < 1e-3, "reset clears the EMA");

        let again = classifier.classify().slope_cents_per_sec;
        assert!((again - raw).abs() < 1e-3);
    }

    #[test]
    fn test_ema_blends_successive_slopes() {
        let config = ProsodyConfig::default();
        let mut classifier = ProsodyClassifier::new(config);
        for frame in glide(200.0, 0.0, 100) {
            classifier.push(frame);
        }
        let first = classifier.classify().slope_cents_per_sec;

        // Extend with a rising tail: the raw slope jumps, the EMA lags
        let mut window: Vec<ProsodyFrame> = classifier.frames().copied().collect();
        for i in 100..150 {
            let t_ms = i as f64 * 10.0;
            let cents = 2000.0 * ((t_ms - 1000.0) as f32 / 1000.0);
            let frame = ProsodyFrame::new(t_ms, Some(200.0 * (cents / 1200.0).exp2()));
            classifier.push(frame);
            window.push(frame);
        }
        let raw = classify_window(&window, classifier.config()).slope_cents_per_sec;
        let smoothed = classifier.classify().slope_cents_per_sec;
        assert!((smoothed - (first + 0.5 * (raw - first))).abs() < 1e-2);
    }

    #[test]
    fn test_empty_window() {
        let result = classify_window(&[], &ProsodyConfig::default());
        assert!(result.insufficient_voiced);
        assert_eq!(result.voiced_ms, 0.0);
    }
}
