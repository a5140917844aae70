// Expressiveness statistic over a cents series
//
// spread = 0.6·stdev + 0.4·(IQR / 1.349), where IQR / 1.349 is the robust
// stdev estimate for a normal distribution. The score is spread divided by
// `ref_spread_cents`, clamped to [0, 1], then reduced linearly by up to 50%
// when fewer than `min_samples` values are available.

use serde::{Deserialize, Serialize};

use super::classifier::ProsodyFrame;
use super::stats;
use crate::config::ExpressivenessConfig;

const STDEV_WEIGHT: f32 = 0.6;
const IQR_WEIGHT: f32 = 0.4;
/// IQR of a unit normal
const IQR_TO_SIGMA: f32 = 1.349;
const MAX_SAMPLE_PENALTY: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpressivenessResult {
    pub stdev_cents: f32,
    pub iqr_cents: f32,
    pub range_cents: f32,
    pub score01: f32,
    pub voiced_ms: f64,
    pub sample_count: usize,
}

/// Score a cents series; pure, no state
pub fn score_expressiveness(
    cents: &[f32],
    voiced_ms: f64,
    config: &ExpressivenessConfig,
) -> ExpressivenessResult {
    let sample_count = cents.len();
    if sample_count < 2 {
        return ExpressivenessResult {
            voiced_ms,
            sample_count,
            ..ExpressivenessResult::default()
        };
    }

    let center = stats::mean(cents).unwrap_or(0.0);
    let detrended: Vec<f32> = cents.iter().map(|c| c - center).collect();

    let stdev_cents = stats::sample_stdev(&detrended);
    let iqr_cents = stats::iqr(&detrended);
    let (min, max) = detrended
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &c| {
            (lo.min(c), hi.max(c))
        });
    let range_cents = max - min;

    let spread = STDEV_WEIGHT * stdev_cents + IQR_WEIGHT * (iqr_cents / IQR_TO_SIGMA);
    let mut score01 = (spread / config.ref_spread_cents).clamp(0.0, 1.0);

    if sample_count < config.min_samples {
        let shortfall = 1.0 - sample_count as f32 / config.min_samples as f32;
        score01 *= 1.0 - MAX_SAMPLE_PENALTY * shortfall;
    }

    ExpressivenessResult {
        stdev_cents,
        iqr_cents,
        range_cents,
        score01,
        voiced_ms,
        sample_count,
    }
}

/// Voiced frames as cents relative to their median F0
///
/// Returns the series and the reference Hz (0 when nothing is voiced).
pub fn cents_series(frames: &[ProsodyFrame]) -> (Vec<f32>, f32) {
    let voiced: Vec<f32> = frames.iter().filter_map(ProsodyFrame::voiced_hz).collect();
    let Some(ref_hz) = stats::median(&voiced) else {
        return (Vec::new(), 0.0);
    };
    let cents = voiced.iter().map(|&hz| 1200.0 * (hz / ref_hz).log2()).collect();
    (cents, ref_hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExpressivenessConfig {
        ExpressivenessConfig::default()
    }

    #[test]
    fn test_empty_and_single_score_zero() {
        assert_eq!(score_expressiveness(&[], 0.0, &config()).score01, 0.0);
        let single = score_expressiveness(&[150.0], 20.0, &config());
        assert_eq!(single.score01, 0.0);
        assert_eq!(single.sample_count, 1);
        assert_eq!(single.voiced_ms, 20.0);
    }

    #[test]
    fn test_constant_series_scores_zero() {
        let result = score_expressiveness(&[42.0; 20], 400.0, &config());
        assert!(result.score01.abs() < 1e-6);
        assert_eq!(result.range_cents, 0.0);
    }

    #[test]
    fn test_reference_scenario() {
        let result = score_expressiveness(&[-200.0, -100.0, 0.0, 100.0, 200.0], 1000.0, &config());
        assert_eq!(result.range_cents, 400.0);
        assert_eq!(result.sample_count, 5);
        assert_eq!(result.iqr_cents, 200.0);
        assert!((result.stdev_cents - 158.113_88).abs() < 1e-3);
        assert!(result.score01 > 0.0 && result.score01 <= 1.0);
        // spread 154.17 / 300, then a 25% penalty for 5 of 10 samples
        assert!((result.score01 - 0.3854).abs() < 1e-3);
    }

    #[test]
    fn test_doubling_spread_increases_score() {
        let base: Vec<f32> = (-5..=5).map(|i| i as f32 * 10.0).collect();
        let doubled: Vec<f32> = base.iter().map(|c| c * 2.0).collect();
        let a = score_expressiveness(&base, 500.0, &config());
        let b = score_expressiveness(&doubled, 500.0, &config());
        assert!(b.score01 > a.score01);
    }

    #[test]
    fn test_larger_reference_lowers_score() {
        let series: Vec<f32> = (-5..=5).map(|i| i as f32 * 20.0).collect();
        let narrow = score_expressiveness(&series, 500.0, &config());
        let wide = score_expressiveness(
            &series,
            500.0,
            &ExpressivenessConfig {
                ref_spread_cents: 600.0,
                ..config()
            },
        );
        assert!(wide.score01 < narrow.score01);
    }

    #[test]
    fn test_offset_does_not_change_score() {
        let series = [-50.0, 0.0, 25.0, 80.0, -10.0, 30.0, 5.0, -40.0, 60.0, 15.0];
        let shifted: Vec<f32> = series.iter().map(|c| c + 500.0).collect();
        let a = score_expressiveness(&series, 200.0, &config());
        let b = score_expressiveness(&shifted, 200.0, &config());
        assert!((a.score01 - b.score01).abs() < 1e-4);
    }

    #[test]
    fn test_cents_series_relative_to_median() {
        let frames = [
            ProsodyFrame::new(0.0, Some(200.0)),
            ProsodyFrame::new(10.0, None),
            ProsodyFrame::new(20.0, Some(400.0)),
            ProsodyFrame::new(30.0, Some(100.0)),
        ];
        let (cents, ref_hz) = cents_series(&frames);
        assert_eq!(ref_hz, 200.0);
        assert_eq!(cents, vec![0.0, 1200.0, -1200.0]);
        assert_eq!(cents_series(&[]), (Vec::new(), 0.0));
    }
}
