// Autocorrelation pitch search
//
// Time-domain pitch estimation shared by the frame analyzer and the
// autocorrelation detector.
//
// Algorithm:
// 1. n[τ] = 2·r[τ]/m[τ] for τ in [1, max_lag + 1], where r[τ] = Σ x[i]·x[i+τ]
//    and m[τ] is the energy of the overlapping parts (updated incrementally)
// 2. Skip the positive lobe around τ = 0
// 3. Take the highest point of each later positive region (key maxima),
//    keeping those whose lag lies in [sr/max_hz, sr/min_hz]
// 4. Pick the first key maximum within KEY_MAXIMUM_RATIO of the highest
// 5. Fit a parabola through n at τ-1, τ, τ+1; reject pitches outside the range
// 6. pitch = sr / refined τ, clarity = n[τ]

/// Guards divisions on near-silent frames
const EPSILON: f32 = 1e-12;

/// Key maxima this close to the highest one count as the period
const KEY_MAXIMUM_RATIO: f32 = 0.9;

/// Pitch estimate from a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    pub pitch_hz: f32,
    /// Normalized correlation at the chosen lag (not a probability)
    pub clarity: f32,
}

/// Lag range derived from a pitch range and frame length
///
/// Owns its scratch, so `estimate` does not allocate.
#[derive(Debug, Clone)]
pub struct LagSearch {
    sample_rate: f32,
    min_hz: f32,
    max_hz: f32,
    min_lag: usize,
    max_lag: usize,
    /// n[τ] for τ in [0, max_lag + 1]
    nsdf: Vec<f32>,
    /// (lag, value) of each key maximum
    peaks: Vec<(usize, f32)>,
}

impl LagSearch {
    /// Build the lag range for `[min_hz, max_hz]` over frames of `frame_len`
    pub fn new(sample_rate: u32, min_hz: f32, max_hz: f32, frame_len: usize) -> Self {
        let sr = sample_rate as f32;
        let min_hz = min_hz.max(1.0);
        let max_hz = max_hz.max(min_hz);
        let min_lag = ((sr / max_hz).floor() as usize).max(2);
        let max_lag = ((sr / min_hz).ceil() as usize)
            .min(frame_len.saturating_sub(2))
            .max(min_lag + 1);

        Self {
            sample_rate: sr,
            min_hz,
            max_hz,
            min_lag,
            max_lag,
            nsdf: vec![0.0; max_lag + 2],
            peaks: Vec::with_capacity(max_lag / 2 + 2),
        }
    }

    pub fn min_lag(&self) -> usize {
        self.min_lag
    }

    pub fn max_lag(&self) -> usize {
        self.max_lag
    }

    /// Estimate pitch from a DC-free frame
    ///
    /// # Returns
    /// `None` when the frame has no energy, is shorter than the lag range,
    /// shows no periodicity inside the lag range, or refines to a pitch
    /// outside `[min_hz, max_hz]`.
    pub fn estimate(&mut self, frame: &[f32]) -> Option<PitchEstimate> {
        let n = frame.len();
        let last = self.max_lag + 1;
        if n < last + 1 {
            return None;
        }

        let r0 = correlation(frame, 0);
        if r0 < EPSILON {
            return None;
        }

        // m[τ] = m[τ-1] - x[τ-1]² - x[n-τ]²
        let mut m = 2.0 * r0;
        self.nsdf[0] = 1.0;
        for lag in 1..=last {
            let head = frame[lag - 1];
            let tail = frame[n - lag];
            m -= head * head + tail * tail;
            self.nsdf[lag] = if m > EPSILON {
                2.0 * correlation(frame, lag) / m
            } else {
                0.0
            };
        }

        let mut lag = 1;
        while lag <= self.max_lag && self.nsdf[lag] > 0.0 {
            lag += 1;
        }

        self.peaks.clear();
        let mut region: Option<(usize, f32)> = None;
        while lag <= self.max_lag {
            let value = self.nsdf[lag];
            if value > 0.0 {
                if region.map_or(true, |(_, best)| value > best) {
                    region = Some((lag, value));
                }
            } else if let Some(peak) = region.take() {
                self.peaks.push(peak);
            }
            lag += 1;
        }
        // A region still climbing at max_lag peaks below min_hz
        if let Some(peak) = region {
            if peak.0 < self.max_lag || self.nsdf[last] <= peak.1 {
                self.peaks.push(peak);
            }
        }

        let min_lag = self.min_lag;
        let highest = self
            .peaks
            .iter()
            .filter(|(lag, _)| *lag >= min_lag)
            .fold(0.0_f32, |acc, (_, value)| acc.max(*value));
        if highest <= 0.0 {
            return None;
        }

        let (peak, peak_value) = self
            .peaks
            .iter()
            .copied()
            .find(|&(lag, value)| lag >= min_lag && value >= KEY_MAXIMUM_RATIO * highest)?;

        let shift = parabolic_offset(self.nsdf[peak - 1], peak_value, self.nsdf[peak + 1]);
        let pitch_hz = self.sample_rate / (peak as f32 + shift);
        if pitch_hz < self.min_hz || pitch_hz > self.max_hz {
            return None;
        }

        Some(PitchEstimate {
            pitch_hz,
            clarity: peak_value.clamp(0.0, 1.0),
        })
    }
}

/// Time-domain autocorrelation sum at `lag`
pub fn correlation(frame: &[f32], lag: usize) -> f32 {
    if lag >= frame.len() {
        return 0.0;
    }
    frame[..frame.len() - lag]
        .iter()
        .zip(&frame[lag..])
        .map(|(a, b)| a * b)
        .sum()
}

/// Normalized square difference 2·r[τ] / (Σx[i]² + Σx[i+τ]²) over the overlap
pub fn normalized_correlation(frame: &[f32], lag: usize) -> f32 {
    if lag >= frame.len() {
        return 0.0;
    }
    let head = &frame[..frame.len() - lag];
    let tail = &frame[lag..];
    let mut r = 0.0_f32;
    let mut m = 0.0_f32;
    for (a, b) in head.iter().zip(tail) {
        r += a * b;
        m += a * a + b * b;
    }
    if m < EPSILON {
        0.0
    } else {
        2.0 * r / m
    }
}

/// Vertex offset of the parabola through three equally spaced points
///
/// Returns a value in [-0.5, 0.5]; 0 for a degenerate (flat) triple.
pub fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denom = left - 2.0 * center + right;
    if denom.abs() < EPSILON {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_lag_range_from_pitch_range() {
        let search = LagSearch::new(48_000, 60.0, 1000.0, 2048);
        assert_eq!(search.min_lag(), 48);
        assert_eq!(search.max_lag(), 800);
    }

    #[test]
    fn test_lag_range_clamped_to_frame() {
        let search = LagSearch::new(48_000, 20.0, 1000.0, 1024);
        assert_eq!(search.max_lag(), 1022);
    }

    #[test]
    fn test_sine_pitch_within_one_percent() {
        let mut search = LagSearch::new(48_000, 60.0, 1000.0, 2048);
        for freq in [62.0, 70.0, 80.0, 90.0, 100.0, 110.0, 196.0, 220.0, 330.0, 440.0, 900.0] {
            let estimate = search.estimate(&sine(freq, 48_000, 2048)).unwrap();
            let error = (estimate.pitch_hz - freq).abs() / freq;
            assert!(
                error < 0.01,
                "{} Hz estimated as {} Hz",
                freq,
                estimate.pitch_hz
            );
            assert!(estimate.clarity > 0.6, "clarity {}", estimate.clarity);
        }
    }

    #[test]
    fn test_tone_below_range_has_no_estimate() {
        // 40 Hz period is 1200 lags, past the 800-lag limit
        let mut search = LagSearch::new(48_000, 60.0, 1000.0, 2048);
        assert_eq!(search.estimate(&sine(40.0, 48_000, 2048)), None);
    }

    #[test]
    fn test_estimates_stay_inside_range() {
        let mut search = LagSearch::new(48_000, 60.0, 1000.0, 2048);
        for freq in [45.0, 55.0, 61.0, 105.0, 500.0, 990.0, 1200.0, 2500.0] {
            if let Some(estimate) = search.estimate(&sine(freq, 48_000, 2048)) {
                assert!(
                    (60.0..=1000.0).contains(&estimate.pitch_hz),
                    "{} Hz estimated as {} Hz",
                    freq,
                    estimate.pitch_hz
                );
            }
        }
    }

    #[test]
    fn test_silence_has_no_estimate() {
        let mut search = LagSearch::new(48_000, 60.0, 1000.0, 2048);
        assert_eq!(search.estimate(&[0.0; 2048]), None);
    }

    #[test]
    fn test_short_frame_has_no_estimate() {
        let mut search = LagSearch::new(48_000, 60.0, 1000.0, 2048);
        assert_eq!(search.estimate(&sine(220.0, 48_000, 256)), None);
    }

    #[test]
    fn test_parabolic_offset() {
        assert_eq!(parabolic_offset(1.0, 2.0, 1.0), 0.0);
        // Peak of y = -(x - 0.25)^2 sampled at -1, 0, 1
        let f = |x: f32| -(x - 0.25) * (x - 0.25);
        assert!((parabolic_offset(f(-1.0), f(0.0), f(1.0)) - 0.25).abs() < 1e-6);
        assert_eq!(parabolic_offset(1.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_normalized_correlation_peaks_at_period() {
        // 100 samples per period
        let signal = sine(480.0, 48_000, 2048);
        assert!((normalized_correlation(&signal, 100) - 1.0).abs() < 1e-3);
        assert!(normalized_correlation(&signal, 50) < -0.99);
        assert_eq!(normalized_correlation(&[0.0; 16], 4), 0.0);
    }

    #[test]
    fn test_correlation_lag_zero_is_energy() {
        assert_eq!(correlation(&[1.0, 2.0, 3.0], 0), 14.0);
        assert_eq!(correlation(&[1.0, 2.0, 3.0], 1), 8.0);
        assert_eq!(correlation(&[1.0, 2.0, 3.0], 5), 0.0);
    }
}
