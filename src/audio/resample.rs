// Linear resampling
//
// Detectors and the engine work at a model rate (16 kHz for the neural
// path) while capture runs at the device rate. Linear interpolation is
// enough here: the consumers look at F0, far below either Nyquist.

/// Output length for `len` input samples converted between two rates
pub fn resampled_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 || to_rate == 0 {
        return 0;
    }
    ((len as u64 * to_rate as u64 + from_rate as u64 / 2) / from_rate as u64) as usize
}

/// Resample into a fresh vector
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let mut out = Vec::new();
    resample_linear_into(input, from_rate, to_rate, &mut out);
    out
}

/// Resample into `out`, reusing its allocation
///
/// Equal rates copy the input unchanged.
pub fn resample_linear_into(input: &[f32], from_rate: u32, to_rate: u32, out: &mut Vec<f32>) {
    out.clear();
    if input.is_empty() || from_rate == 0 || to_rate == 0 {
        return;
    }
    if from_rate == to_rate {
        out.extend_from_slice(input);
        return;
    }

    let len = resampled_len(input.len(), from_rate, to_rate);
    let step = from_rate as f64 / to_rate as f64;
    let last = input.len() - 1;

    out.extend((0..len).map(|i| {
        let pos = i as f64 * step;
        let idx = (pos.floor() as usize).min(last);
        let frac = (pos - idx as f64) as f32;
        let next = (idx + 1).min(last);
        input[idx] + (input[next] - input[idx]) * frac
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resampled_len() {
        assert_eq!(resampled_len(48_000, 48_000, 16_000), 16_000);
        assert_eq!(resampled_len(2048, 48_000, 16_000), 683);
        assert_eq!(resampled_len(10, 0, 16_000), 0);
    }

    #[test]
    fn test_equal_rates_copy() {
        let input = [0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&input, 16_000, 16_000), input.to_vec());
    }

    #[test]
    fn test_downsample_by_three_picks_every_third() {
        let input: Vec<f32> = (0..9).map(|i| i as f32).collect();
        assert_eq!(resample_linear(&input, 48_000, 16_000), vec![0.0, 3.0, 6.0]);
    }

    #[test]
    fn test_upsample_interpolates() {
        let out = resample_linear(&[0.0, 1.0], 8_000, 16_000);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_preserves_sine_frequency() {
        let freq = 220.0;
        let input: Vec<f32> = (0..4800)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / 48_000.0).sin())
            .collect();
        let out = resample_linear(&input, 48_000, 16_000);

        // Rising zero crossings over 0.3 s of a 220 Hz tone
        let crossings = out
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        assert!((65..=67).contains(&crossings), "{}", crossings);
    }
}
