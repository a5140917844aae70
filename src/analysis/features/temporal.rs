// Temporal module - Time-domain frame measurements
//
// RMS drives the voicing gate; DC removal precedes both the FFT and the
// autocorrelation search.

/// Root-mean-square level of a frame
pub fn compute_rms(audio: &[f32]) -> f32 {
    if audio.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = audio.iter().map(|&x| x * x).sum();
    (sum_sq / audio.len() as f32).sqrt()
}

/// Copy `audio` into `out` with its mean removed; returns the mean
///
/// # Panics
/// Panics if the slices differ in length
pub fn remove_dc(audio: &[f32], out: &mut [f32]) -> f32 {
    assert_eq!(audio.len(), out.len());
    if audio.is_empty() {
        return 0.0;
    }
    let mean = audio.iter().sum::<f32>() / audio.len() as f32;
    for (dst, &src) in out.iter_mut().zip(audio) {
        *dst = src - mean;
    }
    mean
}
