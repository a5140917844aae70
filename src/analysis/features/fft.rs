// FFT module - Fast Fourier Transform computation
//
// This module handles FFT computation with proper windowing to reduce
// spectral leakage. The plan and all buffers are created up front so that
// `process` can run on the audio thread without allocating.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// FFT processor that computes magnitude spectra from audio windows
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    /// Hann window for FFT (pre-computed)
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `fft_size` - FFT window size (power of two)
    ///
    /// # Panics
    /// Panics if `fft_size` is not a power of two
    pub fn new(fft_size: usize) -> Self {
        assert!(
            fft_size.is_power_of_two() && fft_size >= 2,
            "fft_size must be a power of two"
        );

        let window = hann_window(fft_size);
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft,
            fft_size,
            window,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Compute the magnitude spectrum of a Hann-windowed frame
    ///
    /// Writes bins `[0, fft_size / 2)` into `magnitudes`. Input shorter than
    /// the FFT size is zero-padded; longer input is truncated.
    ///
    /// # Panics
    /// Panics if `magnitudes.len() != fft_size / 2`
    pub fn compute_magnitude_spectrum(&mut self, audio: &[f32], magnitudes: &mut [f32]) {
        assert_eq!(magnitudes.len(), self.fft_size / 2);

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = audio.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (mag, bin) in magnitudes.iter_mut().zip(self.buffer.iter()) {
            *mag = bin.norm();
        }
    }
}

/// Symmetric Hann window of length `len`
pub fn hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| {
            0.5 * (1.0 - ((2.0 * std::f32::consts::PI * i as f32) / (len as f32 - 1.0)).cos())
        })
        .collect()
}
