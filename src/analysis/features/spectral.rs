// Spectral module - Frequency-domain feature extraction
//
// This module computes spectral features from magnitude spectra covering
// bins [0, N/2). Every descriptor returns `None` for a zero-energy spectrum
// instead of a sentinel frequency.
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

/// Spectral rolloff threshold (85% of spectral energy)
const ROLLOFF_THRESHOLD: f32 = 0.85;

/// Energy below which a spectrum counts as empty
const MIN_ENERGY: f32 = 1e-10;

/// Neighbourhood radius (bins) searched around each harmonic
const HARMONIC_SEARCH_RADIUS: usize = 1;

/// Spectral feature computation functions
pub struct SpectralFeatures {
    sample_rate: u32,
    fft_size: usize,
}

impl SpectralFeatures {
    /// Create a new spectral features processor
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fft_size` - FFT window size
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate,
            fft_size,
        }
    }

    fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    /// Compute spectral centroid (weighted mean frequency)
    ///
    /// Formula: centroid = Σ(f_i × |X[i]|) / Σ|X[i]|
    ///
    /// # Returns
    /// Spectral centroid in Hz, `None` for an empty spectrum
    pub fn compute_centroid(&self, spectrum: &[f32]) -> Option<f32> {
        let freq_bin_width = self.bin_width();

        let weighted_sum: f32 = spectrum
            .iter()
            .enumerate()
            .map(|(i, &mag)| i as f32 * freq_bin_width * mag)
            .sum();

        let magnitude_sum: f32 = spectrum.iter().sum();

        (magnitude_sum > MIN_ENERGY).then(|| weighted_sum / magnitude_sum)
    }

    /// Compute spectral rolloff (85% energy threshold frequency)
    ///
    /// Returns the frequency of the first bin at which cumulative squared
    /// magnitude reaches 85% of the total.
    pub fn compute_rolloff(&self, spectrum: &[f32]) -> Option<f32> {
        let total_energy: f32 = spectrum.iter().map(|&mag| mag * mag).sum();

        if total_energy < MIN_ENERGY {
            return None;
        }

        let threshold = ROLLOFF_THRESHOLD * total_energy;
        let freq_bin_width = self.bin_width();

        let mut cumulative_energy = 0.0;
        for (i, &mag) in spectrum.iter().enumerate() {
            cumulative_energy += mag * mag;
            if cumulative_energy >= threshold {
                return Some(i as f32 * freq_bin_width);
            }
        }

        // Rounding can leave the sum a hair short of the threshold
        Some((spectrum.len() - 1) as f32 * freq_bin_width)
    }

    /// Compute the first/second harmonic level difference in dB
    ///
    /// Each harmonic level is the maximum magnitude within ±1 bin of the
    /// bin nearest `k × f0`, which absorbs bin quantization.
    ///
    /// # Returns
    /// `H1dB - H2dB`, or `None` when the second harmonic is out of range
    pub fn compute_h1h2(&self, spectrum: &[f32], f0_hz: f32) -> Option<f32> {
        if !(f0_hz.is_finite() && f0_hz > 0.0) {
            return None;
        }
        let h1 = self.harmonic_magnitude(spectrum, f0_hz)?;
        let h2 = self.harmonic_magnitude(spectrum, 2.0 * f0_hz)?;
        Some(to_db(h1) - to_db(h2))
    }

    fn harmonic_magnitude(&self, spectrum: &[f32], freq_hz: f32) -> Option<f32> {
        let center = (freq_hz / self.bin_width()).round() as usize;
        if center >= spectrum.len() {
            return None;
        }
        let lo = center.saturating_sub(HARMONIC_SEARCH_RADIUS);
        let hi = (center + HARMONIC_SEARCH_RADIUS).min(spectrum.len() - 1);
        spectrum[lo..=hi].iter().copied().reduce(f32::max)
    }
}

fn to_db(magnitude: f32) -> f32 {
    20.0 * (magnitude + 1e-12).log10()
}
