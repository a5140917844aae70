// BrightnessAnalyzer - overlapping-window spectral centroid
//
// Runs beside the frame analyzer at a coarser cadence. The window is small,
// so the spectrum comes from a direct DFT over precomputed twiddle tables
// rather than an FFT plan. The centroid is mapped linearly onto [0, 1]
// against a speech centroid range and clipped at both ends.
//
// There is no RMS gate: silence produces brightness 0, never a missing value.

use crate::analysis::features::hann_window;
use crate::config::BrightnessConfig;
use serde::{Deserialize, Serialize};

/// One brightness measurement
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BrightnessReading {
    /// Centroid normalized into [0, 1]
    pub brightness: f32,
    /// Raw magnitude-weighted centroid; 0 for silence
    pub centroid_hz: f32,
}

pub struct BrightnessAnalyzer {
    sample_rate: f32,
    window_len: usize,
    /// New samples between emissions
    stride: usize,
    min_centroid_hz: f32,
    max_centroid_hz: f32,

    history: Vec<f32>,
    write_pos: usize,
    seen: u64,

    window: Vec<f32>,
    cos_table: Vec<f32>,
    sin_table: Vec<f32>,
    frame: Vec<f32>,
}

impl BrightnessAnalyzer {
    pub fn new(sample_rate: u32, config: &BrightnessConfig) -> Self {
        let window_len = config.window.max(2);
        let stride = ((window_len as f32 * (1.0 - config.overlap)).round() as usize).max(1);

        let step = 2.0 * std::f32::consts::PI / window_len as f32;
        let cos_table = (0..window_len).map(|i| (step * i as f32).cos()).collect();
        let sin_table = (0..window_len).map(|i| (step * i as f32).sin()).collect();

        Self {
            sample_rate: sample_rate as f32,
            window_len,
            stride,
            min_centroid_hz: config.min_centroid_hz,
            max_centroid_hz: config.max_centroid_hz,
            history: vec![0.0; window_len],
            write_pos: 0,
            seen: 0,
            window: hann_window(window_len),
            cos_table,
            sin_table,
            frame: vec![0.0; window_len],
        }
    }

    /// Samples between successive readings
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Append samples, emitting a reading every `stride` samples once the
    /// first full window has arrived
    pub fn process_block<F>(&mut self, input: &[f32], mut emit: F)
    where
        F: FnMut(BrightnessReading),
    {
        let window_len = self.window_len as u64;
        for &sample in input {
            self.history[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.window_len;
            self.seen += 1;

            if self.seen >= window_len && (self.seen - window_len) % self.stride as u64 == 0 {
                emit(self.measure());
            }
        }
    }

    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.write_pos = 0;
        self.seen = 0;
    }

    /// Map a centroid onto [0, 1]
    pub fn normalize(&self, centroid_hz: f32) -> f32 {
        let span = self.max_centroid_hz - self.min_centroid_hz;
        if span <= 0.0 {
            return 0.0;
        }
        ((centroid_hz - self.min_centroid_hz) / span).clamp(0.0, 1.0)
    }

    fn measure(&mut self) -> BrightnessReading {
        // Oldest sample sits at write_pos once the history is full
        let n = self.window_len;
        for i in 0..n {
            self.frame[i] = self.history[(self.write_pos + i) % n] * self.window[i];
        }

        let bin_hz = self.sample_rate / n as f32;
        let mut weighted = 0.0_f32;
        let mut total = 0.0_f32;
        for k in 0..n / 2 {
            let mut re = 0.0_f32;
            let mut im = 0.0_f32;
            for (i, &x) in self.frame.iter().enumerate() {
                let idx = (k * i) % n;
                re += x * self.cos_table[idx];
                im -= x * self.sin_table[idx];
            }
            let magnitude = (re * re + im * im).sqrt();
            weighted += k as f32 * bin_hz * magnitude;
            total += magnitude;
        }

        if total < 1e-9 {
            return BrightnessReading::default();
        }

        let centroid_hz = weighted / total;
        BrightnessReading {
            brightness: self.normalize(centroid_hz),
            centroid_hz,
        }
    }
}
