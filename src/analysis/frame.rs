// FrameAnalyzer - per-hop DSP on the audio thread
//
// Incoming samples land in a circular buffer twice the analysis window. Every
// `hop` samples (a sample-count modulus, not a timer) the most recent
// `frame_size` samples are unwrapped and analysed:
//
// 1. RMS gate: below `voicing_rms` the hop is silent and nothing else runs
// 2. DC removal, Hann window, FFT magnitudes for bins [0, N/2)
// 3. Spectral centroid and 85% rolloff
// 4. Autocorrelation pitch with parabolic refinement
// 5. H1–H2 from the spectrum when a pitch was accepted
//
// All buffers are allocated in `new`; `process_block` never allocates.

use crate::analysis::autocorr::LagSearch;
use crate::analysis::features::{compute_rms, remove_dc, FftProcessor, SpectralFeatures};
use crate::config::AnalyzerConfig;
use crate::transport::TelemetryFrame;

/// Hop-driven frame analyzer producing one [`TelemetryFrame`] per hop
pub struct FrameAnalyzer {
    config: AnalyzerConfig,

    /// Circular history, 2 × frame_size
    history: Vec<f32>,
    write_pos: usize,
    since_hop: usize,
    hops: u64,

    // Scratch, sized once
    frame: Vec<f32>,
    centered: Vec<f32>,
    spectrum: Vec<f32>,

    fft: FftProcessor,
    spectral: SpectralFeatures,
    lag_search: LagSearch,
}

impl FrameAnalyzer {
    /// Create an analyzer for the given configuration
    ///
    /// # Panics
    /// Panics if `frame_size` is not a power of two (see [`FftProcessor::new`]).
    /// Run the configuration through `AppConfig::sanitized` first.
    pub fn new(config: &AnalyzerConfig) -> Self {
        let frame_size = config.frame_size;
        let hop = config.hop.clamp(1, frame_size);

        log::debug!(
            "[FrameAnalyzer] frame_size={} hop={} range={}..{} Hz",
            frame_size,
            hop,
            config.min_hz,
            config.max_hz
        );

        Self {
            config: AnalyzerConfig {
                hop,
                ..config.clone()
            },
            history: vec![0.0; frame_size * 2],
            write_pos: 0,
            since_hop: 0,
            hops: 0,
            frame: vec![0.0; frame_size],
            centered: vec![0.0; frame_size],
            spectrum: vec![0.0; frame_size / 2],
            fft: FftProcessor::new(frame_size),
            spectral: SpectralFeatures::new(config.sample_rate, frame_size),
            lag_search: LagSearch::new(config.sample_rate, config.min_hz, config.max_hz, frame_size),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Number of hops analysed since construction or the last reset
    pub fn hops(&self) -> u64 {
        self.hops
    }

    /// Append a block of mono samples, calling `emit` once per completed hop
    /// with the frame and the window it was computed from
    ///
    /// Safe for the audio callback: no allocation, no locking.
    pub fn process_block<F>(&mut self, input: &[f32], mut emit: F)
    where
        F: FnMut(TelemetryFrame, &[f32]),
    {
        let len = self.history.len();
        for &sample in input {
            self.history[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % len;
            self.since_hop += 1;

            if self.since_hop == self.config.hop {
                self.since_hop = 0;
                self.unwrap_latest();
                let frame = self.analyze_frame();
                emit(frame, &self.frame);
            }
        }
    }

    /// Analyse one window directly, bypassing the hop scheduler
    ///
    /// Shorter windows are zero-padded at the front; longer ones keep their
    /// most recent `frame_size` samples.
    pub fn analyze_window(&mut self, window: &[f32]) -> TelemetryFrame {
        let frame_size = self.frame.len();
        let take = window.len().min(frame_size);
        let pad = frame_size - take;
        self.frame[..pad].fill(0.0);
        self.frame[pad..].copy_from_slice(&window[window.len() - take..]);
        self.analyze_frame()
    }

    /// Clear history and hop phase
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.write_pos = 0;
        self.since_hop = 0;
        self.hops = 0;
    }

    /// Copy the newest `frame_size` samples out of the circular history
    fn unwrap_latest(&mut self) {
        let len = self.history.len();
        let frame_size = self.frame.len();
        let start = (self.write_pos + len - frame_size) % len;
        let first = (len - start).min(frame_size);
        self.frame[..first].copy_from_slice(&self.history[start..start + first]);
        self.frame[first..].copy_from_slice(&self.history[..frame_size - first]);
    }

    fn analyze_frame(&mut self) -> TelemetryFrame {
        self.hops += 1;

        let rms = compute_rms(&self.frame);
        if rms < self.config.voicing_rms {
            return TelemetryFrame::silent(rms);
        }

        remove_dc(&self.frame, &mut self.centered);
        self.fft
            .compute_magnitude_spectrum(&self.centered, &mut self.spectrum);

        let centroid_hz = self.spectral.compute_centroid(&self.spectrum);
        let rolloff_hz = self.spectral.compute_rolloff(&self.spectrum);

        let (pitch_hz, clarity, h1h2) = match self.lag_search.estimate(&self.centered) {
            Some(estimate) if estimate.clarity >= self.config.min_clarity => (
                Some(estimate.pitch_hz),
                estimate.clarity,
                self.spectral.compute_h1h2(&self.spectrum, estimate.pitch_hz),
            ),
            _ => (None, 0.0, None),
        };

        TelemetryFrame {
            pitch_hz,
            clarity,
            rms,
            centroid_hz,
            rolloff_hz,
            h1h2,
        }
    }
}
