// Neural pitch detector
//
// Preprocessing and decoding live here; the model call itself goes through
// `InferenceBackend`, so the decoding logic is testable without a model file.
//
// Per frame:
// 1. Linear-resample to the model rate
// 2. Pad (zeros at the front) or keep the newest `input_len` samples
// 3. Peak-normalize
// 4. Infer logits over `bins` log-spaced pitch bins
// 5. Softmax, arg-max, bin → Hz on a log axis
// 6. Gate: confidence below `confidence_gate` reports no pitch

use log::{debug, info};

use super::{DetectorKind, PitchDetector, PitchDetectorOutput};
use crate::audio::resample::resample_linear_into;
use crate::config::DetectorConfig;
use crate::error::DetectorError;

/// Model execution seam
pub trait InferenceBackend: Send {
    /// Samples the model expects per call
    fn input_len(&self) -> usize;

    /// Run the model on exactly `input_len` samples, returning per-bin logits
    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>, DetectorError>;
}

pub struct NeuralDetector<B: InferenceBackend> {
    backend: B,
    config: DetectorConfig,
    initialized: bool,
    resampled: Vec<f32>,
    input: Vec<f32>,
}

impl<B: InferenceBackend> NeuralDetector<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: DetectorConfig::default(),
            initialized: false,
            resampled: Vec::new(),
            input: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Center frequency of output bin `index` on the log-spaced axis
    pub fn bin_to_hz(&self, index: usize) -> f32 {
        let bins = self.config.bins.max(2);
        let position = index.min(bins - 1) as f32 / (bins - 1) as f32;
        let ratio = self.config.bin_max_hz / self.config.bin_min_hz;
        self.config.bin_min_hz * ratio.powf(position)
    }

    /// Fill `self.input` with the model-rate window
    ///
    /// Returns `false` for silent input.
    fn prepare(&mut self, samples: &[f32], sample_rate: u32) -> bool {
        let input_len = self.backend.input_len();
        resample_linear_into(
            samples,
            sample_rate,
            self.config.model_sample_rate,
            &mut self.resampled,
        );

        self.input.clear();
        self.input.resize(input_len, 0.0);
        let take = self.resampled.len().min(input_len);
        let src = &self.resampled[self.resampled.len() - take..];
        self.input[input_len - take..].copy_from_slice(src);

        let peak = self.input.iter().fold(0.0_f32, |acc, x| acc.max(x.abs()));
        if peak < 1e-6 {
            return false;
        }
        for x in &mut self.input {
            *x /= peak;
        }
        true
    }

    fn decode(&self, logits: &[f32]) -> PitchDetectorOutput {
        let probs = softmax(logits);
        let Some((best, &confidence)) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
        else {
            return PitchDetectorOutput::unvoiced();
        };

        if confidence < self.config.confidence_gate {
            return PitchDetectorOutput {
                pitch_hz: None,
                confidence,
            };
        }
        PitchDetectorOutput::voiced(self.bin_to_hz(best), confidence)
    }
}

impl<B: InferenceBackend> PitchDetector for NeuralDetector<B> {
    fn initialize(&mut self, config: &DetectorConfig) -> Result<(), DetectorError> {
        if self.backend.input_len() == 0 {
            return Err(DetectorError::ModelLoad {
                reason: "model declares an empty input".to_string(),
            });
        }
        if config.bins < 2 {
            return Err(DetectorError::InvalidOutput {
                expected: "at least 2 bins".to_string(),
                got: config.bins.to_string(),
            });
        }

        self.config = config.clone();
        self.resampled.reserve(self.backend.input_len() * 4);
        self.input.reserve(self.backend.input_len());
        self.initialized = true;

        info!(
            "[NeuralDetector] Ready: input_len={} bins={} range={}..{} Hz",
            self.backend.input_len(),
            config.bins,
            config.bin_min_hz,
            config.bin_max_hz
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.resampled.clear();
        self.input.clear();
    }

    fn process_frame(&mut self, samples: &[f32], sample_rate: u32) -> PitchDetectorOutput {
        if !self.initialized || !self.prepare(samples, sample_rate) {
            return PitchDetectorOutput::unvoiced();
        }

        match self.backend.infer(&self.input) {
            Ok(logits) if logits.len() == self.config.bins => self.decode(&logits),
            Ok(logits) => {
                debug!(
                    "[NeuralDetector] Expected {} logits, got {}",
                    self.config.bins,
                    logits.len()
                );
                PitchDetectorOutput::unvoiced()
            }
            Err(err) => {
                debug!("[NeuralDetector] Inference failed: {}", err);
                PitchDetectorOutput::unvoiced()
            }
        }
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Neural
    }
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
