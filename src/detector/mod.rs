//! Pitch detector abstraction and capability-gated selection.
//!
//! Two interchangeable estimators sit behind [`PitchDetector`]:
//! - [`NeuralDetector`]: model inference over a log-spaced pitch axis
//! - [`AutocorrelationDetector`]: time-domain fallback with no model
//!
//! Downstream code only ever sees [`PitchDetectorOutput`], so swapping the
//! detector at runtime is invisible to the engine.

use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::error::DetectorError;

pub mod autocorr;
pub mod neural;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod selector;

pub use autocorr::AutocorrelationDetector;
pub use neural::{InferenceBackend, NeuralDetector};
#[cfg(feature = "onnx")]
pub use onnx::TractBackend;
pub use selector::{Capabilities, DetectorSelector, Selection, SelectionReason};

/// Minimal per-frame result every detector produces
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PitchDetectorOutput {
    /// `None` when the frame is unvoiced
    pub pitch_hz: Option<f32>,
    /// Detector confidence in [0, 1]
    pub confidence: f32,
}

impl PitchDetectorOutput {
    pub fn unvoiced() -> Self {
        Self::default()
    }

    pub fn voiced(pitch_hz: f32, confidence: f32) -> Self {
        Self {
            pitch_hz: Some(pitch_hz),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn is_voiced(&self) -> bool {
        self.pitch_hz.is_some()
    }
}

/// Which estimator produced the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Neural,
    Autocorrelation,
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorKind::Neural => write!(f, "neural"),
            DetectorKind::Autocorrelation => write!(f, "autocorrelation"),
        }
    }
}

/// Common contract for pitch estimators
///
/// `process_frame` must not fail: numerical trouble or a failed inference
/// call degrades to [`PitchDetectorOutput::unvoiced`].
pub trait PitchDetector: Send {
    /// Prepare internal state; errors here trigger the fallback path
    fn initialize(&mut self, config: &DetectorConfig) -> Result<(), DetectorError>;

    /// Drop any per-stream state
    fn reset(&mut self);

    fn process_frame(&mut self, samples: &[f32], sample_rate: u32) -> PitchDetectorOutput;

    fn kind(&self) -> DetectorKind;
}

impl<T: PitchDetector + ?Sized> PitchDetector for Box<T> {
    fn initialize(&mut self, config: &DetectorConfig) -> Result<(), DetectorError> {
        (**self).initialize(config)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn process_frame(&mut self, samples: &[f32], sample_rate: u32) -> PitchDetectorOutput {
        (**self).process_frame(samples, sample_rate)
    }

    fn kind(&self) -> DetectorKind {
        (**self).kind()
    }
}
