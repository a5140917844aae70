// Pitch detector error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Detector error code constants
///
/// Error code range: 4001-4005
pub struct DetectorErrorCodes {}

impl DetectorErrorCodes {
    /// Runtime capability required by the detector is missing
    pub const CAPABILITY_MISSING: i32 = 4001;

    /// Model file does not exist
    pub const MODEL_NOT_FOUND: i32 = 4002;

    /// Model could not be parsed, optimized or made runnable
    pub const MODEL_LOAD: i32 = 4003;

    /// Inference call failed
    pub const INFERENCE: i32 = 4004;

    /// Model produced an output of unexpected shape
    pub const INVALID_OUTPUT: i32 = 4005;
}

/// Log a detector error with structured context
///
/// Detector failures are recoverable (the selector falls back to the
/// autocorrelation detector), so they are logged at warn level.
pub fn log_detector_error(err: &DetectorError, context: &str) {
    warn!(
        "Detector error in {}: code={}, component=PitchDetector, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Pitch detector errors
///
/// Construction-time variants route the selector to the fallback detector.
/// `Inference` and `InvalidOutput` are absorbed per frame and never escape
/// `process_frame`.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorError {
    /// Capability probe reported a missing prerequisite
    CapabilityMissing { capability: String },

    /// Model file not found
    ModelNotFound { path: String },

    /// Model load/optimization failure
    ModelLoad { reason: String },

    /// Inference failure
    Inference { reason: String },

    /// Output tensor has an unexpected shape
    InvalidOutput { expected: String, got: String },
}

impl ErrorCode for DetectorError {
    fn code(&self) -> i32 {
        match self {
            DetectorError::CapabilityMissing { .. } => DetectorErrorCodes::CAPABILITY_MISSING,
            DetectorError::ModelNotFound { .. } => DetectorErrorCodes::MODEL_NOT_FOUND,
            DetectorError::ModelLoad { .. } => DetectorErrorCodes::MODEL_LOAD,
            DetectorError::Inference { .. } => DetectorErrorCodes::INFERENCE,
            DetectorError::InvalidOutput { .. } => DetectorErrorCodes::INVALID_OUTPUT,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectorError::CapabilityMissing { capability } => {
                format!("Missing runtime capability: {}", capability)
            }
            DetectorError::ModelNotFound { path } => format!("Model not found: {}", path),
            DetectorError::ModelLoad { reason } => format!("Failed to load model: {}", reason),
            DetectorError::Inference { reason } => format!("Inference failed: {}", reason),
            DetectorError::InvalidOutput { expected, got } => {
                format!("Invalid model output: expected {}, got {}", expected, got)
            }
        }
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DetectorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DetectorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_error_codes() {
        assert_eq!(
            DetectorError::CapabilityMissing {
                capability: "wasm_simd".to_string()
            }
            .code(),
            DetectorErrorCodes::CAPABILITY_MISSING
        );
        assert_eq!(
            DetectorError::ModelNotFound {
                path: "a.onnx".to_string()
            }
            .code(),
            DetectorErrorCodes::MODEL_NOT_FOUND
        );
        assert_eq!(
            DetectorError::ModelLoad {
                reason: "bad".to_string()
            }
            .code(),
            DetectorErrorCodes::MODEL_LOAD
        );
        assert_eq!(
            DetectorError::Inference {
                reason: "bad".to_string()
            }
            .code(),
            DetectorErrorCodes::INFERENCE
        );
        assert_eq!(
            DetectorError::InvalidOutput {
                expected: "[1, 360]".to_string(),
                got: "[1, 12]".to_string()
            }
            .code(),
            DetectorErrorCodes::INVALID_OUTPUT
        );
    }

    #[test]
    fn test_detector_error_display() {
        let err = DetectorError::ModelNotFound {
            path: "models/pitch.onnx".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("4002"));
        assert!(display.contains("models/pitch.onnx"));
    }
}
