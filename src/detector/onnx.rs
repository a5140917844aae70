//! ONNX model backend for the neural detector (tract, pure Rust).
//!
//! Compiled only with the `onnx` feature. Any failure while loading the model
//! is returned as a [`DetectorError`] so the selector can fall back.

use std::path::Path;

use tract_onnx::prelude::*;

use super::neural::InferenceBackend;
use crate::error::DetectorError;

type TractPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Runnable ONNX model taking `[1, input_len]` f32 audio
pub struct TractBackend {
    plan: TractPlan,
    input_len: usize,
}

impl TractBackend {
    /// Load, optimize and plan the model at `path`
    pub fn load<P: AsRef<Path>>(path: P, input_len: usize) -> Result<Self, DetectorError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DetectorError::ModelNotFound {
                path: path.display().to_string(),
            });
        }

        let load_err = |e: TractError| DetectorError::ModelLoad {
            reason: e.to_string(),
        };

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(load_err)?
            .with_input_fact(0, f32::fact([1, input_len]).into())
            .map_err(load_err)?
            .into_optimized()
            .map_err(load_err)?
            .into_runnable()
            .map_err(load_err)?;

        log::info!(
            "[TractBackend] Loaded {} (input_len={})",
            path.display(),
            input_len
        );

        Ok(Self { plan, input_len })
    }
}

impl InferenceBackend for TractBackend {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>, DetectorError> {
        let infer_err = |e: TractError| DetectorError::Inference {
            reason: e.to_string(),
        };

        let tensor = Tensor::from_shape(&[1, input.len()], input).map_err(infer_err)?;
        let outputs = self.plan.run(tvec!(tensor.into())).map_err(infer_err)?;

        let first = outputs.first().ok_or_else(|| DetectorError::InvalidOutput {
            expected: "one output tensor".to_string(),
            got: "none".to_string(),
        })?;
        let view = first.to_array_view::<f32>().map_err(infer_err)?;
        Ok(view.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_not_found() {
        let result = TractBackend::load("/nonexistent/pitch.onnx", 1024);
        assert!(matches!(result, Err(DetectorError::ModelNotFound { .. })));
    }
}
