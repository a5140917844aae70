// Detector selection - capability probe + neural/fallback routing
//
// The neural detector is attempted only when every capability holds. Any
// construction or initialization error routes to the autocorrelation
// detector. Both produce the same output type, so the switch is invisible
// downstream.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use super::{AutocorrelationDetector, DetectorKind, PitchDetector};
use crate::config::DetectorConfig;
use crate::error::{log_detector_error, DetectorError};
use crate::telemetry::TelemetryCollector;

/// Host capabilities that gate the neural detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Isolated context allowing shared memory between threads
    pub cross_origin_isolated: bool,
    /// Shared memory usable by the audio and consumer threads
    pub shared_array_buffer: bool,
    /// SIMD instructions available to the inference runtime
    pub wasm_simd: bool,
}

impl Capabilities {
    /// Probe the native host
    ///
    /// Threads and shared memory always exist natively; SIMD is detected at
    /// runtime (SSE4.1 on x86, NEON on aarch64).
    pub fn probe_native() -> Self {
        Self {
            cross_origin_isolated: true,
            shared_array_buffer: true,
            wasm_simd: simd_available(),
        }
    }

    pub fn supports_neural(&self) -> bool {
        self.missing().is_none()
    }

    /// First missing capability, if any
    pub fn missing(&self) -> Option<&'static str> {
        if !self.cross_origin_isolated {
            Some("cross_origin_isolated")
        } else if !self.shared_array_buffer {
            Some("shared_array_buffer")
        } else if !self.wasm_simd {
            Some("wasm_simd")
        } else {
            None
        }
    }
}

fn simd_available() -> bool {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
            std::arch::is_x86_feature_detected!("sse4.1")
        } else if #[cfg(target_arch = "aarch64")] {
            std::arch::is_aarch64_feature_detected!("neon")
        } else {
            false
        }
    }
}

/// Builds a neural detector; errors trigger the fallback
pub type NeuralFactory =
    Box<dyn Fn(&DetectorConfig) -> Result<Box<dyn PitchDetector>, DetectorError> + Send + Sync>;

/// Builds the always-available fallback detector
pub type FallbackFactory = Box<dyn Fn(&DetectorConfig) -> Box<dyn PitchDetector> + Send + Sync>;

/// Why a detector was chosen
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionReason {
    /// All capabilities present and the neural detector initialized
    Preferred,
    /// Named capability absent; neural path not attempted
    CapabilityMissing(String),
    /// Neural construction or initialization failed
    InitFailed(DetectorError),
}

impl SelectionReason {
    pub fn describe(&self) -> String {
        match self {
            SelectionReason::Preferred => "preferred".to_string(),
            SelectionReason::CapabilityMissing(capability) => {
                format!("capability missing: {}", capability)
            }
            SelectionReason::InitFailed(err) => format!("neural init failed: {}", err),
        }
    }
}

/// Outcome of [`DetectorSelector::select`]
pub struct Selection {
    pub detector: Box<dyn PitchDetector>,
    pub kind: DetectorKind,
    pub reason: SelectionReason,
}

pub struct DetectorSelector {
    neural: NeuralFactory,
    fallback: FallbackFactory,
    collector: Option<Arc<TelemetryCollector>>,
}

impl DetectorSelector {
    pub fn new(neural: NeuralFactory, fallback: FallbackFactory) -> Self {
        Self {
            neural,
            fallback,
            collector: None,
        }
    }

    /// Neural detector from `config.model_path` (feature `onnx`), falling back
    /// to [`AutocorrelationDetector`]
    pub fn standard() -> Self {
        Self::new(
            Box::new(build_neural),
            Box::new(|config: &DetectorConfig| {
                Box::new(AutocorrelationDetector::new(config)) as Box<dyn PitchDetector>
            }),
        )
    }

    pub fn with_collector(mut self, collector: Arc<TelemetryCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn select(&self, capabilities: &Capabilities, config: &DetectorConfig) -> Selection {
        if let Some(capability) = capabilities.missing() {
            info!(
                "[DetectorSelector] {} unavailable, using fallback detector",
                capability
            );
            return self.fallback(
                config,
                SelectionReason::CapabilityMissing(capability.to_string()),
            );
        }

        let neural = (self.neural)(config).and_then(|mut detector| {
            detector.initialize(config)?;
            Ok(detector)
        });

        match neural {
            Ok(detector) => {
                let kind = detector.kind();
                info!("[DetectorSelector] Using {} detector", kind);
                self.report(kind, &SelectionReason::Preferred);
                Selection {
                    detector,
                    kind,
                    reason: SelectionReason::Preferred,
                }
            }
            Err(err) => {
                log_detector_error(&err, "DetectorSelector::select");
                if let Some(collector) = &self.collector {
                    collector.record_detector_fallback(&err);
                }
                self.fallback(config, SelectionReason::InitFailed(err))
            }
        }
    }

    fn fallback(&self, config: &DetectorConfig, reason: SelectionReason) -> Selection {
        let mut detector = (self.fallback)(config);
        if let Err(err) = detector.initialize(config) {
            // Nothing left to fall back to; keep the detector with its defaults
            log_detector_error(&err, "DetectorSelector::fallback");
        }
        let kind = detector.kind();
        self.report(kind, &reason);
        Selection {
            detector,
            kind,
            reason,
        }
    }

    fn report(&self, kind: DetectorKind, reason: &SelectionReason) {
        if let Some(collector) = &self.collector {
            collector.record_detector_selected(kind, reason.describe());
        }
    }
}

impl Default for DetectorSelector {
    fn default() -> Self {
        Self::standard()
    }
}

/// Samples per inference call (64 ms at 16 kHz)
#[cfg(feature = "onnx")]
const NEURAL_INPUT_LEN: usize = 1024;

#[cfg(feature = "onnx")]
fn build_neural(config: &DetectorConfig) -> Result<Box<dyn PitchDetector>, DetectorError> {
    use super::{NeuralDetector, TractBackend};

    let path = config
        .model_path
        .as_deref()
        .ok_or_else(|| DetectorError::ModelNotFound {
            path: "<unset>".to_string(),
        })?;
    let backend = TractBackend::load(path, NEURAL_INPUT_LEN)?;
    Ok(Box::new(NeuralDetector::new(backend)))
}

#[cfg(not(feature = "onnx"))]
fn build_neural(_config: &DetectorConfig) -> Result<Box<dyn PitchDetector>, DetectorError> {
    Err(DetectorError::ModelLoad {
        reason: "built without the onnx feature".to_string(),
    })
}
