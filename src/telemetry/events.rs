//! Diagnostics event types published by the pipeline, the detector
//! selector and the capture engine.

use serde::{Deserialize, Serialize};

use crate::detector::DetectorKind;

/// Pipeline lifecycle stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    CaptureStarted,
    CaptureStopped,
    WorkerStarted,
    WorkerStopped,
}

/// Diagnostics events covering transport health, detector routing and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Frames dropped by a full telemetry ring since the previous report
    Overrun { dropped: u64, total: u64 },
    BufferOccupancy {
        channel: String,
        percent: f32,
    },
    DetectorSelected {
        kind: DetectorKind,
        reason: String,
    },
    /// The preferred detector failed to construct
    DetectorFallback { code: i32, message: String },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
}
