// Prosody Telemetry - real-time pitch and prosody engine
// Lock-free audio-thread analysis feeding a consumer-side smoothing pipeline

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod offline;
pub mod pipeline;
pub mod prosody;
pub mod telemetry;
pub mod transport;

// Re-exports for convenience
pub use analysis::{BrightnessAnalyzer, BrightnessReading, FrameAnalyzer};
pub use audio::{AudioWorklet, WorkletParts};
pub use config::AppConfig;
pub use detector::{
    Capabilities, DetectorKind, DetectorSelector, PitchDetector, PitchDetectorOutput,
};
pub use engine::{EngineOutput, PitchEngine};
pub use offline::{OfflineReport, OfflineRunner};
pub use pipeline::{ConsumerWorker, TelemetryPipeline, TelemetryUpdate};
pub use prosody::{
    score_expressiveness, ExpressivenessResult, ProsodyClassifier, ProsodyLabel, ProsodyResult,
};
pub use telemetry::{MetricEvent, TelemetryCollector};
pub use transport::{TelemetryFrame, TelemetryRing};
