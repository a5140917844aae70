// Pipeline module - consumer-side processing of drained telemetry
//
// TelemetryPipeline is the synchronous per-frame stage:
//   TelemetryFrame → PitchEngine → ProsodyClassifier → TelemetryUpdate
// It is shared by the threaded ConsumerWorker (live) and the OfflineRunner.

pub mod worker;

use serde::{Deserialize, Serialize};

use crate::analysis::BrightnessReading;
use crate::config::AppConfig;
use crate::detector::PitchDetectorOutput;
use crate::engine::{EngineOutput, PitchEngine};
use crate::prosody::{ProsodyClassifier, ProsodyFrame, ProsodyResult};
use crate::transport::TelemetryFrame;

#[cfg(feature = "capture")]
pub use worker::PipelineHandle;
pub use worker::{ConsumerWorker, WorkerSummary};

/// Everything the UI needs for one hop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryUpdate {
    /// Stream time of the hop, derived from the hop count
    pub t_ms: f64,
    pub frame: TelemetryFrame,
    pub engine: EngineOutput,
    pub prosody: ProsodyResult,
    /// Newest brightness reading seen so far
    pub brightness: Option<BrightnessReading>,
}

/// Engine + prosody stage driven one frame at a time
pub struct TelemetryPipeline {
    engine: PitchEngine,
    classifier: ProsodyClassifier,
    hop_ms: f64,
    hops: u64,
    brightness: Option<BrightnessReading>,
}

impl TelemetryPipeline {
    /// Hop timing comes from `engine.hop_sec`; pass a sanitized config so it
    /// matches the analyzer
    pub fn new(config: &AppConfig) -> Self {
        Self {
            engine: PitchEngine::new(config.engine.clone()),
            classifier: ProsodyClassifier::new(config.prosody.clone()),
            hop_ms: config.engine.hop_sec * 1000.0,
            hops: 0,
            brightness: None,
        }
    }

    pub fn engine(&self) -> &PitchEngine {
        &self.engine
    }

    pub fn classifier(&self) -> &ProsodyClassifier {
        &self.classifier
    }

    pub fn hop_ms(&self) -> f64 {
        self.hop_ms
    }

    /// Remember the newest brightness reading for subsequent updates
    pub fn set_brightness(&mut self, reading: BrightnessReading) {
        self.brightness = Some(reading);
    }

    /// Advance one hop
    ///
    /// The frame's autocorrelation pitch and clarity stand in for the
    /// detector output; clarity is the confidence the engine gates on.
    pub fn process_frame(&mut self, frame: &TelemetryFrame) -> TelemetryUpdate {
        let t_ms = self.hops as f64 * self.hop_ms;
        self.hops += 1;

        let raw = PitchDetectorOutput {
            pitch_hz: frame.pitch_hz,
            confidence: frame.clarity,
        };
        let engine = self.engine.update(raw);

        self.classifier
            .push(ProsodyFrame::new(t_ms, engine.voiced_pitch_hz()));
        let prosody = self.classifier.classify();

        TelemetryUpdate {
            t_ms,
            frame: *frame,
            engine,
            prosody,
            brightness: self.brightness,
        }
    }

    /// Advance stream time past hops that were dropped upstream
    pub fn skip_hops(&mut self, hops: u64) {
        self.hops += hops;
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.classifier.reset();
        self.hops = 0;
        self.brightness = None;
    }
}
