// Prosody module - contour and variability judgments on the smoothed F0
//
// Runs on the consumer thread at UI cadence:
// - classifier: rising / falling / flat over a trailing time window
// - expressiveness: pitch variability score from a cents series
// - stats: shared descriptive statistics

pub mod classifier;
pub mod expressiveness;
pub mod stats;

pub use classifier::{
    classify_window, label_for_slope, ProsodyClassifier, ProsodyFrame, ProsodyLabel,
    ProsodyResult,
};
pub use expressiveness::{cents_series, score_expressiveness, ExpressivenessResult};
