// 1-D Kalman filter in semitone space with fast-lock
//
// Random-walk model: predict P += Q, correct with K = P / (P + R_eff).
// For the first `fast_lock_frames` updates after a (re)seed the measurement
// variance is scaled down, which raises the gain so a legitimate jump is
// tracked within a few hops instead of lagging.

use serde::{Deserialize, Serialize};

use crate::config::KalmanConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KalmanState {
    pub mean_semitone: f32,
    pub variance_semitone2: f32,
    /// Updates since the last seed
    pub frames_since_lock: u32,
}

impl KalmanState {
    /// Start tracking at `measurement` with the given variance
    pub fn seeded(measurement: f32, variance: f32) -> Self {
        Self {
            mean_semitone: measurement,
            variance_semitone2: variance,
            frames_since_lock: 0,
        }
    }

    pub fn in_fast_lock(&self, config: &KalmanConfig) -> bool {
        self.frames_since_lock < config.fast_lock_frames
    }

    /// Effective measurement variance for the next update
    pub fn effective_r(&self, config: &KalmanConfig) -> f32 {
        if self.in_fast_lock(config) {
            config.r_semitones2 * config.fast_lock_r_scale
        } else {
            config.r_semitones2
        }
    }

    /// Predict + correct with one measurement; returns the new mean
    pub fn update(&mut self, measurement: f32, config: &KalmanConfig) -> f32 {
        let r_eff = self.effective_r(config);
        let predicted = self.variance_semitone2 + config.q_semitones2;
        let gain = predicted / (predicted + r_eff);

        self.mean_semitone += gain * (measurement - self.mean_semitone);
        self.variance_semitone2 = (1.0 - gain) * predicted;
        self.frames_since_lock = self.frames_since_lock.saturating_add(1);
        self.mean_semitone
    }
}
