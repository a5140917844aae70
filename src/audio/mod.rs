// Audio module - capture, audio-thread analysis and resampling

#[cfg(feature = "capture")]
pub mod capture;
pub mod resample;
pub mod worklet;

#[cfg(feature = "capture")]
pub use capture::CaptureEngine;
pub use resample::{resample_linear, resample_linear_into, resampled_len};
pub use worklet::{AudioWorklet, WorkletParts, WorkletStats};
