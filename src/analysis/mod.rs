// Analysis module - audio-thread DSP
//
// Everything here runs inside the audio callback and must finish well
// within one hop (~10 ms at 48 kHz / 512). Buffers are sized at
// construction; steady-state processing does not allocate.
//
// Pipeline per hop:
//   samples → FrameAnalyzer → TelemetryFrame (pitch, clarity, rms, spectral)
//   samples → BrightnessAnalyzer → BrightnessReading (coarser cadence)

pub mod autocorr;
pub mod brightness;
pub mod features;
pub mod frame;

pub use autocorr::{LagSearch, PitchEstimate};
pub use brightness::{BrightnessAnalyzer, BrightnessReading};
pub use frame::FrameAnalyzer;
