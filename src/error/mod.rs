// Error types for the pitch & prosody telemetry engine
//
// This module defines custom error types for capture, transport, detector
// and pipeline operations. Every error carries a stable numeric code so
// embedding layers can route on it without string matching.
//
// Per-hop analysis never produces errors: numerical edge cases degrade to an
// unvoiced frame instead. Only construction-time misuse and detector setup
// failures surface here.

mod audio;
mod detector;
mod pipeline;
mod transport;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use detector::{log_detector_error, DetectorError, DetectorErrorCodes};
pub use pipeline::{PipelineError, PipelineErrorCodes};
pub use transport::{TransportError, TransportErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the embedding boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
