// Pipeline startup and shutdown error types

use crate::error::{AudioError, ErrorCode, TransportError};
use std::fmt;

/// Pipeline error code constants
///
/// Error code range: 5001-5003
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Capture device could not be opened or started
    pub const AUDIO: i32 = 5001;

    /// Telemetry ring could not be built
    pub const TRANSPORT: i32 = 5002;

    /// Consumer worker thread panicked
    pub const WORKER_PANICKED: i32 = 5003;
}

/// Errors raised while wiring capture, transport and the consumer worker
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    Audio(AudioError),
    Transport(TransportError),
    WorkerPanicked,
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::Audio(_) => PipelineErrorCodes::AUDIO,
            PipelineError::Transport(_) => PipelineErrorCodes::TRANSPORT,
            PipelineError::WorkerPanicked => PipelineErrorCodes::WORKER_PANICKED,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::Audio(err) => format!("Capture failed: {}", err.message()),
            PipelineError::Transport(err) => format!("Transport setup failed: {}", err.message()),
            PipelineError::WorkerPanicked => "Consumer worker thread panicked".to_string(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Audio(err) => Some(err),
            PipelineError::Transport(err) => Some(err),
            PipelineError::WorkerPanicked => None,
        }
    }
}

impl From<AudioError> for PipelineError {
    fn from(err: AudioError) -> Self {
        PipelineError::Audio(err)
    }
}

impl From<TransportError> for PipelineError {
    fn from(err: TransportError) -> Self {
        PipelineError::Transport(err)
    }
}
