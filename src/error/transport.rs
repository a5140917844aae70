// Ring transport error types

use crate::error::ErrorCode;
use std::fmt;

/// Transport error code constants
///
/// Error code range: 3001-3004
pub struct TransportErrorCodes {}

impl TransportErrorCodes {
    /// Ring capacity below the two-slot minimum
    pub const CAPACITY_TOO_SMALL: i32 = 3001;

    /// Record width does not match the telemetry frame layout
    pub const INVALID_RECORD_WIDTH: i32 = 3002;

    /// Consumer attached before the producer marked the layout ready
    pub const LAYOUT_NOT_READY: i32 = 3003;

    /// Ring capacity beyond what the u32 header indices can address
    pub const CAPACITY_TOO_LARGE: i32 = 3004;
}

/// Errors raised while constructing or attaching to a telemetry ring
///
/// These indicate programming errors rather than runtime conditions: a ring
/// that was built successfully never fails during push or drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Capacity must be at least 2
    CapacityTooSmall { capacity: usize },

    /// Capacity must fit the header's u32 indices
    CapacityTooLarge { capacity: usize, max: usize },

    /// Values per frame must equal the frame record width
    InvalidRecordWidth { width: usize },

    /// Layout has not been marked ready
    LayoutNotReady,
}

impl ErrorCode for TransportError {
    fn code(&self) -> i32 {
        match self {
            TransportError::CapacityTooSmall { .. } => TransportErrorCodes::CAPACITY_TOO_SMALL,
            TransportError::CapacityTooLarge { .. } => TransportErrorCodes::CAPACITY_TOO_LARGE,
            TransportError::InvalidRecordWidth { .. } => {
                TransportErrorCodes::INVALID_RECORD_WIDTH
            }
            TransportError::LayoutNotReady => TransportErrorCodes::LAYOUT_NOT_READY,
        }
    }

    fn message(&self) -> String {
        match self {
            TransportError::CapacityTooSmall { capacity } => {
                format!("Ring capacity must be at least 2 (got {})", capacity)
            }
            TransportError::CapacityTooLarge { capacity, max } => {
                format!("Ring capacity must be at most {} (got {})", max, capacity)
            }
            TransportError::InvalidRecordWidth { width } => {
                format!(
                    "Ring record width must be {} values (got {})",
                    crate::transport::frame::VALUES_PER_FRAME,
                    width
                )
            }
            TransportError::LayoutNotReady => "Ring layout not marked ready".to_string(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransportError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TransportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_codes() {
        assert_eq!(
            TransportError::CapacityTooSmall { capacity: 1 }.code(),
            3001
        );
        assert_eq!(TransportError::InvalidRecordWidth { width: 4 }.code(), 3002);
        assert_eq!(TransportError::LayoutNotReady.code(), 3003);
        assert_eq!(
            TransportError::CapacityTooLarge {
                capacity: usize::MAX,
                max: 10
            }
            .code(),
            3004
        );
    }

    #[test]
    fn test_transport_error_messages() {
        let err = TransportError::CapacityTooSmall { capacity: 1 };
        assert_eq!(err.message(), "Ring capacity must be at least 2 (got 1)");

        let err = TransportError::InvalidRecordWidth { width: 4 };
        assert!(err.message().contains("got 4"));

        let err = TransportError::CapacityTooLarge { capacity: 20, max: 10 };
        assert_eq!(err.message(), "Ring capacity must be at most 10 (got 20)");
    }
}
