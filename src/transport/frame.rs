//! Per-hop telemetry record and its packed float encoding.
//!
//! Each record is six `f32` values in a fixed order. Optional fields are
//! encoded as NaN; any non-finite value decodes back to `None`.

use serde::{Deserialize, Serialize};

/// Number of packed values per record in the ring payload.
pub const VALUES_PER_FRAME: usize = 6;

const PITCH: usize = 0;
const CLARITY: usize = 1;
const RMS: usize = 2;
const CENTROID: usize = 3;
const ROLLOFF: usize = 4;
const H1H2: usize = 5;

/// One analysis hop worth of telemetry.
///
/// `pitch_hz == None` denotes an unvoiced hop. When the RMS gate rejects a
/// hop every optional field is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub pitch_hz: Option<f32>,
    pub clarity: f32,
    pub rms: f32,
    pub centroid_hz: Option<f32>,
    pub rolloff_hz: Option<f32>,
    pub h1h2: Option<f32>,
}

impl TelemetryFrame {
    /// Frame emitted for hops below the voicing gate.
    pub fn silent(rms: f32) -> Self {
        Self {
            rms,
            ..Self::default()
        }
    }

    pub fn is_voiced(&self) -> bool {
        self.pitch_hz.is_some()
    }

    /// Pack into the fixed record layout.
    pub fn encode(&self) -> [f32; VALUES_PER_FRAME] {
        let mut out = [0.0; VALUES_PER_FRAME];
        out[PITCH] = self.pitch_hz.unwrap_or(f32::NAN);
        out[CLARITY] = self.clarity;
        out[RMS] = self.rms;
        out[CENTROID] = self.centroid_hz.unwrap_or(f32::NAN);
        out[ROLLOFF] = self.rolloff_hz.unwrap_or(f32::NAN);
        out[H1H2] = self.h1h2.unwrap_or(f32::NAN);
        out
    }

    /// Unpack a record. Non-finite required fields decode to 0.
    pub fn decode(values: &[f32; VALUES_PER_FRAME]) -> Self {
        Self {
            pitch_hz: finite(values[PITCH]),
            clarity: finite(values[CLARITY]).unwrap_or(0.0),
            rms: finite(values[RMS]).unwrap_or(0.0),
            centroid_hz: finite(values[CENTROID]),
            rolloff_hz: finite(values[ROLLOFF]),
            h1h2: finite(values[H1H2]),
        }
    }
}

fn finite(value: f32) -> Option<f32> {
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voiced_frame_roundtrip_is_exact() {
        let frame = TelemetryFrame {
            pitch_hz: Some(219.987_65),
            clarity: 0.912_345,
            rms: 0.123_456_7,
            centroid_hz: Some(1234.567),
            rolloff_hz: Some(3456.789),
            h1h2: Some(-3.210_987),
        };
        assert_eq!(TelemetryFrame::decode(&frame.encode()), frame);
    }

    #[test]
    fn test_silent_frame_decodes_nulls() {
        let encoded = TelemetryFrame::silent(0.001).encode();
        assert!(encoded[PITCH].is_nan());
        let decoded = TelemetryFrame::decode(&encoded);
        assert_eq!(decoded.pitch_hz, None);
        assert_eq!(decoded.centroid_hz, None);
        assert_eq!(decoded.rolloff_hz, None);
        assert_eq!(decoded.h1h2, None);
        assert_eq!(decoded.rms, 0.001);
    }

    #[test]
    fn test_infinite_values_decode_as_absent() {
        let values = [f32::INFINITY, f32::NAN, 0.5, f32::NEG_INFINITY, 10.0, 1.0];
        let decoded = TelemetryFrame::decode(&values);
        assert_eq!(decoded.pitch_hz, None);
        assert_eq!(decoded.clarity, 0.0);
        assert_eq!(decoded.centroid_hz, None);
        assert_eq!(decoded.rolloff_hz, Some(10.0));
    }
}
