// Autocorrelation fallback detector
//
// Shares the lag search with the frame analyzer. Needs nothing from the
// host, so it is always constructible and is what the selector falls back to.

use super::{DetectorKind, PitchDetector, PitchDetectorOutput};
use crate::analysis::autocorr::LagSearch;
use crate::analysis::features::remove_dc;
use crate::config::DetectorConfig;
use crate::error::DetectorError;

pub struct AutocorrelationDetector {
    min_hz: f32,
    max_hz: f32,
    min_clarity: f32,
    /// (sample_rate, frame_len) `search` was built for
    search_key: Option<(u32, usize)>,
    search: LagSearch,
    centered: Vec<f32>,
}

impl AutocorrelationDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            min_hz: config.min_hz,
            max_hz: config.max_hz,
            min_clarity: config.min_clarity,
            search_key: None,
            search: LagSearch::new(config.model_sample_rate, config.min_hz, config.max_hz, 0),
            centered: Vec::new(),
        }
    }

    fn search_for(&mut self, sample_rate: u32, frame_len: usize) -> &mut LagSearch {
        let key = (sample_rate, frame_len);
        if self.search_key != Some(key) {
            self.search = LagSearch::new(sample_rate, self.min_hz, self.max_hz, frame_len);
            self.search_key = Some(key);
        }
        &mut self.search
    }
}

impl Default for AutocorrelationDetector {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

impl PitchDetector for AutocorrelationDetector {
    fn initialize(&mut self, config: &DetectorConfig) -> Result<(), DetectorError> {
        self.min_hz = config.min_hz;
        self.max_hz = config.max_hz;
        self.min_clarity = config.min_clarity;
        self.search_key = None;
        Ok(())
    }

    fn reset(&mut self) {
        self.search_key = None;
    }

    fn process_frame(&mut self, samples: &[f32], sample_rate: u32) -> PitchDetectorOutput {
        if samples.is_empty() || sample_rate == 0 {
            return PitchDetectorOutput::unvoiced();
        }

        let mut centered = std::mem::take(&mut self.centered);
        centered.resize(samples.len(), 0.0);
        remove_dc(samples, &mut centered);

        let min_clarity = self.min_clarity;
        let estimate = self.search_for(sample_rate, samples.len()).estimate(&centered);
        self.centered = centered;

        match estimate {
            Some(estimate) if estimate.clarity >= min_clarity => {
                PitchDetectorOutput::voiced(estimate.pitch_hz, estimate.clarity)
            }
            Some(estimate) => PitchDetectorOutput {
                pitch_hz: None,
                confidence: estimate.clarity,
            },
            None => PitchDetectorOutput::unvoiced(),
        }
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Autocorrelation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.4 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_detects_sine_at_model_rate() {
        let mut detector = AutocorrelationDetector::default();
        detector.initialize(&DetectorConfig::default()).unwrap();

        let output = detector.process_frame(&sine(200.0, 16_000, 1024), 16_000);
        let pitch = output.pitch_hz.unwrap();
        assert!((pitch - 200.0).abs() < 2.0, "{}", pitch);
        assert!(output.confidence > 0.5);
    }

    #[test]
    fn test_rate_change_rebuilds_search() {
        let mut detector = AutocorrelationDetector::default();
        let a = detector.process_frame(&sine(300.0, 16_000, 1024), 16_000);
        let b = detector.process_frame(&sine(300.0, 48_000, 2048), 48_000);
        assert!((a.pitch_hz.unwrap() - 300.0).abs() < 3.0);
        assert!((b.pitch_hz.unwrap() - 300.0).abs() < 3.0);
    }

    #[test]
    fn test_silence_and_empty_are_unvoiced() {
        let mut detector = AutocorrelationDetector::default();
        assert_eq!(
            detector.process_frame(&[0.0; 1024], 16_000),
            PitchDetectorOutput::unvoiced()
        );
        assert_eq!(detector.process_frame(&[], 16_000), PitchDetectorOutput::unvoiced());
    }

    #[test]
    fn test_low_voice_at_model_rate() {
        let mut detector = AutocorrelationDetector::default();
        for freq in [65.0, 85.0, 100.0] {
            let output = detector.process_frame(&sine(freq, 16_000, 1024), 16_000);
            let pitch = output.pitch_hz.expect("low tone should be voiced");
            assert!((pitch - freq).abs() / freq < 0.01, "{} Hz detected as {}", freq, pitch);
        }
    }

    #[test]
    fn test_cached_search_reused_for_same_shape() {
        let mut detector = AutocorrelationDetector::default();
        let first = detector.process_frame(&sine(250.0, 16_000, 1024), 16_000);
        detector.reset();
        let second = detector.process_frame(&sine(250.0, 16_000, 1024), 16_000);
        let third = detector.process_frame(&sine(250.0, 16_000, 1024), 16_000);
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn test_kind() {
        assert_eq!(
            AutocorrelationDetector::default().kind(),
            DetectorKind::Autocorrelation
        );
    }
}
