//! Deterministic offline run of the full telemetry pipeline.
//!
//! The clip is pushed through the same AudioWorklet and ring the live path
//! uses, in render-quantum sized blocks, and the ring is drained after every
//! block so no frame is ever dropped. Results depend only on the samples and
//! the configuration.
//!
//! With a selector attached, a detector is chosen for every run and attached
//! to the worklet, exactly as the live path does.

use serde::{Deserialize, Serialize};

use crate::audio::{AudioWorklet, WorkletParts};
use crate::config::AppConfig;
use crate::detector::{Capabilities, DetectorKind, DetectorSelector};
use crate::error::TransportError;
use crate::fixtures::PcmClip;
use crate::pipeline::{TelemetryPipeline, TelemetryUpdate};
use crate::prosody::{cents_series, score_expressiveness, ExpressivenessResult, ProsodyFrame, ProsodyResult};
use crate::transport::TelemetryFrame;

/// Samples handed to the worklet per call, matching a typical render quantum
const RENDER_QUANTUM: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineSummary {
    pub voiced_frames: usize,
    pub mean_pitch_hz: Option<f32>,
    /// Running classifier state after the last hop
    pub prosody: Option<ProsodyResult>,
    /// Scored over every voiced hop of the clip
    pub expressiveness: ExpressivenessResult,
    pub mean_brightness: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineReport {
    pub sample_rate: u32,
    /// Detector that supplied pitch; `None` for the analyzer's own estimate
    pub detector: Option<DetectorKind>,
    pub duration_ms: f64,
    pub frames: Vec<TelemetryUpdate>,
    pub summary: OfflineSummary,
}

pub struct OfflineRunner {
    config: AppConfig,
    selector: Option<(DetectorSelector, Capabilities)>,
}

impl OfflineRunner {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            selector: None,
        }
    }

    /// Select a detector for each run under `capabilities`
    pub fn with_detector(mut self, selector: DetectorSelector, capabilities: Capabilities) -> Self {
        self.selector = Some((selector, capabilities));
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Configuration retuned to `sample_rate`; the engine follows the analyzer
    fn config_for_rate(&self, sample_rate: u32) -> AppConfig {
        let mut config = self.config.clone();
        config.analyzer.sample_rate = sample_rate;
        config.sanitized()
    }

    pub fn run(&self, clip: &PcmClip) -> Result<OfflineReport, TransportError> {
        let config = self.config_for_rate(clip.sample_rate);
        let WorkletParts {
            mut worklet,
            mut consumer,
            mut brightness_rx,
        } = AudioWorklet::build(&config)?;
        if let Some((selector, capabilities)) = &self.selector {
            let selection = selector.select(capabilities, &config.detector);
            log::info!(
                "[OfflineRunner] {} detector ({})",
                selection.kind,
                selection.reason.describe()
            );
            worklet.set_detector(Some(selection.detector));
        }
        let mut pipeline = TelemetryPipeline::new(&config);

        let mut frames = Vec::new();
        let mut drained: Vec<TelemetryFrame> = Vec::with_capacity(config.transport.capacity);
        let mut brightness_sum = 0.0_f64;
        let mut brightness_count = 0_usize;

        for block in clip.samples.chunks(RENDER_QUANTUM) {
            worklet.process_mono(block);

            for reading in brightness_rx.drain() {
                brightness_sum += reading.brightness as f64;
                brightness_count += 1;
                pipeline.set_brightness(reading);
            }

            drained.clear();
            consumer.drain_into(&mut drained);
            frames.extend(drained.iter().map(|frame| pipeline.process_frame(frame)));
        }

        let summary = summarize(
            &frames,
            &config,
            pipeline.hop_ms(),
            (brightness_count > 0).then(|| (brightness_sum / brightness_count as f64) as f32),
        );

        log::info!(
            "[OfflineRunner] {} hops, {} voiced, mean pitch {:?}",
            frames.len(),
            summary.voiced_frames,
            summary.mean_pitch_hz
        );

        Ok(OfflineReport {
            sample_rate: clip.sample_rate,
            detector: worklet.detector_kind(),
            duration_ms: clip.duration_ms(),
            frames,
            summary,
        })
    }
}

fn summarize(
    frames: &[TelemetryUpdate],
    config: &AppConfig,
    hop_ms: f64,
    mean_brightness: Option<f32>,
) -> OfflineSummary {
    let voiced: Vec<f32> = frames
        .iter()
        .filter_map(|u| u.engine.voiced_pitch_hz())
        .collect();
    let mean_pitch_hz =
        (!voiced.is_empty()).then(|| voiced.iter().sum::<f32>() / voiced.len() as f32);

    let prosody_frames: Vec<ProsodyFrame> = frames
        .iter()
        .map(|u| ProsodyFrame::new(u.t_ms, u.engine.voiced_pitch_hz()))
        .collect();
    let (cents, _) = cents_series(&prosody_frames);
    let voiced_ms = cents.len() as f64 * hop_ms;
    let expressiveness = score_expressiveness(&cents, voiced_ms, &config.expressiveness);

    OfflineSummary {
        voiced_frames: voiced.len(),
        mean_pitch_hz,
        prosody: frames.last().map(|u| u.prosody),
        expressiveness,
        mean_brightness,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::detector::{AutocorrelationDetector, PitchDetector, PitchDetectorOutput};
    use crate::error::DetectorError;
    use crate::fixtures::Synthetic;

    /// Always hears the same note
    struct FixedDetector;

    impl PitchDetector for FixedDetector {
        fn initialize(&mut self, _config: &DetectorConfig) -> Result<(), DetectorError> {
            Ok(())
        }

        fn reset(&mut self) {}

        fn process_frame(&mut self, _samples: &[f32], _sample_rate: u32) -> PitchDetectorOutput {
            PitchDetectorOutput::voiced(311.0, 0.8)
        }

        fn kind(&self) -> DetectorKind {
            DetectorKind::Neural
        }
    }

    fn fixed_selector() -> DetectorSelector {
        DetectorSelector::new(
            Box::new(|_: &DetectorConfig| Ok(Box::new(FixedDetector) as Box<dyn PitchDetector>)),
            Box::new(|config: &DetectorConfig| {
                Box::new(AutocorrelationDetector::new(config)) as Box<dyn PitchDetector>
            }),
        )
    }

    fn all_capabilities() -> Capabilities {
        Capabilities {
            cross_origin_isolated: true,
            shared_array_buffer: true,
            wasm_simd: true,
        }
    }

    #[test]
    fn test_sine_clip_summary() {
        let clip = Synthetic::Sine { hz: 220.0 }.render(48_000, 1000);
        let report = OfflineRunner::new(AppConfig::default()).run(&clip).unwrap();

        assert_eq!(report.frames.len(), 48_000 / 512);
        assert!(report.summary.voiced_frames > 80);
        let mean = report.summary.mean_pitch_hz.unwrap();
        assert!((mean - 220.0).abs() < 220.0 * 0.02, "mean {}", mean);
        assert!(report.summary.expressiveness.score01 < 0.1);
        assert!(report.summary.mean_brightness.is_some());
    }

    #[test]
    fn test_silence_clip_has_no_pitch() {
        let clip = Synthetic::Silence.render(16_000, 500);
        let report = OfflineRunner::new(AppConfig::default()).run(&clip).unwrap();

        assert!(!report.frames.is_empty());
        assert_eq!(report.summary.voiced_frames, 0);
        assert_eq!(report.summary.mean_pitch_hz, None);
        assert!(report.summary.prosody.unwrap().insufficient_voiced);
    }

    #[test]
    fn test_empty_clip() {
        let report = OfflineRunner::new(AppConfig::default())
            .run(&PcmClip::new(Vec::new(), 48_000))
            .unwrap();
        assert!(report.frames.is_empty());
        assert_eq!(report.summary.prosody, None);
        assert_eq!(report.summary.expressiveness.sample_count, 0);
    }

    #[test]
    fn test_selected_detector_output_reaches_engine() {
        let clip = Synthetic::Sine { hz: 220.0 }.render(48_000, 500);
        let report = OfflineRunner::new(AppConfig::default())
            .with_detector(fixed_selector(), all_capabilities())
            .run(&clip)
            .unwrap();

        assert_eq!(report.detector, Some(DetectorKind::Neural));
        for update in &report.frames {
            assert_eq!(update.engine.raw, PitchDetectorOutput::voiced(311.0, 0.8));
        }
        let mean = report.summary.mean_pitch_hz.unwrap();
        assert!((mean - 311.0).abs() < 0.5, "mean {}", mean);
    }

    #[test]
    fn test_missing_capability_falls_back_transparently() {
        let clip = Synthetic::Sine { hz: 220.0 }.render(48_000, 500);
        let capabilities = Capabilities {
            wasm_simd: false,
            ..all_capabilities()
        };
        let report = OfflineRunner::new(AppConfig::default())
            .with_detector(fixed_selector(), capabilities)
            .run(&clip)
            .unwrap();

        assert_eq!(report.detector, Some(DetectorKind::Autocorrelation));
        let mean = report.summary.mean_pitch_hz.unwrap();
        assert!((mean - 220.0).abs() < 220.0 * 0.02, "mean {}", mean);
    }

    #[test]
    fn test_decay_tail_excluded_from_summary() {
        let mut samples = Synthetic::Sine { hz: 220.0 }.render(48_000, 600).samples;
        samples.extend(Synthetic::Silence.render(48_000, 400).samples);
        let report = OfflineRunner::new(AppConfig::default())
            .run(&PcmClip::new(samples, 48_000))
            .unwrap();

        assert_eq!(report.detector, None);
        let voiced = report.frames.iter().filter(|u| u.engine.voiced).count();
        let decaying = report
            .frames
            .iter()
            .filter(|u| !u.engine.voiced && u.engine.pitch_hz.is_some())
            .count();
        assert!(decaying > 0);
        assert_eq!(report.summary.voiced_frames, voiced);
        assert_eq!(report.summary.expressiveness.sample_count, voiced);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let clip = Synthetic::Glide {
            from_hz: 150.0,
            to_hz: 300.0,
        }
        .render(44_100, 800);
        let runner = OfflineRunner::new(AppConfig::default());
        assert_eq!(runner.run(&clip).unwrap(), runner.run(&clip).unwrap());
    }
}
