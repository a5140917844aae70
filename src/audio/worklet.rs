// Audio worklet - the audio-thread end of the pipeline
//
// Owns both analyzers and the producer halves of both transports. Each
// callback block is reduced to its first channel, fed through the frame
// analyzer (one ring record per hop) and the brightness analyzer (one
// channel reading per stride). Nothing here blocks or locks; a full ring or
// channel drops and counts.
//
// With a detector attached, every hop above the RMS gate is also run through
// it and its pitch and confidence replace the analyzer's autocorrelation
// estimate in the record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::analysis::{BrightnessAnalyzer, BrightnessReading, FrameAnalyzer};
use crate::config::AppConfig;
use crate::detector::{DetectorKind, PitchDetector, PitchDetectorOutput};
use crate::error::TransportError;
use crate::transport::{
    reading_channel, ReadingReceiver, ReadingSender, TelemetryConsumer, TelemetryFrame,
    TelemetryProducer, TelemetryRing,
};

/// Samples de-interleaved per pass; larger callbacks are split
const MONO_CHUNK: usize = 4096;

/// Brightness readings buffered between consumer drains
const BRIGHTNESS_QUEUE: usize = 64;

/// Counters readable from any thread
#[derive(Debug, Default)]
pub struct WorkletStats {
    pub samples: AtomicU64,
    pub frames: AtomicU64,
    pub readings: AtomicU64,
}

impl WorkletStats {
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn readings(&self) -> u64 {
        self.readings.load(Ordering::Relaxed)
    }
}

pub struct AudioWorklet {
    analyzer: FrameAnalyzer,
    brightness: BrightnessAnalyzer,
    producer: TelemetryProducer,
    brightness_tx: ReadingSender<BrightnessReading>,
    detector: Option<Box<dyn PitchDetector>>,
    sample_rate: u32,
    voicing_rms: f32,
    mono: Vec<f32>,
    stats: Arc<WorkletStats>,
}

/// Worklet plus the consumer ends of its transports
pub struct WorkletParts {
    pub worklet: AudioWorklet,
    pub consumer: TelemetryConsumer,
    pub brightness_rx: ReadingReceiver<BrightnessReading>,
}

impl AudioWorklet {
    pub fn new(
        config: &AppConfig,
        producer: TelemetryProducer,
        brightness_tx: ReadingSender<BrightnessReading>,
    ) -> Self {
        Self {
            analyzer: FrameAnalyzer::new(&config.analyzer),
            brightness: BrightnessAnalyzer::new(config.analyzer.sample_rate, &config.brightness),
            producer,
            brightness_tx,
            detector: None,
            sample_rate: config.analyzer.sample_rate,
            voicing_rms: config.analyzer.voicing_rms,
            mono: vec![0.0; MONO_CHUNK],
            stats: Arc::new(WorkletStats::default()),
        }
    }

    /// Create the ring and brightness channel, mark the ring ready and wire
    /// a worklet to their producer ends
    pub fn build(config: &AppConfig) -> Result<WorkletParts, TransportError> {
        let mut ring = TelemetryRing::new(config.transport.capacity, config.transport.values_per_frame)?;
        ring.mark_ready();
        let (producer, consumer) = ring.split();
        let (brightness_tx, brightness_rx) = reading_channel(BRIGHTNESS_QUEUE);

        log::info!(
            "[AudioWorklet] Transport ready: capacity={} hop={} frame_size={}",
            config.transport.capacity,
            config.analyzer.hop,
            config.analyzer.frame_size
        );

        Ok(WorkletParts {
            worklet: Self::new(config, producer, brightness_tx),
            consumer,
            brightness_rx,
        })
    }

    pub fn stats(&self) -> Arc<WorkletStats> {
        Arc::clone(&self.stats)
    }

    /// Attach (or detach) the detector that supplies per-hop pitch
    ///
    /// The incoming detector is reset; the previous one is returned. Call
    /// before the stream starts, since the consumer keeps its filter state.
    pub fn set_detector(
        &mut self,
        detector: Option<Box<dyn PitchDetector>>,
    ) -> Option<Box<dyn PitchDetector>> {
        let detector = detector.map(|mut detector| {
            detector.reset();
            detector
        });
        if let Some(detector) = &detector {
            log::info!("[AudioWorklet] Pitch from {} detector", detector.kind());
        }
        std::mem::replace(&mut self.detector, detector)
    }

    /// Detector supplying pitch, `None` when the analyzer's own estimate is used
    pub fn detector_kind(&self) -> Option<DetectorKind> {
        self.detector.as_ref().map(|detector| detector.kind())
    }

    /// Process interleaved input, keeping only the first channel
    pub fn process(&mut self, input: &[f32], channels: usize) {
        if channels <= 1 {
            self.process_mono(input);
            return;
        }

        let mut frames = input.chunks_exact(channels).map(|frame| frame[0]);
        loop {
            let mut filled = 0;
            for (slot, sample) in self.mono.iter_mut().zip(frames.by_ref()) {
                *slot = sample;
                filled += 1;
            }
            if filled == 0 {
                break;
            }
            let mono = std::mem::take(&mut self.mono);
            self.process_mono(&mono[..filled]);
            self.mono = mono;
        }
    }

    /// Process a mono block
    pub fn process_mono(&mut self, input: &[f32]) {
        let Self {
            analyzer,
            brightness,
            producer,
            brightness_tx,
            detector,
            sample_rate,
            voicing_rms,
            stats,
            ..
        } = self;

        analyzer.process_block(input, |mut frame, window| {
            if let Some(detector) = detector.as_mut() {
                if frame.rms >= *voicing_rms {
                    apply_detection(&mut frame, detector.process_frame(window, *sample_rate));
                }
            }
            if producer.push(&frame) {
                stats.frames.fetch_add(1, Ordering::Relaxed);
            }
        });
        brightness.process_block(input, |reading| {
            if brightness_tx.send(reading) {
                stats.readings.fetch_add(1, Ordering::Relaxed);
            }
        });
        stats.samples.fetch_add(input.len() as u64, Ordering::Relaxed);
    }

    /// Frames dropped because the ring was full
    pub fn overruns(&self) -> u64 {
        self.producer.overruns()
    }

    /// Restart analysis phase; transports are left as they are
    pub fn reset(&mut self) {
        self.analyzer.reset();
        self.brightness.reset();
        if let Some(detector) = self.detector.as_mut() {
            detector.reset();
        }
    }
}

/// Replace the analyzer's pitch with a detector's
///
/// H1-H2 is kept only while the detector agrees the hop is voiced.
fn apply_detection(frame: &mut TelemetryFrame, output: PitchDetectorOutput) {
    frame.pitch_hz = output.pitch_hz;
    frame.clarity = output.confidence;
    if output.pitch_hz.is_none() {
        frame.h1h2 = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / 48_000.0).sin())
            .collect()
    }

    #[test]
    fn test_mono_block_fills_ring_and_channel() {
        let config = AppConfig::default();
        let WorkletParts {
            mut worklet,
            mut consumer,
            mut brightness_rx,
        } = AudioWorklet::build(&config).unwrap();

        worklet.process_mono(&tone(220.0, 5120));

        let frames = consumer.drain();
        assert_eq!(frames.len(), 10);
        assert!(frames.last().unwrap().is_voiced());
        // 1024-sample window, then every 256 samples
        assert_eq!(brightness_rx.drain().len(), 1 + (5120 - 1024) / 256);

        let stats = worklet.stats();
        assert_eq!(stats.samples(), 5120);
        assert_eq!(stats.frames(), 10);
    }

    #[test]
    fn test_interleaved_input_uses_first_channel() {
        let config = AppConfig::default();
        let mut stereo = AudioWorklet::build(&config).unwrap();
        let mut mono = AudioWorklet::build(&config).unwrap();

        let left = tone(330.0, 10_000);
        let interleaved: Vec<f32> = left.iter().flat_map(|&s| [s, 0.0]).collect();

        stereo.worklet.process(&interleaved, 2);
        mono.worklet.process_mono(&left);

        assert_eq!(stereo.consumer.drain(), mono.consumer.drain());
    }

    #[test]
    fn test_full_ring_counts_overruns() {
        let mut config = AppConfig::default();
        config.transport.capacity = 4;
        let mut parts = AudioWorklet::build(&config).unwrap();

        parts.worklet.process_mono(&vec![0.0; 512 * 10]);
        assert_eq!(parts.consumer.drain().len(), 4);
        assert_eq!(parts.worklet.overruns(), 6);
        assert_eq!(parts.consumer.overruns(), 6);
    }

    /// Reports a fixed pitch for every full window
    struct FixedDetector;

    impl PitchDetector for FixedDetector {
        fn initialize(
            &mut self,
            _config: &crate::config::DetectorConfig,
        ) -> Result<(), crate::error::DetectorError> {
            Ok(())
        }

        fn reset(&mut self) {}

        fn process_frame(&mut self, samples: &[f32], sample_rate: u32) -> PitchDetectorOutput {
            assert_eq!(samples.len(), 2048);
            assert_eq!(sample_rate, 48_000);
            PitchDetectorOutput::voiced(333.0, 0.87)
        }

        fn kind(&self) -> DetectorKind {
            DetectorKind::Neural
        }
    }

    #[test]
    fn test_attached_detector_supplies_pitch() {
        let config = AppConfig::default();
        let mut parts = AudioWorklet::build(&config).unwrap();
        assert_eq!(parts.worklet.detector_kind(), None);
        assert!(parts
            .worklet
            .set_detector(Some(Box::new(FixedDetector)))
            .is_none());
        assert_eq!(parts.worklet.detector_kind(), Some(DetectorKind::Neural));

        parts.worklet.process_mono(&tone(220.0, 5120));
        let frames = parts.consumer.drain();
        assert_eq!(frames.len(), 10);
        for frame in &frames {
            assert_eq!(frame.pitch_hz, Some(333.0));
            assert_eq!(frame.clarity, 0.87);
        }

        let previous = parts.worklet.set_detector(None).unwrap();
        assert_eq!(previous.kind(), DetectorKind::Neural);
    }

    #[test]
    fn test_detector_skipped_below_rms_gate() {
        let config = AppConfig::default();
        let mut parts = AudioWorklet::build(&config).unwrap();
        parts
            .worklet
            .set_detector(Some(Box::new(FixedDetector)));

        parts.worklet.process_mono(&vec![0.0; 512 * 4]);
        for frame in parts.consumer.drain() {
            assert_eq!(frame, TelemetryFrame::silent(0.0));
        }
    }

    #[test]
    fn test_unvoiced_detection_clears_harmonics() {
        let mut frame = TelemetryFrame {
            pitch_hz: Some(220.0),
            clarity: 0.9,
            rms: 0.3,
            centroid_hz: Some(800.0),
            rolloff_hz: Some(1600.0),
            h1h2: Some(12.0),
        };
        apply_detection(&mut frame, PitchDetectorOutput { pitch_hz: None, confidence: 0.2 });
        assert_eq!(frame.pitch_hz, None);
        assert_eq!(frame.clarity, 0.2);
        assert_eq!(frame.h1h2, None);
        assert_eq!(frame.centroid_hz, Some(800.0));
    }

    #[test]
    fn test_invalid_capacity_is_rejected() {
        let mut config = AppConfig::default();
        config.transport.capacity = 1;
        assert!(matches!(
            AudioWorklet::build(&config),
            Err(TransportError::CapacityTooSmall { capacity: 1 })
        ));
    }
}
