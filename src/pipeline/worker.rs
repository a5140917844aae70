// ConsumerWorker - drains the telemetry ring on a dedicated thread
//
// Loop, every `drain_interval_ms`:
// 1. Sample ring occupancy
// 2. Take the newest brightness reading, if a channel is attached
// 3. Drain all pending frames through the TelemetryPipeline
// 4. Broadcast one TelemetryUpdate per frame
// 5. Report new overruns and advance stream time past the dropped hops
//
// Shutdown sets a flag; the loop performs a final drain before exiting so
// frames already in the ring are not lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::broadcast;

use super::{TelemetryPipeline, TelemetryUpdate};
use crate::analysis::BrightnessReading;
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::telemetry::{LifecyclePhase, TelemetryCollector};
use crate::transport::{ReadingReceiver, TelemetryConsumer, TelemetryFrame};

/// Updates buffered per subscriber before it starts lagging
const UPDATE_BUFFER: usize = 256;

/// Counters returned when the worker exits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerSummary {
    pub frames: u64,
    pub overruns: u64,
}

pub struct ConsumerWorker {
    running: Arc<AtomicBool>,
    updates: broadcast::Sender<TelemetryUpdate>,
    handle: Option<JoinHandle<WorkerSummary>>,
}

impl ConsumerWorker {
    /// Start the consumer thread
    pub fn spawn(
        consumer: TelemetryConsumer,
        brightness_rx: Option<ReadingReceiver<BrightnessReading>>,
        config: &AppConfig,
        collector: Arc<TelemetryCollector>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);

        let state = WorkerState {
            consumer,
            brightness_rx,
            pipeline: TelemetryPipeline::new(config),
            interval: Duration::from_millis(config.transport.drain_interval_ms.max(1)),
            running: Arc::clone(&running),
            updates: updates.clone(),
            collector,
            frames: Vec::with_capacity(config.transport.capacity),
            last_overruns: 0,
            processed: 0,
        };
        let handle = thread::spawn(move || state.run());

        Self {
            running,
            updates,
            handle: Some(handle),
        }
    }

    /// Receive every update published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryUpdate> {
        self.updates.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the thread after a final drain and wait for it
    pub fn shutdown(mut self) -> Result<WorkerSummary, PipelineError> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<WorkerSummary, PipelineError> {
        self.running.store(false, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| PipelineError::WorkerPanicked),
            None => Ok(WorkerSummary::default()),
        }
    }
}

impl Drop for ConsumerWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop_and_join();
        }
    }
}

struct WorkerState {
    consumer: TelemetryConsumer,
    brightness_rx: Option<ReadingReceiver<BrightnessReading>>,
    pipeline: TelemetryPipeline,
    interval: Duration,
    running: Arc<AtomicBool>,
    updates: broadcast::Sender<TelemetryUpdate>,
    collector: Arc<TelemetryCollector>,
    frames: Vec<TelemetryFrame>,
    last_overruns: u64,
    processed: u64,
}

impl WorkerState {
    fn run(mut self) -> WorkerSummary {
        tracing::info!(
            "[ConsumerWorker] Starting drain loop, interval={:?}",
            self.interval
        );
        self.collector.record_lifecycle(LifecyclePhase::WorkerStarted);

        while self.running.load(Ordering::SeqCst) {
            self.tick();
            thread::sleep(self.interval);
        }
        // Frames pushed between the last tick and the flag flip
        self.tick();

        self.collector.record_lifecycle(LifecyclePhase::WorkerStopped);
        tracing::info!(
            "[ConsumerWorker] Stopped after {} frames, {} overruns",
            self.processed,
            self.last_overruns
        );

        WorkerSummary {
            frames: self.processed,
            overruns: self.last_overruns,
        }
    }

    fn tick(&mut self) {
        let capacity = self.consumer.capacity().max(1);
        let occupancy = self.consumer.pending() as f32 / capacity as f32 * 100.0;
        self.collector
            .record_buffer_occupancy("telemetry_ring", occupancy);

        if let Some(reading) = self.brightness_rx.as_mut().and_then(|rx| rx.latest()) {
            self.pipeline.set_brightness(reading);
        }

        self.frames.clear();
        let drained = self.consumer.drain_into(&mut self.frames);
        for frame in &self.frames {
            let update = self.pipeline.process_frame(frame);
            // No subscribers is not an error
            let _ = self.updates.send(update);
        }
        self.processed += drained as u64;

        // Dropped frames are newer than everything just drained
        let total = self.consumer.overruns();
        if total > self.last_overruns {
            let dropped = total - self.last_overruns;
            tracing::warn!(
                "[ConsumerWorker] Ring overrun: {} frame(s) dropped ({} total)",
                dropped,
                total
            );
            self.collector.record_overrun(dropped, total);
            self.pipeline.skip_hops(dropped);
            self.last_overruns = total;
        }

        if drained > 0 {
            tracing::debug!(
                "[ConsumerWorker] Drained {} frame(s), occupancy {:.1}%",
                drained,
                occupancy
            );
        }
    }
}

/// Live capture wired to a consumer worker
#[cfg(feature = "capture")]
pub struct PipelineHandle {
    capture: crate::audio::CaptureEngine,
    worker: ConsumerWorker,
    collector: Arc<TelemetryCollector>,
}

#[cfg(feature = "capture")]
impl PipelineHandle {
    /// Open the default input device, build the transport at the device
    /// rate and start both threads
    ///
    /// A selected detector runs on the audio thread in place of the
    /// analyzer's own pitch estimate.
    pub fn start(
        config: &AppConfig,
        collector: Arc<TelemetryCollector>,
        selection: Option<crate::detector::Selection>,
    ) -> Result<Self, PipelineError> {
        let mut capture = crate::audio::CaptureEngine::open()?;

        let mut config = config.clone();
        config.analyzer.sample_rate = capture.sample_rate();
        let config = config.sanitized();

        let mut parts = crate::audio::AudioWorklet::build(&config)?;
        if let Some(selection) = selection {
            tracing::info!(
                "[PipelineHandle] {} detector ({})",
                selection.kind,
                selection.reason.describe()
            );
            parts.worklet.set_detector(Some(selection.detector));
        }
        let worker = ConsumerWorker::spawn(
            parts.consumer,
            Some(parts.brightness_rx),
            &config,
            Arc::clone(&collector),
        );

        capture.start(parts.worklet)?;
        collector.record_lifecycle(LifecyclePhase::CaptureStarted);

        Ok(Self {
            capture,
            worker,
            collector,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryUpdate> {
        self.worker.subscribe()
    }

    pub fn sample_rate(&self) -> u32 {
        self.capture.sample_rate()
    }

    /// Stop capture first so the worker's final drain sees every frame
    pub fn stop(mut self) -> Result<WorkerSummary, PipelineError> {
        self.capture.stop()?;
        self.collector
            .record_lifecycle(LifecyclePhase::CaptureStopped);
        self.worker.shutdown()
    }
}
