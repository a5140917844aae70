//! Diagnostics telemetry collector.
//!
//! The collector keeps a bounded history of [`MetricEvent`]s and fans them
//! out over a tokio broadcast channel. There is no global instance: callers
//! create one and hand an `Arc<TelemetryCollector>` to the components that
//! report into it.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::detector::DetectorKind;
use crate::error::{DetectorError, ErrorCode};

pub mod events;

pub use events::{LifecyclePhase, MetricEvent};

/// Minimum change in occupancy percent before a new gauge event is emitted.
const OCCUPANCY_DEBOUNCE_PERCENT: f32 = 2.5;

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
    gauges: Mutex<HashMap<&'static str, f32>>,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity: history_capacity.max(1),
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
            gauges: Mutex::new(HashMap::new()),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = lock(&self.history);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream`; lagged receivers yield `Err` items.
    pub fn stream(&self) -> BroadcastStream<MetricEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = lock(&self.history);
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }

    pub fn record_overrun(&self, dropped: u64, total: u64) {
        if dropped > 0 {
            self.publish(MetricEvent::Overrun { dropped, total });
        }
    }

    pub fn record_detector_selected(&self, kind: DetectorKind, reason: impl Into<String>) {
        self.publish(MetricEvent::DetectorSelected {
            kind,
            reason: reason.into(),
        });
    }

    pub fn record_detector_fallback(&self, err: &DetectorError) {
        self.publish(MetricEvent::DetectorFallback {
            code: err.code(),
            message: err.message(),
        });
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.publish(MetricEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    /// Report queue fill level, skipping changes smaller than 2.5 points.
    pub fn record_buffer_occupancy(&self, channel: &'static str, percent: f32) {
        let normalized = percent.clamp(0.0, 100.0);
        let should_emit = {
            let mut gauges = lock(&self.gauges);
            let changed = gauges
                .get(channel)
                .map(|last| (last - normalized).abs() >= OCCUPANCY_DEBOUNCE_PERCENT)
                .unwrap_or(true);
            if changed {
                gauges.insert(channel, normalized);
            }
            changed
        };

        if should_emit {
            self.publish(MetricEvent::BufferOccupancy {
                channel: channel.to_string(),
                percent: normalized,
            });
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// History stays usable even if a publisher panicked mid-update.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.record_overrun(1, 1);
        collector.record_overrun(2, 3);
        collector.record_lifecycle(LifecyclePhase::WorkerStarted);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert_eq!(
            snapshot.recent[0],
            MetricEvent::Overrun {
                dropped: 1,
                total: 1
            }
        );
        assert!(matches!(
            snapshot.recent[2],
            MetricEvent::Lifecycle {
                phase: LifecyclePhase::WorkerStarted,
                ..
            }
        ));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for total in 1..=3 {
            collector.record_overrun(1, total);
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.total_events, 3);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::Overrun { total: 2, .. }
        ));
    }

    #[test]
    fn zero_overrun_is_not_reported() {
        let collector = TelemetryCollector::default();
        collector.record_overrun(0, 5);
        assert_eq!(collector.snapshot().total_events, 0);
    }

    #[test]
    fn subscribers_receive_fallback_events() {
        let collector = TelemetryCollector::default();
        let mut rx = collector.subscribe();
        collector.record_detector_fallback(&DetectorError::ModelNotFound {
            path: "pitch.onnx".to_string(),
        });

        match rx.try_recv().unwrap() {
            MetricEvent::DetectorFallback { code, message } => {
                assert_eq!(code, 4002);
                assert!(message.contains("pitch.onnx"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn buffer_gauge_debounces_small_changes() {
        let collector = TelemetryCollector::new(8, 8);
        collector.record_buffer_occupancy("ring", 10.0);
        collector.record_buffer_occupancy("ring", 10.5);
        collector.record_buffer_occupancy("ring", 25.0);

        let gauges = collector
            .snapshot()
            .recent
            .iter()
            .filter(|event| matches!(event, MetricEvent::BufferOccupancy { .. }))
            .count();
        assert_eq!(gauges, 2);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&MetricEvent::DetectorSelected {
            kind: DetectorKind::Autocorrelation,
            reason: "preferred".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"detector_selected\""));
        assert!(json.contains("\"autocorrelation\""));
    }
}
