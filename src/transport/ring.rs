// TelemetryRing - lock-free header + payload ring for per-hop telemetry
//
// Layout mirrors a shared-memory buffer: a four-word header followed by a
// payload of fixed-width f32 records stored as raw bits in AtomicU32 slots.
//
// Header words:
// - WRITE: next slot the producer fills (written only by the producer)
// - READ: next slot the consumer drains (written only by the consumer)
// - SLOTS: physical slot count (usable capacity + 1)
// - STATE: INIT or READY
//
// One physical slot is kept as slack so that `read == write` always means
// empty and a ring holding `capacity` frames is distinguishable from it.
// When the ring is full the producer drops the new frame and bumps the
// overrun counter; it never overwrites a slot the consumer may be reading.
//
// Single-writer discipline is enforced by ownership: `split()` hands out one
// `TelemetryProducer` and one `TelemetryConsumer`, neither of which is Clone.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use super::frame::{TelemetryFrame, VALUES_PER_FRAME};
use crate::error::TransportError;

const WRITE: usize = 0;
const READ: usize = 1;
const SLOTS: usize = 2;
const STATE: usize = 3;
const HEADER_WORDS: usize = 4;

/// Largest usable capacity; keeps `write + slots` inside u32 index math
pub const MAX_CAPACITY: usize = (u32::MAX / 2) as usize - 1;

const STATE_INIT: u32 = 0;
const STATE_READY: u32 = 1;

/// Layout state published in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingState {
    Init,
    Ready,
}

struct RingShared {
    header: [AtomicU32; HEADER_WORDS],
    payload: Box<[AtomicU32]>,
    overruns: AtomicU64,
}

impl RingShared {
    fn slots(&self) -> u32 {
        self.header[SLOTS].load(Ordering::Relaxed)
    }

    fn state(&self) -> RingState {
        match self.header[STATE].load(Ordering::Acquire) {
            STATE_READY => RingState::Ready,
            _ => RingState::Init,
        }
    }

    fn pending(&self) -> usize {
        let slots = self.slots();
        let write = self.header[WRITE].load(Ordering::Acquire);
        let read = self.header[READ].load(Ordering::Acquire);
        ((write + slots - read) % slots) as usize
    }
}

/// Owner of a ring before it is split between threads.
pub struct TelemetryRing {
    shared: Arc<RingShared>,
}

impl TelemetryRing {
    /// Create a ring holding up to `capacity` frames.
    ///
    /// # Errors
    /// `CapacityTooSmall` when `capacity < 2`, `CapacityTooLarge` above
    /// [`MAX_CAPACITY`], `InvalidRecordWidth` when `values_per_frame` differs
    /// from the frame layout.
    pub fn new(capacity: usize, values_per_frame: usize) -> Result<Self, TransportError> {
        if capacity < 2 {
            return Err(TransportError::CapacityTooSmall { capacity });
        }
        if capacity > MAX_CAPACITY {
            return Err(TransportError::CapacityTooLarge {
                capacity,
                max: MAX_CAPACITY,
            });
        }
        if values_per_frame != VALUES_PER_FRAME {
            return Err(TransportError::InvalidRecordWidth {
                width: values_per_frame,
            });
        }

        let slots = capacity + 1;
        let payload = (0..slots * VALUES_PER_FRAME)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let shared = RingShared {
            header: [
                AtomicU32::new(0),
                AtomicU32::new(0),
                AtomicU32::new(slots as u32),
                AtomicU32::new(STATE_INIT),
            ],
            payload,
            overruns: AtomicU64::new(0),
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Usable capacity in frames.
    pub fn capacity(&self) -> usize {
        self.shared.slots() as usize - 1
    }

    pub fn state(&self) -> RingState {
        self.shared.state()
    }

    /// Zero both indices and the overrun counter, and return to `Init`.
    ///
    /// Requires exclusive ownership, so neither side can be mid-operation.
    pub fn reset(&mut self) {
        self.shared.header[STATE].store(STATE_INIT, Ordering::Release);
        self.shared.header[WRITE].store(0, Ordering::Release);
        self.shared.header[READ].store(0, Ordering::Release);
        self.shared.overruns.store(0, Ordering::Relaxed);
    }

    /// Publish that the layout is valid for the consumer.
    pub fn mark_ready(&mut self) {
        self.shared.header[STATE].store(STATE_READY, Ordering::Release);
    }

    /// Hand out the producer and consumer halves.
    pub fn split(self) -> (TelemetryProducer, TelemetryConsumer) {
        (
            TelemetryProducer {
                shared: Arc::clone(&self.shared),
            },
            TelemetryConsumer {
                shared: self.shared,
            },
        )
    }

    /// Rejoin both halves (e.g. to reset on stream restart).
    ///
    /// Returns the halves unchanged when they belong to different rings.
    pub fn reunite(
        producer: TelemetryProducer,
        consumer: TelemetryConsumer,
    ) -> Result<Self, (TelemetryProducer, TelemetryConsumer)> {
        if Arc::ptr_eq(&producer.shared, &consumer.shared) {
            drop(producer);
            Ok(Self {
                shared: consumer.shared,
            })
        } else {
            Err((producer, consumer))
        }
    }
}

/// Audio-thread half: advances only the write index.
pub struct TelemetryProducer {
    shared: Arc<RingShared>,
}

impl TelemetryProducer {
    /// Append a frame without blocking or allocating.
    ///
    /// Returns `false` (and counts an overrun) when the ring is full.
    pub fn push(&mut self, frame: &TelemetryFrame) -> bool {
        let shared = &*self.shared;
        let slots = shared.slots();
        let write = shared.header[WRITE].load(Ordering::Relaxed);
        let read = shared.header[READ].load(Ordering::Acquire);
        let next = (write + 1) % slots;

        if next == read {
            shared.overruns.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let base = write as usize * VALUES_PER_FRAME;
        for (offset, value) in frame.encode().iter().enumerate() {
            shared.payload[base + offset].store(value.to_bits(), Ordering::Relaxed);
        }

        shared.header[WRITE].store(next, Ordering::Release);
        true
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots() as usize - 1
    }

    /// Frames dropped because the consumer fell behind.
    pub fn overruns(&self) -> u64 {
        self.shared.overruns.load(Ordering::Relaxed)
    }
}

/// Consumer-thread half: advances only the read index.
pub struct TelemetryConsumer {
    shared: Arc<RingShared>,
}

impl TelemetryConsumer {
    /// Decode every frame between the read and write indices.
    ///
    /// Never blocks; returns an empty list when the ring is empty or the
    /// layout is not yet ready.
    pub fn drain(&mut self) -> Vec<TelemetryFrame> {
        let mut frames = Vec::with_capacity(self.pending());
        self.drain_into(&mut frames);
        frames
    }

    /// Append drained frames to `out`, returning how many were added.
    pub fn drain_into(&mut self, out: &mut Vec<TelemetryFrame>) -> usize {
        let shared = &*self.shared;
        if shared.state() != RingState::Ready {
            return 0;
        }

        let slots = shared.slots();
        let write = shared.header[WRITE].load(Ordering::Acquire);
        let mut read = shared.header[READ].load(Ordering::Relaxed);
        let mut drained = 0;

        while read != write {
            let base = read as usize * VALUES_PER_FRAME;
            let mut values = [0.0_f32; VALUES_PER_FRAME];
            for (offset, value) in values.iter_mut().enumerate() {
                *value = f32::from_bits(shared.payload[base + offset].load(Ordering::Relaxed));
            }
            out.push(TelemetryFrame::decode(&values));
            read = (read + 1) % slots;
            drained += 1;
        }

        shared.header[READ].store(read, Ordering::Release);
        drained
    }

    /// Frames currently waiting to be drained.
    pub fn pending(&self) -> usize {
        self.shared.pending()
    }

    pub fn state(&self) -> RingState {
        self.shared.state()
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots() as usize - 1
    }

    /// Frames dropped because the consumer fell behind.
    pub fn overruns(&self) -> u64 {
        self.shared.overruns.load(Ordering::Relaxed)
    }
}
