// Reading channel - bounded SPSC queue for typed audio-thread readings
//
// Wraps an rtrb ring buffer so the audio thread can hand structured values
// (brightness readings, detector outputs) to the consumer without locks.
// A full queue drops the newest value and counts it; the sender never waits.

use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Create a bounded reading channel.
///
/// # Panics
/// Panics if `capacity` is 0.
pub fn reading_channel<T>(capacity: usize) -> (ReadingSender<T>, ReadingReceiver<T>) {
    assert!(capacity > 0, "capacity must be greater than 0");
    let (producer, consumer) = RingBuffer::new(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        ReadingSender {
            producer,
            dropped: Arc::clone(&dropped),
        },
        ReadingReceiver { consumer, dropped },
    )
}

/// Audio-thread side of a reading channel.
pub struct ReadingSender<T> {
    producer: Producer<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> ReadingSender<T> {
    /// Push without blocking; returns `false` when the value was dropped.
    pub fn send(&mut self, value: T) -> bool {
        match self.producer.push(value) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer side of a reading channel.
pub struct ReadingReceiver<T> {
    consumer: Consumer<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> ReadingReceiver<T> {
    pub fn try_recv(&mut self) -> Option<T> {
        self.consumer.pop().ok()
    }

    /// Pop everything currently queued.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.consumer.slots());
        while let Ok(value) = self.consumer.pop() {
            out.push(value);
        }
        out
    }

    /// Pop everything and keep only the newest value.
    pub fn latest(&mut self) -> Option<T> {
        let mut last = None;
        while let Ok(value) = self.consumer.pop() {
            last = Some(value);
        }
        last
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_arrive_in_order() {
        let (mut tx, mut rx) = reading_channel::<u32>(4);
        assert!(tx.send(1));
        assert!(tx.send(2));
        assert_eq!(rx.drain(), vec![1, 2]);
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_full_channel_drops_newest() {
        let (mut tx, mut rx) = reading_channel::<u32>(2);
        assert!(tx.send(1));
        assert!(tx.send(2));
        assert!(!tx.send(3));
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.dropped(), 1);
        assert_eq!(rx.drain(), vec![1, 2]);
    }

    #[test]
    fn test_latest_keeps_newest() {
        let (mut tx, mut rx) = reading_channel::<u32>(8);
        for i in 0..5 {
            tx.send(i);
        }
        assert_eq!(rx.latest(), Some(4));
        assert_eq!(rx.latest(), None);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        let _ = reading_channel::<u32>(0);
    }
}
