// Bounded median filter for raw pitch values
//
// Suppresses single-hop octave errors before the Kalman stage. The window is
// a FIFO of the most recent values; the median is taken over a scratch copy
// so the FIFO order is preserved.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct MedianFilter {
    window: VecDeque<f32>,
    capacity: usize,
    scratch: Vec<f32>,
}

impl MedianFilter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            scratch: Vec::with_capacity(capacity),
        }
    }

    /// Push a value, evicting the oldest when full, and return the new median
    pub fn push(&mut self, value: f32) -> f32 {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
        self.median().unwrap_or(value)
    }

    /// Median of the current window; even counts average the middle pair
    pub fn median(&mut self) -> Option<f32> {
        if self.window.is_empty() {
            return None;
        }
        self.scratch.clear();
        self.scratch.extend(self.window.iter().copied());
        self.scratch.sort_by(f32::total_cmp);

        let mid = self.scratch.len() / 2;
        if self.scratch.len() % 2 == 1 {
            Some(self.scratch[mid])
        } else {
            Some(0.5 * (self.scratch[mid - 1] + self.scratch[mid]))
        }
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window contents, oldest first
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.window.iter().copied()
    }
}
