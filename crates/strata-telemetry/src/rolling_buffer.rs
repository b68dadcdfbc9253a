// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-capacity storage for rolling frame metrics.

use std::time::Duration;

/// A circular buffer of samples, overwriting the oldest once full.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    index: usize,
}

impl<T: Copy> RollingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            index: 0,
        }
    }

    /// Pushes a new value into the buffer, overwriting the oldest if full.
    pub fn push(&mut self, value: T) {
        if self.data.len() < self.capacity {
            self.data.push(value);
        } else {
            self.data[self.index] = value;
        }
        self.index = (self.index + 1) % self.capacity;
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no sample was pushed yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recent sample.
    pub fn latest(&self) -> Option<T> {
        if self.data.is_empty() {
            return None;
        }
        let newest = (self.index + self.capacity - 1) % self.capacity;
        self.data.get(newest).copied()
    }

    /// Values in chronological order (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let split = if self.data.len() < self.capacity { 0 } else { self.index };
        let (left, right) = self.data.split_at(split);
        right.iter().chain(left.iter())
    }

    /// Drops every sample.
    pub fn clear(&mut self) {
        self.data.clear();
        self.index = 0;
    }
}

impl RollingBuffer<Duration> {
    /// Arithmetic mean, zero when empty.
    pub fn average(&self) -> Duration {
        if self.data.is_empty() {
            return Duration::ZERO;
        }
        self.data.iter().sum::<Duration>() / self.data.len() as u32
    }

    /// Shortest sample.
    pub fn min(&self) -> Option<Duration> {
        self.data.iter().min().copied()
    }

    /// Longest sample.
    pub fn max(&self) -> Option<Duration> {
        self.data.iter().max().copied()
    }

    /// Nearest-rank percentile, `p` in `[0, 100]`.
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.data.is_empty() {
            return None;
        }
        let mut sorted = self.data.clone();
        sorted.sort_unstable();
        let rank = ((p.clamp(0.0, 100.0) / 100.0) * sorted.len() as f64).ceil() as usize;
        Some(sorted[rank.clamp(1, sorted.len()) - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn average_follows_the_window() {
        let mut buffer = RollingBuffer::new(3);

        buffer.push(ms(10));
        assert_eq!(buffer.average(), ms(10));

        buffer.push(ms(20));
        assert_eq!(buffer.average(), ms(15));

        buffer.push(ms(30));
        assert_eq!(buffer.average(), ms(20));

        // Should wrap around
        buffer.push(ms(40));
        assert_eq!(buffer.average(), ms(30));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn iteration_is_chronological_after_wrapping() {
        let mut buffer = RollingBuffer::new(3);
        for value in 1..=5u32 {
            buffer.push(value);
        }
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(buffer.latest(), Some(5));
    }

    #[test]
    fn extremes_and_percentiles() {
        let mut buffer = RollingBuffer::new(100);
        for value in 1..=100 {
            buffer.push(ms(value));
        }
        assert_eq!(buffer.min(), Some(ms(1)));
        assert_eq!(buffer.max(), Some(ms(100)));
        assert_eq!(buffer.percentile(50.0), Some(ms(50)));
        assert_eq!(buffer.percentile(95.0), Some(ms(95)));
        assert_eq!(buffer.percentile(0.0), Some(ms(1)));
        assert_eq!(buffer.percentile(100.0), Some(ms(100)));
    }

    #[test]
    fn empty_buffer_reports_nothing() {
        let buffer: RollingBuffer<Duration> = RollingBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.average(), Duration::ZERO);
        assert_eq!(buffer.percentile(99.0), None);
        assert_eq!(buffer.latest(), None);
    }
}
