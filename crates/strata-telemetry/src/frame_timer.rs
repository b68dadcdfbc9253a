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

//! CPU-side frame timing.

use std::time::{Duration, Instant};

use serde::Serialize;
use strata_core::frame::{FrameContext, FrameStatus, PresentStatus};

use crate::rolling_buffer::RollingBuffer;

/// One measured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSample {
    /// Frame number handed out by the scheduler.
    pub frame_number: u64,
    /// Slot the frame was recorded in.
    pub slot: usize,
    /// Time from `begin_frame` returning to `end_frame` returning.
    pub cpu_time: Duration,
    /// Whether the image reached the screen.
    pub presented: bool,
}

/// Aggregates over the current window, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameStats {
    /// Frames in the window.
    pub frames: usize,
    /// Mean frame time.
    pub average_ms: f64,
    /// Fastest frame.
    pub min_ms: f64,
    /// Slowest frame.
    pub max_ms: f64,
    /// 95th percentile frame time.
    pub p95_ms: f64,
    /// 99th percentile frame time.
    pub p99_ms: f64,
    /// Frames skipped since the timer was created.
    pub skipped: u64,
}

impl FrameStats {
    /// Serializes the stats as a JSON object.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Measures frames between [`FrameTimer::frame_started`] and [`FrameTimer::frame_ended`]
/// into a rolling window.
#[derive(Debug)]
pub struct FrameTimer {
    current: Option<(FrameContext, Instant)>,
    window: RollingBuffer<Duration>,
    last: Option<FrameSample>,
    skipped: u64,
}

impl FrameTimer {
    /// A timer keeping the last `window` frames.
    pub fn new(window: usize) -> Self {
        Self {
            current: None,
            window: RollingBuffer::new(window),
            last: None,
            skipped: 0,
        }
    }

    /// Feeds the outcome of `FrameScheduler::begin_frame`.
    pub fn frame_started(&mut self, status: &FrameStatus) {
        match status {
            FrameStatus::Ready(context) => {
                if self.current.is_some() {
                    log::warn!("FrameTimer: frame started twice, discarding the open sample");
                }
                self.current = Some((*context, Instant::now()));
            }
            FrameStatus::Skipped(reason) => {
                self.skipped += 1;
                log::trace!("FrameTimer: frame skipped ({reason:?})");
            }
        }
    }

    /// Feeds the outcome of `FrameScheduler::end_frame` and returns the closed sample.
    pub fn frame_ended(&mut self, status: &PresentStatus) -> Option<FrameSample> {
        let (context, started) = self.current.take()?;
        let sample = FrameSample {
            frame_number: context.frame_number,
            slot: context.slot,
            cpu_time: started.elapsed(),
            presented: matches!(status, PresentStatus::Presented),
        };
        self.window.push(sample.cpu_time);
        self.last = Some(sample);
        Some(sample)
    }

    /// The most recent closed sample.
    pub fn last_sample(&self) -> Option<FrameSample> {
        self.last
    }

    /// Aggregates over the window, `None` before the first closed frame.
    pub fn stats(&self) -> Option<FrameStats> {
        let to_ms = |d: Duration| d.as_secs_f64() * 1000.0;
        Some(FrameStats {
            frames: self.window.len(),
            average_ms: to_ms(self.window.average()),
            min_ms: to_ms(self.window.min()?),
            max_ms: to_ms(self.window.max()?),
            p95_ms: to_ms(self.window.percentile(95.0)?),
            p99_ms: to_ms(self.window.percentile(99.0)?),
            skipped: self.skipped,
        })
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::frame::SkipReason;
    use strata_core::renderer::api::{Extent2d, TextureViewId};

    fn ready(frame_number: u64, slot: usize) -> FrameStatus {
        FrameStatus::Ready(FrameContext {
            slot,
            frame_number,
            target: TextureViewId(1),
            extent: Extent2d::new(8, 8),
            suboptimal: false,
        })
    }

    #[test]
    fn samples_carry_the_frame_identity() {
        let mut timer = FrameTimer::new(4);

        timer.frame_started(&ready(7, 1));
        let sample = timer.frame_ended(&PresentStatus::Presented).unwrap();

        assert_eq!(sample.frame_number, 7);
        assert_eq!(sample.slot, 1);
        assert!(sample.presented);
        assert_eq!(timer.last_sample(), Some(sample));
        assert_eq!(timer.stats().unwrap().frames, 1);
    }

    #[test]
    fn skipped_frames_are_counted_not_timed() {
        let mut timer = FrameTimer::default();

        timer.frame_started(&FrameStatus::Skipped(SkipReason::Minimized));

        assert_eq!(timer.frame_ended(&PresentStatus::Presented), None);
        assert_eq!(timer.stats(), None);

        timer.frame_started(&ready(0, 0));
        timer.frame_ended(&PresentStatus::Skipped(SkipReason::Outdated));
        let stats = timer.stats().unwrap();
        assert_eq!(stats.skipped, 1);
        assert!(!timer.last_sample().unwrap().presented);
    }

    #[test]
    fn stats_serialize_to_json() {
        let mut timer = FrameTimer::new(2);
        timer.frame_started(&ready(0, 0));
        timer.frame_ended(&PresentStatus::Presented);

        let json = timer.stats().unwrap().to_json().unwrap();

        assert!(json.contains("\"average_ms\""));
        assert!(json.contains("\"skipped\":0"));
    }
}
