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

//! Batching of consecutive draws into a single pass.

/// Identifies a render pass target within a frame (e.g. depth prepass, scene, overlay).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassId(pub u32);

/// What the recorder must do before issuing the next draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTransition {
    /// The requested pass is already open.
    Continue,
    /// No pass is open; open the requested one.
    Open(PassId),
    /// Close the open pass, then open the requested one.
    Switch {
        /// Pass to end.
        close: PassId,
        /// Pass to begin.
        open: PassId,
    },
}

/// Counters of the pass transitions of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Passes opened.
    pub opens: usize,
    /// Passes closed.
    pub closes: usize,
    /// Draws that reused an already open pass.
    pub batched: usize,
}

/// Tracks the open pass of the current frame.
#[derive(Debug, Default)]
pub struct PassTracker {
    open: Option<PassId>,
    stats: PassStats,
}

impl PassTracker {
    /// Creates a tracker with no open pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that the next draw targets `pass`.
    pub fn request(&mut self, pass: PassId) -> PassTransition {
        match self.open {
            Some(open) if open == pass => {
                self.stats.batched += 1;
                PassTransition::Continue
            }
            Some(open) => {
                self.stats.closes += 1;
                self.stats.opens += 1;
                self.open = Some(pass);
                PassTransition::Switch { close: open, open: pass }
            }
            None => {
                self.stats.opens += 1;
                self.open = Some(pass);
                PassTransition::Open(pass)
            }
        }
    }

    /// Closes the open pass, if any.
    pub fn close(&mut self) -> Option<PassId> {
        let closed = self.open.take();
        if closed.is_some() {
            self.stats.closes += 1;
        }
        closed
    }

    /// The open pass.
    pub fn open_pass(&self) -> Option<PassId> {
        self.open
    }

    /// Counters since the last reset.
    pub fn stats(&self) -> PassStats {
        self.stats
    }

    /// Closes any open pass and returns the frame's counters, starting a new frame.
    pub fn finish_frame(&mut self) -> PassStats {
        self.close();
        std::mem::take(&mut self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTH: PassId = PassId(0);
    const SCENE: PassId = PassId(1);

    #[test]
    fn consecutive_draws_share_a_pass() {
        let mut tracker = PassTracker::new();
        assert_eq!(tracker.request(SCENE), PassTransition::Open(SCENE));
        assert_eq!(tracker.request(SCENE), PassTransition::Continue);
        assert_eq!(tracker.request(SCENE), PassTransition::Continue);

        let stats = tracker.finish_frame();
        assert_eq!(stats, PassStats { opens: 1, closes: 1, batched: 2 });
    }

    #[test]
    fn changing_target_closes_and_opens() {
        let mut tracker = PassTracker::new();
        tracker.request(DEPTH);
        assert_eq!(
            tracker.request(SCENE),
            PassTransition::Switch { close: DEPTH, open: SCENE }
        );
        tracker.request(DEPTH);

        let stats = tracker.finish_frame();
        assert_eq!(stats.opens, 3);
        assert_eq!(stats.closes, 3);
        assert_eq!(tracker.open_pass(), None);
        assert_eq!(tracker.stats(), PassStats::default());
    }

    #[test]
    fn closing_without_a_pass_is_silent() {
        let mut tracker = PassTracker::new();
        assert_eq!(tracker.close(), None);
        assert_eq!(tracker.stats().closes, 0);
    }
}
