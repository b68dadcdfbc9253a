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

//! Immediate-mode debug primitives, collected per frame slot for an overlay renderer.

use glam::{Vec3, Vec4};

/// A world-space line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugLine {
    /// Start point.
    pub start: Vec3,
    /// End point.
    pub end: Vec3,
    /// Linear RGBA colour.
    pub color: Vec4,
}

/// A text label anchored at a world-space position.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugText {
    /// Anchor.
    pub position: Vec3,
    /// Label content.
    pub text: String,
    /// Linear RGBA colour.
    pub color: Vec4,
}

#[derive(Debug, Default)]
struct SlotSubmissions {
    lines: Vec<DebugLine>,
    texts: Vec<DebugText>,
}

/// Debug submissions of every frame slot.
///
/// Submissions go to the slot currently recording and are cleared when that slot
/// begins its next frame.
#[derive(Debug)]
pub struct DebugDraw {
    slots: Vec<SlotSubmissions>,
    active: usize,
}

impl DebugDraw {
    /// Creates storage for `frames_in_flight` slots.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            slots: (0..frames_in_flight.max(1))
                .map(|_| SlotSubmissions::default())
                .collect(),
            active: 0,
        }
    }

    /// Makes `slot` the target of new submissions and clears its previous content.
    pub fn begin_slot(&mut self, slot: usize) {
        self.active = slot % self.slots.len();
        let submissions = &mut self.slots[self.active];
        submissions.lines.clear();
        submissions.texts.clear();
    }

    /// Adds a line to the active slot.
    pub fn line(&mut self, start: Vec3, end: Vec3, color: Vec4) {
        self.slots[self.active]
            .lines
            .push(DebugLine { start, end, color });
    }

    /// Adds the twelve edges of an axis-aligned box.
    pub fn aabb(&mut self, min: Vec3, max: Vec3, color: Vec4) {
        let corner = |i: usize| {
            Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        };
        for i in 0..8 {
            for axis in [1, 2, 4] {
                if i & axis == 0 {
                    self.line(corner(i), corner(i | axis), color);
                }
            }
        }
    }

    /// Adds a text label to the active slot.
    pub fn text(&mut self, position: Vec3, text: impl Into<String>, color: Vec4) {
        self.slots[self.active].texts.push(DebugText {
            position,
            text: text.into(),
            color,
        });
    }

    /// Lines submitted for `slot`.
    pub fn lines(&self, slot: usize) -> &[DebugLine] {
        &self.slots[slot % self.slots.len()].lines
    }

    /// Texts submitted for `slot`.
    pub fn texts(&self, slot: usize) -> &[DebugText] {
        &self.slots[slot % self.slots.len()].texts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submissions_are_cleared_when_slot_begins_again() {
        let mut debug = DebugDraw::new(2);
        debug.begin_slot(0);
        debug.line(Vec3::ZERO, Vec3::X, Vec4::ONE);
        debug.text(Vec3::Y, "origin", Vec4::ONE);
        debug.begin_slot(1);
        debug.line(Vec3::ZERO, Vec3::Y, Vec4::ONE);

        assert_eq!(debug.lines(0).len(), 1);
        assert_eq!(debug.texts(0)[0].text, "origin");
        assert_eq!(debug.lines(1).len(), 1);

        debug.begin_slot(0);
        assert!(debug.lines(0).is_empty());
        assert!(debug.texts(0).is_empty());
        assert_eq!(debug.lines(1).len(), 1);
    }

    #[test]
    fn aabb_emits_twelve_edges() {
        let mut debug = DebugDraw::new(1);
        debug.aabb(Vec3::ZERO, Vec3::ONE, Vec4::ONE);
        let lines = debug.lines(0);
        assert_eq!(lines.len(), 12);
        for line in lines {
            assert!((line.end - line.start).length() == 1.0);
        }
    }
}
