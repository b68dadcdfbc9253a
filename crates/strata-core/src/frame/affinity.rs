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

use std::thread::{self, ThreadId};

/// Records the thread that owns a render-side subsystem.
///
/// Checks are debug assertions only; release builds rely on the single-owner
/// structure of the frame loop.
#[derive(Debug, Clone, Copy)]
pub struct ThreadAffinity {
    owner: ThreadId,
}

impl ThreadAffinity {
    /// Binds to the calling thread.
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    /// Moves ownership to the calling thread, e.g. after handing the renderer to
    /// a dedicated render thread.
    pub fn rebind_to_current(&mut self) {
        self.owner = thread::current().id();
    }

    /// Returns `true` when called from the owning thread.
    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Debug-asserts that the caller is the owning thread.
    #[inline]
    #[track_caller]
    pub fn check(&self, operation: &str) {
        debug_assert!(
            self.is_owner(),
            "{operation} called off the render thread ({:?} != {:?})",
            thread::current().id(),
            self.owner
        );
    }
}
