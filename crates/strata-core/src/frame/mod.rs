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

//! Per-frame lifecycle: slot rotation, deferred destruction and transient memory.
//!
//! The [`FrameScheduler`] owns one of each subsystem and drives them from the
//! render thread. The subsystems are usable on their own as long as the caller
//! upholds the same ordering: wait for a slot's previous submission, then recycle
//! that slot.

mod affinity;
mod debug_draw;
mod graveyard;
mod pass_tracker;
mod scheduler;
mod staging;

pub use self::affinity::ThreadAffinity;
pub use self::debug_draw::{DebugDraw, DebugLine, DebugText};
pub use self::graveyard::{ResourceGraveyard, RetireSender, RetiredResource};
pub use self::pass_tracker::{PassId, PassStats, PassTracker, PassTransition};
pub use self::scheduler::{
    FrameContext, FrameError, FrameScheduler, FrameStatus, PresentStatus, SizeDependent, SkipReason,
    SlotState,
};
pub use self::staging::{align_up, StagingAllocator, StagingChunk, StagingError, StagingSlice};
