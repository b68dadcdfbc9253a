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

//! An in-memory implementation of the device contracts.
//!
//! The headless device executes buffer writes and copies for real, records every
//! other command, and keeps an ordered event log of submissions, completion
//! observations and destructions. Tests use it to check frame-lifecycle properties
//! (destruction lag, zero leaks, use-after-free) without a GPU.
//!
//! Submissions complete immediately by default. Switch to manual completion with
//! [`HeadlessDevice::set_auto_complete`] to model a GPU that lags behind the CPU.

mod device;
mod encoder;
mod surface;

pub use self::device::{DeviceEvent, HeadlessDevice, HeadlessStats, ObjectKind};
pub use self::encoder::{HeadlessCommandEncoder, RecordedCommand};
pub use self::surface::HeadlessSurface;
