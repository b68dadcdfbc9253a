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

//! Logging initialisation and frame timing for the strata frame lifecycle.

#![warn(missing_docs)]

pub mod frame_timer;
pub mod logging;
pub mod rolling_buffer;

pub use frame_timer::{FrameSample, FrameStats, FrameTimer};
pub use logging::LoggingConfig;
pub use rolling_buffer::RollingBuffer;
