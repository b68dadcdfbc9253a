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

//! # Strata Core
//!
//! Backend-agnostic GPU frame lifecycle. This crate defines the device contracts
//! (see [`renderer::traits`]) and the subsystems that sit on top of them:
//!
//! - [`frame::ResourceGraveyard`]: deferred destruction keyed by in-flight frame slot.
//! - [`frame::StagingAllocator`]: per-frame transient upload chunks.
//! - [`pipeline::PipelineStateCache`]: ordered-key cache of compiled state objects.
//! - [`frame::FrameScheduler`]: the N-buffered acquire/record/submit/present loop.
//! - [`culling::DepthPyramidCuller`]: Hi-Z occlusion culling with same-frame readback.
//!
//! Concrete backends live in `strata-infra`; [`renderer::headless`] provides an
//! in-memory device used by the test suites.

#![warn(missing_docs)]

pub mod config;
pub mod culling;
pub mod draw_params;
pub mod frame;
pub mod pipeline;
pub mod renderer;

pub use config::RendererConfig;
pub use renderer::{GraphicsDevice, PresentationSurface};
