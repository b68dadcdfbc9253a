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

//! Provides the public, backend-agnostic rendering contracts.
//!
//! This module defines the "common language" for every device operation: the abstract
//! `traits` (like [`GraphicsDevice`]), the descriptors and opaque ids of the `api`
//! module, and the error types. A concrete backend (the wgpu backend in `strata-infra`,
//! or the in-memory [`headless`] device) implements these traits; the frame subsystems
//! only ever talk to the traits.

pub mod api;
pub mod error;
pub mod headless;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{PipelineError, ResourceError, ShaderError, SurfaceError};
pub use self::traits::{
    CommandEncoder, ComputePass, GraphicsDevice, PresentationSurface, RenderPass,
};
