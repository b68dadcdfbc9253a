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

//! Backend-agnostic rendering API.
//!
//! Organized into several logical sub-modules:
//!
//! - **[`flags`]**: Bit-set types (usages, shader stage visibility).
//! - **[`resource`]**: GPU handles (Buffer, Texture, View, Sampler) and their descriptors.
//! - **[`binding`]**: Bind group layouts, bind groups and reflected binding declarations.
//! - **[`pipeline`]**: Render-state enums, shader modules and pipeline descriptors.
//! - **[`command`]**: Command buffers, submissions and pass descriptors.
//! - **[`gpu_resource`]**: The closed set of destroyable device objects.

pub mod binding;
pub mod command;
pub mod flags;
pub mod gpu_resource;
pub mod pipeline;
pub mod resource;

pub use self::binding::*;
pub use self::command::*;
pub use self::flags::*;
pub use self::gpu_resource::GpuResource;
pub use self::pipeline::*;
pub use self::resource::*;
