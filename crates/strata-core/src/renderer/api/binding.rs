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

//! Defines data structures for bind groups and bind group layouts.
//!
//! Bind groups are the mechanism for binding resources (buffers, textures, samplers)
//! to shaders. They abstract over the binding models of the different graphics APIs
//! (descriptor sets in Vulkan, bind groups in WebGPU).
//!
//! The shader layer hands the engine one [`StageBindings`] per compiled stage: the
//! reflected `(set, binding, type, count)` declarations the stage reads. The pipeline
//! cache merges those into one layout per set.

use super::flags::{ShaderStage, ShaderStageFlags};
use super::resource::{BufferId, SamplerId, TextureFormat, TextureViewId};
use std::num::NonZeroU64;

/// Maximum number of binding sets a pipeline may address.
pub const MAX_BINDING_SETS: usize = 4;

/// An opaque handle to a bind group layout resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindGroupLayoutId(pub usize);

/// An opaque handle to a bind group resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindGroupId(pub usize);

/// The type of texture sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSampleType {
    /// A floating-point texture sample.
    Float {
        /// Whether the texture can be filtered.
        filterable: bool,
    },
    /// A depth texture sample.
    Depth,
    /// An unsigned integer texture sample.
    Uint,
}

/// The type of sampler binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerBindingType {
    /// A filtering sampler.
    Filtering,
    /// A non-filtering sampler.
    NonFiltering,
    /// A comparison sampler.
    Comparison,
}

/// The type of resource bound at a binding point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// A uniform buffer.
    UniformBuffer,
    /// A storage buffer.
    StorageBuffer {
        /// Whether the buffer is read-only in the shader.
        read_only: bool,
    },
    /// A 2D texture read through `textureLoad`/sampling.
    Texture {
        /// The kind of values the texture yields.
        sample_type: TextureSampleType,
        /// Whether the texture is multisampled.
        multisampled: bool,
    },
    /// A write-only 2D storage texture.
    StorageTexture {
        /// The texel format written by the shader.
        format: TextureFormat,
    },
    /// A sampler.
    Sampler(SamplerBindingType),
}

/// Describes a single binding entry in a bind group layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindGroupLayoutEntry {
    /// The binding index (e.g., `@binding(0)` in WGSL).
    pub binding: u32,
    /// Which shader stages can access this binding.
    pub visibility: ShaderStageFlags,
    /// The type of resource being bound.
    pub ty: BindingType,
    /// Array element count; 1 for a single resource.
    pub count: u32,
}

/// Describes a bind group layout to be created.
#[derive(Debug, Clone)]
pub struct BindGroupLayoutDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// The entries in this bind group layout. May be empty.
    pub entries: &'a [BindGroupLayoutEntry],
}

/// Describes a buffer binding with offset and size.
#[derive(Debug, Clone, Copy)]
pub struct BufferBinding {
    /// The buffer to bind.
    pub buffer: BufferId,
    /// Offset into the buffer in bytes.
    pub offset: u64,
    /// Size of the binding, or None to bind from offset to end of buffer.
    pub size: Option<NonZeroU64>,
}

/// Describes a single resource binding in a bind group.
#[derive(Debug, Clone, Copy)]
pub enum BindingResource {
    /// Binds a buffer range.
    Buffer(BufferBinding),
    /// Binds a texture view.
    TextureView(TextureViewId),
    /// Binds a sampler.
    Sampler(SamplerId),
}

/// A single entry in a bind group.
#[derive(Debug, Clone, Copy)]
pub struct BindGroupEntry {
    /// The binding index.
    pub binding: u32,
    /// The resource to bind.
    pub resource: BindingResource,
}

impl BindGroupEntry {
    /// Binds a whole buffer.
    pub fn buffer(binding: u32, buffer: BufferId) -> Self {
        Self {
            binding,
            resource: BindingResource::Buffer(BufferBinding {
                buffer,
                offset: 0,
                size: None,
            }),
        }
    }

    /// Binds a texture view.
    pub fn view(binding: u32, view: TextureViewId) -> Self {
        Self {
            binding,
            resource: BindingResource::TextureView(view),
        }
    }
}

/// Describes a bind group to be created.
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// The layout this bind group conforms to.
    pub layout: BindGroupLayoutId,
    /// The resources to bind at each binding point.
    pub entries: &'a [BindGroupEntry],
}

/// One reflected binding declared by a shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingDeclaration {
    /// Binding set (descriptor set / bind group index).
    pub set: u32,
    /// Binding slot inside the set.
    pub binding: u32,
    /// Resource type expected at the slot.
    pub ty: BindingType,
    /// Array element count.
    pub count: u32,
}

impl BindingDeclaration {
    /// A single (non-array) binding.
    pub const fn new(set: u32, binding: u32, ty: BindingType) -> Self {
        Self {
            set,
            binding,
            ty,
            count: 1,
        }
    }
}

/// The reflected binding declarations of one compiled shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageBindings {
    /// The stage the declarations belong to.
    pub stage: ShaderStage,
    /// Declared bindings, in any order.
    pub declarations: Vec<BindingDeclaration>,
}

impl StageBindings {
    /// Creates the declarations of `stage`.
    pub fn new(stage: ShaderStage, declarations: Vec<BindingDeclaration>) -> Self {
        Self {
            stage,
            declarations,
        }
    }
}
