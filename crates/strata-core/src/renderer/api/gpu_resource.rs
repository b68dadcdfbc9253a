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

//! The closed set of device objects that can be retired and destroyed.

use super::binding::{BindGroupId, BindGroupLayoutId};
use super::pipeline::{ComputePipelineId, PipelineLayoutId, RenderPipelineId, ShaderModuleId};
use super::resource::{BufferId, SamplerId, TextureId, TextureViewId};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;

/// Any device-owned object.
///
/// Application code never destroys these directly; they are handed to the
/// [`ResourceGraveyard`](crate::frame::ResourceGraveyard), which calls
/// [`GpuResource::destroy`] once no in-flight frame can reference them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResource {
    /// A buffer.
    Buffer(BufferId),
    /// A texture.
    Texture(TextureId),
    /// A texture view.
    TextureView(TextureViewId),
    /// A sampler.
    Sampler(SamplerId),
    /// A shader module.
    ShaderModule(ShaderModuleId),
    /// A bind group layout.
    BindGroupLayout(BindGroupLayoutId),
    /// A bind group.
    BindGroup(BindGroupId),
    /// A pipeline layout.
    PipelineLayout(PipelineLayoutId),
    /// A graphics pipeline.
    RenderPipeline(RenderPipelineId),
    /// A compute pipeline.
    ComputePipeline(ComputePipelineId),
}

impl GpuResource {
    /// Destroys the object on `device`.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        match self {
            GpuResource::Buffer(id) => device.destroy_buffer(id),
            GpuResource::Texture(id) => device.destroy_texture(id),
            GpuResource::TextureView(id) => device.destroy_texture_view(id),
            GpuResource::Sampler(id) => device.destroy_sampler(id),
            GpuResource::ShaderModule(id) => device.destroy_shader_module(id),
            GpuResource::BindGroupLayout(id) => device.destroy_bind_group_layout(id),
            GpuResource::BindGroup(id) => device.destroy_bind_group(id),
            GpuResource::PipelineLayout(id) => device.destroy_pipeline_layout(id),
            GpuResource::RenderPipeline(id) => device.destroy_render_pipeline(id),
            GpuResource::ComputePipeline(id) => device.destroy_compute_pipeline(id),
        }
    }

    /// Short name of the object kind, for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            GpuResource::Buffer(_) => "buffer",
            GpuResource::Texture(_) => "texture",
            GpuResource::TextureView(_) => "texture view",
            GpuResource::Sampler(_) => "sampler",
            GpuResource::ShaderModule(_) => "shader module",
            GpuResource::BindGroupLayout(_) => "bind group layout",
            GpuResource::BindGroup(_) => "bind group",
            GpuResource::PipelineLayout(_) => "pipeline layout",
            GpuResource::RenderPipeline(_) => "render pipeline",
            GpuResource::ComputePipeline(_) => "compute pipeline",
        }
    }
}

macro_rules! impl_from_id {
    ($($id:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$id> for GpuResource {
                fn from(id: $id) -> Self {
                    GpuResource::$variant(id)
                }
            }
        )*
    };
}

impl_from_id! {
    BufferId => Buffer,
    TextureId => Texture,
    TextureViewId => TextureView,
    SamplerId => Sampler,
    ShaderModuleId => ShaderModule,
    BindGroupLayoutId => BindGroupLayout,
    BindGroupId => BindGroup,
    PipelineLayoutId => PipelineLayout,
    RenderPipelineId => RenderPipeline,
    ComputePipelineId => ComputePipeline,
}
