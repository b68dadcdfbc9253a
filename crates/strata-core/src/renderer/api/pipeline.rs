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

//! Render-state enums, shader modules and pipeline descriptors.

use super::binding::BindGroupLayoutId;
use super::resource::TextureFormat;
use std::borrow::Cow;

/// An opaque handle to a compiled shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderModuleId(pub usize);

/// An opaque handle to a pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipelineLayoutId(pub usize);

/// An opaque handle to a compiled graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderPipelineId(pub usize);

/// An opaque handle to a compiled compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComputePipelineId(pub usize);

/// The source of a shader module, as produced by the shader layer.
#[derive(Debug, Clone)]
pub enum ShaderSource<'a> {
    /// WGSL source text.
    Wgsl(Cow<'a, str>),
}

/// A descriptor used to create a [`ShaderModuleId`].
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// The shader code.
    pub source: ShaderSource<'a>,
}

/// Colour blending preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum BlendMode {
    /// Source replaces destination.
    #[default]
    Disabled,
    /// `src + dst` on colour and alpha.
    Additive,
    /// Classic `src * a + dst * (1 - a)`.
    AlphaBlend,
    /// `src + dst * (1 - a)` with premultiplied colour.
    PreMultiplied,
    /// Depth/stencil only: colour writes are masked off.
    NoColorWrites,
    /// Premultiplied blending that leaves destination alpha untouched.
    PreMultipliedRgb,
}

/// Rasterizer preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RasterizerMode {
    /// No face culling.
    #[default]
    NoCull,
    /// Cull back faces.
    BackFaceCull,
    /// Cull back faces and clamp depth instead of clipping.
    BackFaceCullNoZClip,
    /// Cull front faces.
    FrontFaceCull,
    /// No culling, single sample.
    NoCullNoMs,
    /// Line polygon mode.
    Wireframe,
}

/// Depth test/write preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DepthMode {
    /// No depth test, no depth write.
    #[default]
    Disabled,
    /// Depth test and write.
    Enabled,
    /// Depth test without write.
    EnabledNoWrites,
}

impl DepthMode {
    /// Whether the depth buffer is tested.
    pub const fn tests(self) -> bool {
        !matches!(self, DepthMode::Disabled)
    }

    /// Whether the depth buffer is written.
    pub const fn writes(self) -> bool {
        matches!(self, DepthMode::Enabled)
    }
}

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DrawTopology {
    /// Independent points.
    PointList,
    /// Independent lines.
    LineList,
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Four control point patches (tessellation input).
    PatchList4,
}

/// Depth comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DepthCompare {
    /// Never passes.
    Never,
    /// Passes if the new value is less.
    #[default]
    Less,
    /// Passes if equal.
    Equal,
    /// Passes if less or equal.
    LessEqual,
    /// Passes if greater.
    Greater,
    /// Passes if not equal.
    NotEqual,
    /// Passes if greater or equal.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// Format of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    Uint32,
}

/// Format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VertexFormat {
    /// One `f32`.
    Float32,
    /// Two `f32`.
    Float32x2,
    /// Three `f32`.
    Float32x3,
    /// Four `f32`.
    Float32x4,
    /// Four `u8`, normalized.
    Unorm8x4,
}

impl VertexFormat {
    /// Size in bytes.
    pub const fn size(self) -> u64 {
        match self {
            VertexFormat::Float32 | VertexFormat::Unorm8x4 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// One attribute inside a vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Format of the attribute.
    pub format: VertexFormat,
    /// Byte offset inside the vertex.
    pub offset: u64,
    /// Shader location.
    pub shader_location: u32,
}

/// How vertices are laid out in one vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBufferLayout {
    /// Byte distance between two vertices.
    pub array_stride: u64,
    /// Attributes read from the buffer.
    pub attributes: Vec<VertexAttribute>,
}

/// Identity of a registered [`InputLayout`]; takes part in the pipeline key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InputLayoutId(pub u32);

/// A vertex input layout shared by many pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLayout {
    /// Stable identity used for key comparison.
    pub id: InputLayoutId,
    /// One entry per bound vertex buffer slot.
    pub buffers: Vec<VertexBufferLayout>,
}

/// Describes a pipeline layout to be created.
#[derive(Debug, Clone)]
pub struct PipelineLayoutDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// One layout per binding set, positionally.
    pub bind_group_layouts: &'a [BindGroupLayoutId],
}

/// A programmable stage of a pipeline descriptor.
#[derive(Debug, Clone)]
pub struct ProgrammableStage<'a> {
    /// Compiled module.
    pub module: ShaderModuleId,
    /// Entry point name.
    pub entry_point: &'a str,
}

/// Fixed-function state of a graphics pipeline, expressed as presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStatePresets {
    /// Colour blending.
    pub blend: BlendMode,
    /// Rasterizer.
    pub rasterizer: RasterizerMode,
    /// Depth test/write.
    pub depth: DepthMode,
    /// Primitive topology.
    pub topology: DrawTopology,
    /// Depth comparison.
    pub depth_compare: DepthCompare,
}

/// Describes a graphics pipeline to be created.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// The pipeline layout.
    pub layout: PipelineLayoutId,
    /// Vertex stage.
    pub vertex: ProgrammableStage<'a>,
    /// Pixel stage; `None` for depth-only pipelines.
    pub pixel: Option<ProgrammableStage<'a>>,
    /// Vertex buffer layouts.
    pub vertex_buffers: &'a [VertexBufferLayout],
    /// Fixed-function presets.
    pub state: RenderStatePresets,
    /// Colour attachment formats.
    pub color_formats: &'a [TextureFormat],
    /// Depth attachment format.
    pub depth_format: Option<TextureFormat>,
}

/// Describes a compute pipeline to be created.
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// The pipeline layout.
    pub layout: PipelineLayoutId,
    /// Compute stage.
    pub stage: ProgrammableStage<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_mode_flags() {
        assert!(!DepthMode::Disabled.tests());
        assert!(DepthMode::Enabled.tests() && DepthMode::Enabled.writes());
        assert!(DepthMode::EnabledNoWrites.tests());
        assert!(!DepthMode::EnabledNoWrites.writes());
    }

    #[test]
    fn preset_orders_are_declaration_orders() {
        assert!(BlendMode::Disabled < BlendMode::Additive);
        assert!(RasterizerMode::NoCull < RasterizerMode::BackFaceCull);
        assert!(DrawTopology::LineList < DrawTopology::TriangleList);
    }
}
