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

use std::num::NonZeroU32;

use strata_core::config::PresentModePreference;
use strata_core::renderer::api::{
    BindingType, BlendMode, BufferUsage, Color, DepthCompare, DepthMode, DrawTopology, FilterMode,
    IndexFormat, LoadOp, RasterizerMode, SamplerBindingType, ShaderStageFlags, StoreOp,
    TextureFormat, TextureSampleType, TextureUsage, VertexFormat,
};

/// A local extension trait to convert our engine's types into WGPU-compatible types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a WGPU-compatible type.
    fn into_wgpu(self) -> T;
}

// --- Formats ---

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        }
    }
}

/// Maps a surface format back to the engine's formats, if it has a counterpart.
pub fn from_wgpu_texture_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(TextureFormat::Rgba8UnormSrgb),
        wgpu::TextureFormat::Bgra8Unorm => Some(TextureFormat::Bgra8Unorm),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(TextureFormat::Bgra8UnormSrgb),
        wgpu::TextureFormat::Rgba16Float => Some(TextureFormat::Rgba16Float),
        _ => None,
    }
}

impl IntoWgpu<wgpu::VertexFormat> for VertexFormat {
    fn into_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            VertexFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
        }
    }
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

// --- Usages ---

impl IntoWgpu<wgpu::BufferUsages> for BufferUsage {
    fn into_wgpu(self) -> wgpu::BufferUsages {
        let pairs = [
            (BufferUsage::MAP_READ, wgpu::BufferUsages::MAP_READ),
            (BufferUsage::MAP_WRITE, wgpu::BufferUsages::MAP_WRITE),
            (BufferUsage::COPY_SRC, wgpu::BufferUsages::COPY_SRC),
            (BufferUsage::COPY_DST, wgpu::BufferUsages::COPY_DST),
            (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
            (BufferUsage::INDEX, wgpu::BufferUsages::INDEX),
            (BufferUsage::UNIFORM, wgpu::BufferUsages::UNIFORM),
            (BufferUsage::STORAGE, wgpu::BufferUsages::STORAGE),
            (BufferUsage::INDIRECT, wgpu::BufferUsages::INDIRECT),
        ];
        pairs
            .into_iter()
            .filter(|(ours, _)| self.contains(*ours))
            .fold(wgpu::BufferUsages::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

impl IntoWgpu<wgpu::TextureUsages> for TextureUsage {
    fn into_wgpu(self) -> wgpu::TextureUsages {
        let pairs = [
            (TextureUsage::COPY_SRC, wgpu::TextureUsages::COPY_SRC),
            (TextureUsage::COPY_DST, wgpu::TextureUsages::COPY_DST),
            (TextureUsage::TEXTURE_BINDING, wgpu::TextureUsages::TEXTURE_BINDING),
            (TextureUsage::STORAGE_BINDING, wgpu::TextureUsages::STORAGE_BINDING),
            (TextureUsage::RENDER_ATTACHMENT, wgpu::TextureUsages::RENDER_ATTACHMENT),
        ];
        pairs
            .into_iter()
            .filter(|(ours, _)| self.contains(*ours))
            .fold(wgpu::TextureUsages::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

/// Stages without a wgpu counterpart (mesh, tessellation) are dropped; the pipeline
/// cache never builds pipelines with them on this backend.
impl IntoWgpu<wgpu::ShaderStages> for ShaderStageFlags {
    fn into_wgpu(self) -> wgpu::ShaderStages {
        let mut stages = wgpu::ShaderStages::NONE;
        if self.contains(ShaderStageFlags::VERTEX) {
            stages |= wgpu::ShaderStages::VERTEX;
        }
        if self.contains(ShaderStageFlags::PIXEL) {
            stages |= wgpu::ShaderStages::FRAGMENT;
        }
        if self.contains(ShaderStageFlags::COMPUTE) {
            stages |= wgpu::ShaderStages::COMPUTE;
        }
        stages
    }
}

// --- Bindings ---

impl IntoWgpu<wgpu::TextureSampleType> for TextureSampleType {
    fn into_wgpu(self) -> wgpu::TextureSampleType {
        match self {
            TextureSampleType::Float { filterable } => wgpu::TextureSampleType::Float { filterable },
            TextureSampleType::Depth => wgpu::TextureSampleType::Depth,
            TextureSampleType::Uint => wgpu::TextureSampleType::Uint,
        }
    }
}

impl IntoWgpu<wgpu::SamplerBindingType> for SamplerBindingType {
    fn into_wgpu(self) -> wgpu::SamplerBindingType {
        match self {
            SamplerBindingType::Filtering => wgpu::SamplerBindingType::Filtering,
            SamplerBindingType::NonFiltering => wgpu::SamplerBindingType::NonFiltering,
            SamplerBindingType::Comparison => wgpu::SamplerBindingType::Comparison,
        }
    }
}

impl IntoWgpu<wgpu::BindingType> for BindingType {
    fn into_wgpu(self) -> wgpu::BindingType {
        match self {
            BindingType::UniformBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingType::StorageBuffer { read_only } => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingType::Texture {
                sample_type,
                multisampled,
            } => wgpu::BindingType::Texture {
                sample_type: sample_type.into_wgpu(),
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled,
            },
            BindingType::StorageTexture { format } => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: format.into_wgpu(),
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            BindingType::Sampler(ty) => wgpu::BindingType::Sampler(ty.into_wgpu()),
        }
    }
}

/// Array count of a binding; a single resource has no count.
pub fn binding_count(count: u32) -> Option<NonZeroU32> {
    if count > 1 {
        NonZeroU32::new(count)
    } else {
        None
    }
}

// --- Render state presets ---

/// Blend state and colour write mask of a [`BlendMode`].
pub fn blend_state(mode: BlendMode) -> (Option<wgpu::BlendState>, wgpu::ColorWrites) {
    use wgpu::{BlendComponent, BlendFactor, BlendOperation, BlendState};

    let additive = BlendComponent {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::One,
        operation: BlendOperation::Add,
    };
    let premultiplied = BlendComponent {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
        operation: BlendOperation::Add,
    };
    match mode {
        BlendMode::Disabled => (None, wgpu::ColorWrites::ALL),
        BlendMode::Additive => (
            Some(BlendState {
                color: additive,
                alpha: additive,
            }),
            wgpu::ColorWrites::ALL,
        ),
        BlendMode::AlphaBlend => (Some(BlendState::ALPHA_BLENDING), wgpu::ColorWrites::ALL),
        BlendMode::PreMultiplied => (
            Some(BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            wgpu::ColorWrites::ALL,
        ),
        BlendMode::NoColorWrites => (None, wgpu::ColorWrites::empty()),
        BlendMode::PreMultipliedRgb => (
            Some(BlendState {
                color: premultiplied,
                alpha: BlendComponent {
                    src_factor: BlendFactor::Zero,
                    dst_factor: BlendFactor::One,
                    operation: BlendOperation::Add,
                },
            }),
            wgpu::ColorWrites::COLOR,
        ),
    }
}

/// Primitive state of a rasterizer preset and topology.
///
/// Returns `None` for topologies wgpu cannot draw (tessellation patches).
pub fn primitive_state(rasterizer: RasterizerMode, topology: DrawTopology) -> Option<wgpu::PrimitiveState> {
    let topology = match topology {
        DrawTopology::PointList => wgpu::PrimitiveTopology::PointList,
        DrawTopology::LineList => wgpu::PrimitiveTopology::LineList,
        DrawTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        DrawTopology::PatchList4 => return None,
    };
    let (cull_mode, polygon_mode, unclipped_depth) = match rasterizer {
        RasterizerMode::NoCull | RasterizerMode::NoCullNoMs => (None, wgpu::PolygonMode::Fill, false),
        RasterizerMode::BackFaceCull => (Some(wgpu::Face::Back), wgpu::PolygonMode::Fill, false),
        RasterizerMode::BackFaceCullNoZClip => (Some(wgpu::Face::Back), wgpu::PolygonMode::Fill, true),
        RasterizerMode::FrontFaceCull => (Some(wgpu::Face::Front), wgpu::PolygonMode::Fill, false),
        RasterizerMode::Wireframe => (None, wgpu::PolygonMode::Line, false),
    };
    Some(wgpu::PrimitiveState {
        topology,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode,
        unclipped_depth,
        polygon_mode,
        conservative: false,
    })
}

impl IntoWgpu<wgpu::CompareFunction> for DepthCompare {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            DepthCompare::Never => wgpu::CompareFunction::Never,
            DepthCompare::Less => wgpu::CompareFunction::Less,
            DepthCompare::Equal => wgpu::CompareFunction::Equal,
            DepthCompare::LessEqual => wgpu::CompareFunction::LessEqual,
            DepthCompare::Greater => wgpu::CompareFunction::Greater,
            DepthCompare::NotEqual => wgpu::CompareFunction::NotEqual,
            DepthCompare::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            DepthCompare::Always => wgpu::CompareFunction::Always,
        }
    }
}

/// Depth state for a depth attachment of `format`. A disabled mode still declares
/// the attachment, with an always-passing test and no writes.
pub fn depth_stencil_state(
    mode: DepthMode,
    compare: DepthCompare,
    format: TextureFormat,
) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: format.into_wgpu(),
        depth_write_enabled: mode.writes(),
        depth_compare: if mode.tests() {
            compare.into_wgpu()
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

// --- Passes ---

impl IntoWgpu<wgpu::Color> for Color {
    fn into_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r,
            g: self.g,
            b: self.b,
            a: self.a,
        }
    }
}

impl IntoWgpu<wgpu::LoadOp<wgpu::Color>> for LoadOp<Color> {
    fn into_wgpu(self) -> wgpu::LoadOp<wgpu::Color> {
        match self {
            LoadOp::Clear(color) => wgpu::LoadOp::Clear(color.into_wgpu()),
            LoadOp::Load => wgpu::LoadOp::Load,
        }
    }
}

impl IntoWgpu<wgpu::LoadOp<f32>> for LoadOp<f32> {
    fn into_wgpu(self) -> wgpu::LoadOp<f32> {
        match self {
            LoadOp::Clear(value) => wgpu::LoadOp::Clear(value),
            LoadOp::Load => wgpu::LoadOp::Load,
        }
    }
}

impl IntoWgpu<wgpu::StoreOp> for StoreOp {
    fn into_wgpu(self) -> wgpu::StoreOp {
        match self {
            StoreOp::Store => wgpu::StoreOp::Store,
            StoreOp::Discard => wgpu::StoreOp::Discard,
        }
    }
}

impl IntoWgpu<wgpu::FilterMode> for FilterMode {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// The preferred present mode if the surface supports it, FIFO otherwise.
pub fn present_mode(preference: PresentModePreference, supported: &[wgpu::PresentMode]) -> wgpu::PresentMode {
    let wanted = match preference {
        PresentModePreference::Fifo => wgpu::PresentMode::Fifo,
        PresentModePreference::Mailbox => wgpu::PresentMode::Mailbox,
        PresentModePreference::Immediate => wgpu::PresentMode::Immediate,
    };
    if supported.contains(&wanted) {
        wanted
    } else {
        wgpu::PresentMode::Fifo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_usage_is_mapped_flag_by_flag() {
        let usage: wgpu::BufferUsages = (BufferUsage::VERTEX | BufferUsage::COPY_DST).into_wgpu();
        assert_eq!(usage, wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST);

        let readback: wgpu::BufferUsages = (BufferUsage::MAP_READ | BufferUsage::COPY_DST).into_wgpu();
        assert_eq!(readback, wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST);
    }

    #[test]
    fn pixel_stage_maps_to_fragment() {
        let stages: wgpu::ShaderStages = (ShaderStageFlags::VERTEX | ShaderStageFlags::PIXEL).into_wgpu();
        assert_eq!(stages, wgpu::ShaderStages::VERTEX_FRAGMENT);

        let mesh_only: wgpu::ShaderStages = ShaderStageFlags::MESH.into_wgpu();
        assert_eq!(mesh_only, wgpu::ShaderStages::NONE);
    }

    #[test]
    fn storage_texture_is_write_only_2d() {
        let ty: wgpu::BindingType = BindingType::StorageTexture {
            format: TextureFormat::R32Float,
        }
        .into_wgpu();
        assert_eq!(
            ty,
            wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: wgpu::TextureFormat::R32Float,
                view_dimension: wgpu::TextureViewDimension::D2,
            }
        );
        assert_eq!(binding_count(1), None);
        assert_eq!(binding_count(4), NonZeroU32::new(4));
    }

    #[test]
    fn rasterizer_presets() {
        let back = primitive_state(RasterizerMode::BackFaceCull, DrawTopology::TriangleList).unwrap();
        assert_eq!(back.cull_mode, Some(wgpu::Face::Back));
        assert!(!back.unclipped_depth);

        let no_clip = primitive_state(RasterizerMode::BackFaceCullNoZClip, DrawTopology::TriangleList).unwrap();
        assert!(no_clip.unclipped_depth);

        let wire = primitive_state(RasterizerMode::Wireframe, DrawTopology::LineList).unwrap();
        assert_eq!(wire.polygon_mode, wgpu::PolygonMode::Line);

        assert!(primitive_state(RasterizerMode::NoCull, DrawTopology::PatchList4).is_none());
    }

    #[test]
    fn blend_presets() {
        assert_eq!(blend_state(BlendMode::Disabled), (None, wgpu::ColorWrites::ALL));
        assert_eq!(blend_state(BlendMode::NoColorWrites).1, wgpu::ColorWrites::empty());
        assert_eq!(
            blend_state(BlendMode::AlphaBlend).0,
            Some(wgpu::BlendState::ALPHA_BLENDING)
        );
    }

    #[test]
    fn depth_modes() {
        let off = depth_stencil_state(DepthMode::Disabled, DepthCompare::Less, TextureFormat::Depth32Float);
        assert_eq!(off.depth_compare, wgpu::CompareFunction::Always);
        assert!(!off.depth_write_enabled);

        let read_only =
            depth_stencil_state(DepthMode::EnabledNoWrites, DepthCompare::GreaterEqual, TextureFormat::Depth32Float);
        assert_eq!(read_only.depth_compare, wgpu::CompareFunction::GreaterEqual);
        assert!(!read_only.depth_write_enabled);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let supported = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Mailbox];
        assert_eq!(
            present_mode(PresentModePreference::Mailbox, &supported),
            wgpu::PresentMode::Mailbox
        );
        assert_eq!(
            present_mode(PresentModePreference::Immediate, &supported),
            wgpu::PresentMode::Fifo
        );
    }
}
