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

use crate::renderer::api::{
    BlendMode, DepthCompare, DepthMode, DrawTopology, InputLayoutId, RasterizerMode,
    RenderStatePresets, ShaderModuleId, ShaderStage, TextureFormat,
};

/// The attachment formats a graphics pipeline renders into.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderTargetFormats {
    /// Colour attachment formats, in attachment order.
    pub color: Vec<TextureFormat>,
    /// Depth attachment format.
    pub depth: Option<TextureFormat>,
}

impl RenderTargetFormats {
    /// One colour target plus an optional depth target.
    pub fn new(color: TextureFormat, depth: Option<TextureFormat>) -> Self {
        Self {
            color: vec![color],
            depth,
        }
    }

    /// A depth-only target.
    pub fn depth_only(depth: TextureFormat) -> Self {
        Self {
            color: Vec::new(),
            depth: Some(depth),
        }
    }
}

/// Identity of a compiled pipeline state.
///
/// Fields compare in declaration order through the derived `Ord`: the cache is a
/// `BTreeMap` keyed by this type, so two keys address the same entry exactly when
/// every field matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipelineStateKey {
    /// Colour blending.
    pub blend: BlendMode,
    /// Culling, fill and depth-clip behaviour.
    pub rasterizer: RasterizerMode,
    /// Depth test and write.
    pub depth: DepthMode,
    /// Primitive topology.
    pub topology: DrawTopology,
    /// Depth comparison operator.
    pub depth_compare: DepthCompare,
    /// Vertex input layout, `None` for vertex-pulling and compute pipelines.
    pub input_layout: Option<InputLayoutId>,
    /// Shader module bound to each stage, indexed by [`ShaderStage::index`].
    pub stages: [Option<ShaderModuleId>; ShaderStage::COUNT],
    /// Attachment formats.
    pub targets: RenderTargetFormats,
}

impl PipelineStateKey {
    /// A graphics key with a vertex stage and an optional pixel stage.
    pub fn graphics(
        state: RenderStatePresets,
        vertex: ShaderModuleId,
        pixel: Option<ShaderModuleId>,
        targets: RenderTargetFormats,
    ) -> Self {
        let mut key = Self {
            blend: state.blend,
            rasterizer: state.rasterizer,
            depth: state.depth,
            topology: state.topology,
            depth_compare: state.depth_compare,
            targets,
            ..Self::default()
        };
        key.stages[ShaderStage::Vertex.index()] = Some(vertex);
        key.stages[ShaderStage::Pixel.index()] = pixel;
        key
    }

    /// A compute key.
    pub fn compute(module: ShaderModuleId) -> Self {
        let mut key = Self::default();
        key.stages[ShaderStage::Compute.index()] = Some(module);
        key
    }

    /// Sets the vertex input layout.
    pub fn with_input_layout(mut self, layout: InputLayoutId) -> Self {
        self.input_layout = Some(layout);
        self
    }

    /// Binds `module` to `stage`.
    pub fn with_stage(mut self, stage: ShaderStage, module: ShaderModuleId) -> Self {
        self.stages[stage.index()] = Some(module);
        self
    }

    /// The module bound to `stage`.
    pub fn stage(&self, stage: ShaderStage) -> Option<ShaderModuleId> {
        self.stages[stage.index()]
    }

    /// Stages with a module, in canonical order.
    pub fn active_stages(&self) -> impl Iterator<Item = (ShaderStage, ShaderModuleId)> + '_ {
        ShaderStage::ALL
            .into_iter()
            .filter_map(|stage| self.stage(stage).map(|module| (stage, module)))
    }

    /// Whether the compute stage is bound.
    pub fn is_compute(&self) -> bool {
        self.stage(ShaderStage::Compute).is_some()
    }

    /// The fixed-function presets of the key.
    pub fn presets(&self) -> RenderStatePresets {
        RenderStatePresets {
            blend: self.blend,
            rasterizer: self.rasterizer,
            depth: self.depth,
            topology: self.topology,
            depth_compare: self.depth_compare,
        }
    }
}
