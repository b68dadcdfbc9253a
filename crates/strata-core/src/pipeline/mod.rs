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

//! Deterministic cache of compiled pipeline state.
//!
//! Entries are keyed by a totally ordered [`PipelineStateKey`] and built lazily on the
//! first miss. Building merges the reflected bindings of every active stage into one
//! layout per set, creates the pipeline layout, then the graphics or compute pipeline.
//! Entries live until [`PipelineStateCache::teardown`].

mod key;
mod merge;

pub use self::key::{PipelineStateKey, RenderTargetFormats};
pub use self::merge::merge_bindings;

use crate::frame::ResourceGraveyard;
use crate::renderer::api::{
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindGroupLayoutId, ComputePipelineDescriptor,
    ComputePipelineId, GpuResource, InputLayout, PipelineLayoutDescriptor, PipelineLayoutId,
    ProgrammableStage, RenderPipelineDescriptor, RenderPipelineId, ShaderStage, StageBindings,
};
use crate::renderer::error::PipelineError;
use crate::renderer::traits::GraphicsDevice;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Reflection data and entry point of one active stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInput {
    /// Entry point function name.
    pub entry_point: Cow<'static, str>,
    /// Reflected binding declarations; `bindings.stage` names the stage.
    pub bindings: StageBindings,
}

impl StageInput {
    /// Creates a stage input.
    pub fn new(entry_point: impl Into<Cow<'static, str>>, bindings: StageBindings) -> Self {
        Self {
            entry_point: entry_point.into(),
            bindings,
        }
    }

    /// The stage this input describes.
    pub fn stage(&self) -> ShaderStage {
        self.bindings.stage
    }
}

/// The compiled state object of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineObject {
    /// A graphics pipeline.
    Render(RenderPipelineId),
    /// A compute pipeline.
    Compute(ComputePipelineId),
}

/// A cached, compiled pipeline state.
#[derive(Debug)]
pub struct PipelineStateEntry {
    /// The key the entry was built for.
    pub key: PipelineStateKey,
    /// The compiled pipeline.
    pub pipeline: PipelineObject,
    /// The pipeline layout.
    pub layout: PipelineLayoutId,
    /// One layout per binding set, gaps included.
    pub set_layouts: Vec<BindGroupLayoutId>,
    /// The merged binding entries of each set.
    pub bindings: Vec<Vec<BindGroupLayoutEntry>>,
}

impl PipelineStateEntry {
    /// The graphics pipeline, if this is a graphics entry.
    pub fn render_pipeline(&self) -> Option<RenderPipelineId> {
        match self.pipeline {
            PipelineObject::Render(id) => Some(id),
            PipelineObject::Compute(_) => None,
        }
    }

    /// The compute pipeline, if this is a compute entry.
    pub fn compute_pipeline(&self) -> Option<ComputePipelineId> {
        match self.pipeline {
            PipelineObject::Compute(id) => Some(id),
            PipelineObject::Render(_) => None,
        }
    }

    /// The layout of binding set `set`.
    pub fn set_layout(&self, set: usize) -> Option<BindGroupLayoutId> {
        self.set_layouts.get(set).copied()
    }

    fn resources(&self) -> impl Iterator<Item = GpuResource> + '_ {
        let pipeline = match self.pipeline {
            PipelineObject::Render(id) => GpuResource::from(id),
            PipelineObject::Compute(id) => GpuResource::from(id),
        };
        std::iter::once(pipeline)
            .chain(std::iter::once(GpuResource::from(self.layout)))
            .chain(self.set_layouts.iter().map(|&id| GpuResource::from(id)))
    }
}

/// Append-or-lookup cache of [`PipelineStateEntry`] values.
///
/// Shared by reference; lookups and inserts are serialized by an internal mutex.
#[derive(Debug, Default)]
pub struct PipelineStateCache {
    entries: Mutex<BTreeMap<PipelineStateKey, Arc<PipelineStateEntry>>>,
}

impl PipelineStateCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<PipelineStateKey, Arc<PipelineStateEntry>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the entry for `key`, building it on a miss.
    ///
    /// `stages` must hold exactly one input per stage bound in the key, and
    /// `input_layout` must match the key's input layout identity.
    pub fn get_or_create(
        &self,
        device: &dyn GraphicsDevice,
        key: &PipelineStateKey,
        stages: &[StageInput],
        input_layout: Option<&InputLayout>,
    ) -> Result<Arc<PipelineStateEntry>, PipelineError> {
        let mut entries = self.entries();
        if let Some(entry) = entries.get(key) {
            return Ok(Arc::clone(entry));
        }

        let ordered = validate_request(device, key, stages, input_layout)?;
        let entry = Arc::new(build_entry(device, key, &ordered, input_layout)?);
        log::info!(
            "PipelineStateCache: built {:?} ({} sets), {} entries cached",
            entry.pipeline,
            entry.set_layouts.len(),
            entries.len() + 1
        );
        entries.insert(key.clone(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Looks up an entry without building it.
    pub fn get(&self, key: &PipelineStateKey) -> Option<Arc<PipelineStateEntry>> {
        self.entries().get(key).cloned()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Retires every cached object and empties the cache.
    ///
    /// Returns the number of entries torn down.
    pub fn teardown(&self, graveyard: &mut ResourceGraveyard) -> usize {
        let entries = std::mem::take(&mut *self.entries());
        for entry in entries.values() {
            graveyard.retire_all(entry.resources());
        }
        log::debug!("PipelineStateCache: tore down {} entries", entries.len());
        entries.len()
    }
}

/// Checks the stage combination and returns the stage inputs in canonical order.
fn validate_request<'s>(
    device: &dyn GraphicsDevice,
    key: &PipelineStateKey,
    stages: &'s [StageInput],
    input_layout: Option<&InputLayout>,
) -> Result<Vec<&'s StageInput>, PipelineError> {
    let active: Vec<ShaderStage> = key.active_stages().map(|(stage, _)| stage).collect();
    if active.is_empty() {
        return Err(PipelineError::InvalidStageCombination(
            "no shader stage bound".to_owned(),
        ));
    }

    for &stage in &active {
        let expressible = matches!(
            stage,
            ShaderStage::Vertex | ShaderStage::Pixel | ShaderStage::Compute
        );
        if !expressible || !device.supports_stage(stage) {
            return Err(PipelineError::UnsupportedStage(stage));
        }
    }

    if key.is_compute() && active.len() > 1 {
        return Err(PipelineError::InvalidStageCombination(format!(
            "compute stage mixed with graphics stages {:?}",
            &active[..active.len() - 1]
        )));
    }
    if !key.is_compute() && key.stage(ShaderStage::Vertex).is_none() {
        return Err(PipelineError::InvalidStageCombination(
            "graphics pipeline without a vertex stage".to_owned(),
        ));
    }
    if key.input_layout != input_layout.map(|layout| layout.id) {
        return Err(PipelineError::InvalidStageCombination(format!(
            "input layout {:?} does not match the key's {:?}",
            input_layout.map(|layout| layout.id),
            key.input_layout
        )));
    }

    let mut ordered = Vec::with_capacity(active.len());
    for &stage in &active {
        let mut matching = stages.iter().filter(|input| input.stage() == stage);
        match (matching.next(), matching.next()) {
            (Some(input), None) => ordered.push(input),
            (None, _) => {
                return Err(PipelineError::InvalidStageCombination(format!(
                    "no reflection data for {stage:?}"
                )))
            }
            (Some(_), Some(_)) => {
                return Err(PipelineError::InvalidStageCombination(format!(
                    "duplicate reflection data for {stage:?}"
                )))
            }
        }
    }
    if let Some(extra) = stages.iter().find(|input| key.stage(input.stage()).is_none()) {
        return Err(PipelineError::InvalidStageCombination(format!(
            "reflection data for unbound stage {:?}",
            extra.stage()
        )));
    }
    Ok(ordered)
}

/// Objects created so far for an entry under construction, destroyed if the build fails.
struct PartialBuild<'d> {
    device: &'d dyn GraphicsDevice,
    created: Vec<GpuResource>,
}

impl PartialBuild<'_> {
    fn track(&mut self, resource: impl Into<GpuResource>) {
        self.created.push(resource.into());
    }

    fn commit(mut self) {
        self.created.clear();
    }
}

impl Drop for PartialBuild<'_> {
    fn drop(&mut self) {
        // Never submitted, so immediate destruction is safe.
        for resource in self.created.drain(..).rev() {
            if let Err(e) = resource.destroy(self.device) {
                log::warn!("PipelineStateCache: rollback of {resource:?} failed: {e}");
            }
        }
    }
}

fn build_entry(
    device: &dyn GraphicsDevice,
    key: &PipelineStateKey,
    stages: &[&StageInput],
    input_layout: Option<&InputLayout>,
) -> Result<PipelineStateEntry, PipelineError> {
    let bindings = merge_bindings(stages.iter().map(|input| &input.bindings))?;
    let mut build = PartialBuild {
        device,
        created: Vec::new(),
    };

    let mut set_layouts = Vec::with_capacity(bindings.len());
    for (set, entries) in bindings.iter().enumerate() {
        let label = format!("Cached Set Layout {set}");
        let id = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(&label),
            entries,
        })?;
        build.track(id);
        set_layouts.push(id);
    }

    let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("Cached Pipeline Layout"),
        bind_group_layouts: &set_layouts,
    })?;
    build.track(layout);

    let find = |stage: ShaderStage| {
        key.stage(stage).and_then(|module| {
            stages
                .iter()
                .find(|input| input.stage() == stage)
                .map(|input| ProgrammableStage {
                    module,
                    entry_point: input.entry_point.as_ref(),
                })
        })
    };

    let pipeline = if key.is_compute() {
        let stage = find(ShaderStage::Compute).ok_or_else(|| {
            PipelineError::InvalidStageCombination("compute stage vanished".to_owned())
        })?;
        let label = "Cached Compute Pipeline";
        let id = device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(label),
                layout,
                stage,
            })
            .map_err(|e| PipelineError::CompilationFailed {
                label: Some(label.to_owned()),
                details: e.to_string(),
            })?;
        build.track(id);
        PipelineObject::Compute(id)
    } else {
        let vertex = find(ShaderStage::Vertex).ok_or_else(|| {
            PipelineError::InvalidStageCombination("graphics pipeline without a vertex stage".to_owned())
        })?;
        let label = "Cached Render Pipeline";
        let id = device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(label),
                layout,
                vertex,
                pixel: find(ShaderStage::Pixel),
                vertex_buffers: input_layout.map(|l| l.buffers.as_slice()).unwrap_or(&[]),
                state: key.presets(),
                color_formats: &key.targets.color,
                depth_format: key.targets.depth,
            })
            .map_err(|e| PipelineError::CompilationFailed {
                label: Some(label.to_owned()),
                details: e.to_string(),
            })?;
        build.track(id);
        PipelineObject::Render(id)
    };

    build.commit();
    Ok(PipelineStateEntry {
        key: key.clone(),
        pipeline,
        layout,
        set_layouts,
        bindings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::{
        BindingDeclaration, BindingType, DepthMode, RasterizerMode, RenderStatePresets,
        ShaderModuleDescriptor, ShaderModuleId, ShaderSource, TextureFormat,
    };
    use crate::renderer::headless::HeadlessDevice;

    fn module(device: &HeadlessDevice, source: &'static str) -> ShaderModuleId {
        device
            .create_shader_module(&ShaderModuleDescriptor {
                label: Some("test"),
                source: ShaderSource::Wgsl(Cow::Borrowed(source)),
            })
            .unwrap()
    }

    fn graphics(device: &HeadlessDevice) -> (PipelineStateKey, Vec<StageInput>) {
        let key = PipelineStateKey::graphics(
            RenderStatePresets {
                rasterizer: RasterizerMode::BackFaceCull,
                depth: DepthMode::Enabled,
                ..Default::default()
            },
            module(device, "vs"),
            Some(module(device, "fs")),
            RenderTargetFormats::new(TextureFormat::Rgba8Unorm, Some(TextureFormat::Depth32Float)),
        );
        let stages = vec![
            StageInput::new(
                "vs_main",
                StageBindings::new(
                    ShaderStage::Vertex,
                    vec![BindingDeclaration::new(0, 0, BindingType::UniformBuffer)],
                ),
            ),
            StageInput::new(
                "fs_main",
                StageBindings::new(
                    ShaderStage::Pixel,
                    vec![BindingDeclaration::new(0, 0, BindingType::UniformBuffer)],
                ),
            ),
        ];
        (key, stages)
    }

    #[test]
    fn identical_keys_share_an_entry() {
        let device = HeadlessDevice::new();
        let cache = PipelineStateCache::new();
        let (key, stages) = graphics(&device);

        let first = cache.get_or_create(&device, &key, &stages, None).unwrap();
        let second = cache.get_or_create(&device, &key, &stages, None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(first.render_pipeline().is_some());
    }

    #[test]
    fn changed_field_builds_a_new_entry() {
        let device = HeadlessDevice::new();
        let cache = PipelineStateCache::new();
        let (key, stages) = graphics(&device);
        let mut other = key.clone();
        other.depth = DepthMode::EnabledNoWrites;

        let a = cache.get_or_create(&device, &key, &stages, None).unwrap();
        let b = cache.get_or_create(&device, &other, &stages, None).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn mixing_compute_and_graphics_is_rejected() {
        let device = HeadlessDevice::new();
        let cache = PipelineStateCache::new();
        let (key, mut stages) = graphics(&device);
        let key = key.with_stage(ShaderStage::Compute, module(&device, "cs"));
        stages.push(StageInput::new(
            "main",
            StageBindings::new(ShaderStage::Compute, Vec::new()),
        ));
        assert!(matches!(
            cache.get_or_create(&device, &key, &stages, None),
            Err(PipelineError::InvalidStageCombination(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn unsupported_stage_is_rejected() {
        let device = HeadlessDevice::new();
        let cache = PipelineStateCache::new();
        let (key, stages) = graphics(&device);
        let key = key.with_stage(ShaderStage::Hull, module(&device, "hs"));
        assert!(matches!(
            cache.get_or_create(&device, &key, &stages, None),
            Err(PipelineError::UnsupportedStage(ShaderStage::Hull))
        ));
    }

    #[test]
    fn failed_build_leaves_nothing_behind() {
        let device = HeadlessDevice::new();
        let cache = PipelineStateCache::new();
        let (key, mut stages) = graphics(&device);
        let baseline = device.live_resource_count();
        stages[1].bindings.declarations[0].ty = BindingType::StorageBuffer { read_only: true };

        assert!(matches!(
            cache.get_or_create(&device, &key, &stages, None),
            Err(PipelineError::BindingConflict { .. })
        ));
        assert_eq!(device.live_resource_count(), baseline);
    }

    #[test]
    fn compute_entry_fills_set_gaps() {
        let device = HeadlessDevice::new();
        let cache = PipelineStateCache::new();
        let key = PipelineStateKey::compute(module(&device, "cs"));
        let stages = [StageInput::new(
            "main",
            StageBindings::new(
                ShaderStage::Compute,
                vec![BindingDeclaration::new(
                    1,
                    0,
                    BindingType::StorageBuffer { read_only: false },
                )],
            ),
        )];
        let entry = cache.get_or_create(&device, &key, &stages, None).unwrap();
        assert!(entry.compute_pipeline().is_some());
        assert_eq!(entry.set_layouts.len(), 2);
        assert!(entry.bindings[0].is_empty());
    }

    #[test]
    fn teardown_retires_everything() {
        let device = HeadlessDevice::new();
        let cache = PipelineStateCache::new();
        let (key, stages) = graphics(&device);
        let modules = device.live_resource_count();
        cache.get_or_create(&device, &key, &stages, None).unwrap();
        assert!(device.live_resource_count() > modules);

        let mut graveyard = ResourceGraveyard::new(Arc::new(device.clone()), 2);
        assert_eq!(cache.teardown(&mut graveyard), 1);
        graveyard.flush();
        assert_eq!(device.live_resource_count(), modules);
        assert!(cache.is_empty());
    }
}
