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

use super::hiz::{mip_count, word_count};
use super::{CullCamera, CullError, CullRecord, CullUniforms, VisibilitySet};
use crate::config::{CullingConfig, RendererConfig};
use crate::frame::{ResourceGraveyard, SizeDependent, ThreadAffinity};
use crate::pipeline::{PipelineStateCache, PipelineStateEntry, PipelineStateKey, StageInput};
use crate::renderer::api::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId, BindingDeclaration,
    BindingType, BufferDescriptor, BufferId, BufferUsage, ComputePassDescriptor,
    ComputePipelineId, Extent2d, GpuResource, ShaderModuleId, ShaderStage, StageBindings,
    TextureDescriptor, TextureFormat, TextureId, TextureSampleType, TextureUsage,
    TextureViewDescriptor, TextureViewId,
};
use crate::renderer::error::{PipelineError, ResourceError};
use crate::renderer::traits::{CommandEncoder, GraphicsDevice};
use std::borrow::Cow;
use std::sync::Arc;

/// Threads per workgroup side of the pyramid kernels.
pub const PYRAMID_WORKGROUP_SIZE: u32 = 8;
/// Threads per workgroup of the visibility kernel. One thread owns one word.
pub const CULL_WORKGROUP_SIZE: u32 = 64;

const PYRAMID_FORMAT: TextureFormat = TextureFormat::R32Float;
const ENTRY_POINT: &str = "main";

/// Bindings of the depth copy kernel: the depth target and pyramid mip 0.
pub fn depth_copy_bindings() -> StageBindings {
    StageBindings::new(
        ShaderStage::Compute,
        vec![
            BindingDeclaration::new(
                0,
                0,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    multisampled: false,
                },
            ),
            BindingDeclaration::new(0, 1, BindingType::StorageTexture { format: PYRAMID_FORMAT }),
        ],
    )
}

/// Bindings of the reduction kernel: the previous mip and the mip being written.
pub fn reduce_bindings() -> StageBindings {
    StageBindings::new(
        ShaderStage::Compute,
        vec![
            BindingDeclaration::new(
                0,
                0,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    multisampled: false,
                },
            ),
            BindingDeclaration::new(0, 1, BindingType::StorageTexture { format: PYRAMID_FORMAT }),
        ],
    )
}

/// Bindings of the visibility kernel: uniforms, records, the whole pyramid and the words.
pub fn cull_bindings() -> StageBindings {
    StageBindings::new(
        ShaderStage::Compute,
        vec![
            BindingDeclaration::new(0, 0, BindingType::UniformBuffer),
            BindingDeclaration::new(0, 1, BindingType::StorageBuffer { read_only: true }),
            BindingDeclaration::new(
                0,
                2,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    multisampled: false,
                },
            ),
            BindingDeclaration::new(0, 3, BindingType::StorageBuffer { read_only: false }),
        ],
    )
}

/// The three compute shader modules of the culler, each with a `main` entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CullShaderModules {
    /// Copies the depth target into pyramid mip 0.
    pub depth_copy: ShaderModuleId,
    /// 2x2 minimum reduction of one mip into the next.
    pub reduce: ShaderModuleId,
    /// Sphere-versus-pyramid test writing visibility words.
    pub cull: ShaderModuleId,
}

#[derive(Debug)]
struct CullPipeline {
    id: ComputePipelineId,
    group_layout: BindGroupLayoutId,
}

impl CullPipeline {
    fn new(
        device: &dyn GraphicsDevice,
        cache: &PipelineStateCache,
        module: ShaderModuleId,
        bindings: StageBindings,
    ) -> Result<Self, PipelineError> {
        let entry = cache.get_or_create(
            device,
            &PipelineStateKey::compute(module),
            &[StageInput::new(ENTRY_POINT, bindings)],
            None,
        )?;
        Self::from_entry(&entry)
    }

    fn from_entry(entry: &PipelineStateEntry) -> Result<Self, PipelineError> {
        let malformed = || {
            PipelineError::InvalidStageCombination("culling kernel without a compute pipeline".to_owned())
        };
        Ok(Self {
            id: entry.compute_pipeline().ok_or_else(malformed)?,
            group_layout: entry.set_layout(0).ok_or_else(malformed)?,
        })
    }
}

/// Size-dependent objects: the depth target, the pyramid and their bind groups.
#[derive(Debug)]
struct PyramidTargets {
    extent: Extent2d,
    mip_count: u32,
    depth_texture: TextureId,
    depth_view: TextureViewId,
    pyramid: TextureId,
    pyramid_view: TextureViewId,
    mip_views: Vec<TextureViewId>,
    copy_group: BindGroupId,
    reduce_groups: Vec<BindGroupId>,
    cull_group: BindGroupId,
}

impl PyramidTargets {
    fn resources(&self) -> Vec<GpuResource> {
        let mut resources: Vec<GpuResource> = vec![self.copy_group.into(), self.cull_group.into()];
        resources.extend(self.reduce_groups.iter().map(|&g| GpuResource::from(g)));
        resources.extend(self.mip_views.iter().map(|&v| GpuResource::from(v)));
        resources.extend([
            GpuResource::from(self.pyramid_view),
            GpuResource::from(self.depth_view),
            GpuResource::from(self.pyramid),
            GpuResource::from(self.depth_texture),
        ]);
        resources
    }
}

/// What a slot recorded, consumed by [`DepthPyramidCuller::resolve_visibility`].
#[derive(Debug, Clone, Copy)]
enum SlotWork {
    /// Nothing dispatched; every renderable is visible.
    AllVisible(usize),
    /// Words for this many records were copied to the slot's readback buffer.
    Dispatched(usize),
}

/// Hi-Z occlusion culler with same-frame visibility readback.
#[derive(Debug)]
pub struct DepthPyramidCuller {
    device: Arc<dyn GraphicsDevice>,
    config: CullingConfig,
    depth_format: TextureFormat,
    depth_copy: CullPipeline,
    reduce: CullPipeline,
    cull: CullPipeline,
    records: BufferId,
    uniforms: BufferId,
    words: BufferId,
    readback: Vec<BufferId>,
    targets: Option<PyramidTargets>,
    extent: Extent2d,
    record_count: usize,
    slot_work: Vec<Option<SlotWork>>,
    affinity: ThreadAffinity,
}

impl DepthPyramidCuller {
    /// Builds the kernels through `pipelines` and allocates the fixed-size buffers.
    ///
    /// No depth target exists until the first [`SizeDependent::resize`].
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        pipelines: &PipelineStateCache,
        shaders: &CullShaderModules,
        config: &RendererConfig,
    ) -> Result<Self, CullError> {
        let capacity = config.culling.max_records as u64;
        let word_bytes = (word_count(capacity as usize) as u64 * 4).max(4);

        let depth_copy = CullPipeline::new(device.as_ref(), pipelines, shaders.depth_copy, depth_copy_bindings())?;
        let reduce = CullPipeline::new(device.as_ref(), pipelines, shaders.reduce, reduce_bindings())?;
        let cull = CullPipeline::new(device.as_ref(), pipelines, shaders.cull, cull_bindings())?;

        let buffer = |label: &'static str, size: u64, usage: BufferUsage| {
            device.create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed(label)),
                size,
                usage,
            })
        };
        let records = buffer(
            "Cull Records",
            capacity * std::mem::size_of::<CullRecord>() as u64,
            BufferUsage::STORAGE | BufferUsage::COPY_DST,
        )?;
        let uniforms = buffer(
            "Cull Uniforms",
            std::mem::size_of::<CullUniforms>() as u64,
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        )?;
        let words = buffer(
            "Visibility Words",
            word_bytes,
            BufferUsage::STORAGE | BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
        )?;
        let readback = (0..config.frames_in_flight)
            .map(|_| buffer("Visibility Readback", word_bytes, BufferUsage::MAP_READ | BufferUsage::COPY_DST))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "DepthPyramidCuller: capacity {} records, {} readback slots",
            capacity,
            readback.len()
        );

        Ok(Self {
            device,
            config: config.culling,
            depth_format: config.depth_format,
            depth_copy,
            reduce,
            cull,
            records,
            uniforms,
            words,
            slot_work: vec![None; readback.len()],
            readback,
            targets: None,
            extent: Extent2d::new(0, 0),
            record_count: 0,
            affinity: ThreadAffinity::current(),
        })
    }

    /// The view the depth-only pass must render into, `None` while the target is zero-sized.
    pub fn depth_target(&self) -> Option<TextureViewId> {
        self.targets.as_ref().map(|t| t.depth_view)
    }

    /// Current target size.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Mips of the current pyramid, zero without a target.
    pub fn mip_count(&self) -> u32 {
        self.targets.as_ref().map_or(0, |t| t.mip_count)
    }

    /// Capacity of the record array.
    pub fn capacity(&self) -> usize {
        self.config.max_records as usize
    }

    /// The GPU-side visibility word array.
    pub fn visibility_buffer(&self) -> BufferId {
        self.words
    }

    /// Moves render-thread ownership to the calling thread.
    pub fn rebind_to_current_thread(&mut self) {
        self.affinity.rebind_to_current();
    }

    fn occlusion_active(&self) -> bool {
        self.config.culling_enabled && self.config.occlusion_enabled && self.targets.is_some()
    }

    /// Uploads this frame's bounding spheres and camera.
    ///
    /// `records[i]` belongs to renderable `i`. Exceeding the capacity is fatal.
    pub fn prepare(&mut self, records: &[CullRecord], camera: &CullCamera) -> Result<(), CullError> {
        self.affinity.check("DepthPyramidCuller::prepare");
        if records.len() > self.capacity() {
            return Err(CullError::CapacityExceeded {
                requested: records.len(),
                capacity: self.capacity(),
            });
        }
        self.record_count = records.len();
        if !self.occlusion_active() || records.is_empty() {
            return Ok(());
        }

        let Some(targets) = &self.targets else {
            return Ok(());
        };
        let uniforms = CullUniforms::new(
            camera,
            targets.extent,
            targets.mip_count,
            records.len() as u32,
            self.config.depth_bias,
        );
        self.device
            .write_buffer(self.records, 0, bytemuck::cast_slice(records))?;
        self.device
            .write_buffer(self.uniforms, 0, bytemuck::bytes_of(&uniforms))?;
        Ok(())
    }

    /// Records the pyramid build, the visibility dispatch and the copy into `slot`'s
    /// readback buffer. Must follow the depth-only pass in the same command stream.
    ///
    /// Returns `false` when nothing was recorded because every renderable is visible
    /// anyway (culling or occlusion disabled, zero-sized target, no records).
    pub fn record(&mut self, encoder: &mut dyn CommandEncoder, slot: usize) -> bool {
        self.affinity.check("DepthPyramidCuller::record");
        let slot = slot % self.readback.len();
        let count = self.record_count;
        let targets = match &self.targets {
            Some(targets) if self.occlusion_active() && count > 0 => targets,
            _ => {
                self.slot_work[slot] = Some(SlotWork::AllVisible(count));
                return false;
            }
        };

        let groups = |size: u32| size.div_ceil(PYRAMID_WORKGROUP_SIZE);
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Hi-Z Pyramid"),
            });
            pass.set_pipeline(self.depth_copy.id);
            pass.set_bind_group(0, targets.copy_group);
            pass.dispatch_workgroups(groups(targets.extent.width), groups(targets.extent.height), 1);

            pass.set_pipeline(self.reduce.id);
            for (index, group) in targets.reduce_groups.iter().enumerate() {
                let mip = targets.extent.mip(index as u32 + 1);
                pass.set_bind_group(0, *group);
                pass.dispatch_workgroups(groups(mip.width), groups(mip.height), 1);
            }
        }

        let words = word_count(count) as u32;
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Visibility"),
            });
            pass.set_pipeline(self.cull.id);
            pass.set_bind_group(0, targets.cull_group);
            pass.dispatch_workgroups(words.div_ceil(CULL_WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(self.words, 0, self.readback[slot], 0, words as u64 * 4);

        log::trace!(
            "DepthPyramidCuller: recorded {} mips and {} words for slot {}",
            targets.mip_count,
            words,
            slot
        );
        self.slot_work[slot] = Some(SlotWork::Dispatched(count));
        true
    }

    /// Reads `slot`'s visibility words.
    ///
    /// The work recorded by [`Self::record`] must have been submitted; the read waits
    /// for it, bounded by the configured readback timeout.
    pub fn resolve_visibility(&mut self, slot: usize) -> Result<VisibilitySet, CullError> {
        self.affinity.check("DepthPyramidCuller::resolve_visibility");
        let slot = slot % self.readback.len();
        match self.slot_work[slot].take() {
            None => Err(CullError::NotRecorded(slot)),
            Some(SlotWork::AllVisible(count)) => Ok(VisibilitySet::all_visible(count)),
            Some(SlotWork::Dispatched(count)) => {
                let bytes = self.device.read_buffer(
                    self.readback[slot],
                    0,
                    word_count(count) as u64 * 4,
                    self.config.readback_timeout(),
                )?;
                let words: Vec<u32> = bytes
                    .chunks_exact(4)
                    .map(bytemuck::pod_read_unaligned::<u32>)
                    .collect();
                Ok(VisibilitySet::from_words(words, count))
            }
        }
    }

    fn build_targets(
        &self,
        extent: Extent2d,
        created: &mut Vec<GpuResource>,
    ) -> Result<PyramidTargets, ResourceError> {
        let device = self.device.as_ref();
        let mips = mip_count(extent);

        let depth_texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("Scene Depth")),
            size: extent,
            mip_level_count: 1,
            format: self.depth_format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        })?;
        created.push(depth_texture.into());
        let depth_view = device.create_texture_view(depth_texture, &TextureViewDescriptor::default())?;
        created.push(depth_view.into());

        let pyramid = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("Hi-Z Pyramid")),
            size: extent,
            mip_level_count: mips,
            format: PYRAMID_FORMAT,
            usage: TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
        })?;
        created.push(pyramid.into());
        let pyramid_view = device.create_texture_view(pyramid, &TextureViewDescriptor::default())?;
        created.push(pyramid_view.into());

        let mut mip_views = Vec::with_capacity(mips as usize);
        for mip in 0..mips {
            let view = device.create_texture_view(pyramid, &TextureViewDescriptor::single_mip(mip))?;
            created.push(view.into());
            mip_views.push(view);
        }

        let copy_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Hi-Z Depth Copy"),
            layout: self.depth_copy.group_layout,
            entries: &[BindGroupEntry::view(0, depth_view), BindGroupEntry::view(1, mip_views[0])],
        })?;
        created.push(copy_group.into());

        let mut reduce_groups = Vec::with_capacity(mip_views.len().saturating_sub(1));
        for pair in mip_views.windows(2) {
            let group = device.create_bind_group(&BindGroupDescriptor {
                label: Some("Hi-Z Reduce"),
                layout: self.reduce.group_layout,
                entries: &[BindGroupEntry::view(0, pair[0]), BindGroupEntry::view(1, pair[1])],
            })?;
            created.push(group.into());
            reduce_groups.push(group);
        }

        let cull_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Visibility"),
            layout: self.cull.group_layout,
            entries: &[
                BindGroupEntry::buffer(0, self.uniforms),
                BindGroupEntry::buffer(1, self.records),
                BindGroupEntry::view(2, pyramid_view),
                BindGroupEntry::buffer(3, self.words),
            ],
        })?;
        created.push(cull_group.into());

        Ok(PyramidTargets {
            extent,
            mip_count: mips,
            depth_texture,
            depth_view,
            pyramid,
            pyramid_view,
            mip_views,
            copy_group,
            reduce_groups,
            cull_group,
        })
    }

    /// Retires every object the culler owns. The kernels belong to the pipeline cache.
    pub fn destroy(&mut self, graveyard: &mut ResourceGraveyard) {
        if let Some(targets) = self.targets.take() {
            graveyard.retire_all(targets.resources());
        }
        graveyard.retire_all([self.records, self.uniforms, self.words]);
        graveyard.retire_all(self.readback.drain(..));
        self.slot_work.clear();
    }
}

impl SizeDependent for DepthPyramidCuller {
    fn resize(&mut self, graveyard: &mut ResourceGraveyard, extent: Extent2d) -> Result<(), ResourceError> {
        self.affinity.check("DepthPyramidCuller::resize");
        if let Some(old) = self.targets.take() {
            graveyard.retire_all(old.resources());
        }
        self.extent = extent;
        if extent.is_empty() {
            log::debug!("DepthPyramidCuller: zero-sized target, pyramid skipped");
            return Ok(());
        }

        let mut created = Vec::new();
        match self.build_targets(extent, &mut created) {
            Ok(targets) => {
                log::debug!(
                    "DepthPyramidCuller: {}x{} target, {} mips",
                    extent.width,
                    extent.height,
                    targets.mip_count
                );
                self.targets = Some(targets);
                Ok(())
            }
            Err(e) => {
                graveyard.retire_all(created);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::{ShaderModuleDescriptor, ShaderSource};
    use crate::renderer::headless::HeadlessDevice;
    use glam::{Mat4, Vec3};

    struct Fixture {
        device: HeadlessDevice,
        graveyard: ResourceGraveyard,
        culler: DepthPyramidCuller,
    }

    fn fixture(config: RendererConfig) -> Fixture {
        let device = HeadlessDevice::new();
        let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
        let module = |label| {
            device
                .create_shader_module(&ShaderModuleDescriptor {
                    label: Some(label),
                    source: ShaderSource::Wgsl(Cow::Borrowed("")),
                })
                .unwrap()
        };
        let shaders = CullShaderModules {
            depth_copy: module("copy"),
            reduce: module("reduce"),
            cull: module("cull"),
        };
        let cache = PipelineStateCache::new();
        let culler = DepthPyramidCuller::new(shared.clone(), &cache, &shaders, &config).unwrap();
        Fixture {
            device,
            graveyard: ResourceGraveyard::new(shared, config.frames_in_flight),
            culler,
        }
    }

    fn camera() -> CullCamera {
        CullCamera::new(
            Mat4::IDENTITY,
            Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0),
            0.1,
        )
    }

    fn records(count: usize) -> Vec<CullRecord> {
        (0..count)
            .map(|i| CullRecord::new(Vec3::new(i as f32, 0.0, -10.0), 1.0))
            .collect()
    }

    #[test]
    fn resize_builds_one_view_per_mip() {
        let mut f = fixture(RendererConfig::default());
        f.culler.resize(&mut f.graveyard, Extent2d::new(100, 60)).unwrap();
        assert_eq!(f.culler.mip_count(), 7);
        assert!(f.culler.depth_target().is_some());
    }

    #[test]
    fn capacity_overflow_is_fatal() {
        let mut config = RendererConfig::default();
        config.culling.max_records = 8;
        let mut f = fixture(config);
        assert!(matches!(
            f.culler.prepare(&records(9), &camera()),
            Err(CullError::CapacityExceeded {
                requested: 9,
                capacity: 8
            })
        ));
    }

    #[test]
    fn zero_sized_target_reports_all_visible() {
        let mut f = fixture(RendererConfig::default());
        f.culler.resize(&mut f.graveyard, Extent2d::new(0, 0)).unwrap();
        assert!(f.culler.depth_target().is_none());

        f.culler.prepare(&records(5), &camera()).unwrap();
        let mut encoder = f.device.create_command_encoder(None);
        assert!(!f.culler.record(encoder.as_mut(), 0));
        let visibility = f.culler.resolve_visibility(0).unwrap();
        assert_eq!(visibility.visible_count(), 5);
    }

    #[test]
    fn disabled_culling_skips_the_gpu() {
        let mut config = RendererConfig::default();
        config.culling.culling_enabled = false;
        let mut f = fixture(config);
        f.culler.resize(&mut f.graveyard, Extent2d::new(16, 16)).unwrap();
        f.culler.prepare(&records(3), &camera()).unwrap();

        let mut encoder = f.device.create_command_encoder(None);
        assert!(!f.culler.record(encoder.as_mut(), 1));
        f.device.submit_command_buffer(encoder.finish()).unwrap();
        assert_eq!(f.device.stats().dispatches, 0);
        assert_eq!(f.culler.resolve_visibility(1).unwrap().visible_count(), 3);
    }

    #[test]
    fn words_reach_the_slot_readback() {
        let mut f = fixture(RendererConfig::default());
        f.culler.resize(&mut f.graveyard, Extent2d::new(16, 16)).unwrap();
        f.culler.prepare(&records(40), &camera()).unwrap();
        // The headless device does not run kernels; stand in for the cull output.
        f.device
            .write_buffer(f.culler.visibility_buffer(), 0, bytemuck::cast_slice(&[0xF0F0_F0F0u32, 0x3]))
            .unwrap();

        let mut encoder = f.device.create_command_encoder(None);
        assert!(f.culler.record(encoder.as_mut(), 2));
        f.device.submit_command_buffer(encoder.finish()).unwrap();

        let visibility = f.culler.resolve_visibility(2).unwrap();
        assert_eq!(visibility.words(), &[0xF0F0_F0F0, 0x3]);
        assert_eq!(f.device.stats().compute_passes, 2);
        // Copy, then one reduction per mip after the first, then the visibility kernel.
        assert_eq!(f.device.stats().dispatches, 1 + 3 + 1);
    }

    #[test]
    fn resolve_without_record_is_an_error() {
        let mut f = fixture(RendererConfig::default());
        assert!(matches!(
            f.culler.resolve_visibility(0),
            Err(CullError::NotRecorded(0))
        ));
    }

    #[test]
    fn destroy_releases_everything_but_kernels() {
        let mut f = fixture(RendererConfig::default());
        let baseline = f.device.live_resource_count();
        f.culler.resize(&mut f.graveyard, Extent2d::new(32, 32)).unwrap();
        f.culler.resize(&mut f.graveyard, Extent2d::new(64, 32)).unwrap();
        f.culler.destroy(&mut f.graveyard);
        f.graveyard.flush();
        // 3 modules + 3 x (pipeline, layout, set layout) remain.
        assert_eq!(f.device.live_resource_count(), baseline - 3 - 3);
        assert_eq!(f.device.live_resource_count(), 12);
    }
}
