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

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use strata_core::renderer::api::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutId, BindingResource,
    BufferDescriptor, BufferId, BufferUsage, CommandBufferId, ComputePipelineDescriptor,
    ComputePipelineId, PipelineLayoutDescriptor, PipelineLayoutId, RenderPipelineDescriptor,
    RenderPipelineId, SamplerDescriptor, SamplerId, ShaderModuleDescriptor, ShaderModuleId,
    ShaderSource, ShaderStage, SubmissionId, TextureDescriptor, TextureId, TextureViewDescriptor,
    TextureViewId, WaitStatus,
};
use strata_core::renderer::traits::CommandEncoder;
use strata_core::renderer::{GraphicsDevice, ResourceError, ShaderError};

use super::command::WgpuCommandEncoder;
use super::context::WgpuGraphicsContext;
use super::conversions::{
    binding_count, blend_state, depth_stencil_state, primitive_state, IntoWgpu,
};

/// One map of live objects of a single kind, keyed by raw id.
#[derive(Debug)]
struct Registry<T> {
    kind: &'static str,
    entries: Mutex<HashMap<usize, T>>,
}

impl<T> Registry<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, T>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, id: usize, entry: T) {
        self.lock().insert(id, entry);
    }

    fn remove(&self, id: usize) -> Result<T, ResourceError> {
        self.lock()
            .remove(&id)
            .ok_or_else(|| ResourceError::not_found(self.kind, id))
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

impl<T: Clone> Registry<T> {
    fn get(&self, id: usize) -> Result<T, ResourceError> {
        self.lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| ResourceError::not_found(self.kind, id))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WgpuBufferEntry {
    pub(crate) wgpu_buffer: Arc<wgpu::Buffer>,
    pub(crate) size: u64,
    pub(crate) usage: BufferUsage,
}

#[derive(Debug, Clone)]
pub(crate) struct WgpuTextureEntry {
    pub(crate) wgpu_texture: Arc<wgpu::Texture>,
    pub(crate) size: u64, // To track VRAM accurately on destruction
}

/// The internal, non-clonable state of the WgpuDevice.
#[derive(Debug)]
pub struct WgpuDeviceInternal {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    downlevel_flags: wgpu::DownlevelFlags,

    shader_modules: Registry<Arc<wgpu::ShaderModule>>,
    bind_group_layouts: Registry<Arc<wgpu::BindGroupLayout>>,
    bind_groups: Registry<Arc<wgpu::BindGroup>>,
    pipeline_layouts: Registry<Arc<wgpu::PipelineLayout>>,
    render_pipelines: Registry<Arc<wgpu::RenderPipeline>>,
    compute_pipelines: Registry<Arc<wgpu::ComputePipeline>>,
    buffers: Registry<WgpuBufferEntry>,
    textures: Registry<WgpuTextureEntry>,
    texture_views: Registry<Arc<wgpu::TextureView>>,
    samplers: Registry<Arc<wgpu::Sampler>>,
    /// Views of presentation images; not counted as live device objects.
    surface_views: Registry<Arc<wgpu::TextureView>>,

    next_id: AtomicUsize,

    // VRAM Tracking
    vram_allocated_bytes: AtomicU64,
    vram_peak_bytes: AtomicU64,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<usize, wgpu::CommandBuffer>>,
    /// Queue indices of submissions whose completion was not yet observed.
    in_flight: Mutex<BTreeMap<u64, wgpu::SubmissionIndex>>,
    next_submission: AtomicU64,
    completed_submission: Arc<AtomicU64>,
}

/// A clonable, thread-safe handle to the WGPU graphics device.
///
/// It wraps the actual device state (`WgpuDeviceInternal`) in an Arc, allowing it
/// to be shared across threads and with command encoders and surfaces.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

impl WgpuDevice {
    /// Wraps the logical device and queue of `context`.
    pub fn new(context: &WgpuGraphicsContext) -> Self {
        Self {
            internal: Arc::new(WgpuDeviceInternal {
                device: context.device.clone(),
                queue: context.queue.clone(),
                adapter_name: context.adapter_name.clone(),
                downlevel_flags: context.downlevel_flags,
                shader_modules: Registry::new("shader module"),
                bind_group_layouts: Registry::new("bind group layout"),
                bind_groups: Registry::new("bind group"),
                pipeline_layouts: Registry::new("pipeline layout"),
                render_pipelines: Registry::new("render pipeline"),
                compute_pipelines: Registry::new("compute pipeline"),
                buffers: Registry::new("buffer"),
                textures: Registry::new("texture"),
                texture_views: Registry::new("texture view"),
                samplers: Registry::new("sampler"),
                surface_views: Registry::new("surface view"),
                next_id: AtomicUsize::new(1),
                vram_allocated_bytes: AtomicU64::new(0),
                vram_peak_bytes: AtomicU64::new(0),
                pending_command_buffers: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(BTreeMap::new()),
                next_submission: AtomicU64::new(1),
                completed_submission: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    fn generate_id(&self) -> usize {
        self.internal.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Runs `call` inside validation and out-of-memory error scopes.
    ///
    /// Scopes are thread-local, so concurrent callers never see each other's errors.
    fn scoped<T>(&self, call: impl FnOnce() -> T) -> Result<T, wgpu::Error> {
        let device = &self.internal.device;
        let memory = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = call();
        let invalid = pollster::block_on(validation.pop());
        let exhausted = pollster::block_on(memory.pop());
        match invalid.or(exhausted) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    /// Like [`Self::scoped`], mapping a captured error to a [`ResourceError`].
    fn checked<T>(&self, what: &str, call: impl FnOnce() -> T) -> Result<T, ResourceError> {
        self.scoped(call).map_err(|error| {
            log::error!("WgpuDevice: {what} failed: {error}");
            match error {
                wgpu::Error::OutOfMemory { .. } => ResourceError::OutOfMemory,
                other => ResourceError::BackendError(format!("{what}: {other}")),
            }
        })
    }

    /// The underlying `wgpu::Device`.
    pub fn wgpu_device(&self) -> &wgpu::Device {
        &self.internal.device
    }

    /// Bytes currently allocated by buffers and textures.
    pub fn vram_allocated_bytes(&self) -> u64 {
        self.internal.vram_allocated_bytes.load(Ordering::Relaxed)
    }

    /// Highest value [`Self::vram_allocated_bytes`] reached.
    pub fn vram_peak_bytes(&self) -> u64 {
        self.internal.vram_peak_bytes.load(Ordering::Relaxed)
    }

    fn track_allocation(&self, bytes: u64) {
        let current = self
            .internal
            .vram_allocated_bytes
            .fetch_add(bytes, Ordering::Relaxed)
            + bytes;
        self.internal
            .vram_peak_bytes
            .fetch_max(current, Ordering::Relaxed);
    }

    fn track_release(&self, bytes: u64) {
        self.internal
            .vram_allocated_bytes
            .fetch_sub(bytes, Ordering::Relaxed);
    }

    // --- Lookups used by command encoders ---

    pub(crate) fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        self.internal.buffers.get(id.0).ok().map(|e| e.wgpu_buffer)
    }

    pub(crate) fn get_wgpu_texture_view(&self, id: TextureViewId) -> Option<Arc<wgpu::TextureView>> {
        self.internal
            .texture_views
            .get(id.0)
            .or_else(|_| self.internal.surface_views.get(id.0))
            .ok()
    }

    pub(crate) fn get_wgpu_bind_group(&self, id: BindGroupId) -> Option<Arc<wgpu::BindGroup>> {
        self.internal.bind_groups.get(id.0).ok()
    }

    pub(crate) fn get_wgpu_render_pipeline(&self, id: RenderPipelineId) -> Option<Arc<wgpu::RenderPipeline>> {
        self.internal.render_pipelines.get(id.0).ok()
    }

    pub(crate) fn get_wgpu_compute_pipeline(&self, id: ComputePipelineId) -> Option<Arc<wgpu::ComputePipeline>> {
        self.internal.compute_pipelines.get(id.0).ok()
    }

    /// Registers the view of an acquired presentation image.
    pub(crate) fn register_surface_view(&self, view: wgpu::TextureView) -> TextureViewId {
        let id = self.generate_id();
        self.internal.surface_views.insert(id, Arc::new(view));
        TextureViewId(id)
    }

    /// Forgets a view registered with [`Self::register_surface_view`].
    pub(crate) fn unregister_surface_view(&self, id: TextureViewId) {
        if self.internal.surface_views.remove(id.0).is_err() {
            log::warn!("WgpuDevice: surface view {:?} was not registered", id);
        }
    }

    /// (crate-internal) Registers a finished wgpu::CommandBuffer, storing it
    /// in a map and returning an abstract ID for it.
    pub(crate) fn register_command_buffer(&self, buffer: wgpu::CommandBuffer) -> CommandBufferId {
        let id = self.generate_id();
        self.internal
            .pending_command_buffers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, buffer);
        CommandBufferId(id)
    }

    // --- Submission tracking ---

    fn completed(&self) -> u64 {
        self.internal.completed_submission.load(Ordering::Acquire)
    }

    fn mark_completed(&self, submission: u64) {
        self.internal
            .completed_submission
            .fetch_max(submission, Ordering::AcqRel);
        let completed = self.completed();
        let mut in_flight = self
            .internal
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *in_flight = in_flight.split_off(&(completed + 1));
    }

    /// Processes finished work without blocking, firing completion callbacks.
    fn poll_non_blocking(&self) {
        if let Err(e) = self.internal.device.poll(wgpu::PollType::Poll) {
            log::warn!("WgpuDevice: non-blocking poll failed: {e:?}");
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    // --- Shader Module Operations ---

    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let source = match &descriptor.source {
            ShaderSource::Wgsl(code) => {
                if code.trim().is_empty() {
                    return Err(ShaderError::CompilationError {
                        label: descriptor.label.unwrap_or_default().to_owned(),
                        details: "empty WGSL source".to_owned(),
                    }
                    .into());
                }
                wgpu::ShaderSource::Wgsl(code.clone())
            }
        };
        let module = self
            .scoped(|| {
                self.internal
                    .device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: descriptor.label,
                        source,
                    })
            })
            .map_err(|error| match error {
                wgpu::Error::OutOfMemory { .. } => ResourceError::OutOfMemory,
                other => ShaderError::CompilationError {
                    label: descriptor.label.unwrap_or_default().to_owned(),
                    details: other.to_string(),
                }
                .into(),
            })?;
        let id = self.generate_id();
        self.internal.shader_modules.insert(id, Arc::new(module));
        log::info!(
            "WgpuDevice: Created shader module '{}' with ID {}",
            descriptor.label.unwrap_or_default(),
            id
        );
        Ok(ShaderModuleId(id))
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.internal.shader_modules.remove(id.0)?;
        log::debug!("WgpuDevice: Destroyed shader module {id:?}");
        Ok(())
    }

    // --- Binding Operations ---

    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = descriptor
            .entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: entry.visibility.into_wgpu(),
                ty: entry.ty.into_wgpu(),
                count: binding_count(entry.count),
            })
            .collect();
        let layout = self.checked("create_bind_group_layout", || {
            self.internal
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: descriptor.label,
                    entries: &entries,
                })
        })?;
        let id = self.generate_id();
        self.internal.bind_group_layouts.insert(id, Arc::new(layout));
        log::debug!(
            "WgpuDevice: Created bind group layout {:?} ({} entries)",
            descriptor.label,
            entries.len()
        );
        Ok(BindGroupLayoutId(id))
    }

    fn destroy_bind_group_layout(&self, id: BindGroupLayoutId) -> Result<(), ResourceError> {
        self.internal.bind_group_layouts.remove(id.0)?;
        log::debug!("WgpuDevice: Destroyed bind group layout {id:?}");
        Ok(())
    }

    fn create_bind_group(&self, descriptor: &BindGroupDescriptor) -> Result<BindGroupId, ResourceError> {
        let layout = self.internal.bind_group_layouts.get(descriptor.layout.0)?;

        // Resolve every resource first so the wgpu entries can borrow them.
        enum Resolved {
            Buffer(Arc<wgpu::Buffer>, u64, Option<std::num::NonZeroU64>),
            View(Arc<wgpu::TextureView>),
            Sampler(Arc<wgpu::Sampler>),
        }
        let resolved = descriptor
            .entries
            .iter()
            .map(|entry| {
                Ok(match entry.resource {
                    BindingResource::Buffer(binding) => Resolved::Buffer(
                        self.internal.buffers.get(binding.buffer.0)?.wgpu_buffer,
                        binding.offset,
                        binding.size,
                    ),
                    BindingResource::TextureView(view) => {
                        Resolved::View(self.internal.texture_views.get(view.0)?)
                    }
                    BindingResource::Sampler(sampler) => {
                        Resolved::Sampler(self.internal.samplers.get(sampler.0)?)
                    }
                })
            })
            .collect::<Result<Vec<_>, ResourceError>>()?;

        let entries: Vec<wgpu::BindGroupEntry> = descriptor
            .entries
            .iter()
            .zip(&resolved)
            .map(|(entry, resource)| wgpu::BindGroupEntry {
                binding: entry.binding,
                resource: match resource {
                    Resolved::Buffer(buffer, offset, size) => {
                        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer,
                            offset: *offset,
                            size: *size,
                        })
                    }
                    Resolved::View(view) => wgpu::BindingResource::TextureView(view),
                    Resolved::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
                },
            })
            .collect();

        let group = self.checked("create_bind_group", || {
            self.internal
                .device
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: descriptor.label,
                    layout: &layout,
                    entries: &entries,
                })
        })?;
        let id = self.generate_id();
        self.internal.bind_groups.insert(id, Arc::new(group));
        Ok(BindGroupId(id))
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        self.internal.bind_groups.remove(id.0)?;
        Ok(())
    }

    // --- Pipeline Operations ---

    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError> {
        let layouts = descriptor
            .bind_group_layouts
            .iter()
            .map(|id| self.internal.bind_group_layouts.get(id.0))
            .collect::<Result<Vec<_>, _>>()?;
        let layout_refs: Vec<&wgpu::BindGroupLayout> = layouts.iter().map(|l| l.as_ref()).collect();
        let layout = self.checked("create_pipeline_layout", || {
            self.internal
                .device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: descriptor.label,
                    bind_group_layouts: &layout_refs,
                    immediate_size: 0,
                })
        })?;
        let id = self.generate_id();
        self.internal.pipeline_layouts.insert(id, Arc::new(layout));
        log::debug!(
            "WgpuDevice: Created pipeline layout {:?} with {} sets",
            descriptor.label,
            layout_refs.len()
        );
        Ok(PipelineLayoutId(id))
    }

    fn destroy_pipeline_layout(&self, id: PipelineLayoutId) -> Result<(), ResourceError> {
        self.internal.pipeline_layouts.remove(id.0)?;
        Ok(())
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        log::debug!(
            "WgpuDevice: Creating render pipeline with label: {:?}",
            descriptor.label
        );
        let layout = self.internal.pipeline_layouts.get(descriptor.layout.0)?;
        let vertex_module = self.internal.shader_modules.get(descriptor.vertex.module.0)?;
        let pixel_module = descriptor
            .pixel
            .as_ref()
            .map(|stage| self.internal.shader_modules.get(stage.module.0))
            .transpose()?;

        let primitive = primitive_state(descriptor.state.rasterizer, descriptor.state.topology)
            .ok_or_else(|| {
                ResourceError::BackendError(format!(
                    "topology {:?} is not supported by the wgpu backend",
                    descriptor.state.topology
                ))
            })?;

        // 1. Vertex buffer layouts
        let attributes: Vec<Vec<wgpu::VertexAttribute>> = descriptor
            .vertex_buffers
            .iter()
            .map(|buffer| {
                buffer
                    .attributes
                    .iter()
                    .map(|attr| wgpu::VertexAttribute {
                        format: attr.format.into_wgpu(),
                        offset: attr.offset,
                        shader_location: attr.shader_location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = descriptor
            .vertex_buffers
            .iter()
            .zip(&attributes)
            .map(|(buffer, attributes)| wgpu::VertexBufferLayout {
                array_stride: buffer.array_stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        // 2. Colour targets
        let (blend, write_mask) = blend_state(descriptor.state.blend);
        let targets: Vec<Option<wgpu::ColorTargetState>> = descriptor
            .color_formats
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: (*format).into_wgpu(),
                    blend,
                    write_mask,
                })
            })
            .collect();

        // 3. Depth
        let depth_stencil = descriptor.depth_format.map(|format| {
            depth_stencil_state(descriptor.state.depth, descriptor.state.depth_compare, format)
        });

        let pipeline = self.checked("create_render_pipeline", || {
            self.internal
                .device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: descriptor.label,
                    layout: Some(layout.as_ref()),
                    vertex: wgpu::VertexState {
                        module: &vertex_module,
                        entry_point: Some(descriptor.vertex.entry_point),
                        buffers: &vertex_buffers,
                        compilation_options: Default::default(),
                    },
                    fragment: pixel_module.as_ref().zip(descriptor.pixel.as_ref()).map(
                        |(module, stage)| wgpu::FragmentState {
                            module,
                            entry_point: Some(stage.entry_point),
                            targets: &targets,
                            compilation_options: Default::default(),
                        },
                    ),
                    primitive,
                    depth_stencil,
                    multisample: wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                })
        })?;
        let id = self.generate_id();
        self.internal.render_pipelines.insert(id, Arc::new(pipeline));
        log::info!(
            "WgpuDevice: Created render pipeline '{}' with ID {}",
            descriptor.label.unwrap_or_default(),
            id
        );
        Ok(RenderPipelineId(id))
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.internal.render_pipelines.remove(id.0)?;
        log::debug!("WgpuDevice: Destroyed render pipeline {id:?}");
        Ok(())
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let layout = self.internal.pipeline_layouts.get(descriptor.layout.0)?;
        let module = self.internal.shader_modules.get(descriptor.stage.module.0)?;
        if !self.supports_stage(ShaderStage::Compute) {
            return Err(ResourceError::BackendError(format!(
                "adapter \"{}\" cannot run compute shaders",
                self.internal.adapter_name
            )));
        }
        let pipeline = self.checked("create_compute_pipeline", || {
            self.internal
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: descriptor.label,
                    layout: Some(layout.as_ref()),
                    module: &module,
                    entry_point: Some(descriptor.stage.entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                })
        })?;
        let id = self.generate_id();
        self.internal.compute_pipelines.insert(id, Arc::new(pipeline));
        log::info!(
            "WgpuDevice: Created compute pipeline '{}' with ID {}",
            descriptor.label.unwrap_or_default(),
            id
        );
        Ok(ComputePipelineId(id))
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        self.internal.compute_pipelines.remove(id.0)?;
        log::debug!("WgpuDevice: Destroyed compute pipeline {id:?}");
        Ok(())
    }

    // --- Buffer Operations ---

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let buffer = self.checked("create_buffer", || {
            self.internal.device.create_buffer(&wgpu::BufferDescriptor {
                label: descriptor.label.as_deref(),
                size: descriptor.size,
                usage: descriptor.usage.into_wgpu(),
                mapped_at_creation: false,
            })
        })?;
        let id = self.generate_id();
        self.track_allocation(descriptor.size);
        self.internal.buffers.insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer: Arc::new(buffer),
                size: descriptor.size,
                usage: descriptor.usage,
            },
        );
        log::info!(
            "WgpuDevice: Created buffer '{}' with ID {}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(BufferId(id))
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = self.internal.buffers.remove(id.0)?;
        entry.wgpu_buffer.destroy();
        self.track_release(entry.size);
        log::debug!("WgpuDevice: Destroyed buffer {id:?}");
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let entry = self.internal.buffers.get(id.0)?;
        let len = data.len() as u64;
        if offset.checked_add(len).is_none_or(|end| end > entry.size) {
            return Err(ResourceError::OutOfBounds {
                offset,
                len,
                size: entry.size,
            });
        }
        ResourceError::check_copy_alignment(offset, len)?;
        self.checked("write_buffer", || {
            self.internal
                .queue
                .write_buffer(&entry.wgpu_buffer, offset, data)
        })
    }

    fn read_buffer(
        &self,
        id: BufferId,
        offset: u64,
        size: u64,
        timeout: Duration,
    ) -> Result<Vec<u8>, ResourceError> {
        let entry = self.internal.buffers.get(id.0)?;
        if !entry.usage.contains(BufferUsage::MAP_READ) {
            return Err(ResourceError::BackendError(format!(
                "buffer {} is not MAP_READ",
                id.0
            )));
        }
        if offset + size > entry.size {
            return Err(ResourceError::OutOfBounds {
                offset,
                len: size,
                size: entry.size,
            });
        }

        let mapped = Arc::new(Mutex::new(None));
        let mapped_for_callback = Arc::clone(&mapped);
        let slice = entry.wgpu_buffer.slice(offset..offset + size);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            *mapped_for_callback
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(result);
        });

        if let Err(e) = self.internal.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(timeout),
        }) {
            log::warn!("WgpuDevice: readback poll ended early: {e:?}");
        }

        let result = mapped
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match result {
            Some(Ok(())) => {
                let bytes = slice.get_mapped_range().to_vec();
                entry.wgpu_buffer.unmap();
                Ok(bytes)
            }
            Some(Err(e)) => Err(ResourceError::BackendError(format!(
                "mapping buffer {} failed: {e:?}",
                id.0
            ))),
            None => Err(ResourceError::BackendError(format!(
                "mapping buffer {} did not complete within {:?}",
                id.0, timeout
            ))),
        }
    }

    // --- Texture Operations ---

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let texture = self.checked("create_texture", || {
            self.internal.device.create_texture(&wgpu::TextureDescriptor {
                label: descriptor.label.as_deref(),
                size: wgpu::Extent3d {
                    width: descriptor.size.width,
                    height: descriptor.size.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: descriptor.mip_level_count,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: descriptor.format.into_wgpu(),
                usage: descriptor.usage.into_wgpu(),
                view_formats: &[],
            })
        })?;

        // Simplified size: mip 0 texels times texel size, plus a third for the mip chain.
        let base = descriptor.size.width as u64
            * descriptor.size.height as u64
            * descriptor.format.bytes_per_texel() as u64;
        let size = if descriptor.mip_level_count > 1 {
            base + base / 3
        } else {
            base
        };

        let id = self.generate_id();
        self.track_allocation(size);
        self.internal.textures.insert(
            id,
            WgpuTextureEntry {
                wgpu_texture: Arc::new(texture),
                size,
            },
        );
        log::info!(
            "WgpuDevice: Created texture '{}' with ID {} ({}x{}, {} mips)",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.mip_level_count
        );
        Ok(TextureId(id))
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let entry = self.internal.textures.remove(id.0)?;
        entry.wgpu_texture.destroy();
        self.track_release(entry.size);
        log::debug!("WgpuDevice: Destroyed texture {id:?}");
        Ok(())
    }

    fn create_texture_view(
        &self,
        texture_id: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let texture = self.internal.textures.get(texture_id.0)?;
        let view = self.checked("create_texture_view", || {
            texture.wgpu_texture.create_view(&wgpu::TextureViewDescriptor {
                label: descriptor.label.as_deref(),
                base_mip_level: descriptor.base_mip_level,
                mip_level_count: descriptor.mip_level_count,
                ..Default::default()
            })
        })?;
        let id = self.generate_id();
        self.internal.texture_views.insert(id, Arc::new(view));
        Ok(TextureViewId(id))
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        self.internal.texture_views.remove(id.0)?;
        Ok(())
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let filter = descriptor.filter.into_wgpu();
        let sampler = self.checked("create_sampler", || {
            self.internal.device.create_sampler(&wgpu::SamplerDescriptor {
                label: descriptor.label.as_deref(),
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        })?;
        let id = self.generate_id();
        self.internal.samplers.insert(id, Arc::new(sampler));
        Ok(SamplerId(id))
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.internal.samplers.remove(id.0)?;
        Ok(())
    }

    // --- Command Operations ---

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        let encoder = self
            .internal
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label });
        Box::new(WgpuCommandEncoder::new(encoder, self.clone()))
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) -> Result<SubmissionId, ResourceError> {
        let buffer = self
            .internal
            .pending_command_buffers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&command_buffer.0)
            .ok_or_else(|| ResourceError::not_found("command buffer", command_buffer.0))?;

        // Holding the map across submit keeps submission ids in queue order.
        let mut in_flight = self
            .internal
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let index = self.checked("submit", || self.internal.queue.submit(std::iter::once(buffer)))?;
        let submission = self.internal.next_submission.fetch_add(1, Ordering::AcqRel);
        let completed = Arc::clone(&self.internal.completed_submission);
        self.internal.queue.on_submitted_work_done(move || {
            completed.fetch_max(submission, Ordering::AcqRel);
        });
        in_flight.insert(submission, index);
        log::trace!("WgpuDevice: submission {}", submission);
        Ok(SubmissionId(submission))
    }

    fn is_submission_complete(&self, submission: SubmissionId) -> bool {
        if self.completed() >= submission.0 {
            return true;
        }
        self.poll_non_blocking();
        self.completed() >= submission.0
    }

    fn wait_for_submission(
        &self,
        submission: SubmissionId,
        timeout: Duration,
    ) -> Result<WaitStatus, ResourceError> {
        if self.is_submission_complete(submission) {
            self.mark_completed(submission.0);
            return Ok(WaitStatus::Complete);
        }
        let index = self
            .internal
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&submission.0)
            .cloned();
        let Some(index) = index else {
            return Err(ResourceError::BackendError(format!(
                "submission {} was never made on this device",
                submission.0
            )));
        };

        match self.internal.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout: Some(timeout),
        }) {
            Ok(_) => {
                self.mark_completed(submission.0);
                Ok(WaitStatus::Complete)
            }
            Err(wgpu::PollError::Timeout) => Ok(WaitStatus::TimedOut),
            Err(e) => Err(ResourceError::BackendError(format!("poll failed: {e:?}"))),
        }
    }

    fn wait_idle(&self) -> Result<(), ResourceError> {
        self.internal
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| ResourceError::BackendError(format!("poll failed: {e:?}")))?;
        let last = self.internal.next_submission.load(Ordering::Acquire) - 1;
        self.mark_completed(last);
        Ok(())
    }

    fn live_resource_count(&self) -> usize {
        let internal = &self.internal;
        internal.shader_modules.len()
            + internal.bind_group_layouts.len()
            + internal.bind_groups.len()
            + internal.pipeline_layouts.len()
            + internal.render_pipelines.len()
            + internal.compute_pipelines.len()
            + internal.buffers.len()
            + internal.textures.len()
            + internal.texture_views.len()
            + internal.samplers.len()
    }

    fn supports_stage(&self, stage: ShaderStage) -> bool {
        match stage {
            ShaderStage::Vertex | ShaderStage::Pixel => true,
            ShaderStage::Compute => self
                .internal
                .downlevel_flags
                .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
            _ => false,
        }
    }

    fn backend_name(&self) -> &'static str {
        "wgpu"
    }
}

impl std::fmt::Display for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wgpu device on \"{}\"", self.internal.adapter_name)
    }
}
