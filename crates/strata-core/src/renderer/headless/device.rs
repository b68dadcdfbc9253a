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

use super::encoder::{HeadlessCommandEncoder, RecordedCommand};
use crate::renderer::api::*;
use crate::renderer::error::{ResourceError, ShaderError};
use crate::renderer::traits::{CommandEncoder, GraphicsDevice};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Kind of a device object tracked by the headless device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A buffer.
    Buffer,
    /// A texture.
    Texture,
    /// A texture view.
    TextureView,
    /// A sampler.
    Sampler,
    /// A shader module.
    ShaderModule,
    /// A bind group layout.
    BindGroupLayout,
    /// A bind group.
    BindGroup,
    /// A pipeline layout.
    PipelineLayout,
    /// A graphics pipeline.
    RenderPipeline,
    /// A compute pipeline.
    ComputePipeline,
}

impl ObjectKind {
    fn name(self) -> &'static str {
        match self {
            ObjectKind::Buffer => "buffer",
            ObjectKind::Texture => "texture",
            ObjectKind::TextureView => "texture view",
            ObjectKind::Sampler => "sampler",
            ObjectKind::ShaderModule => "shader module",
            ObjectKind::BindGroupLayout => "bind group layout",
            ObjectKind::BindGroup => "bind group",
            ObjectKind::PipelineLayout => "pipeline layout",
            ObjectKind::RenderPipeline => "render pipeline",
            ObjectKind::ComputePipeline => "compute pipeline",
        }
    }
}

/// One entry of the headless device's ordered event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A command buffer was submitted.
    Submitted(SubmissionId),
    /// A caller observed that a submission had completed.
    CompletionObserved(SubmissionId),
    /// An object was destroyed.
    Destroyed {
        /// Object kind.
        kind: ObjectKind,
        /// Raw id.
        id: usize,
    },
    /// An object was destroyed while an incomplete submission still referenced it.
    UseAfterFree {
        /// Object kind.
        kind: ObjectKind,
        /// Raw id.
        id: usize,
        /// The submission still using it.
        submission: SubmissionId,
    },
}

/// Counters of the work the headless device has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    /// Submitted command buffers.
    pub submissions: usize,
    /// Render passes executed.
    pub render_passes: usize,
    /// Compute passes executed.
    pub compute_passes: usize,
    /// Draw calls executed.
    pub draws: usize,
    /// Dispatches executed.
    pub dispatches: usize,
    /// Buffer copies executed.
    pub copies: usize,
}

#[derive(Debug)]
struct BufferRecord {
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug)]
struct TextureRecord {
    mip_level_count: u32,
}

#[derive(Debug, Default)]
struct State {
    live: HashMap<usize, ObjectKind>,
    external_views: HashSet<usize>,
    buffers: HashMap<usize, BufferRecord>,
    textures: HashMap<usize, TextureRecord>,
    command_buffers: HashMap<usize, Vec<RecordedCommand>>,
    in_flight: Vec<(SubmissionId, HashSet<usize>)>,
    events: Vec<DeviceEvent>,
    stats: HeadlessStats,
}

impl State {
    fn expect_live(&self, kind: ObjectKind, id: usize) -> Result<(), ResourceError> {
        match self.live.get(&id) {
            Some(k) if *k == kind => Ok(()),
            _ if kind == ObjectKind::TextureView && self.external_views.contains(&id) => Ok(()),
            _ => Err(ResourceError::not_found(kind.name(), id)),
        }
    }

    fn is_referenced(&self, id: usize) -> bool {
        self.live.contains_key(&id) || self.external_views.contains(&id)
    }

    fn retire_completed(&mut self, completed: u64) {
        self.in_flight.retain(|(sub, _)| sub.0 > completed);
    }
}

#[derive(Debug)]
struct HeadlessDeviceInternal {
    next_id: AtomicUsize,
    next_submission: AtomicU64,
    completed: AtomicU64,
    auto_complete: AtomicBool,
    state: Mutex<State>,
}

/// An in-memory [`GraphicsDevice`].
///
/// Cloning is cheap; clones share the same device state.
#[derive(Debug, Clone)]
pub struct HeadlessDevice {
    internal: Arc<HeadlessDeviceInternal>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Creates a device whose submissions complete immediately.
    pub fn new() -> Self {
        Self {
            internal: Arc::new(HeadlessDeviceInternal {
                next_id: AtomicUsize::new(1),
                next_submission: AtomicU64::new(1),
                completed: AtomicU64::new(0),
                auto_complete: AtomicBool::new(true),
                state: Mutex::new(State::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.internal
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn allocate(&self, kind: ObjectKind) -> usize {
        let id = self.internal.next_id.fetch_add(1, Ordering::Relaxed);
        self.state().live.insert(id, kind);
        log::trace!("Headless: created {} {}", kind.name(), id);
        id
    }

    fn release(&self, kind: ObjectKind, id: usize) -> Result<(), ResourceError> {
        let completed = self.internal.completed.load(Ordering::Acquire);
        let mut state = self.state();
        state.expect_live(kind, id)?;
        let blocking = state
            .in_flight
            .iter()
            .find(|(sub, ids)| sub.0 > completed && ids.contains(&id))
            .map(|(sub, _)| *sub);
        if let Some(submission) = blocking {
            state.events.push(DeviceEvent::UseAfterFree {
                kind,
                id,
                submission,
            });
            return Err(ResourceError::BackendError(format!(
                "{} {} destroyed while in use by submission {}",
                kind.name(),
                id,
                submission.0
            )));
        }
        state.live.remove(&id);
        state.buffers.remove(&id);
        state.textures.remove(&id);
        state.events.push(DeviceEvent::Destroyed { kind, id });
        Ok(())
    }

    /// Switches between immediate completion (the default) and manual completion.
    pub fn set_auto_complete(&self, enabled: bool) {
        self.internal.auto_complete.store(enabled, Ordering::Release);
        if enabled {
            self.complete_all();
        }
    }

    /// Marks every submission up to and including `submission` as complete.
    pub fn complete_through(&self, submission: SubmissionId) {
        let last = self.last_submission().0;
        let target = submission.0.min(last);
        let previous = self.internal.completed.fetch_max(target, Ordering::AcqRel);
        let completed = previous.max(target);
        self.state().retire_completed(completed);
    }

    /// Marks every submission made so far as complete.
    pub fn complete_all(&self) {
        self.complete_through(self.last_submission());
    }

    /// The most recent submission, or `SubmissionId(0)` if none happened.
    pub fn last_submission(&self) -> SubmissionId {
        SubmissionId(self.internal.next_submission.load(Ordering::Acquire) - 1)
    }

    /// A copy of the ordered event log.
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.state().events.clone()
    }

    /// Every use-after-free the device detected.
    pub fn violations(&self) -> Vec<DeviceEvent> {
        self.state()
            .events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::UseAfterFree { .. }))
            .cloned()
            .collect()
    }

    /// Work counters.
    pub fn stats(&self) -> HeadlessStats {
        self.state().stats
    }

    /// Returns `true` if `id` names a live object.
    pub fn is_live(&self, id: usize) -> bool {
        self.state().live.contains_key(&id)
    }

    /// Reads the current content of a buffer, regardless of its usage flags.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state().buffers.get(&id.0).map(|b| b.data.clone())
    }

    /// Registers a view owned by a presentation surface. It can be referenced by
    /// passes but does not count as a live device object.
    pub fn register_external_view(&self) -> TextureViewId {
        let id = self.internal.next_id.fetch_add(1, Ordering::Relaxed);
        self.state().external_views.insert(id);
        TextureViewId(id)
    }

    /// Forgets a view registered with [`Self::register_external_view`].
    pub fn unregister_external_view(&self, id: TextureViewId) {
        self.state().external_views.remove(&id.0);
    }

    pub(crate) fn register_command_buffer(&self, commands: Vec<RecordedCommand>) -> CommandBufferId {
        let id = self.internal.next_id.fetch_add(1, Ordering::Relaxed);
        self.state().command_buffers.insert(id, commands);
        CommandBufferId(id)
    }

    fn observe(&self, submission: SubmissionId) -> bool {
        let complete = submission.0 <= self.internal.completed.load(Ordering::Acquire);
        if complete {
            self.state()
                .events
                .push(DeviceEvent::CompletionObserved(submission));
        }
        complete
    }
}

fn execute_copy(
    state: &mut State,
    source: BufferId,
    source_offset: u64,
    destination: BufferId,
    destination_offset: u64,
    size: u64,
) -> Result<(), ResourceError> {
    ResourceError::check_copy_alignment(source_offset, size)?;
    ResourceError::check_copy_alignment(destination_offset, size)?;
    let bytes = {
        let src = state
            .buffers
            .get(&source.0)
            .ok_or_else(|| ResourceError::not_found("buffer", source.0))?;
        let end = source_offset + size;
        if end > src.data.len() as u64 {
            return Err(ResourceError::OutOfBounds {
                offset: source_offset,
                len: size,
                size: src.data.len() as u64,
            });
        }
        src.data[source_offset as usize..end as usize].to_vec()
    };
    let dst = state
        .buffers
        .get_mut(&destination.0)
        .ok_or_else(|| ResourceError::not_found("buffer", destination.0))?;
    let end = destination_offset + size;
    if end > dst.data.len() as u64 {
        return Err(ResourceError::OutOfBounds {
            offset: destination_offset,
            len: size,
            size: dst.data.len() as u64,
        });
    }
    dst.data[destination_offset as usize..end as usize].copy_from_slice(&bytes);
    Ok(())
}

impl GraphicsDevice for HeadlessDevice {
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let ShaderSource::Wgsl(source) = &descriptor.source;
        if source.contains("#error") {
            return Err(ShaderError::CompilationError {
                label: descriptor.label.unwrap_or("unlabelled").to_owned(),
                details: "source contains an #error directive".to_owned(),
            }
            .into());
        }
        Ok(ShaderModuleId(self.allocate(ObjectKind::ShaderModule)))
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.release(ObjectKind::ShaderModule, id.0)
    }

    fn create_bind_group_layout(
        &self,
        _descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        Ok(BindGroupLayoutId(self.allocate(ObjectKind::BindGroupLayout)))
    }

    fn destroy_bind_group_layout(&self, id: BindGroupLayoutId) -> Result<(), ResourceError> {
        self.release(ObjectKind::BindGroupLayout, id.0)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        {
            let state = self.state();
            state.expect_live(ObjectKind::BindGroupLayout, descriptor.layout.0)?;
            for entry in descriptor.entries {
                match entry.resource {
                    BindingResource::Buffer(binding) => {
                        state.expect_live(ObjectKind::Buffer, binding.buffer.0)?
                    }
                    BindingResource::TextureView(view) => {
                        state.expect_live(ObjectKind::TextureView, view.0)?
                    }
                    BindingResource::Sampler(sampler) => {
                        state.expect_live(ObjectKind::Sampler, sampler.0)?
                    }
                }
            }
        }
        Ok(BindGroupId(self.allocate(ObjectKind::BindGroup)))
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        self.release(ObjectKind::BindGroup, id.0)
    }

    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError> {
        {
            let state = self.state();
            for layout in descriptor.bind_group_layouts {
                state.expect_live(ObjectKind::BindGroupLayout, layout.0)?;
            }
        }
        Ok(PipelineLayoutId(self.allocate(ObjectKind::PipelineLayout)))
    }

    fn destroy_pipeline_layout(&self, id: PipelineLayoutId) -> Result<(), ResourceError> {
        self.release(ObjectKind::PipelineLayout, id.0)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        {
            let state = self.state();
            state.expect_live(ObjectKind::PipelineLayout, descriptor.layout.0)?;
            state.expect_live(ObjectKind::ShaderModule, descriptor.vertex.module.0)?;
            if let Some(pixel) = &descriptor.pixel {
                state.expect_live(ObjectKind::ShaderModule, pixel.module.0)?;
            }
        }
        Ok(RenderPipelineId(self.allocate(ObjectKind::RenderPipeline)))
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.release(ObjectKind::RenderPipeline, id.0)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        {
            let state = self.state();
            state.expect_live(ObjectKind::PipelineLayout, descriptor.layout.0)?;
            state.expect_live(ObjectKind::ShaderModule, descriptor.stage.module.0)?;
        }
        Ok(ComputePipelineId(self.allocate(ObjectKind::ComputePipeline)))
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        self.release(ObjectKind::ComputePipeline, id.0)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = self.allocate(ObjectKind::Buffer);
        self.state().buffers.insert(
            id,
            BufferRecord {
                usage: descriptor.usage,
                data: vec![0; descriptor.size as usize],
            },
        );
        Ok(BufferId(id))
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.release(ObjectKind::Buffer, id.0)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state();
        let buffer = state
            .buffers
            .get_mut(&id.0)
            .ok_or_else(|| ResourceError::not_found("buffer", id.0))?;
        let end = offset + data.len() as u64;
        if end > buffer.data.len() as u64 {
            return Err(ResourceError::OutOfBounds {
                offset,
                len: data.len() as u64,
                size: buffer.data.len() as u64,
            });
        }
        ResourceError::check_copy_alignment(offset, data.len() as u64)?;
        buffer.data[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(
        &self,
        id: BufferId,
        offset: u64,
        size: u64,
        _timeout: Duration,
    ) -> Result<Vec<u8>, ResourceError> {
        let state = self.state();
        let buffer = state
            .buffers
            .get(&id.0)
            .ok_or_else(|| ResourceError::not_found("buffer", id.0))?;
        if !buffer.usage.contains(BufferUsage::MAP_READ) {
            return Err(ResourceError::BackendError(format!(
                "buffer {} is not mappable for reading",
                id.0
            )));
        }
        let end = offset + size;
        if end > buffer.data.len() as u64 {
            return Err(ResourceError::OutOfBounds {
                offset,
                len: size,
                size: buffer.data.len() as u64,
            });
        }
        Ok(buffer.data[offset as usize..end as usize].to_vec())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if descriptor.size.is_empty() || descriptor.mip_level_count == 0 {
            return Err(ResourceError::BackendError(format!(
                "invalid texture extent {:?} with {} mips",
                descriptor.size, descriptor.mip_level_count
            )));
        }
        let id = self.allocate(ObjectKind::Texture);
        self.state().textures.insert(
            id,
            TextureRecord {
                mip_level_count: descriptor.mip_level_count,
            },
        );
        Ok(TextureId(id))
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.release(ObjectKind::Texture, id.0)
    }

    fn create_texture_view(
        &self,
        texture_id: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        {
            let state = self.state();
            let texture = state
                .textures
                .get(&texture_id.0)
                .ok_or_else(|| ResourceError::not_found("texture", texture_id.0))?;
            let count = descriptor
                .mip_level_count
                .unwrap_or(texture.mip_level_count.saturating_sub(descriptor.base_mip_level));
            if count == 0 || descriptor.base_mip_level + count > texture.mip_level_count {
                return Err(ResourceError::OutOfBounds {
                    offset: descriptor.base_mip_level as u64,
                    len: count as u64,
                    size: texture.mip_level_count as u64,
                });
            }
        }
        Ok(TextureViewId(self.allocate(ObjectKind::TextureView)))
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        self.release(ObjectKind::TextureView, id.0)
    }

    fn create_sampler(&self, _descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        Ok(SamplerId(self.allocate(ObjectKind::Sampler)))
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.release(ObjectKind::Sampler, id.0)
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(HeadlessCommandEncoder {
            device: self.clone(),
            commands: Vec::new(),
        })
    }

    fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferId,
    ) -> Result<SubmissionId, ResourceError> {
        let mut state = self.state();
        let commands = state
            .command_buffers
            .remove(&command_buffer.0)
            .ok_or_else(|| ResourceError::not_found("command buffer", command_buffer.0))?;

        let mut referenced = HashSet::new();
        for command in &commands {
            for id in command.referenced_ids() {
                if !state.is_referenced(id) {
                    return Err(ResourceError::not_found("object", id));
                }
                referenced.insert(id);
            }
        }

        for command in &commands {
            match command {
                RecordedCommand::BeginRenderPass { .. } => state.stats.render_passes += 1,
                RecordedCommand::BeginComputePass { .. } => state.stats.compute_passes += 1,
                RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. } => {
                    state.stats.draws += 1
                }
                RecordedCommand::Dispatch { .. } => state.stats.dispatches += 1,
                RecordedCommand::CopyBufferToBuffer {
                    source,
                    source_offset,
                    destination,
                    destination_offset,
                    size,
                } => {
                    execute_copy(
                        &mut state,
                        *source,
                        *source_offset,
                        *destination,
                        *destination_offset,
                        *size,
                    )?;
                    state.stats.copies += 1;
                }
                _ => {}
            }
        }

        let submission = SubmissionId(
            self.internal
                .next_submission
                .fetch_add(1, Ordering::AcqRel),
        );
        state.stats.submissions += 1;
        state.events.push(DeviceEvent::Submitted(submission));
        if self.internal.auto_complete.load(Ordering::Acquire) {
            self.internal
                .completed
                .fetch_max(submission.0, Ordering::AcqRel);
        } else {
            state.in_flight.push((submission, referenced));
        }
        Ok(submission)
    }

    fn is_submission_complete(&self, submission: SubmissionId) -> bool {
        self.observe(submission)
    }

    fn wait_for_submission(
        &self,
        submission: SubmissionId,
        _timeout: Duration,
    ) -> Result<WaitStatus, ResourceError> {
        // Manual completion never advances on its own, so waiting cannot help.
        if self.observe(submission) {
            Ok(WaitStatus::Complete)
        } else {
            Ok(WaitStatus::TimedOut)
        }
    }

    fn wait_idle(&self) -> Result<(), ResourceError> {
        self.complete_all();
        let last = self.last_submission();
        if last.0 > 0 {
            self.observe(last);
        }
        Ok(())
    }

    fn live_resource_count(&self) -> usize {
        self.state().live.len()
    }

    fn supports_stage(&self, stage: ShaderStage) -> bool {
        matches!(
            stage,
            ShaderStage::Vertex | ShaderStage::Pixel | ShaderStage::Compute
        )
    }

    fn backend_name(&self) -> &'static str {
        "headless"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn buffer(device: &HeadlessDevice, size: u64, usage: BufferUsage) -> BufferId {
        device
            .create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed("test")),
                size,
                usage,
            })
            .unwrap()
    }

    #[test]
    fn copies_execute_on_submit() {
        let device = HeadlessDevice::new();
        let src = buffer(&device, 16, BufferUsage::COPY_SRC);
        let dst = buffer(&device, 16, BufferUsage::COPY_DST | BufferUsage::MAP_READ);
        device.write_buffer(src, 4, &[1, 2, 3, 4]).unwrap();

        let mut encoder = device.create_command_encoder(None);
        encoder.copy_buffer_to_buffer(src, 4, dst, 0, 4);
        let cb = encoder.finish();
        assert_eq!(device.read_buffer(dst, 0, 4, Duration::ZERO).unwrap(), [0; 4]);

        device.submit_command_buffer(cb).unwrap();
        assert_eq!(
            device.read_buffer(dst, 0, 4, Duration::ZERO).unwrap(),
            [1, 2, 3, 4]
        );
        assert_eq!(device.stats().copies, 1);
    }

    #[test]
    fn writes_and_copies_follow_the_copy_alignment() {
        let device = HeadlessDevice::new();
        let src = buffer(&device, 16, BufferUsage::COPY_SRC);
        let dst = buffer(&device, 16, BufferUsage::COPY_DST);

        assert!(matches!(
            device.write_buffer(src, 0, &[1, 2, 3]),
            Err(ResourceError::Misaligned { len: 3, .. })
        ));
        assert!(matches!(
            device.write_buffer(src, 6, &[0; 4]),
            Err(ResourceError::Misaligned { offset: 6, .. })
        ));

        let mut encoder = device.create_command_encoder(None);
        encoder.copy_buffer_to_buffer(src, 0, dst, 2, 4);
        assert!(matches!(
            device.submit_command_buffer(encoder.finish()),
            Err(ResourceError::Misaligned { offset: 2, .. })
        ));
        assert_eq!(device.stats().copies, 0);
    }

    #[test]
    fn destroying_in_flight_object_is_reported() {
        let device = HeadlessDevice::new();
        device.set_auto_complete(false);
        let src = buffer(&device, 4, BufferUsage::COPY_SRC);
        let dst = buffer(&device, 4, BufferUsage::COPY_DST);

        let mut encoder = device.create_command_encoder(None);
        encoder.copy_buffer_to_buffer(src, 0, dst, 0, 4);
        let submission = device.submit_command_buffer(encoder.finish()).unwrap();

        assert!(device.destroy_buffer(src).is_err());
        assert_eq!(device.violations().len(), 1);

        device.complete_through(submission);
        assert!(device.is_submission_complete(submission));
        device.destroy_buffer(src).unwrap();
        device.destroy_buffer(dst).unwrap();
        assert_eq!(device.live_resource_count(), 0);
    }

    #[test]
    fn wait_times_out_under_manual_completion() {
        let device = HeadlessDevice::new();
        device.set_auto_complete(false);
        let encoder = device.create_command_encoder(None);
        let submission = device.submit_command_buffer(encoder.finish()).unwrap();
        assert_eq!(
            device
                .wait_for_submission(submission, Duration::from_millis(1))
                .unwrap(),
            WaitStatus::TimedOut
        );
        device.wait_idle().unwrap();
        assert_eq!(
            device
                .wait_for_submission(submission, Duration::from_millis(1))
                .unwrap(),
            WaitStatus::Complete
        );
    }

    #[test]
    fn submit_rejects_destroyed_references() {
        let device = HeadlessDevice::new();
        let src = buffer(&device, 4, BufferUsage::COPY_SRC);
        let dst = buffer(&device, 4, BufferUsage::COPY_DST);
        let mut encoder = device.create_command_encoder(None);
        encoder.copy_buffer_to_buffer(src, 0, dst, 0, 4);
        let cb = encoder.finish();
        device.destroy_buffer(src).unwrap();
        assert!(matches!(
            device.submit_command_buffer(cb),
            Err(ResourceError::NotFound { .. })
        ));
    }

    #[test]
    fn view_mip_range_is_validated() {
        let device = HeadlessDevice::new();
        let texture = device
            .create_texture(&TextureDescriptor {
                label: None,
                size: Extent2d::new(8, 8),
                mip_level_count: 3,
                format: TextureFormat::R32Float,
                usage: TextureUsage::STORAGE_BINDING,
            })
            .unwrap();
        assert!(device
            .create_texture_view(texture, &TextureViewDescriptor::single_mip(2))
            .is_ok());
        assert!(device
            .create_texture_view(texture, &TextureViewDescriptor::single_mip(3))
            .is_err());
    }
}
