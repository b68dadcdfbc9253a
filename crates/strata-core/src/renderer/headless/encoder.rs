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

use super::device::HeadlessDevice;
use crate::renderer::api::{
    BindGroupId, BufferId, CommandBufferId, ComputePassDescriptor, ComputePipelineId,
    IndexFormat, RenderPassDescriptor, RenderPipelineId, TextureViewId,
};
use crate::renderer::traits::{CommandEncoder, ComputePass, RenderPass};
use std::any::Any;
use std::ops::Range;

/// One command captured by a [`HeadlessCommandEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// A render pass was opened.
    BeginRenderPass {
        /// Pass label.
        label: Option<String>,
        /// Colour targets.
        color_targets: Vec<TextureViewId>,
        /// Depth target.
        depth_target: Option<TextureViewId>,
    },
    /// A compute pass was opened.
    BeginComputePass {
        /// Pass label.
        label: Option<String>,
    },
    /// The open pass was closed.
    EndPass,
    /// A graphics pipeline was bound.
    SetRenderPipeline(RenderPipelineId),
    /// A compute pipeline was bound.
    SetComputePipeline(ComputePipelineId),
    /// A bind group was bound.
    SetBindGroup {
        /// Set index.
        index: u32,
        /// Bound group.
        bind_group: BindGroupId,
    },
    /// A vertex buffer was bound.
    SetVertexBuffer {
        /// Vertex buffer slot.
        slot: u32,
        /// Bound buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
    },
    /// An index buffer was bound.
    SetIndexBuffer {
        /// Bound buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// Index format.
        format: IndexFormat,
    },
    /// A non-indexed draw.
    Draw {
        /// Vertex range.
        vertices: Range<u32>,
        /// Instance range.
        instances: Range<u32>,
    },
    /// An indexed draw.
    DrawIndexed {
        /// Index range.
        indices: Range<u32>,
        /// Base vertex.
        base_vertex: i32,
        /// Instance range.
        instances: Range<u32>,
    },
    /// A compute dispatch.
    Dispatch {
        /// Workgroups along x.
        x: u32,
        /// Workgroups along y.
        y: u32,
        /// Workgroups along z.
        z: u32,
    },
    /// A buffer-to-buffer copy, executed at submission.
    CopyBufferToBuffer {
        /// Source buffer.
        source: BufferId,
        /// Source offset.
        source_offset: u64,
        /// Destination buffer.
        destination: BufferId,
        /// Destination offset.
        destination_offset: u64,
        /// Byte count.
        size: u64,
    },
}

impl RecordedCommand {
    /// Raw ids of every device object the command references.
    pub fn referenced_ids(&self) -> Vec<usize> {
        match self {
            RecordedCommand::BeginRenderPass {
                color_targets,
                depth_target,
                ..
            } => color_targets
                .iter()
                .map(|v| v.0)
                .chain(depth_target.map(|v| v.0))
                .collect(),
            RecordedCommand::SetRenderPipeline(id) => vec![id.0],
            RecordedCommand::SetComputePipeline(id) => vec![id.0],
            RecordedCommand::SetBindGroup { bind_group, .. } => vec![bind_group.0],
            RecordedCommand::SetVertexBuffer { buffer, .. } => vec![buffer.0],
            RecordedCommand::SetIndexBuffer { buffer, .. } => vec![buffer.0],
            RecordedCommand::CopyBufferToBuffer {
                source,
                destination,
                ..
            } => vec![source.0, destination.0],
            RecordedCommand::BeginComputePass { .. }
            | RecordedCommand::EndPass
            | RecordedCommand::Draw { .. }
            | RecordedCommand::DrawIndexed { .. }
            | RecordedCommand::Dispatch { .. } => Vec::new(),
        }
    }
}

/// Records commands into a list that the [`HeadlessDevice`] replays on submit.
#[derive(Debug)]
pub struct HeadlessCommandEncoder {
    pub(crate) device: HeadlessDevice,
    pub(crate) commands: Vec<RecordedCommand>,
}

impl HeadlessCommandEncoder {
    /// Commands recorded so far.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }
}

struct HeadlessRenderPass<'a> {
    commands: &'a mut Vec<RecordedCommand>,
}

impl<'pass> RenderPass<'pass> for HeadlessRenderPass<'pass> {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.commands
            .push(RecordedCommand::SetRenderPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId) {
        self.commands
            .push(RecordedCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        self.commands.push(RecordedCommand::SetVertexBuffer {
            slot,
            buffer,
            offset,
        });
    }

    fn set_index_buffer(&mut self, buffer: BufferId, offset: u64, index_format: IndexFormat) {
        self.commands.push(RecordedCommand::SetIndexBuffer {
            buffer,
            offset,
            format: index_format,
        });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.commands
            .push(RecordedCommand::Draw { vertices, instances });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.commands.push(RecordedCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

impl Drop for HeadlessRenderPass<'_> {
    fn drop(&mut self) {
        self.commands.push(RecordedCommand::EndPass);
    }
}

struct HeadlessComputePass<'a> {
    commands: &'a mut Vec<RecordedCommand>,
}

impl<'pass> ComputePass<'pass> for HeadlessComputePass<'pass> {
    fn set_pipeline(&mut self, pipeline: ComputePipelineId) {
        self.commands
            .push(RecordedCommand::SetComputePipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId) {
        self.commands
            .push(RecordedCommand::SetBindGroup { index, bind_group });
    }

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(RecordedCommand::Dispatch { x, y, z });
    }
}

impl Drop for HeadlessComputePass<'_> {
    fn drop(&mut self) {
        self.commands.push(RecordedCommand::EndPass);
    }
}

impl CommandEncoder for HeadlessCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: descriptor.label.map(str::to_owned),
            color_targets: descriptor
                .color_attachments
                .iter()
                .map(|att| att.view)
                .collect(),
            depth_target: descriptor.depth_attachment.as_ref().map(|att| att.view),
        });
        Box::new(HeadlessRenderPass {
            commands: &mut self.commands,
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'encoder>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        self.commands.push(RecordedCommand::BeginComputePass {
            label: descriptor.label.map(str::to_owned),
        });
        Box::new(HeadlessComputePass {
            commands: &mut self.commands,
        })
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    ) {
        self.commands.push(RecordedCommand::CopyBufferToBuffer {
            source,
            source_offset,
            destination,
            destination_offset,
            size,
        });
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let HeadlessCommandEncoder { device, commands } = *self;
        device.register_command_buffer(commands)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
