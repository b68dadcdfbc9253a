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

//! Command buffers, submissions and pass descriptors.

use super::resource::TextureViewId;

/// An opaque handle to a finished, not yet submitted command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub usize);

/// The completion signal of one queue submission.
///
/// Submission ids are monotonic per device: once id `n` is complete, every id
/// lower than `n` is complete as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionId(pub u64);

/// Outcome of a bounded wait on a [`SubmissionId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The submission finished executing.
    Complete,
    /// The timeout elapsed first.
    TimedOut,
}

/// An RGBA colour used for clears.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Alpha.
    pub a: f64,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
}

/// What happens to an attachment at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    /// Clear to the given value.
    Clear(V),
    /// Keep the previous content.
    Load,
}

/// What happens to an attachment at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Keep the rendered content.
    Store,
    /// Content may be discarded.
    Discard,
}

/// Load and store operations of one attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operations<V> {
    /// Load operation.
    pub load: LoadOp<V>,
    /// Store operation.
    pub store: StoreOp,
}

/// A colour attachment of a render pass.
#[derive(Debug, Clone)]
pub struct RenderPassColorAttachment {
    /// Target view.
    pub view: TextureViewId,
    /// Load/store operations.
    pub ops: Operations<Color>,
}

/// The depth attachment of a render pass.
#[derive(Debug, Clone)]
pub struct RenderPassDepthAttachment {
    /// Target view.
    pub view: TextureViewId,
    /// Load/store operations on depth.
    pub depth_ops: Operations<f32>,
}

/// Describes a render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// Colour attachments.
    pub color_attachments: &'a [RenderPassColorAttachment],
    /// Depth attachment.
    pub depth_attachment: Option<RenderPassDepthAttachment>,
}

/// Describes a compute pass.
#[derive(Debug, Clone, Default)]
pub struct ComputePassDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
}
