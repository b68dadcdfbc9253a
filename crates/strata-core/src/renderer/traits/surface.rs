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

use crate::renderer::api::{Extent2d, TextureFormat, TextureViewId};
use crate::renderer::error::SurfaceError;
use std::fmt::Debug;

/// The image acquired for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredTarget {
    /// View to render into. Only valid until [`PresentationSurface::present`].
    pub view: TextureViewId,
    /// The image can be presented but no longer matches the surface exactly.
    pub suboptimal: bool,
}

/// A swapchain-like sequence of presentable images.
pub trait PresentationSurface: Send + Debug {
    /// Acquires the next presentable target.
    /// ## Errors
    /// * [`SurfaceError`] - Recoverable kinds mean "skip this frame and resize".
    fn acquire(&mut self) -> Result<AcquiredTarget, SurfaceError>;

    /// Presents the target acquired last. Must follow the submission that rendered into it.
    fn present(&mut self) -> Result<(), SurfaceError>;

    /// Drops the acquired target without presenting it.
    fn discard(&mut self);

    /// Recreates the presentable images at the new size.
    fn reconfigure(&mut self, size: Extent2d) -> Result<(), SurfaceError>;

    /// Current size of the presentable images.
    fn size(&self) -> Extent2d;

    /// Texel format of the presentable images.
    fn format(&self) -> TextureFormat;
}
