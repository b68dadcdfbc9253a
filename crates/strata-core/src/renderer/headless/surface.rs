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
use crate::renderer::api::{Extent2d, TextureFormat, TextureViewId};
use crate::renderer::error::SurfaceError;
use crate::renderer::traits::{AcquiredTarget, PresentationSurface};
use std::collections::VecDeque;

/// A presentation surface with a fixed number of in-memory images.
///
/// Acquire and present failures can be queued to exercise the frame-skip paths.
#[derive(Debug)]
pub struct HeadlessSurface {
    device: HeadlessDevice,
    images: Vec<TextureViewId>,
    next_image: usize,
    acquired: Option<TextureViewId>,
    size: Extent2d,
    format: TextureFormat,
    acquire_errors: VecDeque<SurfaceError>,
    present_errors: VecDeque<SurfaceError>,
    presented: usize,
    reconfigurations: usize,
}

impl HeadlessSurface {
    /// Number of images in the swapchain.
    pub const IMAGE_COUNT: usize = 3;

    /// Creates a surface of `size` on `device`.
    pub fn new(device: &HeadlessDevice, size: Extent2d, format: TextureFormat) -> Self {
        let images = (0..Self::IMAGE_COUNT)
            .map(|_| device.register_external_view())
            .collect();
        Self {
            device: device.clone(),
            images,
            next_image: 0,
            acquired: None,
            size,
            format,
            acquire_errors: VecDeque::new(),
            present_errors: VecDeque::new(),
            presented: 0,
            reconfigurations: 0,
        }
    }

    /// The next `acquire` fails with `error`.
    pub fn fail_next_acquire(&mut self, error: SurfaceError) {
        self.acquire_errors.push_back(error);
    }

    /// The next `present` fails with `error`.
    pub fn fail_next_present(&mut self, error: SurfaceError) {
        self.present_errors.push_back(error);
    }

    /// Number of successful presentations.
    pub fn presented(&self) -> usize {
        self.presented
    }

    /// Number of successful reconfigurations.
    pub fn reconfigurations(&self) -> usize {
        self.reconfigurations
    }

    fn release_images(&mut self) {
        for view in self.images.drain(..) {
            self.device.unregister_external_view(view);
        }
    }
}

impl PresentationSurface for HeadlessSurface {
    fn acquire(&mut self) -> Result<AcquiredTarget, SurfaceError> {
        if let Some(error) = self.acquire_errors.pop_front() {
            return Err(error);
        }
        if self.size.is_empty() {
            return Err(SurfaceError::Outdated);
        }
        let view = self.images[self.next_image];
        self.next_image = (self.next_image + 1) % self.images.len();
        self.acquired = Some(view);
        Ok(AcquiredTarget {
            view,
            suboptimal: false,
        })
    }

    fn present(&mut self) -> Result<(), SurfaceError> {
        if self.acquired.take().is_none() {
            return Err(SurfaceError::Other("present without acquire".to_owned()));
        }
        if let Some(error) = self.present_errors.pop_front() {
            return Err(error);
        }
        self.presented += 1;
        Ok(())
    }

    fn discard(&mut self) {
        self.acquired = None;
    }

    fn reconfigure(&mut self, size: Extent2d) -> Result<(), SurfaceError> {
        self.acquired = None;
        self.release_images();
        self.images = (0..Self::IMAGE_COUNT)
            .map(|_| self.device.register_external_view())
            .collect();
        self.next_image = 0;
        self.size = size;
        self.reconfigurations += 1;
        Ok(())
    }

    fn size(&self) -> Extent2d {
        self.size
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        self.release_images();
    }
}
