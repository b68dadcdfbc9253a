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

use std::fmt;

use strata_core::config::PresentModePreference;
use strata_core::renderer::api::{Extent2d, TextureFormat, TextureViewId};
use strata_core::renderer::traits::{AcquiredTarget, PresentationSurface};
use strata_core::renderer::SurfaceError;

use super::conversions::{from_wgpu_texture_format, present_mode};
use super::device::WgpuDevice;

/// A window surface presenting through a `wgpu::Surface`.
///
/// The acquired image's view is registered on the device for the duration of the
/// frame so passes can target it by [`TextureViewId`].
pub struct WgpuSurface {
    surface: wgpu::Surface<'static>,
    device: WgpuDevice,
    config: wgpu::SurfaceConfiguration,
    format: TextureFormat,
    size: Extent2d,
    current: Option<(wgpu::SurfaceTexture, TextureViewId)>,
}

impl fmt::Debug for WgpuSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuSurface")
            .field("format", &self.format)
            .field("size", &self.size)
            .field("present_mode", &self.config.present_mode)
            .field("acquired", &self.current.is_some())
            .finish()
    }
}

impl WgpuSurface {
    /// Configures `surface` for `device` at the given size.
    ///
    /// An sRGB format the engine knows is preferred. A zero size leaves the
    /// surface unconfigured until [`PresentationSurface::reconfigure`].
    pub fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        device: WgpuDevice,
        width: u32,
        height: u32,
        preference: PresentModePreference,
    ) -> Result<Self, SurfaceError> {
        let caps = surface.get_capabilities(adapter);
        let (wgpu_format, format) = caps
            .formats
            .iter()
            .filter_map(|f| from_wgpu_texture_format(*f).map(|engine| (*f, engine)))
            .min_by_key(|(f, _)| !f.is_srgb())
            .ok_or_else(|| {
                SurfaceError::Other(format!(
                    "no supported surface format among {:?}",
                    caps.formats
                ))
            })?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: wgpu_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: present_mode(preference, &caps.present_modes),
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let size = Extent2d::new(width, height);
        if !size.is_empty() {
            surface.configure(device.wgpu_device(), &config);
        }
        log::info!(
            "WgpuSurface: configured {:?} {}x{} ({:?})",
            format,
            width,
            height,
            config.present_mode
        );

        Ok(Self {
            surface,
            device,
            config,
            format,
            size,
            current: None,
        })
    }

    fn release_current(&mut self) -> Option<wgpu::SurfaceTexture> {
        self.current.take().map(|(texture, view)| {
            self.device.unregister_surface_view(view);
            texture
        })
    }
}

fn map_surface_error(error: wgpu::SurfaceError) -> SurfaceError {
    match error {
        wgpu::SurfaceError::Outdated => SurfaceError::Outdated,
        wgpu::SurfaceError::Lost => SurfaceError::Lost,
        wgpu::SurfaceError::Timeout => SurfaceError::Timeout,
        wgpu::SurfaceError::OutOfMemory => SurfaceError::OutOfMemory,
        other => SurfaceError::Other(other.to_string()),
    }
}

impl PresentationSurface for WgpuSurface {
    fn acquire(&mut self) -> Result<AcquiredTarget, SurfaceError> {
        if self.size.is_empty() {
            return Err(SurfaceError::Outdated);
        }
        if self.release_current().is_some() {
            log::warn!("WgpuSurface: previous image was never presented, discarding it");
        }

        let texture = self
            .surface
            .get_current_texture()
            .map_err(map_surface_error)?;
        let suboptimal = texture.suboptimal;
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let view = self.device.register_surface_view(view);
        self.current = Some((texture, view));
        Ok(AcquiredTarget { view, suboptimal })
    }

    fn present(&mut self) -> Result<(), SurfaceError> {
        let texture = self
            .release_current()
            .ok_or_else(|| SurfaceError::Other("present without an acquired image".to_owned()))?;
        texture.present();
        Ok(())
    }

    fn discard(&mut self) {
        // Dropping the texture without presenting hands the image back.
        drop(self.release_current());
    }

    fn reconfigure(&mut self, size: Extent2d) -> Result<(), SurfaceError> {
        drop(self.release_current());
        self.size = size;
        if size.is_empty() {
            return Ok(());
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface
            .configure(self.device.wgpu_device(), &self.config);
        log::info!(
            "WgpuSurface: Resized surface configuration to {}x{}",
            size.width,
            size.height
        );
        Ok(())
    }

    fn size(&self) -> Extent2d {
        self.size
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}
