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

use std::sync::Arc;

use anyhow::{Context, Result};
use strata_core::config::RendererConfig;
use winit::window::Window;

use super::device::WgpuDevice;
use super::surface::WgpuSurface;

/// Holds the core WGPU state objects required for rendering.
#[derive(Debug)]
pub struct WgpuGraphicsContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    // Store info for easy access
    pub adapter_name: String,
    pub adapter_backend: wgpu::Backend,
    /// Capabilities below the full WebGPU baseline, e.g. compute on GL.
    pub downlevel_flags: wgpu::DownlevelFlags,
}

impl WgpuGraphicsContext {
    /// Asynchronously selects an adapter and opens a logical device on it.
    ///
    /// ## Arguments
    /// * `instance` - The `wgpu::Instance` the adapter is requested from.
    /// * `compatible_surface` - A surface the adapter must be able to present to, if any.
    pub async fn new(
        instance: wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        log::info!("Initializing WGPU Graphics Context...");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Strata Logical Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create logical device")?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(Arc::new(|e: wgpu::Error| {
            log::error!("WGPU Uncaptured Error: {e}");
        }));

        let downlevel_flags = adapter.get_downlevel_capabilities().flags;
        if !downlevel_flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            log::warn!("Adapter has no compute shader support; GPU culling is unavailable.");
        }

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            adapter_name: adapter_info.name,
            adapter_backend: adapter_info.backend,
            downlevel_flags,
        })
    }

    /// Opens a device with no presentation surface, blocking on adapter selection.
    pub fn new_headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        pollster::block_on(Self::new(instance, None))
    }
}

/// Opens a device for `window` and configures its surface from `config`.
///
/// The returned pair is what a `FrameScheduler` is built from.
pub fn bootstrap(window: Arc<Window>, config: &RendererConfig) -> Result<(WgpuDevice, WgpuSurface)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let size = window.inner_size();
    let surface = instance
        .create_surface(Arc::clone(&window))
        .context("failed to create wgpu surface")?;
    log::debug!("WGPU surface created for the window.");

    let context = pollster::block_on(WgpuGraphicsContext::new(instance, Some(&surface)))?;
    let device = WgpuDevice::new(&context);
    let surface = WgpuSurface::new(
        surface,
        &context.adapter,
        device.clone(),
        size.width,
        size.height,
        config.present_mode,
    )
    .context("failed to configure the window surface")?;
    Ok((device, surface))
}
