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


use std::borrow::Cow;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use strata_core::config::{CullingConfig, RendererConfig};
use strata_core::culling::hiz::{cull_cpu, DepthImage, DepthPyramid};
use strata_core::culling::{CullCamera, CullRecord, CullShaderModules, DepthPyramidCuller};
use strata_core::frame::{FrameContext, FrameScheduler, FrameStatus, SizeDependent};
use strata_core::pipeline::{PipelineStateKey, RenderTargetFormats, StageInput};
use strata_core::renderer::api::{
    BindingDeclaration, BindingType, DepthMode, Extent2d, LoadOp, Operations, RasterizerMode,
    RenderPassDepthAttachment, RenderPassDescriptor, RenderStatePresets, ShaderModuleDescriptor,
    ShaderModuleId, ShaderSource, ShaderStage, StageBindings, StoreOp, TextureFormat,
};
use strata_core::renderer::headless::{HeadlessDevice, HeadlessSurface};
use strata_core::renderer::GraphicsDevice;

const EXTENT: Extent2d = Extent2d {
    width: 64,
    height: 64,
};

struct Scene {
    device: HeadlessDevice,
    scheduler: FrameScheduler,
    culler: DepthPyramidCuller,
    modules: Vec<ShaderModuleId>,
}

fn module(device: &HeadlessDevice, label: &'static str) -> ShaderModuleId {
    device
        .create_shader_module(&ShaderModuleDescriptor {
            label: Some(label),
            source: ShaderSource::Wgsl(Cow::Borrowed("")),
        })
        .unwrap()
}

fn scene(culling: CullingConfig) -> Scene {
    let device = HeadlessDevice::new();
    let surface = HeadlessSurface::new(&device, EXTENT, TextureFormat::Bgra8UnormSrgb);
    let config = RendererConfig {
        culling,
        ..RendererConfig::default()
    };
    let mut scheduler = FrameScheduler::new(Arc::new(device.clone()), Box::new(surface), config.clone()).unwrap();

    let shaders = CullShaderModules {
        depth_copy: module(&device, "copy"),
        reduce: module(&device, "reduce"),
        cull: module(&device, "cull"),
    };
    let mut culler = DepthPyramidCuller::new(
        Arc::clone(scheduler.device()),
        scheduler.pipelines(),
        &shaders,
        &config,
    )
    .unwrap();
    let targets: &mut [&mut dyn SizeDependent] = &mut [&mut culler];
    scheduler.resize_buffers(EXTENT.width, EXTENT.height, targets).unwrap();

    Scene {
        device,
        scheduler,
        culler,
        modules: vec![shaders.depth_copy, shaders.reduce, shaders.cull],
    }
}

fn camera() -> CullCamera {
    CullCamera::new(
        Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y),
        Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0),
        0.1,
    )
}

/// Every third sphere sits in front of a wall at distance 5, the others behind it.
fn records() -> Vec<CullRecord> {
    (0..40)
        .map(|i| {
            let x = (i as f32 - 20.0) * 0.05;
            if i % 3 == 0 {
                CullRecord::new(Vec3::new(x, 0.0, -3.0), 0.5)
            } else {
                CullRecord::new(Vec3::new(x, 0.0, -20.0), 1.0)
            }
        })
        .collect()
}

fn wall_pyramid() -> DepthPyramid {
    let depth = camera().projection.project_point3(Vec3::new(0.0, 0.0, -5.0)).z;
    DepthPyramid::build(&DepthImage::filled(EXTENT, depth))
}

fn ready(status: FrameStatus) -> FrameContext {
    match status {
        FrameStatus::Ready(context) => context,
        FrameStatus::Skipped(reason) => panic!("frame skipped: {reason:?}"),
    }
}

fn graphics_pipeline(vertex: ShaderModuleId, pixel: ShaderModuleId) -> (PipelineStateKey, Vec<StageInput>) {
    let key = PipelineStateKey::graphics(
        RenderStatePresets {
            rasterizer: RasterizerMode::BackFaceCull,
            depth: DepthMode::Enabled,
            ..Default::default()
        },
        vertex,
        Some(pixel),
        RenderTargetFormats::new(TextureFormat::Bgra8UnormSrgb, Some(TextureFormat::Depth32Float)),
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

fn shut_down(mut scene: Scene) -> HeadlessDevice {
    scene.culler.destroy(scene.scheduler.graveyard_mut());
    scene.scheduler.graveyard_mut().retire_all(scene.modules.drain(..));
    scene.scheduler.shutdown().unwrap();
    scene.device
}

#[test]
fn occluded_spheres_are_hidden_in_the_same_frame() {
    // ARRANGE
    let mut scene = scene(CullingConfig::default());
    let records = records();
    let camera = camera();
    let bias = CullingConfig::default().depth_bias;
    let expected = cull_cpu(&records, &camera, Some(&wall_pyramid()), bias);

    // ACT
    let context = ready(scene.scheduler.begin_frame().unwrap());
    scene.culler.prepare(&records, &camera).unwrap();
    let depth = scene.culler.depth_target().unwrap();
    let encoder = scene.scheduler.encoder().unwrap();
    {
        let _depth_prepass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Depth Prepass"),
            color_attachments: &[],
            depth_attachment: Some(RenderPassDepthAttachment {
                view: depth,
                depth_ops: Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Store,
                },
            }),
        });
    }
    assert!(scene.culler.record(encoder, context.slot));
    // The headless device does not run kernels; stand in for the cull output.
    scene
        .device
        .write_buffer(scene.culler.visibility_buffer(), 0, bytemuck::cast_slice(&expected))
        .unwrap();
    scene.scheduler.flush_recording(true).unwrap();
    let visibility = scene.culler.resolve_visibility(context.slot).unwrap();
    scene.scheduler.end_frame().unwrap();

    // ASSERT
    assert_eq!(visibility.len(), records.len());
    assert_eq!(visibility.words(), expected.as_slice());
    assert_eq!(visibility.visible_count(), 14);
    assert!(visibility.iter_visible().all(|i| i % 3 == 0));

    let device = shut_down(scene);
    assert_eq!(device.live_resource_count(), 0);
    assert!(device.violations().is_empty());
}

#[test]
fn minimising_releases_the_pyramid_targets() {
    // ARRANGE
    let mut scene = scene(CullingConfig::default());
    let records = records();
    let live_before = scene.device.live_resource_count();
    assert!(scene.culler.depth_target().is_some());

    // ACT
    let targets: &mut [&mut dyn SizeDependent] = &mut [&mut scene.culler];
    scene.scheduler.resize_buffers(0, 0, targets).unwrap();
    let released = scene.scheduler.graveyard_mut().flush();

    // ASSERT
    assert!(released > 0);
    assert!(scene.culler.depth_target().is_none());
    assert_eq!(scene.device.live_resource_count(), live_before - released);
    scene.culler.prepare(&records, &camera()).unwrap();
    let mut encoder = scene.device.create_command_encoder(None);
    assert!(!scene.culler.record(encoder.as_mut(), 0));
    let visibility = scene.culler.resolve_visibility(0).unwrap();
    assert_eq!(visibility.visible_count(), records.len());

    let targets: &mut [&mut dyn SizeDependent] = &mut [&mut scene.culler];
    scene.scheduler.resize_buffers(EXTENT.width, EXTENT.height, targets).unwrap();
    assert!(scene.culler.depth_target().is_some());
    let device = shut_down(scene);
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn disabled_occlusion_reports_everything_visible() {
    // ARRANGE
    let mut scene = scene(CullingConfig {
        occlusion_enabled: false,
        ..CullingConfig::default()
    });
    let records = records();

    // ACT
    let context = ready(scene.scheduler.begin_frame().unwrap());
    scene.culler.prepare(&records, &camera()).unwrap();
    let recorded = scene.culler.record(scene.scheduler.encoder().unwrap(), context.slot);
    scene.scheduler.end_frame().unwrap();
    let visibility = scene.culler.resolve_visibility(context.slot).unwrap();

    // ASSERT
    assert!(!recorded);
    assert_eq!(visibility.visible_count(), records.len());
    assert_eq!(scene.device.stats().dispatches, 0);
    shut_down(scene);
}

#[test]
fn pipelines_are_shared_across_frames_and_released_at_shutdown() {
    // ARRANGE
    let mut scene = scene(CullingConfig::default());
    let vertex = module(&scene.device, "vs");
    let pixel = module(&scene.device, "fs");
    scene.modules.extend([vertex, pixel]);
    let (key, stages) = graphics_pipeline(vertex, pixel);
    let pipelines = Arc::clone(scene.scheduler.pipelines());
    let cached_before = pipelines.len();

    // ACT
    let mut entries = Vec::new();
    for _ in 0..3 {
        ready(scene.scheduler.begin_frame().unwrap());
        entries.push(pipelines.get_or_create(&scene.device, &key, &stages, None).unwrap());
        scene.scheduler.end_frame().unwrap();
    }

    // ASSERT
    assert!(entries.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(pipelines.len(), cached_before + 1);
    assert!(entries[0].render_pipeline().is_some());

    drop(entries);
    let device = shut_down(scene);
    assert_eq!(device.live_resource_count(), 0);
    assert!(device.violations().is_empty());
}
