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

//! Tests against a real adapter. Each test returns early when the machine has none.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use glam::{Mat4, Vec3};
use strata_core::config::RendererConfig;
use strata_core::culling::hiz::{cull_cpu, DepthImage, DepthPyramid};
use strata_core::culling::{CullCamera, CullRecord, DepthPyramidCuller};
use strata_core::frame::{ResourceGraveyard, SizeDependent};
use strata_core::pipeline::PipelineStateCache;
use strata_core::renderer::api::{
    BufferDescriptor, BufferUsage, ComputePipelineDescriptor, Extent2d, LoadOp, Operations,
    PipelineLayoutDescriptor, ProgrammableStage, RenderPassDepthAttachment, RenderPassDescriptor,
    ShaderModuleDescriptor, ShaderSource, ShaderStage, StoreOp, WaitStatus,
};
use strata_core::renderer::{GraphicsDevice, ResourceError, ShaderError};
use strata_infra::{create_cull_shader_modules, WgpuDevice, WgpuGraphicsContext};

fn gpu() -> Option<WgpuDevice> {
    let _ = env_logger::builder().is_test(true).try_init();
    match WgpuGraphicsContext::new_headless() {
        Ok(context) => Some(WgpuDevice::new(&context)),
        Err(e) => {
            eprintln!("skipping: no graphics adapter ({e:#})");
            None
        }
    }
}

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn copies_execute_in_submission_order() {
    let Some(device) = gpu() else { return };

    // ARRANGE
    let buffer = |usage| {
        device
            .create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed("test")),
                size: 16,
                usage,
            })
            .unwrap()
    };
    let source = buffer(BufferUsage::COPY_SRC | BufferUsage::COPY_DST);
    let readback = buffer(BufferUsage::MAP_READ | BufferUsage::COPY_DST);
    let payload: Vec<u8> = (0..16).collect();
    device.write_buffer(source, 0, &payload).unwrap();

    // ACT
    let mut encoder = device.create_command_encoder(Some("copy"));
    encoder.copy_buffer_to_buffer(source, 0, readback, 0, 16);
    let submission = device.submit_command_buffer(encoder.finish()).unwrap();
    let status = device.wait_for_submission(submission, WAIT).unwrap();
    let bytes = device.read_buffer(readback, 0, 16, WAIT).unwrap();

    // ASSERT
    assert_eq!(status, WaitStatus::Complete);
    assert!(device.is_submission_complete(submission));
    assert_eq!(bytes, payload);

    device.destroy_buffer(source).unwrap();
    device.destroy_buffer(readback).unwrap();
    assert_eq!(device.live_resource_count(), 0);
    assert_eq!(device.vram_allocated_bytes(), 0);
}

#[test]
fn submissions_complete_monotonically() {
    let Some(device) = gpu() else { return };

    // ARRANGE
    let ids: Vec<_> = (0..3)
        .map(|_| {
            let encoder = device.create_command_encoder(None);
            device.submit_command_buffer(encoder.finish()).unwrap()
        })
        .collect();

    // ACT
    device.wait_for_submission(ids[2], WAIT).unwrap();

    // ASSERT
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert!(ids.iter().all(|id| device.is_submission_complete(*id)));
}

#[test]
fn out_of_bounds_write_is_rejected() {
    let Some(device) = gpu() else { return };

    let buffer = device
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 8,
            usage: BufferUsage::COPY_DST,
        })
        .unwrap();

    assert!(device.write_buffer(buffer, 4, &[0; 8]).is_err());
    device.destroy_buffer(buffer).unwrap();
}

#[test]
fn misaligned_write_is_rejected() {
    let Some(device) = gpu() else { return };

    // ARRANGE
    let buffer = device
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 16,
            usage: BufferUsage::COPY_DST,
        })
        .unwrap();

    // ACT
    let short = device.write_buffer(buffer, 0, &[1, 2, 3]);
    let offset = device.write_buffer(buffer, 2, &[0; 4]);
    let aligned = device.write_buffer(buffer, 4, &[0; 8]);

    // ASSERT
    assert!(matches!(short, Err(ResourceError::Misaligned { len: 3, .. })));
    assert!(matches!(offset, Err(ResourceError::Misaligned { offset: 2, .. })));
    assert!(aligned.is_ok());
    device.destroy_buffer(buffer).unwrap();
}

#[test]
fn invalid_wgsl_returns_a_compilation_error() {
    let Some(device) = gpu() else { return };

    // ACT
    let result = device.create_shader_module(&ShaderModuleDescriptor {
        label: Some("Broken"),
        source: ShaderSource::Wgsl(Cow::Borrowed("fn main( {")),
    });

    // ASSERT
    assert!(matches!(
        result,
        Err(ResourceError::Shader(ShaderError::CompilationError { ref label, .. })) if label == "Broken"
    ));
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn rejected_pipeline_leaves_the_device_usable() {
    let Some(device) = gpu() else { return };

    // ARRANGE
    let module = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: Some("Empty Kernel"),
            source: ShaderSource::Wgsl(Cow::Borrowed(
                "@compute @workgroup_size(1) fn main() {}",
            )),
        })
        .unwrap();
    let layout = device
        .create_pipeline_layout(&PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[],
        })
        .unwrap();

    // ACT
    let result = device.create_compute_pipeline(&ComputePipelineDescriptor {
        label: Some("Missing Entry"),
        layout,
        stage: ProgrammableStage {
            module,
            entry_point: "does_not_exist",
        },
    });
    let buffer = device.create_buffer(&BufferDescriptor {
        label: None,
        size: 4,
        usage: BufferUsage::COPY_DST,
    });

    // ASSERT
    assert!(result.is_err());
    let buffer = buffer.unwrap();
    device.write_buffer(buffer, 0, &[0; 4]).unwrap();
    device.destroy_buffer(buffer).unwrap();
    device.destroy_pipeline_layout(layout).unwrap();
    device.destroy_shader_module(module).unwrap();
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn gpu_visibility_matches_the_cpu_reference() {
    let Some(device) = gpu() else { return };
    if !device.supports_stage(ShaderStage::Compute) {
        eprintln!("skipping: adapter has no compute shaders");
        return;
    }

    // ARRANGE
    let device: Arc<dyn GraphicsDevice> = Arc::new(device);
    let config = RendererConfig::default();
    let extent = Extent2d::new(64, 64);
    let camera = CullCamera::new(
        Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y),
        Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0),
        0.1,
    );
    // A wall filling the screen at distance 5.
    let wall = camera.projection.project_point3(Vec3::new(0.0, 0.0, -5.0)).z;
    let records = vec![
        CullRecord::new(Vec3::new(0.0, 0.0, -2.0), 0.5),
        CullRecord::new(Vec3::new(0.0, 0.0, -20.0), 1.0),
        CullRecord::new(Vec3::new(1.0, 1.0, -4.0), 0.5),
        CullRecord::new(Vec3::new(-3.0, 0.0, -12.0), 0.25),
        CullRecord::new(Vec3::new(0.0, 0.0, -0.05), 1.0),
    ];

    let pipelines = PipelineStateCache::new();
    let mut graveyard = ResourceGraveyard::new(Arc::clone(&device), config.frames_in_flight);
    let shaders = create_cull_shader_modules(device.as_ref()).unwrap();
    let mut culler = DepthPyramidCuller::new(Arc::clone(&device), &pipelines, &shaders, &config).unwrap();
    culler.resize(&mut graveyard, extent).unwrap();
    let depth_view = culler.depth_target().unwrap();

    // ACT
    culler.prepare(&records, &camera).unwrap();
    let mut encoder = device.create_command_encoder(Some("cull"));
    {
        let _depth_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Depth Prepass"),
            color_attachments: &[],
            depth_attachment: Some(RenderPassDepthAttachment {
                view: depth_view,
                depth_ops: Operations {
                    load: LoadOp::Clear(wall),
                    store: StoreOp::Store,
                },
            }),
        });
    }
    assert!(culler.record(encoder.as_mut(), 0));
    device.submit_command_buffer(encoder.finish()).unwrap();
    let visibility = culler.resolve_visibility(0).unwrap();

    // ASSERT
    let pyramid = DepthPyramid::build(&DepthImage::filled(extent, wall));
    let expected = cull_cpu(&records, &camera, Some(&pyramid), config.culling.depth_bias);
    assert_eq!(visibility.words(), expected.as_slice());
    assert!(visibility.is_visible(0));
    assert!(!visibility.is_visible(1));
    assert!(visibility.is_visible(4));

    culler.destroy(&mut graveyard);
    pipelines.teardown(&mut graveyard);
    graveyard.flush();
    device.destroy_shader_module(shaders.depth_copy).unwrap();
    device.destroy_shader_module(shaders.reduce).unwrap();
    device.destroy_shader_module(shaders.cull).unwrap();
    assert_eq!(device.live_resource_count(), 0);
}
