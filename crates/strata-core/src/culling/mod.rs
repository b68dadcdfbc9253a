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

//! Hierarchical depth-pyramid occlusion culling.
//!
//! Each frame the caller renders a depth-only pass of every frustum-visible
//! renderable into [`DepthPyramidCuller::depth_target`], then the culler reduces that
//! depth into a min-depth pyramid, tests one bounding sphere per renderable against it
//! and reads the packed result back within the same frame as a [`VisibilitySet`].

mod culler;
pub mod hiz;
mod visibility;

pub use self::culler::{
    cull_bindings, depth_copy_bindings, reduce_bindings, CullShaderModules, DepthPyramidCuller,
    CULL_WORKGROUP_SIZE, PYRAMID_WORKGROUP_SIZE,
};
pub use self::visibility::VisibilitySet;

use crate::renderer::api::Extent2d;
use crate::renderer::error::{PipelineError, ResourceError};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use thiserror::Error;

/// An error raised by the [`DepthPyramidCuller`].
#[derive(Debug, Error)]
pub enum CullError {
    /// More renderables than the cull-record array holds.
    #[error("{requested} cull records exceed the capacity of {capacity}")]
    CapacityExceeded {
        /// Records submitted this frame.
        requested: usize,
        /// Configured capacity.
        capacity: usize,
    },
    /// Visibility was resolved for a slot that recorded no culling work.
    #[error("no culling work was recorded for slot {0}")]
    NotRecorded(usize),
    /// Building one of the culling pipelines failed.
    #[error("culling pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    /// Creating, writing or reading a culling resource failed.
    #[error("culling resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// A renderable's world-space bounding sphere, as laid out in the GPU record array.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CullRecord {
    /// Sphere centre.
    pub center: [f32; 3],
    /// Sphere radius.
    pub radius: f32,
}

impl CullRecord {
    /// Creates a record.
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center: center.to_array(),
            radius,
        }
    }

    /// The centre as a vector.
    pub fn center(&self) -> Vec3 {
        Vec3::from_array(self.center)
    }
}

/// The camera the visibility test projects with.
///
/// The projection must map depth to `[0, 1]` with 0 at the near plane
/// (e.g. [`Mat4::perspective_rh`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullCamera {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub projection: Mat4,
    /// Distance of the near plane.
    pub near: f32,
}

impl CullCamera {
    /// Creates a camera.
    pub fn new(view: Mat4, projection: Mat4, near: f32) -> Self {
        Self {
            view,
            projection,
            near,
        }
    }
}

/// Uniform block of the visibility kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CullUniforms {
    /// World to view, column-major.
    pub view: [[f32; 4]; 4],
    /// View to clip, column-major.
    pub projection: [[f32; 4]; 4],
    /// Size of pyramid mip 0 in texels.
    pub base_size: [f32; 2],
    /// Near plane distance.
    pub near: f32,
    /// Depth tolerance.
    pub depth_bias: f32,
    /// Records to test.
    pub record_count: u32,
    /// Mips in the pyramid.
    pub mip_count: u32,
    _padding: [u32; 2],
}

impl CullUniforms {
    /// Packs the per-frame parameters.
    pub fn new(
        camera: &CullCamera,
        base: Extent2d,
        mip_count: u32,
        record_count: u32,
        depth_bias: f32,
    ) -> Self {
        Self {
            view: camera.view.to_cols_array_2d(),
            projection: camera.projection.to_cols_array_2d(),
            base_size: [base.width as f32, base.height as f32],
            near: camera.near,
            depth_bias,
            record_count,
            mip_count,
            _padding: [0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_layouts_have_shader_sizes() {
        assert_eq!(std::mem::size_of::<CullRecord>(), 16);
        assert_eq!(std::mem::size_of::<CullUniforms>(), 160);
    }

    #[test]
    fn record_round_trips_its_centre() {
        let record = CullRecord::new(Vec3::new(1.0, -2.0, 3.0), 0.5);
        assert_eq!(record.center(), Vec3::new(1.0, -2.0, 3.0));
        assert_eq!(bytemuck::bytes_of(&record).len(), 16);
    }
}
