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

//! Compute kernels of the Hi-Z culler, embedded at compile time.
//!
//! Every kernel has a single `main` entry point and one bind group (set 0) laid out
//! as declared by [`strata_core::culling::depth_copy_bindings`],
//! [`strata_core::culling::reduce_bindings`] and [`strata_core::culling::cull_bindings`].
//! The arithmetic mirrors [`strata_core::culling::hiz`].

use std::borrow::Cow;

use strata_core::culling::CullShaderModules;
use strata_core::renderer::api::{ShaderModuleDescriptor, ShaderSource};
use strata_core::renderer::{GraphicsDevice, ResourceError};

/// Copies the depth target into pyramid mip 0. Workgroup 8x8.
pub const DEPTH_COPY_WGSL: &str = include_str!("depth_copy.wgsl");

/// 2x2 minimum reduction of one mip into the next. Workgroup 8x8.
pub const REDUCE_MIN_WGSL: &str = include_str!("reduce_min.wgsl");

/// Sphere-versus-pyramid visibility test, one invocation per 32 records. Workgroup 64.
pub const CULL_WGSL: &str = include_str!("cull.wgsl");

/// Compiles the three culling kernels on `device`.
pub fn create_cull_shader_modules(device: &dyn GraphicsDevice) -> Result<CullShaderModules, ResourceError> {
    let module = |label: &'static str, source: &'static str| {
        device.create_shader_module(&ShaderModuleDescriptor {
            label: Some(label),
            source: ShaderSource::Wgsl(Cow::Borrowed(source)),
        })
    };
    Ok(CullShaderModules {
        depth_copy: module("Hi-Z Depth Copy", DEPTH_COPY_WGSL)?,
        reduce: module("Hi-Z Reduce Min", REDUCE_MIN_WGSL)?,
        cull: module("Hi-Z Visibility", CULL_WGSL)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::culling::{CULL_WORKGROUP_SIZE, PYRAMID_WORKGROUP_SIZE};
    use strata_core::renderer::headless::HeadlessDevice;

    #[test]
    fn kernels_are_compute_entry_points_named_main() {
        for source in [DEPTH_COPY_WGSL, REDUCE_MIN_WGSL, CULL_WGSL] {
            assert!(source.contains("@compute"));
            assert!(source.contains("fn main("));
        }
    }

    #[test]
    fn workgroup_sizes_match_the_dispatch_math() {
        let pyramid = format!("@workgroup_size({PYRAMID_WORKGROUP_SIZE}, {PYRAMID_WORKGROUP_SIZE}, 1)");
        assert!(DEPTH_COPY_WGSL.contains(&pyramid));
        assert!(REDUCE_MIN_WGSL.contains(&pyramid));
        assert!(CULL_WGSL.contains(&format!("@workgroup_size({CULL_WORKGROUP_SIZE}, 1, 1)")));
    }

    #[test]
    fn modules_are_created_on_any_device() {
        // ARRANGE
        let device = HeadlessDevice::new();

        // ACT
        let modules = create_cull_shader_modules(&device).unwrap();

        // ASSERT
        assert_ne!(modules.depth_copy, modules.reduce);
        assert_ne!(modules.reduce, modules.cull);
        assert_eq!(device.live_resource_count(), 3);
    }
}
