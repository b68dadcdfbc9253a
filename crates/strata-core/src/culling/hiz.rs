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

//! CPU reference of the Hi-Z kernels.
//!
//! The depth convention is the standard one: 0 at the near plane, 1 at the far plane,
//! depth test `Less`, cleared to 1. A texel of mip `L` holds the minimum (nearest)
//! depth of its footprint, so an object is hidden only if it lies behind *everything*
//! drawn in the region it covers. The compute shaders in `strata-infra` implement
//! the same arithmetic and are tested against these functions.

use super::{CullCamera, CullRecord};
use crate::renderer::api::Extent2d;
use glam::{Vec2, Vec3};

/// Number of mips of a pyramid over a `size` depth target: `ceil(log2(max(w, h)))`,
/// at least one.
pub fn mip_count(size: Extent2d) -> u32 {
    let largest = size.width.max(size.height).max(1);
    let ceil_log2 = u32::BITS - (largest - 1).leading_zeros();
    ceil_log2.max(1)
}

/// A single-channel float image.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    extent: Extent2d,
    texels: Vec<f32>,
}

impl DepthImage {
    /// An image filled with `value`.
    pub fn filled(extent: Extent2d, value: f32) -> Self {
        Self {
            extent,
            texels: vec![value; (extent.width * extent.height) as usize],
        }
    }

    /// An image whose texel `(x, y)` is `f(x, y)`.
    pub fn from_fn(extent: Extent2d, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut texels = Vec::with_capacity((extent.width * extent.height) as usize);
        for y in 0..extent.height {
            for x in 0..extent.width {
                texels.push(f(x, y));
            }
        }
        Self { extent, texels }
    }

    /// Size of the image.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Texel at `(x, y)`, with coordinates clamped to the image.
    ///
    /// An empty image reads as infinitely far, so nothing tested against it is hidden.
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if self.extent.is_empty() {
            return f32::INFINITY;
        }
        let x = x.min(self.extent.width - 1);
        let y = y.min(self.extent.height - 1);
        self.texels[(y * self.extent.width + x) as usize]
    }

    /// Overwrites texel `(x, y)`.
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let index = (y * self.extent.width + x) as usize;
        self.texels[index] = value;
    }

    /// Raw texels, row-major.
    pub fn texels(&self) -> &[f32] {
        &self.texels
    }
}

/// One 2x2 minimum reduction step.
///
/// The result is half the size (at least 1). When a source dimension is odd, the
/// last destination column/row also covers the extra source column/row.
pub fn reduce_min(source: &DepthImage) -> DepthImage {
    let src = source.extent();
    let dst = Extent2d::new((src.width / 2).max(1), (src.height / 2).max(1));
    let fold_x = src.width % 2 == 1 && src.width > 1;
    let fold_y = src.height % 2 == 1 && src.height > 1;

    DepthImage::from_fn(dst, |x, y| {
        let x_end = if fold_x && x == dst.width - 1 { 2 } else { 1 };
        let y_end = if fold_y && y == dst.height - 1 { 2 } else { 1 };
        let mut min = f32::INFINITY;
        for dy in 0..=y_end {
            for dx in 0..=x_end {
                min = min.min(source.get(2 * x + dx, 2 * y + dy));
            }
        }
        min
    })
}

/// The min-depth pyramid of a depth image.
#[derive(Debug, Clone)]
pub struct DepthPyramid {
    levels: Vec<DepthImage>,
}

impl DepthPyramid {
    /// Builds every level: mip 0 is a copy of `depth`, each further mip reduces the previous.
    ///
    /// An empty `depth` yields a single empty level.
    pub fn build(depth: &DepthImage) -> Self {
        if depth.extent().is_empty() {
            return Self {
                levels: vec![depth.clone()],
            };
        }
        let count = mip_count(depth.extent());
        let mut levels = Vec::with_capacity(count as usize);
        levels.push(depth.clone());
        for level in 1..count as usize {
            let next = reduce_min(&levels[level - 1]);
            levels.push(next);
        }
        Self { levels }
    }

    /// Number of mips.
    pub fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// One mip.
    pub fn level(&self, mip: u32) -> &DepthImage {
        &self.levels[mip as usize]
    }

    /// Size of mip 0.
    pub fn base_extent(&self) -> Extent2d {
        self.levels[0].extent()
    }
}

/// Screen-space bounds of a projected sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereFootprint {
    /// Top-left corner in texture coordinates (`[0, 1]`, v pointing down).
    pub uv_min: Vec2,
    /// Bottom-right corner in texture coordinates.
    pub uv_max: Vec2,
    /// Depth of the point of the sphere closest to the camera.
    pub nearest_depth: f32,
}

/// Projects a sphere given in world space.
///
/// Returns `None` when any part of the sphere is at or in front of the near plane;
/// such a sphere cannot be tested and counts as visible.
pub fn project_sphere(center: Vec3, radius: f32, camera: &CullCamera) -> Option<SphereFootprint> {
    let view_center = camera.view.transform_point3(center);
    let distance = -view_center.z;
    if distance - radius <= camera.near {
        return None;
    }

    // Bound the projection by the corners of the view-space box around the sphere.
    let mut ndc_min = Vec2::splat(f32::INFINITY);
    let mut ndc_max = Vec2::splat(f32::NEG_INFINITY);
    for corner in 0..8u32 {
        let offset = Vec3::new(
            if corner & 1 == 0 { -radius } else { radius },
            if corner & 2 == 0 { -radius } else { radius },
            if corner & 4 == 0 { -radius } else { radius },
        );
        let ndc = camera.projection.project_point3(view_center + offset);
        ndc_min = ndc_min.min(ndc.truncate());
        ndc_max = ndc_max.max(ndc.truncate());
    }

    let nearest = camera
        .projection
        .project_point3(Vec3::new(0.0, 0.0, -(distance - radius)));

    // NDC y points up, texture v points down.
    let uv_min = Vec2::new(ndc_min.x * 0.5 + 0.5, 0.5 - ndc_max.y * 0.5);
    let uv_max = Vec2::new(ndc_max.x * 0.5 + 0.5, 0.5 - ndc_min.y * 0.5);
    Some(SphereFootprint {
        uv_min: uv_min.clamp(Vec2::ZERO, Vec2::ONE),
        uv_max: uv_max.clamp(Vec2::ZERO, Vec2::ONE),
        nearest_depth: nearest.z,
    })
}

/// The finest mip at which the footprint spans at most 2x2 texels.
pub fn select_mip(footprint: &SphereFootprint, base: Extent2d, mip_count: u32) -> u32 {
    let size = (footprint.uv_max - footprint.uv_min) * Vec2::new(base.width as f32, base.height as f32);
    let extent = size.x.max(size.y).max(1.0);
    let level = extent.log2().ceil() as u32;
    level.min(mip_count.saturating_sub(1))
}

/// Texel of mip `level` covering the mip-0 pixel coordinate `pixel`.
///
/// Exact under the odd-edge folding of [`reduce_min`]: the last texel of a mip
/// absorbs the remainder.
fn texel_at(pixel: f32, level: u32, level_size: u32) -> u32 {
    let texel = (pixel.max(0.0) as u32) >> level;
    texel.min(level_size.saturating_sub(1))
}

/// Minimum depth over the texels of mip `level` touched by the footprint corners.
pub fn sample_min(pyramid: &DepthPyramid, level: u32, footprint: &SphereFootprint) -> f32 {
    let base = pyramid.base_extent();
    let image = pyramid.level(level);
    let size = image.extent();
    let scale = Vec2::new(base.width as f32, base.height as f32);
    let min_px = footprint.uv_min * scale;
    let max_px = footprint.uv_max * scale;

    let x0 = texel_at(min_px.x, level, size.width);
    let x1 = texel_at(max_px.x, level, size.width);
    let y0 = texel_at(min_px.y, level, size.height);
    let y1 = texel_at(max_px.y, level, size.height);
    image
        .get(x0, y0)
        .min(image.get(x1, y0))
        .min(image.get(x0, y1))
        .min(image.get(x1, y1))
}

/// Occlusion test of one record against a pyramid.
pub fn is_visible(record: &CullRecord, camera: &CullCamera, pyramid: &DepthPyramid, bias: f32) -> bool {
    if pyramid.base_extent().is_empty() {
        return true;
    }
    let Some(footprint) = project_sphere(record.center(), record.radius, camera) else {
        return true;
    };
    let level = select_mip(&footprint, pyramid.base_extent(), pyramid.mip_count());
    footprint.nearest_depth <= sample_min(pyramid, level, &footprint) + bias
}

/// Number of visibility words needed for `count` records.
pub fn word_count(count: usize) -> usize {
    count.div_ceil(32)
}

/// Packs one bit per record (bit `i & 31` of word `i >> 5`). Padding bits are zero.
pub fn pack_words(bits: impl IntoIterator<Item = bool>) -> Vec<u32> {
    let mut words = Vec::new();
    for (i, visible) in bits.into_iter().enumerate() {
        if i % 32 == 0 {
            words.push(0);
        }
        if visible {
            words[i >> 5] |= 1 << (i & 31);
        }
    }
    words
}

/// Visibility words for `records`, as the cull kernel computes them.
///
/// Without a pyramid (zero-sized target) every record is visible.
pub fn cull_cpu(
    records: &[CullRecord],
    camera: &CullCamera,
    pyramid: Option<&DepthPyramid>,
    bias: f32,
) -> Vec<u32> {
    pack_words(records.iter().map(|record| match pyramid {
        Some(pyramid) => is_visible(record, camera, pyramid, bias),
        None => true,
    }))
}
