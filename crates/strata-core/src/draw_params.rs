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

//! Draw parameters of static meshes, shared between the logic and render threads.
//!
//! A static mesh registers once and keeps its slot in the pool until teardown. The
//! pool's contents are laid out for direct upload into a GPU storage buffer.

use crate::culling::CullRecord;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Identity of a static mesh, chosen by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StaticMeshId(pub u64);

/// A stable index into a [`StaticDrawParamPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StaticLease(u32);

impl StaticLease {
    /// Index of the parameters in the pool, and of the mesh's cull record.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Per-draw constants of a static mesh, as read by shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StaticDrawParams {
    /// Local to world, column-major.
    pub transform: [[f32; 4]; 4],
    /// World-space bounding sphere: centre in `xyz`, radius in `w`.
    pub bounds: [f32; 4],
}

impl StaticDrawParams {
    /// Creates parameters from a transform and a world-space bounding sphere.
    pub fn new(transform: Mat4, center: Vec3, radius: f32) -> Self {
        Self {
            transform: transform.to_cols_array_2d(),
            bounds: center.extend(radius).to_array(),
        }
    }

    /// The bounding sphere as a cull record.
    pub fn cull_record(&self) -> CullRecord {
        let [x, y, z, radius] = self.bounds;
        CullRecord::new(Vec3::new(x, y, z), radius)
    }
}

#[derive(Debug, Default)]
struct PoolState {
    leases: BTreeMap<StaticMeshId, StaticLease>,
    params: Vec<StaticDrawParams>,
}

/// An append-or-lookup pool of [`StaticDrawParams`].
#[derive(Debug, Default)]
pub struct StaticDrawParamPool {
    state: Mutex<PoolState>,
}

impl StaticDrawParamPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the lease of `mesh`, appending `params` if the mesh is new.
    ///
    /// An existing lease keeps its parameters; use [`Self::update`] to change them.
    pub fn lease(&self, mesh: StaticMeshId, params: StaticDrawParams) -> StaticLease {
        let mut state = self.state();
        if let Some(&lease) = state.leases.get(&mesh) {
            return lease;
        }
        let lease = StaticLease(state.params.len() as u32);
        state.params.push(params);
        state.leases.insert(mesh, lease);
        log::trace!("StaticDrawParamPool: {:?} leased slot {}", mesh, lease.0);
        lease
    }

    /// The lease of `mesh`, if registered.
    pub fn find(&self, mesh: StaticMeshId) -> Option<StaticLease> {
        self.state().leases.get(&mesh).copied()
    }

    /// The parameters behind `lease`.
    pub fn get(&self, lease: StaticLease) -> Option<StaticDrawParams> {
        self.state().params.get(lease.0 as usize).copied()
    }

    /// Replaces the parameters behind `lease`. Returns `false` for an unknown lease.
    pub fn update(&self, lease: StaticLease, params: StaticDrawParams) -> bool {
        match self.state().params.get_mut(lease.0 as usize) {
            Some(slot) => {
                *slot = params;
                true
            }
            None => false,
        }
    }

    /// Number of leased slots.
    pub fn len(&self) -> usize {
        self.state().params.len()
    }

    /// Returns `true` when nothing was leased.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pool's contents as upload bytes, ordered by lease index.
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.state().params).to_vec()
    }

    /// One cull record per lease, ordered by lease index.
    pub fn cull_records(&self) -> Vec<CullRecord> {
        self.state().params.iter().map(StaticDrawParams::cull_record).collect()
    }

    /// Forgets every lease.
    pub fn clear(&self) {
        let mut state = self.state();
        state.leases.clear();
        state.params.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn params(x: f32) -> StaticDrawParams {
        StaticDrawParams::new(Mat4::from_translation(Vec3::new(x, 0.0, 0.0)), Vec3::new(x, 0.0, 0.0), 1.0)
    }

    #[test]
    fn lease_is_append_or_lookup() {
        let pool = StaticDrawParamPool::new();
        let a = pool.lease(StaticMeshId(7), params(1.0));
        let b = pool.lease(StaticMeshId(3), params(2.0));
        let again = pool.lease(StaticMeshId(7), params(9.0));

        assert_eq!(a, again);
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(pool.get(a), Some(params(1.0)));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn update_and_export_follow_lease_order() {
        let pool = StaticDrawParamPool::new();
        let a = pool.lease(StaticMeshId(1), params(1.0));
        pool.lease(StaticMeshId(2), params(2.0));
        assert!(pool.update(a, params(5.0)));
        assert!(!pool.update(StaticLease(9), params(0.0)));

        let records = pool.cull_records();
        assert_eq!(records[0].center(), Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(records[1].radius, 1.0);
        assert_eq!(pool.to_bytes().len(), 2 * std::mem::size_of::<StaticDrawParams>());
    }

    #[test]
    fn concurrent_leases_are_unique() {
        let pool = Arc::new(StaticDrawParamPool::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    (0..16)
                        .map(|i| pool.lease(StaticMeshId(i % 8 + t * 8), params(i as f32)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.len(), 32);
        assert_eq!(pool.find(StaticMeshId(31)).map(|l| l.index() < 32), Some(true));
        pool.clear();
        assert!(pool.is_empty());
    }
}
