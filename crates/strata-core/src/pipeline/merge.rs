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

//! Merging of per-stage reflected bindings into one layout per set.

use crate::renderer::api::{
    BindGroupLayoutEntry, ShaderStageFlags, StageBindings, MAX_BINDING_SETS,
};
use crate::renderer::error::PipelineError;
use std::collections::BTreeMap;

/// Merges the declarations of every stage.
///
/// The result has one entry list per set up to the highest declared set; lower
/// sets that no stage uses are present and empty. Entries are sorted by binding.
pub fn merge_bindings<'a, I>(stages: I) -> Result<Vec<Vec<BindGroupLayoutEntry>>, PipelineError>
where
    I: IntoIterator<Item = &'a StageBindings>,
{
    let mut sets: Vec<BTreeMap<u32, BindGroupLayoutEntry>> = Vec::new();

    for stage in stages {
        let visibility = ShaderStageFlags::from_stage(stage.stage);
        for declaration in &stage.declarations {
            let set = declaration.set as usize;
            if set >= MAX_BINDING_SETS {
                return Err(PipelineError::SetIndexOutOfRange {
                    set: declaration.set,
                    stage: stage.stage,
                    max: MAX_BINDING_SETS,
                });
            }
            if sets.len() <= set {
                sets.resize_with(set + 1, BTreeMap::new);
            }

            match sets[set].get_mut(&declaration.binding) {
                Some(existing) => {
                    if existing.ty != declaration.ty || existing.count != declaration.count {
                        return Err(PipelineError::BindingConflict {
                            set: declaration.set,
                            binding: declaration.binding,
                            existing: existing.ty,
                            existing_count: existing.count,
                            incoming: declaration.ty,
                            incoming_count: declaration.count,
                            stage: stage.stage,
                        });
                    }
                    existing.visibility |= visibility;
                }
                None => {
                    sets[set].insert(
                        declaration.binding,
                        BindGroupLayoutEntry {
                            binding: declaration.binding,
                            visibility,
                            ty: declaration.ty,
                            count: declaration.count,
                        },
                    );
                }
            }
        }
    }

    Ok(sets
        .into_iter()
        .map(|set| set.into_values().collect())
        .collect())
}
