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

//! # Strata Infra
//!
//! Concrete backends for the contracts of `strata-core`: the wgpu device, command
//! encoder and window surface, plus the WGSL kernels of the Hi-Z culler.

pub mod graphics;

pub use graphics::shaders::create_cull_shader_modules;
pub use graphics::wgpu::{bootstrap, WgpuDevice, WgpuGraphicsContext, WgpuSurface};
