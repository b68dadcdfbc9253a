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

//! Bit-set types used across the rendering API.

/// Declares a transparent `u32` bit-set with named constants, union and containment.
#[macro_export]
macro_rules! strata_flags {
    (
        $(#[$outer:meta])*
        pub struct $name:ident: u32 {
            $(
                $(#[$inner:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name {
            bits: u32,
        }

        impl $name {
            $(
                $(#[$inner])*
                pub const $flag: Self = Self { bits: $value };
            )*

            /// The empty set.
            pub const fn empty() -> Self {
                Self { bits: 0 }
            }

            /// Creates a set from raw bits.
            pub const fn from_bits(bits: u32) -> Self {
                Self { bits }
            }

            /// Returns the raw bits.
            pub const fn bits(&self) -> u32 {
                self.bits
            }

            /// Returns `true` if no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns `true` if every flag of `other` is also set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if at least one flag is shared with `other`.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Combines two sets.
            pub const fn union(self, other: Self) -> Self {
                Self {
                    bits: self.bits | other.bits,
                }
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self::Output {
                self.union(rhs)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                *self = self.union(rhs);
            }
        }
    };
}

/// A single programmable stage of a pipeline.
///
/// The order of the variants is the order in which stages appear in a
/// [`PipelineStateKey`](crate::pipeline::PipelineStateKey).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Pixel (fragment) shader.
    Pixel,
    /// Mesh shader.
    Mesh,
    /// Amplification (task) shader.
    Amplification,
    /// Hull (tessellation control) shader.
    Hull,
    /// Domain (tessellation evaluation) shader.
    Domain,
    /// Compute shader.
    Compute,
}

impl ShaderStage {
    /// Number of distinct stages.
    pub const COUNT: usize = 7;

    /// Every stage, in key order.
    pub const ALL: [ShaderStage; Self::COUNT] = [
        ShaderStage::Vertex,
        ShaderStage::Pixel,
        ShaderStage::Mesh,
        ShaderStage::Amplification,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Compute,
    ];

    /// Position of the stage inside a key's stage array.
    pub const fn index(self) -> usize {
        self as usize
    }
}

strata_flags! {
    /// Which shader stages can access a resource binding.
    ///
    /// Visibility is merged by union when two stages declare the same binding.
    pub struct ShaderStageFlags: u32 {
        /// Vertex shader stage.
        const VERTEX = 1 << 0;
        /// Pixel (fragment) shader stage.
        const PIXEL = 1 << 1;
        /// Mesh shader stage.
        const MESH = 1 << 2;
        /// Amplification shader stage.
        const AMPLIFICATION = 1 << 3;
        /// Hull shader stage.
        const HULL = 1 << 4;
        /// Domain shader stage.
        const DOMAIN = 1 << 5;
        /// Compute shader stage.
        const COMPUTE = 1 << 6;
    }
}

impl ShaderStageFlags {
    /// Creates flags from a single shader stage.
    pub const fn from_stage(stage: ShaderStage) -> Self {
        Self::from_bits(1 << stage as u32)
    }

    /// Checks if these flags contain a specific stage.
    pub const fn has_stage(&self, stage: ShaderStage) -> bool {
        self.contains(Self::from_stage(stage))
    }
}

impl From<ShaderStage> for ShaderStageFlags {
    fn from(stage: ShaderStage) -> Self {
        Self::from_stage(stage)
    }
}

strata_flags! {
    /// A set of flags describing the allowed usages of a buffer.
    pub struct BufferUsage: u32 {
        /// The buffer can be mapped for reading on the CPU.
        const MAP_READ = 1 << 0;
        /// The buffer can be mapped for writing on the CPU.
        const MAP_WRITE = 1 << 1;
        /// The buffer can be used as the source of a copy operation.
        const COPY_SRC = 1 << 2;
        /// The buffer can be used as the destination of a copy operation.
        const COPY_DST = 1 << 3;
        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 4;
        /// The buffer can be bound as an index buffer.
        const INDEX = 1 << 5;
        /// The buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 6;
        /// The buffer can be bound as a storage buffer.
        const STORAGE = 1 << 7;
        /// The buffer can be used for indirect draw or dispatch commands.
        const INDIRECT = 1 << 8;
    }
}

strata_flags! {
    /// A set of flags describing the allowed usages of a texture.
    pub struct TextureUsage: u32 {
        /// The texture can be used as the source of a copy.
        const COPY_SRC = 1 << 0;
        /// The texture can be used as the destination of a copy.
        const COPY_DST = 1 << 1;
        /// The texture can be sampled / loaded in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// The texture can be written as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// The texture can be a colour or depth attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}
