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

//! Defines the hierarchy of error types for the rendering contracts.
//!
//! Every variant here is fatal for the frame that produced it, except the
//! recoverable [`SurfaceError`] kinds reported by [`SurfaceError::is_recoverable`].

use crate::renderer::api::{
    is_copy_aligned, BindingType, ShaderModuleId, ShaderStage, COPY_BUFFER_ALIGNMENT,
};
use thiserror::Error;

/// An error related to the creation or compilation of a shader module.
#[derive(Debug, Error)]
pub enum ShaderError {
    /// The shader source failed to compile into a backend-specific module.
    #[error("Shader compilation failed for '{label}': {details}")]
    CompilationError {
        /// A descriptive label for the shader, if available.
        label: String,
        /// Detailed error messages from the shader compiler.
        details: String,
    },
    /// The requested shader module could not be found.
    #[error("Shader module not found for ID: {id:?}")]
    NotFound {
        /// The ID of the shader module that was not found.
        id: ShaderModuleId,
    },
}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    #[error("Shader resource error: {0}")]
    Shader(#[from] ShaderError),
    /// The id does not name a live object of the expected kind.
    #[error("{kind} not found with ID {id}")]
    NotFound {
        /// Object kind, e.g. "buffer".
        kind: &'static str,
        /// Raw id value.
        id: usize,
    },
    /// An access went past the end of a resource.
    #[error("Resource access out of bounds: offset {offset} + {len} > {size}")]
    OutOfBounds {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Size of the resource.
        size: u64,
    },
    /// A buffer write or copy does not start or end on the copy alignment.
    #[error("Buffer access at offset {offset} of {len} bytes is not {alignment}-byte aligned")]
    Misaligned {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Required alignment in bytes.
        alignment: u64,
    },
    /// The device ran out of memory.
    #[error("Out of device memory")]
    OutOfMemory,
    /// The device was lost; nothing can be recovered.
    #[error("Device lost")]
    DeviceLost,
    /// An error originating from the specific graphics backend implementation.
    #[error("Backend-specific resource error: {0}")]
    BackendError(String),
}

impl ResourceError {
    /// Shorthand for a [`ResourceError::NotFound`].
    pub fn not_found(kind: &'static str, id: usize) -> Self {
        ResourceError::NotFound { kind, id }
    }

    /// Fails with [`ResourceError::Misaligned`] unless `offset` and `len` are copy aligned.
    pub fn check_copy_alignment(offset: u64, len: u64) -> Result<(), Self> {
        if is_copy_aligned(offset) && is_copy_aligned(len) {
            Ok(())
        } else {
            Err(ResourceError::Misaligned {
                offset,
                len,
                alignment: COPY_BUFFER_ALIGNMENT,
            })
        }
    }
}

/// An error related to building cached pipeline state.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Two stages declare the same binding slot with a different type or count.
    #[error(
        "Binding conflict at set {set} binding {binding}: {existing:?} x{existing_count} vs {incoming:?} x{incoming_count} from {stage:?}"
    )]
    BindingConflict {
        /// Binding set.
        set: u32,
        /// Binding slot.
        binding: u32,
        /// Type already merged.
        existing: BindingType,
        /// Count already merged.
        existing_count: u32,
        /// Type declared by the conflicting stage.
        incoming: BindingType,
        /// Count declared by the conflicting stage.
        incoming_count: u32,
        /// The stage whose declaration conflicts.
        stage: ShaderStage,
    },
    /// A stage declares a set beyond the addressable range.
    #[error("Binding set {set} declared by {stage:?} exceeds the limit of {max} sets")]
    SetIndexOutOfRange {
        /// Declared set.
        set: u32,
        /// Declaring stage.
        stage: ShaderStage,
        /// Number of addressable sets.
        max: usize,
    },
    /// The set of active stages cannot form a pipeline.
    #[error("Invalid shader stage combination: {0}")]
    InvalidStageCombination(String),
    /// The backend cannot build pipelines with this stage.
    #[error("Shader stage {0:?} is not supported by this device")]
    UnsupportedStage(ShaderStage),
    /// The graphics backend failed to compile the pipeline state object.
    #[error("Pipeline compilation failed for '{}': {details}", label.as_deref().unwrap_or("Unknown"))]
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
    /// Creating a layout or pipeline object failed.
    #[error("Pipeline resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// An error reported by a presentation surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface no longer matches the window and must be reconfigured.
    #[error("Presentation target is out of date")]
    Outdated,
    /// The surface was lost and must be reconfigured.
    #[error("Presentation target was lost")]
    Lost,
    /// Acquiring the next image timed out.
    #[error("Timed out acquiring the presentation target")]
    Timeout,
    /// The device ran out of memory.
    #[error("Out of memory while presenting")]
    OutOfMemory,
    /// Any other presentation failure.
    #[error("Presentation failed: {0}")]
    Other(String),
}

impl SurfaceError {
    /// Whether the frame can simply be skipped (a resize is expected to follow).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SurfaceError::Outdated | SurfaceError::Lost | SurfaceError::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_error_display() {
        let err = ResourceError::not_found("buffer", 7);
        assert_eq!(format!("{err}"), "buffer not found with ID 7");

        let err = ResourceError::OutOfBounds {
            offset: 8,
            len: 16,
            size: 12,
        };
        assert_eq!(
            format!("{err}"),
            "Resource access out of bounds: offset 8 + 16 > 12"
        );
    }

    #[test]
    fn test_shader_error_wraps_into_resource_error() {
        let err: ResourceError = ShaderError::CompilationError {
            label: "cull".into(),
            details: "unexpected token".into(),
        }
        .into();
        assert_eq!(
            format!("{err}"),
            "Shader resource error: Shader compilation failed for 'cull': unexpected token"
        );
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::CompilationFailed {
            label: None,
            details: "bad".into(),
        };
        assert_eq!(
            format!("{err}"),
            "Pipeline compilation failed for 'Unknown': bad"
        );
    }

    #[test]
    fn test_surface_error_recoverability() {
        assert!(SurfaceError::Outdated.is_recoverable());
        assert!(SurfaceError::Lost.is_recoverable());
        assert!(SurfaceError::Timeout.is_recoverable());
        assert!(!SurfaceError::OutOfMemory.is_recoverable());
        assert!(!SurfaceError::Other("driver".into()).is_recoverable());
    }
}
