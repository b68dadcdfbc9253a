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

//! The N-buffered acquire / record / submit / present loop.
//!
//! Frame `F` records into slot `F mod N`. Before a slot is reused, the scheduler waits
//! (bounded) for the submission that last used it, and only then recycles what that
//! submission could still reference: the slot's graveyard bin, its staging chunks, its
//! transient bind groups and its debug submissions.

use super::affinity::ThreadAffinity;
use super::debug_draw::DebugDraw;
use super::graveyard::{ResourceGraveyard, RetireSender};
use super::pass_tracker::PassTracker;
use super::staging::{StagingAllocator, StagingError};
use crate::config::{ConfigError, RendererConfig};
use crate::pipeline::PipelineStateCache;
use crate::renderer::api::{
    BindGroupDescriptor, BindGroupId, BufferId, Extent2d, SubmissionId, TextureViewId, WaitStatus,
};
use crate::renderer::error::{ResourceError, SurfaceError};
use crate::renderer::traits::{CommandEncoder, GraphicsDevice, PresentationSurface};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A fatal error of the frame loop.
#[derive(Debug, Error)]
pub enum FrameError {
    /// A slot's previous submission did not complete within the bound.
    #[error("slot {slot} still busy with submission {submission:?} after {timeout:?}")]
    SlotTimeout {
        /// The slot being reused.
        slot: usize,
        /// The submission that did not complete.
        submission: SubmissionId,
        /// The bound that was exceeded.
        timeout: Duration,
    },
    /// A non-recoverable presentation failure.
    #[error("presentation failed: {0}")]
    Surface(#[from] SurfaceError),
    /// Creating, submitting or waiting failed.
    #[error("device error: {0}")]
    Resource(#[from] ResourceError),
    /// Staging memory could not be provided.
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),
    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The operation needs a frame in recording.
    #[error("no frame is recording")]
    NotRecording,
    /// The operation is not allowed while a frame is recording.
    #[error("a frame is already recording")]
    AlreadyRecording,
    /// The scheduler was shut down.
    #[error("the frame scheduler has been shut down")]
    ShutDown,
}

/// Lifecycle of a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never used.
    Idle,
    /// Commands are being recorded.
    Recording,
    /// Submitted, completion not yet observed.
    Submitted,
    /// The slot's last submission has completed.
    Complete,
}

/// Why a frame was skipped. The caller is expected to resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The target no longer matches the window.
    Outdated,
    /// The target was lost.
    Lost,
    /// No image became available in time.
    Timeout,
    /// The target has zero area (minimised window).
    Minimized,
}

impl SkipReason {
    fn from_surface(error: &SurfaceError) -> Option<Self> {
        match error {
            SurfaceError::Outdated => Some(SkipReason::Outdated),
            SurfaceError::Lost => Some(SkipReason::Lost),
            SurfaceError::Timeout => Some(SkipReason::Timeout),
            SurfaceError::OutOfMemory | SurfaceError::Other(_) => None,
        }
    }
}

/// The frame being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    /// Slot index in `0..frames_in_flight`.
    pub slot: usize,
    /// Number of the frame, counting presented frames.
    pub frame_number: u64,
    /// The acquired presentation target.
    pub target: TextureViewId,
    /// Size of the target.
    pub extent: Extent2d,
    /// The target works but no longer matches the surface optimally.
    pub suboptimal: bool,
}

/// Result of [`FrameScheduler::begin_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Recording has begun.
    Ready(FrameContext),
    /// No frame this time.
    Skipped(SkipReason),
}

/// Result of [`FrameScheduler::end_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// Submitted and presented.
    Presented,
    /// Submitted, but the presentation was refused.
    Skipped(SkipReason),
}

/// An object whose GPU storage depends on the presentation size.
pub trait SizeDependent {
    /// Recreates the storage for `extent`, retiring the previous objects into `graveyard`.
    /// A zero-sized `extent` releases the storage.
    fn resize(&mut self, graveyard: &mut ResourceGraveyard, extent: Extent2d) -> Result<(), ResourceError>;
}

#[derive(Debug)]
struct FrameSlot {
    state: SlotState,
    last_submission: Option<SubmissionId>,
    transient_groups: Vec<BindGroupId>,
}

struct Recording {
    context: FrameContext,
    encoder: Box<dyn CommandEncoder>,
}

impl std::fmt::Debug for Recording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recording")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Drives N-buffered frames over a device and a presentation surface.
#[derive(Debug)]
pub struct FrameScheduler {
    device: Arc<dyn GraphicsDevice>,
    surface: Box<dyn PresentationSurface>,
    config: RendererConfig,
    slots: Vec<FrameSlot>,
    next_slot: usize,
    frame_number: u64,
    extent: Extent2d,
    graveyard: ResourceGraveyard,
    staging: StagingAllocator,
    pipelines: Arc<PipelineStateCache>,
    debug_draw: DebugDraw,
    passes: PassTracker,
    recording: Option<Recording>,
    affinity: ThreadAffinity,
    shut_down: bool,
}

impl FrameScheduler {
    /// Creates the scheduler and its subsystems. The calling thread becomes the render thread.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        surface: Box<dyn PresentationSurface>,
        config: RendererConfig,
    ) -> Result<Self, FrameError> {
        config.validate()?;
        let frames = config.frames_in_flight;
        log::info!(
            "FrameScheduler: {} frames in flight on the {} backend",
            frames,
            device.backend_name()
        );
        Ok(Self {
            graveyard: ResourceGraveyard::new(Arc::clone(&device), frames),
            staging: StagingAllocator::new(Arc::clone(&device), &config.staging),
            pipelines: Arc::new(PipelineStateCache::new()),
            debug_draw: DebugDraw::new(frames),
            passes: PassTracker::new(),
            slots: (0..frames)
                .map(|_| FrameSlot {
                    state: SlotState::Idle,
                    last_submission: None,
                    transient_groups: Vec::new(),
                })
                .collect(),
            next_slot: 0,
            frame_number: 0,
            extent: surface.size(),
            device,
            surface,
            config,
            recording: None,
            affinity: ThreadAffinity::current(),
            shut_down: false,
        })
    }

    fn check(&self, operation: &str) -> Result<(), FrameError> {
        self.affinity.check(operation);
        if self.shut_down {
            return Err(FrameError::ShutDown);
        }
        Ok(())
    }

    /// Waits for the slot's last submission, bounded by the configured timeout.
    fn wait_for_slot(&mut self, slot: usize) -> Result<(), FrameError> {
        let Some(submission) = self.slots[slot].last_submission else {
            return Ok(());
        };
        let timeout = self.config.slot_wait_timeout();
        match self.device.wait_for_submission(submission, timeout)? {
            WaitStatus::Complete => {
                self.slots[slot].state = SlotState::Complete;
                Ok(())
            }
            WaitStatus::TimedOut => Err(FrameError::SlotTimeout {
                slot,
                submission,
                timeout,
            }),
        }
    }

    /// Starts the next frame.
    ///
    /// Waits for the slot's previous use, acquires a target and, once a target is
    /// available, recycles the slot's deferred work and opens a command encoder. A
    /// recoverable surface condition yields [`FrameStatus::Skipped`] and leaves the
    /// slot untouched.
    pub fn begin_frame(&mut self) -> Result<FrameStatus, FrameError> {
        self.check("FrameScheduler::begin_frame")?;
        if self.recording.is_some() {
            return Err(FrameError::AlreadyRecording);
        }
        let _span = tracing::debug_span!("begin_frame", frame = self.frame_number).entered();

        if self.extent.is_empty() {
            return Ok(FrameStatus::Skipped(SkipReason::Minimized));
        }

        let slot = self.next_slot;
        self.wait_for_slot(slot)?;

        let acquired = match self.surface.acquire() {
            Ok(acquired) => acquired,
            Err(error) => {
                return match SkipReason::from_surface(&error) {
                    Some(reason) => {
                        log::warn!("FrameScheduler: skipping frame {}: {}", self.frame_number, error);
                        Ok(FrameStatus::Skipped(reason))
                    }
                    None => Err(error.into()),
                };
            }
        };

        let transient = std::mem::take(&mut self.slots[slot].transient_groups);
        self.graveyard.retire_all(transient);
        self.graveyard.begin_frame(slot);
        self.staging.frame_completed(slot);
        self.debug_draw.begin_slot(slot);
        self.passes.finish_frame();

        let context = FrameContext {
            slot,
            frame_number: self.frame_number,
            target: acquired.view,
            extent: self.extent,
            suboptimal: acquired.suboptimal,
        };
        self.recording = Some(Recording {
            context,
            encoder: self.device.create_command_encoder(Some("Frame Encoder")),
        });
        self.slots[slot].state = SlotState::Recording;
        log::debug!("FrameScheduler: frame {} recording in slot {}", self.frame_number, slot);
        Ok(FrameStatus::Ready(context))
    }

    /// The encoder of the frame being recorded.
    pub fn encoder(&mut self) -> Result<&mut dyn CommandEncoder, FrameError> {
        match self.recording.as_mut() {
            Some(recording) => Ok(recording.encoder.as_mut()),
            None => Err(FrameError::NotRecording),
        }
    }

    /// The frame being recorded.
    pub fn current_frame(&self) -> Option<FrameContext> {
        self.recording.as_ref().map(|r| r.context)
    }

    /// Copies `data` into `destination` at `offset` through staging memory owned by
    /// the current slot. The copy executes in command order.
    ///
    /// `offset` and `data.len()` must be multiples of [`COPY_BUFFER_ALIGNMENT`](crate::renderer::api::COPY_BUFFER_ALIGNMENT);
    /// otherwise [`ResourceError::Misaligned`] is returned and nothing is staged.
    pub fn upload_to_buffer(&mut self, destination: BufferId, offset: u64, data: &[u8]) -> Result<(), FrameError> {
        self.check("FrameScheduler::upload_to_buffer")?;
        let recording = self.recording.as_mut().ok_or(FrameError::NotRecording)?;
        ResourceError::check_copy_alignment(offset, data.len() as u64)?;
        let slice = self.staging.write(data, recording.context.slot)?;
        recording
            .encoder
            .copy_buffer_to_buffer(slice.buffer, slice.offset, destination, offset, data.len() as u64);
        Ok(())
    }

    /// Creates a bind group that lives until the current slot is reused.
    pub fn create_transient_bind_group(
        &mut self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, FrameError> {
        self.check("FrameScheduler::create_transient_bind_group")?;
        let slot = self
            .recording
            .as_ref()
            .map(|r| r.context.slot)
            .ok_or(FrameError::NotRecording)?;
        let group = self.device.create_bind_group(descriptor)?;
        self.slots[slot].transient_groups.push(group);
        Ok(group)
    }

    /// Submits what has been recorded so far and continues the frame on a fresh encoder.
    ///
    /// With `wait`, blocks (bounded) until the submitted work completes, which lets the
    /// frame read back results of its own earlier commands.
    pub fn flush_recording(&mut self, wait: bool) -> Result<SubmissionId, FrameError> {
        self.check("FrameScheduler::flush_recording")?;
        let recording = self.recording.as_mut().ok_or(FrameError::NotRecording)?;
        let slot = recording.context.slot;
        let encoder = std::mem::replace(
            &mut recording.encoder,
            self.device.create_command_encoder(Some("Frame Encoder")),
        );
        let submission = self.device.submit_command_buffer(encoder.finish())?;
        self.slots[slot].last_submission = Some(submission);
        log::trace!("FrameScheduler: mid-frame flush {:?} in slot {}", submission, slot);

        if wait {
            let timeout = self.config.slot_wait_timeout();
            if self.device.wait_for_submission(submission, timeout)? == WaitStatus::TimedOut {
                return Err(FrameError::SlotTimeout {
                    slot,
                    submission,
                    timeout,
                });
            }
        }
        Ok(submission)
    }

    /// Submits the frame and presents its target.
    ///
    /// A refused presentation is reported as [`PresentStatus::Skipped`]; the submission
    /// stands and the frame still counts.
    pub fn end_frame(&mut self) -> Result<PresentStatus, FrameError> {
        self.check("FrameScheduler::end_frame")?;
        let recording = self.recording.take().ok_or(FrameError::NotRecording)?;
        let _span = tracing::debug_span!("end_frame", frame = recording.context.frame_number).entered();
        let slot = recording.context.slot;

        let passes = self.passes.finish_frame();
        log::trace!("FrameScheduler: frame {} pass stats {:?}", self.frame_number, passes);

        let submission = match self.device.submit_command_buffer(recording.encoder.finish()) {
            Ok(submission) => submission,
            Err(e) => {
                self.surface.discard();
                return Err(e.into());
            }
        };
        self.slots[slot].last_submission = Some(submission);
        self.slots[slot].state = SlotState::Submitted;
        self.next_slot = (slot + 1) % self.slots.len();
        self.frame_number += 1;

        match self.surface.present() {
            Ok(()) => Ok(PresentStatus::Presented),
            Err(error) => match SkipReason::from_surface(&error) {
                Some(reason) => {
                    log::warn!("FrameScheduler: presentation skipped: {error}");
                    Ok(PresentStatus::Skipped(reason))
                }
                None => Err(error.into()),
            },
        }
    }

    /// Waits for the device to go idle, then recreates every size-dependent object.
    ///
    /// A zero-sized request leaves the surface alone but is still handed to every
    /// target, which releases its storage; frames are skipped until a non-zero size
    /// arrives.
    pub fn resize_buffers(
        &mut self,
        width: u32,
        height: u32,
        targets: &mut [&mut dyn SizeDependent],
    ) -> Result<(), FrameError> {
        self.check("FrameScheduler::resize_buffers")?;
        if self.recording.is_some() {
            return Err(FrameError::AlreadyRecording);
        }
        let extent = Extent2d::new(width, height);
        log::info!("FrameScheduler: resizing to {}x{}", width, height);

        self.device.wait_idle()?;
        for slot in &mut self.slots {
            if slot.last_submission.is_some() {
                slot.state = SlotState::Complete;
            }
        }

        self.extent = extent;
        if !extent.is_empty() {
            self.surface.reconfigure(extent)?;
        }
        for target in targets.iter_mut() {
            target.resize(&mut self.graveyard, extent)?;
        }
        Ok(())
    }

    /// Drains everything and releases the subsystems. Further calls are no-ops; every
    /// other operation fails with [`FrameError::ShutDown`].
    ///
    /// Objects owned by callers (e.g. a culler) should be retired through
    /// [`Self::graveyard_mut`] beforehand so they are flushed too.
    pub fn shutdown(&mut self) -> Result<(), FrameError> {
        self.affinity.check("FrameScheduler::shutdown");
        if self.shut_down {
            return Ok(());
        }
        if self.recording.take().is_some() {
            log::warn!("FrameScheduler: shutting down with a frame still recording; discarding it");
            self.surface.discard();
        }

        self.device.wait_idle()?;
        for slot in &mut self.slots {
            let transient = std::mem::take(&mut slot.transient_groups);
            self.graveyard.retire_all(transient);
            slot.state = SlotState::Idle;
        }
        self.staging.destroy(&mut self.graveyard);
        let entries = self.pipelines.teardown(&mut self.graveyard);
        let destroyed = self.graveyard.flush();
        self.shut_down = true;
        log::info!(
            "FrameScheduler: shut down after {} frames ({} pipelines, {} objects destroyed)",
            self.frame_number,
            entries,
            destroyed
        );
        Ok(())
    }

    /// Frames submitted so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The slot being recorded.
    pub fn current_slot(&self) -> Option<usize> {
        self.recording.as_ref().map(|r| r.context.slot)
    }

    /// State of slot `index`, polling the device for a pending submission.
    pub fn slot_state(&self, index: usize) -> SlotState {
        let slot = &self.slots[index % self.slots.len()];
        match (slot.state, slot.last_submission) {
            (SlotState::Submitted, Some(submission)) if self.device.is_submission_complete(submission) => {
                SlotState::Complete
            }
            (state, _) => state,
        }
    }

    /// Number of frame slots.
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Current presentation size.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// The device.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The pipeline cache, shareable with other threads.
    pub fn pipelines(&self) -> &Arc<PipelineStateCache> {
        &self.pipelines
    }

    /// The graveyard, for retiring from the render thread.
    pub fn graveyard_mut(&mut self) -> &mut ResourceGraveyard {
        &mut self.graveyard
    }

    /// A sender for retiring from other threads.
    pub fn retire_sender(&self) -> RetireSender {
        self.graveyard.sender()
    }

    /// The staging allocator.
    pub fn staging(&self) -> &StagingAllocator {
        &self.staging
    }

    /// Debug submissions.
    pub fn debug_draw(&self) -> &DebugDraw {
        &self.debug_draw
    }

    /// Debug submissions of the frame being recorded.
    pub fn debug_draw_mut(&mut self) -> &mut DebugDraw {
        &mut self.debug_draw
    }

    /// Pass batching of the frame being recorded.
    pub fn passes_mut(&mut self) -> &mut PassTracker {
        &mut self.passes
    }

    /// Moves render-thread ownership to the calling thread.
    pub fn rebind_to_current_thread(&mut self) {
        self.affinity.rebind_to_current();
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        if !self.shut_down {
            if let Err(e) = self.shutdown() {
                log::error!("FrameScheduler: shutdown on drop failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::{BufferDescriptor, BufferUsage, TextureFormat};
    use crate::renderer::headless::{HeadlessDevice, HeadlessSurface};

    fn scheduler(frames: usize) -> (HeadlessDevice, FrameScheduler) {
        let device = HeadlessDevice::new();
        let surface = HeadlessSurface::new(&device, Extent2d::new(64, 64), TextureFormat::Bgra8UnormSrgb);
        let config = RendererConfig {
            frames_in_flight: frames,
            ..RendererConfig::default()
        };
        let scheduler = FrameScheduler::new(Arc::new(device.clone()), Box::new(surface), config).unwrap();
        (device, scheduler)
    }

    fn ready(status: FrameStatus) -> FrameContext {
        match status {
            FrameStatus::Ready(context) => context,
            FrameStatus::Skipped(reason) => panic!("frame skipped: {reason:?}"),
        }
    }

    #[test]
    fn slots_rotate_and_frames_count() {
        let (_device, mut scheduler) = scheduler(3);
        for expected in [0, 1, 2, 0, 1] {
            let context = ready(scheduler.begin_frame().unwrap());
            assert_eq!(context.slot, expected);
            assert_eq!(scheduler.current_slot(), Some(expected));
            assert_eq!(scheduler.end_frame().unwrap(), PresentStatus::Presented);
        }
        assert_eq!(scheduler.frame_number(), 5);
        assert_eq!(scheduler.slot_state(1), SlotState::Complete);
    }

    #[test]
    fn busy_slot_times_out() {
        let (device, mut scheduler) = scheduler(1);
        device.set_auto_complete(false);
        ready(scheduler.begin_frame().unwrap());
        scheduler.end_frame().unwrap();
        assert_eq!(scheduler.slot_state(0), SlotState::Submitted);

        assert!(matches!(
            scheduler.begin_frame(),
            Err(FrameError::SlotTimeout { slot: 0, .. })
        ));
        device.complete_all();
        ready(scheduler.begin_frame().unwrap());
    }

    #[test]
    fn misuse_is_reported() {
        let (_device, mut scheduler) = scheduler(2);
        assert!(matches!(scheduler.end_frame(), Err(FrameError::NotRecording)));
        assert!(matches!(scheduler.encoder(), Err(FrameError::NotRecording)));
        ready(scheduler.begin_frame().unwrap());
        assert!(matches!(scheduler.begin_frame(), Err(FrameError::AlreadyRecording)));
        assert!(matches!(
            scheduler.resize_buffers(8, 8, &mut []),
            Err(FrameError::AlreadyRecording)
        ));
    }

    #[test]
    fn minimised_window_skips_frames() {
        let (_device, mut scheduler) = scheduler(2);
        scheduler.resize_buffers(0, 0, &mut []).unwrap();
        assert_eq!(
            scheduler.begin_frame().unwrap(),
            FrameStatus::Skipped(SkipReason::Minimized)
        );
        scheduler.resize_buffers(32, 16, &mut []).unwrap();
        let context = ready(scheduler.begin_frame().unwrap());
        assert_eq!(context.extent, Extent2d::new(32, 16));
    }

    #[derive(Default)]
    struct ExtentLog(Vec<Extent2d>);

    impl SizeDependent for ExtentLog {
        fn resize(&mut self, _graveyard: &mut ResourceGraveyard, extent: Extent2d) -> Result<(), ResourceError> {
            self.0.push(extent);
            Ok(())
        }
    }

    #[test]
    fn zero_extent_still_reaches_the_targets() {
        let (_device, mut scheduler) = scheduler(2);
        let mut target = ExtentLog::default();

        scheduler.resize_buffers(0, 0, &mut [&mut target as &mut dyn SizeDependent]).unwrap();
        scheduler.resize_buffers(16, 8, &mut [&mut target as &mut dyn SizeDependent]).unwrap();

        assert_eq!(target.0, [Extent2d::new(0, 0), Extent2d::new(16, 8)]);
    }

    #[test]
    fn misaligned_upload_is_rejected_before_staging() {
        let (device, mut scheduler) = scheduler(2);
        let destination = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 16,
                usage: BufferUsage::COPY_DST,
            })
            .unwrap();
        ready(scheduler.begin_frame().unwrap());

        let odd_length = scheduler.upload_to_buffer(destination, 0, &[1, 2, 3]);
        let odd_offset = scheduler.upload_to_buffer(destination, 2, &[0; 4]);

        assert!(matches!(
            odd_length,
            Err(FrameError::Resource(ResourceError::Misaligned { len: 3, .. }))
        ));
        assert!(matches!(
            odd_offset,
            Err(FrameError::Resource(ResourceError::Misaligned { offset: 2, .. }))
        ));
        assert!(scheduler.staging().bound_chunks().is_empty());
        scheduler.end_frame().unwrap();
        device.destroy_buffer(destination).unwrap();
    }

    #[test]
    fn upload_goes_through_staging_in_command_order() {
        let (device, mut scheduler) = scheduler(2);
        let destination = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 8,
                usage: BufferUsage::COPY_DST | BufferUsage::UNIFORM,
            })
            .unwrap();
        ready(scheduler.begin_frame().unwrap());
        scheduler
            .upload_to_buffer(destination, 4, &[1, 2, 3, 4])
            .unwrap();
        assert_eq!(scheduler.staging().bound_chunks().len(), 1);
        scheduler.end_frame().unwrap();

        assert_eq!(device.buffer_contents(destination).unwrap(), [0, 0, 0, 0, 1, 2, 3, 4]);
        device.destroy_buffer(destination).unwrap();
    }

    #[test]
    fn shutdown_is_terminal_and_idempotent() {
        let (device, mut scheduler) = scheduler(3);
        let destination = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 4,
                usage: BufferUsage::COPY_DST,
            })
            .unwrap();
        ready(scheduler.begin_frame().unwrap());
        scheduler.upload_to_buffer(destination, 0, &[0; 4]).unwrap();
        scheduler.end_frame().unwrap();
        scheduler.graveyard_mut().retire(destination);

        scheduler.shutdown().unwrap();
        scheduler.shutdown().unwrap();
        assert!(matches!(scheduler.begin_frame(), Err(FrameError::ShutDown)));
        assert_eq!(device.live_resource_count(), 0);
        assert!(device.violations().is_empty());
    }
}
