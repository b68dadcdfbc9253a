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


use std::sync::Arc;
use std::thread;

use strata_core::config::RendererConfig;
use strata_core::frame::{FrameContext, FrameError, FrameScheduler, FrameStatus, PresentStatus, SkipReason};
use strata_core::renderer::api::{BufferDescriptor, BufferId, BufferUsage, Extent2d, TextureFormat};
use strata_core::renderer::headless::{DeviceEvent, HeadlessDevice, HeadlessSurface, ObjectKind};
use strata_core::renderer::{GraphicsDevice, SurfaceError};

fn scheduler_with(surface: impl FnOnce(&mut HeadlessSurface), frames: usize) -> (HeadlessDevice, FrameScheduler) {
    let device = HeadlessDevice::new();
    let mut headless = HeadlessSurface::new(&device, Extent2d::new(64, 64), TextureFormat::Bgra8UnormSrgb);
    surface(&mut headless);
    let config = RendererConfig {
        frames_in_flight: frames,
        slot_wait_timeout_ms: 10,
        ..RendererConfig::default()
    };
    let scheduler = FrameScheduler::new(Arc::new(device.clone()), Box::new(headless), config).unwrap();
    (device, scheduler)
}

fn ready(status: FrameStatus) -> FrameContext {
    match status {
        FrameStatus::Ready(context) => context,
        FrameStatus::Skipped(reason) => panic!("frame skipped: {reason:?}"),
    }
}

fn buffer(device: &HeadlessDevice) -> BufferId {
    device
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 16,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })
        .unwrap()
}

fn position(events: &[DeviceEvent], wanted: &DeviceEvent) -> usize {
    events
        .iter()
        .position(|event| event == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} never happened"))
}

#[test]
fn retired_buffer_outlives_every_submission_that_can_use_it() {
    // ARRANGE
    let (device, mut scheduler) = scheduler_with(|_| {}, 2);
    device.set_auto_complete(false);

    // ACT
    ready(scheduler.begin_frame().unwrap());
    let retired = buffer(&device);
    scheduler.upload_to_buffer(retired, 0, &[7; 16]).unwrap();
    scheduler.graveyard_mut().retire(retired);
    scheduler.end_frame().unwrap();
    let first = device.last_submission();

    // Slot 1 has never been used: no wait.
    ready(scheduler.begin_frame().unwrap());
    scheduler.end_frame().unwrap();
    let second = device.last_submission();

    device.complete_through(first);
    ready(scheduler.begin_frame().unwrap());
    scheduler.end_frame().unwrap();

    // ASSERT
    assert!(device.is_live(retired.0), "destroyed before its slot came around");

    // Slot 1 is still busy: the frame cannot start and nothing is destroyed.
    assert!(matches!(
        scheduler.begin_frame(),
        Err(FrameError::SlotTimeout { slot: 1, .. })
    ));
    assert!(device.is_live(retired.0));

    device.complete_through(second);
    ready(scheduler.begin_frame().unwrap());
    assert!(!device.is_live(retired.0));

    let events = device.events();
    let observed = position(&events, &DeviceEvent::CompletionObserved(second));
    let destroyed = position(
        &events,
        &DeviceEvent::Destroyed {
            kind: ObjectKind::Buffer,
            id: retired.0,
        },
    );
    assert!(observed < destroyed);
    assert!(device.violations().is_empty());

    scheduler.end_frame().unwrap();
    device.complete_all();
    scheduler.shutdown().unwrap();
}

#[test]
fn retirements_from_worker_threads_join_the_render_thread_bins() {
    // ARRANGE
    let (device, mut scheduler) = scheduler_with(|_| {}, 3);
    let sender = scheduler.retire_sender();
    let buffers: Vec<BufferId> = (0..4).map(|_| buffer(&device)).collect();

    // ACT
    ready(scheduler.begin_frame().unwrap());
    let worker = {
        let buffers = buffers.clone();
        thread::spawn(move || buffers.into_iter().all(|b| sender.retire(b)))
    };
    assert!(worker.join().unwrap());
    scheduler.end_frame().unwrap();

    // ASSERT
    let mut rounds = 0;
    while buffers.iter().any(|b| device.is_live(b.0)) {
        ready(scheduler.begin_frame().unwrap());
        scheduler.end_frame().unwrap();
        rounds += 1;
        assert!(rounds <= 4, "worker retirements were never destroyed");
    }
    // Collected into slot 1 at its next begin, destroyed when slot 1 comes around again.
    assert_eq!(rounds, 4);
    assert!(device.violations().is_empty());
    scheduler.shutdown().unwrap();
}

#[test]
fn refused_acquire_skips_without_consuming_a_slot() {
    // ARRANGE
    let (device, mut scheduler) = scheduler_with(|s| s.fail_next_acquire(SurfaceError::Outdated), 2);

    // ACT
    let skipped = scheduler.begin_frame().unwrap();
    let context = ready(scheduler.begin_frame().unwrap());

    // ASSERT
    assert_eq!(skipped, FrameStatus::Skipped(SkipReason::Outdated));
    assert_eq!(context.slot, 0);
    assert_eq!(context.frame_number, 0);
    assert_eq!(device.stats().submissions, 0);
    scheduler.end_frame().unwrap();
    scheduler.shutdown().unwrap();
}

#[test]
fn refused_present_still_counts_the_frame() {
    // ARRANGE
    let (device, mut scheduler) = scheduler_with(|s| s.fail_next_present(SurfaceError::Lost), 2);

    // ACT
    ready(scheduler.begin_frame().unwrap());
    let first = scheduler.end_frame().unwrap();
    let context = ready(scheduler.begin_frame().unwrap());
    let second = scheduler.end_frame().unwrap();

    // ASSERT
    assert_eq!(first, PresentStatus::Skipped(SkipReason::Lost));
    assert_eq!(second, PresentStatus::Presented);
    assert_eq!(context.slot, 1);
    assert_eq!(scheduler.frame_number(), 2);
    assert_eq!(device.stats().submissions, 2);
    scheduler.shutdown().unwrap();
}

#[test]
fn shutdown_leaves_no_device_objects_behind() {
    // ARRANGE
    let (device, mut scheduler) = scheduler_with(|_| {}, 3);
    let owned = buffer(&device);

    // ACT
    for _ in 0..5 {
        ready(scheduler.begin_frame().unwrap());
        scheduler.upload_to_buffer(owned, 0, &[1; 16]).unwrap();
        scheduler.end_frame().unwrap();
    }
    scheduler.graveyard_mut().retire(owned);
    scheduler.shutdown().unwrap();

    // ASSERT
    assert_eq!(device.live_resource_count(), 0);
    assert!(device.violations().is_empty());
}
