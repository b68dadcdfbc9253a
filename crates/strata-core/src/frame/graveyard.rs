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

//! Deferred destruction of device objects, keyed by in-flight frame slot.
//!
//! A retired object is parked in the bin of the slot that begins next and is only
//! destroyed when that slot comes around again, after the scheduler has observed
//! the completion of the slot's previous submission. Destruction therefore lags
//! retirement by at least one full rotation of the frame slots.

use crate::renderer::api::GpuResource;
use crate::renderer::traits::GraphicsDevice;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;

/// A resource waiting for destruction, with the slot that was recording when it
/// was retired (`None` before the first frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetiredResource {
    /// The resource.
    pub resource: GpuResource,
    /// Slot active at retirement.
    pub retired_during: Option<usize>,
}

/// A cloneable handle for retiring resources from threads other than the
/// render thread. Requests are queued and picked up at the next frame begin.
#[derive(Debug, Clone)]
pub struct RetireSender {
    sender: Sender<GpuResource>,
}

impl RetireSender {
    /// Queues `resource` for deferred destruction.
    ///
    /// Returns `false` if the graveyard no longer exists; the resource then died
    /// with its device.
    pub fn retire(&self, resource: impl Into<GpuResource>) -> bool {
        let resource = resource.into();
        if self.sender.send(resource).is_err() {
            log::warn!(
                "ResourceGraveyard is gone; dropping retirement of {} {:?}",
                resource.kind(),
                resource
            );
            return false;
        }
        true
    }
}

/// Deferred-destruction bins, one per frame slot.
#[derive(Debug)]
pub struct ResourceGraveyard {
    device: Arc<dyn GraphicsDevice>,
    bins: Vec<Vec<RetiredResource>>,
    pending: Vec<RetiredResource>,
    sender: Sender<GpuResource>,
    receiver: Receiver<GpuResource>,
    current_slot: Option<usize>,
    destroyed: usize,
    failures: usize,
}

impl ResourceGraveyard {
    /// Creates one bin per frame slot.
    pub fn new(device: Arc<dyn GraphicsDevice>, frames_in_flight: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            device,
            bins: (0..frames_in_flight.max(1)).map(|_| Vec::new()).collect(),
            pending: Vec::new(),
            sender,
            receiver,
            current_slot: None,
            destroyed: 0,
            failures: 0,
        }
    }

    /// A handle for retiring from another thread.
    pub fn sender(&self) -> RetireSender {
        RetireSender {
            sender: self.sender.clone(),
        }
    }

    /// Retires `resource` from the render thread.
    pub fn retire(&mut self, resource: impl Into<GpuResource>) {
        let resource = resource.into();
        log::trace!("Retiring {} {:?}", resource.kind(), resource);
        self.pending.push(RetiredResource {
            resource,
            retired_during: self.current_slot,
        });
    }

    /// Retires every resource of `resources`.
    pub fn retire_all<I>(&mut self, resources: I)
    where
        I: IntoIterator,
        I::Item: Into<GpuResource>,
    {
        for resource in resources {
            self.retire(resource);
        }
    }

    /// Called once the completion of `slot`'s previous submission has been observed.
    ///
    /// Destroys what the bin collected one rotation ago, then moves every pending
    /// retirement (render-thread and queued) into the bin.
    pub fn begin_frame(&mut self, slot: usize) {
        let slot = slot % self.bins.len();
        let expired = std::mem::take(&mut self.bins[slot]);
        if !expired.is_empty() {
            log::debug!(
                "ResourceGraveyard: destroying {} resources from slot {}",
                expired.len(),
                slot
            );
        }
        for retired in expired {
            self.destroy(retired.resource);
        }

        let tag = self.current_slot;
        self.pending
            .extend(self.receiver.try_iter().map(|resource| RetiredResource {
                resource,
                retired_during: tag,
            }));
        self.bins[slot].append(&mut self.pending);
        self.current_slot = Some(slot);
    }

    /// Waits for the device to go idle, then destroys every pending and binned
    /// resource regardless of its slot. Calling it again is a no-op.
    ///
    /// Returns the number of resources destroyed by this call.
    pub fn flush(&mut self) -> usize {
        if self.outstanding() == 0 {
            return 0;
        }
        if let Err(e) = self.device.wait_idle() {
            log::error!("ResourceGraveyard: wait_idle failed during flush: {e}");
        }
        let mut doomed: Vec<GpuResource> = self.pending.drain(..).map(|r| r.resource).collect();
        doomed.extend(self.receiver.try_iter());
        for bin in &mut self.bins {
            doomed.extend(bin.drain(..).map(|r| r.resource));
        }
        let count = doomed.len();
        for resource in doomed {
            self.destroy(resource);
        }
        log::info!("ResourceGraveyard: flushed {count} resources");
        count
    }

    /// Retired resources not yet destroyed, including queued cross-thread retirements.
    pub fn outstanding(&self) -> usize {
        self.pending.len() + self.receiver.len() + self.bins.iter().map(Vec::len).sum::<usize>()
    }

    /// Contents of one slot's bin.
    pub fn bin(&self, slot: usize) -> &[RetiredResource] {
        &self.bins[slot % self.bins.len()]
    }

    /// Number of resources destroyed so far.
    pub fn destroyed(&self) -> usize {
        self.destroyed
    }

    /// Number of destructions the device rejected.
    pub fn failures(&self) -> usize {
        self.failures
    }

    fn destroy(&mut self, resource: GpuResource) {
        match resource.destroy(self.device.as_ref()) {
            Ok(()) => self.destroyed += 1,
            Err(e) => {
                self.failures += 1;
                log::warn!(
                    "ResourceGraveyard: failed to destroy {} {:?}: {}",
                    resource.kind(),
                    resource,
                    e
                );
            }
        }
    }
}

impl Drop for ResourceGraveyard {
    fn drop(&mut self) {
        if self.outstanding() > 0 {
            log::warn!(
                "ResourceGraveyard dropped with {} outstanding resources; flushing",
                self.outstanding()
            );
            self.flush();
        }
    }
}
