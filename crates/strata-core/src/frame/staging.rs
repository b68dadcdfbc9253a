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

//! Per-frame transient upload memory.
//!
//! Upload data is written into chunks tagged with the frame slot that consumes it.
//! A chunk goes back to the free list only through [`StagingAllocator::frame_completed`],
//! which the scheduler calls once that slot's GPU work is known to be finished.

use crate::config::StagingConfig;
use crate::frame::graveyard::ResourceGraveyard;
use crate::renderer::api::{BufferDescriptor, BufferId, BufferUsage, COPY_BUFFER_ALIGNMENT};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;

/// An error raised by the [`StagingAllocator`].
#[derive(Debug, Error)]
pub enum StagingError {
    /// Zero-byte allocations are meaningless.
    #[error("staging allocation of zero bytes")]
    ZeroSize,
    /// Creating or writing a chunk failed.
    #[error("staging chunk error: {0}")]
    Resource(#[from] ResourceError),
}

/// A writable range inside a staging chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingSlice {
    /// The chunk buffer.
    pub buffer: BufferId,
    /// Byte offset of the range.
    pub offset: u64,
    /// Aligned size of the range.
    pub size: u64,
}

/// One transient upload buffer.
#[derive(Debug, Clone)]
pub struct StagingChunk {
    buffer: BufferId,
    capacity: u64,
    cursor: u64,
    frame: Option<usize>,
}

impl StagingChunk {
    /// Bytes still available.
    pub fn remaining(&self) -> u64 {
        self.capacity - self.cursor
    }

    /// Total size of the chunk.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Frame slot owning the chunk, `None` while free.
    pub fn frame(&self) -> Option<usize> {
        self.frame
    }

    fn carve(&mut self, size: u64) -> StagingSlice {
        let offset = self.cursor;
        self.cursor += size;
        StagingSlice {
            buffer: self.buffer,
            offset,
            size,
        }
    }
}

/// Rounds `value` up to the next multiple of `alignment` (a power of two).
pub fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// A ring of transient upload chunks.
#[derive(Debug)]
pub struct StagingAllocator {
    device: Arc<dyn GraphicsDevice>,
    chunk_size: u64,
    alignment: u64,
    bound: Vec<StagingChunk>,
    free: Vec<StagingChunk>,
}

impl StagingAllocator {
    /// Creates an allocator; no chunk is allocated until the first request.
    ///
    /// The alignment never drops below [`COPY_BUFFER_ALIGNMENT`].
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &StagingConfig) -> Self {
        Self {
            device,
            chunk_size: config.chunk_size,
            alignment: config.alignment.max(COPY_BUFFER_ALIGNMENT),
            bound: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Reserves `size` bytes (rounded up to the alignment) for `frame`.
    ///
    /// The most recently used chunk is reused if it belongs to the same frame and
    /// has room; otherwise the first free chunk large enough is re-tagged; otherwise
    /// a new chunk of `max(size, chunk_size)` bytes is created.
    pub fn get_writable(&mut self, size: u64, frame: usize) -> Result<StagingSlice, StagingError> {
        if size == 0 {
            return Err(StagingError::ZeroSize);
        }
        let aligned = align_up(size, self.alignment);

        if let Some(last) = self.bound.last_mut() {
            if last.frame == Some(frame) && last.remaining() >= aligned {
                return Ok(last.carve(aligned));
            }
        }

        if let Some(index) = self.free.iter().position(|c| c.capacity >= aligned) {
            let mut chunk = self.free.swap_remove(index);
            chunk.frame = Some(frame);
            let slice = chunk.carve(aligned);
            self.bound.push(chunk);
            return Ok(slice);
        }

        let capacity = align_up(aligned.max(self.chunk_size), self.alignment);
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("Staging Chunk")),
            size: capacity,
            usage: BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
        })?;
        log::debug!(
            "StagingAllocator: new chunk {:?} of {} bytes for frame {}",
            buffer,
            capacity,
            frame
        );
        let mut chunk = StagingChunk {
            buffer,
            capacity,
            cursor: 0,
            frame: Some(frame),
        };
        let slice = chunk.carve(aligned);
        self.bound.push(chunk);
        Ok(slice)
    }

    /// Reserves room for `data` and copies it into the chunk.
    ///
    /// Data whose length is not copy aligned is zero-padded inside the slice.
    pub fn write(&mut self, data: &[u8], frame: usize) -> Result<StagingSlice, StagingError> {
        let slice = self.get_writable(data.len() as u64, frame)?;
        let padded_len = align_up(data.len() as u64, COPY_BUFFER_ALIGNMENT) as usize;
        if padded_len == data.len() {
            self.device.write_buffer(slice.buffer, slice.offset, data)?;
        } else {
            let mut padded = Vec::with_capacity(padded_len);
            padded.extend_from_slice(data);
            padded.resize(padded_len, 0);
            self.device.write_buffer(slice.buffer, slice.offset, &padded)?;
        }
        Ok(slice)
    }

    /// Returns every chunk owned by `frame` to the free list.
    ///
    /// Only call this once `frame`'s GPU work has completed.
    pub fn frame_completed(&mut self, frame: usize) {
        let (done, still_bound): (Vec<_>, Vec<_>) = std::mem::take(&mut self.bound)
            .into_iter()
            .partition(|c| c.frame == Some(frame));
        self.bound = still_bound;
        for mut chunk in done {
            chunk.cursor = 0;
            chunk.frame = None;
            self.free.push(chunk);
        }
    }

    /// Chunks currently owned by a frame.
    pub fn bound_chunks(&self) -> &[StagingChunk] {
        &self.bound
    }

    /// Chunks available for reuse.
    pub fn free_chunks(&self) -> &[StagingChunk] {
        &self.free
    }

    /// Hands every chunk to the graveyard.
    pub fn destroy(&mut self, graveyard: &mut ResourceGraveyard) {
        let chunks = self.bound.drain(..).chain(self.free.drain(..));
        graveyard.retire_all(chunks.map(|c| c.buffer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::headless::HeadlessDevice;

    fn allocator(chunk_size: u64) -> (HeadlessDevice, StagingAllocator) {
        let device = HeadlessDevice::new();
        let staging = StagingAllocator::new(
            Arc::new(device.clone()),
            &StagingConfig {
                chunk_size,
                alignment: 256,
            },
        );
        (device, staging)
    }

    #[test]
    fn same_frame_ranges_never_overlap() {
        let (_device, mut staging) = allocator(4096);
        let sizes = [1, 255, 256, 700, 1024, 3000, 17, 4096, 5000];
        let mut slices = Vec::new();
        for size in sizes {
            slices.push(staging.get_writable(size, 0).unwrap());
        }

        for (i, a) in slices.iter().enumerate() {
            assert_eq!(a.offset % 256, 0);
            for b in slices.iter().skip(i + 1) {
                if a.buffer == b.buffer {
                    let disjoint = a.offset + a.size <= b.offset || b.offset + b.size <= a.offset;
                    assert!(disjoint, "{a:?} overlaps {b:?}");
                }
            }
        }
        for chunk in staging.bound_chunks() {
            let used: u64 = slices
                .iter()
                .filter(|s| s.buffer == chunk.buffer)
                .map(|s| s.size)
                .sum();
            assert!(used <= chunk.capacity());
        }
    }

    #[test]
    fn oversized_request_gets_its_own_chunk() {
        let (_device, mut staging) = allocator(1024);
        let slice = staging.get_writable(3000, 0).unwrap();
        assert_eq!(slice.offset, 0);
        assert_eq!(slice.size, 3072);
        assert_eq!(staging.bound_chunks()[0].capacity(), 3072);
    }

    #[test]
    fn other_frames_do_not_share_chunks() {
        let (_device, mut staging) = allocator(4096);
        let a = staging.get_writable(256, 0).unwrap();
        let b = staging.get_writable(256, 1).unwrap();
        assert_ne!(a.buffer, b.buffer);
    }

    #[test]
    fn completed_frames_recycle_their_chunks() {
        let (device, mut staging) = allocator(4096);
        let first = staging.get_writable(512, 0).unwrap();
        staging.get_writable(512, 1).unwrap();

        staging.frame_completed(0);
        assert_eq!(staging.free_chunks().len(), 1);
        assert_eq!(staging.bound_chunks().len(), 1);

        let reused = staging.get_writable(1024, 2).unwrap();
        assert_eq!(reused.buffer, first.buffer);
        assert_eq!(reused.offset, 0);
        assert_eq!(device.live_resource_count(), 2);
    }

    #[test]
    fn free_chunk_too_small_is_skipped() {
        let (_device, mut staging) = allocator(1024);
        let small = staging.get_writable(256, 0).unwrap();
        staging.frame_completed(0);
        let big = staging.get_writable(2048, 1).unwrap();
        assert_ne!(small.buffer, big.buffer);
        assert_eq!(staging.free_chunks().len(), 1);
    }

    #[test]
    fn idle_frame_completion_is_silent() {
        let (_device, mut staging) = allocator(1024);
        staging.frame_completed(2);
        assert!(staging.free_chunks().is_empty());
    }

    #[test]
    fn write_copies_into_the_chunk() {
        let (device, mut staging) = allocator(1024);
        staging.get_writable(256, 0).unwrap();
        let slice = staging.write(&[9, 8, 7, 6], 0).unwrap();
        assert_eq!(slice.offset, 256);
        let contents = device.buffer_contents(slice.buffer).unwrap();
        assert_eq!(&contents[256..260], &[9, 8, 7, 6]);
    }

    #[test]
    fn odd_sized_write_is_padded_to_the_copy_alignment() {
        let (device, mut staging) = allocator(1024);

        let odd = staging.write(&[9, 8, 7], 0).unwrap();
        let next = staging.write(&[1; 5], 0).unwrap();

        let contents = device.buffer_contents(odd.buffer).unwrap();
        assert_eq!(&contents[0..4], &[9, 8, 7, 0]);
        assert_eq!(next.offset, 256);
        assert_eq!(&contents[256..264], &[1, 1, 1, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn alignment_below_the_copy_alignment_is_raised() {
        let device = HeadlessDevice::new();
        let mut staging = StagingAllocator::new(
            Arc::new(device.clone()),
            &StagingConfig {
                chunk_size: 64,
                alignment: 1,
            },
        );

        let first = staging.write(&[3; 3], 0).unwrap();
        let second = staging.write(&[4; 2], 0).unwrap();

        assert_eq!(first.size, 4);
        assert_eq!(second.offset, 4);
        let contents = device.buffer_contents(second.buffer).unwrap();
        assert_eq!(&contents[0..8], &[3, 3, 3, 0, 4, 4, 0, 0]);
    }

    #[test]
    fn zero_sized_request_is_rejected() {
        let (_device, mut staging) = allocator(1024);
        assert!(matches!(
            staging.get_writable(0, 0),
            Err(StagingError::ZeroSize)
        ));
    }

    #[test]
    fn alignment_rounds_up() {
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }
}
