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

//! Physical chunks of the partitioned arena.

use tessera_core::NodeRef;

/// Which index of the partitioner currently owns a chunk.
///
/// The wrapped [`NodeRef`] is the chunk's node in that index, so the chunk
/// can be detached from it in constant time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLocation {
    /// Not indexed anywhere. Only transient during reservation.
    Unowned,
    /// Indexed by size in the free tree.
    Free(NodeRef),
    /// Indexed by recency in the used list.
    Used(NodeRef),
    /// Pinned in the locked list, exempt from reclamation.
    Locked(NodeRef),
}

/// A contiguous byte range of the arena.
///
/// Chunks form a physical chain ordered by address, and every byte of the
/// arena belongs to exactly one chunk.
#[derive(Debug)]
pub struct MemoryChunk<O> {
    pub(crate) start: usize,
    pub(crate) n_bytes: usize,
    /// 0 for free chunks, `u64::MAX` for locked ones.
    pub(crate) update: u64,
    pub(crate) id: Option<String>,
    pub(crate) obj: Option<O>,
    pub(crate) n_locks: u32,
    pub(crate) location: ChunkLocation,
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

impl<O> MemoryChunk<O> {
    pub(crate) fn new(start: usize, n_bytes: usize) -> Self {
        Self {
            start,
            n_bytes,
            update: 0,
            id: None,
            obj: None,
            n_locks: 0,
            location: ChunkLocation::Unowned,
            prev: None,
            next: None,
        }
    }

    pub(crate) fn set(&mut self, start: usize, n_bytes: usize, update: u64) {
        self.start = start;
        self.n_bytes = n_bytes;
        self.update = update;
    }

    /// First byte of the chunk, the offset for buffer sub-uploads.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Size of the chunk in bytes.
    pub fn n_bytes(&self) -> usize {
        self.n_bytes
    }

    /// The byte following the last byte of the chunk.
    pub fn end(&self) -> usize {
        self.start + self.n_bytes
    }

    /// The recency stamp of the chunk.
    pub fn update(&self) -> u64 {
        self.update
    }

    /// The id the chunk is reserved under, `None` for free chunks.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The payload bound to the chunk.
    pub fn obj(&self) -> Option<&O> {
        self.obj.as_ref()
    }

    /// Number of outstanding locks.
    pub fn lock_count(&self) -> u32 {
        self.n_locks
    }

    /// The index currently owning the chunk.
    pub fn location(&self) -> ChunkLocation {
        self.location
    }

    /// Returns `true` if the chunk is not reserved.
    pub fn is_free(&self) -> bool {
        matches!(self.location, ChunkLocation::Free(_))
    }

    /// Returns `true` if the chunk is pinned.
    pub fn is_locked(&self) -> bool {
        matches!(self.location, ChunkLocation::Locked(_))
    }
}
