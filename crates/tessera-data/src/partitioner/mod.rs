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

//! # Memory Partitioner
//!
//! Carves a fixed linear byte arena into named, physically adjacent chunks.
//!
//! Free chunks are indexed by size in an [`AvlTree`], reserved chunks by
//! recency in an [`OrderedList`], and pinned chunks in a FIFO list. A
//! reservation picks, in order of preference:
//!
//! 1. the smallest free chunk large enough to hold the request;
//! 2. the least recently used chunk, if it is large enough on its own;
//! 3. a window of adjacent chunks grown greedily from one of the least
//!    recently used chunks, absorbing the staler neighbour at each step. A
//!    bounded number of windows is tried and the one whose freshest chunk is
//!    the stalest wins.
//!
//! Leftover bytes become a free chunk, merged with its successor when that
//! one is free too, so two free chunks are never adjacent.

mod chunk;
mod error;

pub use chunk::{ChunkLocation, MemoryChunk};
pub use error::{PartitionError, PartitionResult};

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use tessera_core::config::DEFAULT_RECLAIM_TRIALS;
use tessera_core::{
    AvlTree, MemorySettings, OrderedList, ResidencyMonitor, ResidencyReport, SettingsError,
};

/// Callback receiving the id and bound payload of every reclaimed chunk.
pub type ReclaimCallback<O> = Box<dyn FnMut(String, Option<O>)>;

/// Recency stamp of locked chunks, fresher than any reserved chunk.
const LOCKED_UPDATE: u64 = u64::MAX;

#[derive(Debug, Clone, Copy)]
struct FreeEntry {
    n_bytes: usize,
    chunk: usize,
}

#[derive(Debug, Clone, Copy)]
struct UsedEntry {
    update: u64,
    chunk: usize,
}

/// Signed distance between two update stamps, clamped to the `i64` range.
fn update_distance(a: u64, b: u64) -> i64 {
    let distance = i64::try_from(a.abs_diff(b)).unwrap_or(i64::MAX);
    if a < b {
        -distance
    } else {
        distance
    }
}

/// A snapshot of the partitioner's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionStats {
    /// Size of the whole arena.
    pub arena_bytes: usize,
    /// Bytes held by free chunks.
    pub free_bytes: usize,
    /// Size of the largest free chunk.
    pub largest_free_chunk: usize,
    /// Number of free chunks.
    pub free_chunks: usize,
    /// Number of reserved, unlocked chunks.
    pub used_chunks: usize,
    /// Number of locked chunks.
    pub locked_chunks: usize,
}

impl PartitionStats {
    /// Percentage of the arena not held by reserved chunks.
    pub fn free_percentage(&self) -> f64 {
        if self.arena_bytes == 0 {
            0.0
        } else {
            100.0 * self.free_bytes as f64 / self.arena_bytes as f64
        }
    }
}

/// A partitioner of the byte range `[first_byte, first_byte + n_bytes)`.
///
/// # Type Parameters
///
/// * `O`: The payload a caller may bind to a reserved chunk, such as a
///   decoded batch descriptor.
pub struct MemoryPartitioner<O> {
    first_byte: usize,
    n_bytes: usize,
    update: u64,
    reclaim_trials: usize,
    chunks: Vec<MemoryChunk<O>>,
    free_slots: Vec<usize>,
    head: usize,
    chunks_by_id: HashMap<String, usize>,
    memory_chunks_free: AvlTree<FreeEntry>,
    memory_chunks_used: OrderedList<UsedEntry>,
    memory_chunks_locked: OrderedList<usize>,
    on_reclaimed: Option<ReclaimCallback<O>>,
    label: Cow<'static, str>,
}

impl<O> std::fmt::Debug for MemoryPartitioner<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPartitioner")
            .field("label", &self.label)
            .field("first_byte", &self.first_byte)
            .field("n_bytes", &self.n_bytes)
            .field("update", &self.update)
            .field("resident", &self.chunks_by_id.len())
            .finish()
    }
}

impl<O> MemoryPartitioner<O> {
    /// Creates a partitioner managing `[starting_byte, ending_byte)` as a
    /// single free chunk.
    ///
    /// # Panics
    ///
    /// Panics if `ending_byte` is lower than `starting_byte`.
    pub fn new(starting_byte: usize, ending_byte: usize) -> Self {
        assert!(
            ending_byte >= starting_byte,
            "Arena ends ({ending_byte}) before it starts ({starting_byte})"
        );
        let n_bytes = ending_byte - starting_byte;

        let mut partitioner = Self {
            first_byte: starting_byte,
            n_bytes,
            update: 1,
            reclaim_trials: DEFAULT_RECLAIM_TRIALS,
            chunks: Vec::new(),
            free_slots: Vec::new(),
            head: 0,
            chunks_by_id: HashMap::new(),
            memory_chunks_free: AvlTree::new(|a: &FreeEntry, b: &FreeEntry| {
                a.n_bytes.cmp(&b.n_bytes)
            }),
            memory_chunks_used: OrderedList::new(|a: &UsedEntry, b: &UsedEntry| {
                update_distance(a.update, b.update)
            }),
            memory_chunks_locked: OrderedList::new(|_: &usize, _: &usize| 1),
            on_reclaimed: None,
            label: Cow::Borrowed("memory_partitioner"),
        };

        let head = partitioner.allocate_chunk(starting_byte, n_bytes);
        partitioner.head = head;
        if n_bytes > 0 {
            partitioner.index_free(head);
        }
        partitioner
    }

    /// Creates a partitioner sized by `settings`.
    ///
    /// The settings are validated first, so an empty arena or one whose end
    /// overflows `usize` is rejected.
    pub fn from_settings(settings: &MemorySettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self::new(settings.arena_first_byte, settings.arena_end_byte())
            .with_reclaim_trials(settings.reclaim_trials))
    }

    /// Sets how many reclamation windows a reservation tries before settling.
    pub fn with_reclaim_trials(mut self, reclaim_trials: usize) -> Self {
        self.reclaim_trials = reclaim_trials.max(1);
        self
    }

    /// Sets the identifier this partitioner reports to telemetry.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Registers the callback notified of chunks reclaimed from other ids.
    pub fn set_on_reclaimed(&mut self, callback: ReclaimCallback<O>) {
        self.on_reclaimed = Some(callback);
    }

    /// The first byte of the arena.
    pub fn first_byte(&self) -> usize {
        self.first_byte
    }

    /// The size of the arena.
    pub fn n_bytes(&self) -> usize {
        self.n_bytes
    }

    /// Reserves `n_bytes_required` bytes under `chunk_id`.
    ///
    /// Stale chunks of other ids may be reclaimed to make room. Locked
    /// chunks never are. If `chunk_id` is already resident, its chunk is
    /// released first.
    ///
    /// # Errors
    ///
    /// * [`PartitionError::ZeroSized`] if `n_bytes_required` is 0.
    /// * [`PartitionError::Exhausted`] if no selection of chunks can hold
    ///   the request without touching a locked chunk.
    pub fn reserve(
        &mut self,
        chunk_id: &str,
        n_bytes_required: usize,
    ) -> PartitionResult<&MemoryChunk<O>> {
        if n_bytes_required == 0 {
            return Err(PartitionError::ZeroSized);
        }
        if n_bytes_required > self.n_bytes {
            return Err(self.exhausted(n_bytes_required));
        }
        if self.chunks_by_id.contains_key(chunk_id) {
            log::warn!(
                "[MemoryPartitioner::reserve] Chunk is already reserved, releasing it first: {chunk_id}"
            );
            self.release(chunk_id);
        }

        let selected = self.select_chunks(n_bytes_required)?;

        // Detach every selected chunk from its index.
        let mut reclaimed = Vec::new();
        for &index in &selected {
            match self.chunks[index].location {
                ChunkLocation::Used(node) => {
                    self.memory_chunks_used.remove_by_ref(node);
                    let chunk = &mut self.chunks[index];
                    if let Some(id) = chunk.id.take() {
                        self.chunks_by_id.remove(&id);
                        reclaimed.push((id, chunk.obj.take()));
                    }
                }
                ChunkLocation::Free(node) => {
                    self.memory_chunks_free.remove_by_ref(node);
                }
                ChunkLocation::Locked(_) | ChunkLocation::Unowned => {
                    log::error!(
                        "[MemoryPartitioner::reserve] Selected a chunk that cannot be reclaimed at byte {}",
                        self.chunks[index].start
                    );
                }
            }
            self.chunks[index].location = ChunkLocation::Unowned;
        }

        let first = selected[0];
        let last = selected[selected.len() - 1];
        let start = self.chunks[first].start;
        let end = self.chunks[last].end();
        let after = self.chunks[last].next;

        // The first chunk keeps its physical predecessor.
        let update = self.update;
        {
            let chunk = &mut self.chunks[first];
            chunk.set(start, n_bytes_required, update);
            chunk.id = Some(chunk_id.to_owned());
            chunk.obj = None;
            chunk.n_locks = 0;
        }
        let node = self.memory_chunks_used.add(UsedEntry {
            update,
            chunk: first,
        });
        self.chunks[first].location = ChunkLocation::Used(node);
        self.chunks_by_id.insert(chunk_id.to_owned(), first);

        let n_available_bytes = end - start;
        if n_available_bytes == n_bytes_required {
            self.link(first, after);
            for &index in &selected[1..] {
                self.deallocate_chunk(index);
            }
        } else {
            let leftover_start = start + n_bytes_required;
            let leftover_bytes = n_available_bytes - n_bytes_required;
            let free = if selected.len() == 1 {
                self.allocate_chunk(leftover_start, leftover_bytes)
            } else {
                for &index in &selected[1..selected.len() - 1] {
                    self.deallocate_chunk(index);
                }
                self.chunks[last].set(leftover_start, leftover_bytes, 0);
                last
            };
            self.link(first, Some(free));
            self.link(free, after);

            if let Some(next) = after {
                if let ChunkLocation::Free(node) = self.chunks[next].location {
                    self.memory_chunks_free.remove_by_ref(node);
                    self.chunks[free].n_bytes += self.chunks[next].n_bytes;
                    let beyond = self.chunks[next].next;
                    self.link(free, beyond);
                    self.deallocate_chunk(next);
                }
            }
            self.index_free(free);
        }

        self.update += 1;

        if !reclaimed.is_empty() {
            log::debug!(
                "Reserving '{chunk_id}' ({n_bytes_required} bytes) reclaimed {:?}",
                reclaimed.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>()
            );
            if let Some(callback) = self.on_reclaimed.as_mut() {
                for (id, obj) in reclaimed {
                    callback(id, obj);
                }
            }
        }

        Ok(&self.chunks[first])
    }

    /// Marks the chunk of `chunk_id` as just used and returns its payload.
    ///
    /// Locked chunks keep their position.
    pub fn touch(&mut self, chunk_id: &str) -> Option<&O> {
        let index = *self.chunks_by_id.get(chunk_id)?;
        if self.chunks[index].n_locks == 0 {
            let update = self.update;
            self.update += 1;
            self.chunks[index].update = update;
            if let ChunkLocation::Used(node) = self.chunks[index].location {
                if let Some(entry) = self.memory_chunks_used.get_mut(node) {
                    entry.update = update;
                }
                self.memory_chunks_used.move_to_the_end(node);
            }
        }
        self.chunks[index].obj.as_ref()
    }

    /// The chunk reserved under `chunk_id`.
    pub fn get_chunk(&self, chunk_id: &str) -> Option<&MemoryChunk<O>> {
        self.chunks_by_id
            .get(chunk_id)
            .map(|&index| &self.chunks[index])
    }

    /// Returns `true` if a chunk is reserved under `chunk_id`.
    pub fn possess(&self, chunk_id: &str) -> bool {
        self.chunks_by_id.contains_key(chunk_id)
    }

    /// Number of locks on the chunk of `chunk_id`.
    pub fn lock_count(&self, chunk_id: &str) -> Option<u32> {
        self.get_chunk(chunk_id).map(|chunk| chunk.n_locks)
    }

    /// Pins the chunk of `chunk_id`, exempting it from reclamation, and
    /// returns its payload.
    pub fn add_lock(&mut self, chunk_id: &str) -> Option<&O> {
        let index = *self.chunks_by_id.get(chunk_id)?;
        if self.chunks[index].n_locks == 0 {
            match self.chunks[index].location {
                ChunkLocation::Used(node) => {
                    self.memory_chunks_used.remove_by_ref(node);
                }
                _ => log::warn!(
                    "[MemoryPartitioner::add_lock] Trying to lock an already locked chunk: {chunk_id}"
                ),
            }
            let node = self.memory_chunks_locked.add(index);
            let chunk = &mut self.chunks[index];
            chunk.location = ChunkLocation::Locked(node);
            chunk.update = LOCKED_UPDATE;
        }
        let chunk = &mut self.chunks[index];
        chunk.n_locks += 1;
        chunk.obj.as_ref()
    }

    /// Removes one lock from the chunk of `chunk_id`.
    ///
    /// Removing the last lock puts the chunk back in recency order as just used.
    pub fn remove_lock(&mut self, chunk_id: &str) {
        let Some(&index) = self.chunks_by_id.get(chunk_id) else {
            return;
        };
        if self.chunks[index].n_locks == 0 {
            log::warn!(
                "[MemoryPartitioner::remove_lock] Trying to unlock a non-locked chunk: {chunk_id}"
            );
            return;
        }
        self.chunks[index].n_locks -= 1;
        if self.chunks[index].n_locks == 0 {
            if let ChunkLocation::Locked(node) = self.chunks[index].location {
                self.memory_chunks_locked.remove_by_ref(node);
            }
            let update = self.update;
            self.update += 1;
            let node = self.memory_chunks_used.add(UsedEntry {
                update,
                chunk: index,
            });
            let chunk = &mut self.chunks[index];
            chunk.update = update;
            chunk.location = ChunkLocation::Used(node);
        }
    }

    /// Binds `obj` to the chunk of `chunk_id`.
    ///
    /// Returns `false`, dropping `obj`, if no chunk is reserved under that id.
    pub fn bind_object(&mut self, chunk_id: &str, obj: O) -> bool {
        match self.chunks_by_id.get(chunk_id) {
            Some(&index) => {
                self.chunks[index].obj = Some(obj);
                true
            }
            None => false,
        }
    }

    /// Frees the chunk of `chunk_id` regardless of its locks, merging it with
    /// free neighbours, and returns its payload.
    pub fn release(&mut self, chunk_id: &str) -> Option<O> {
        let index = self.chunks_by_id.remove(chunk_id)?;
        match self.chunks[index].location {
            ChunkLocation::Locked(node) => {
                self.memory_chunks_locked.remove_by_ref(node);
            }
            ChunkLocation::Used(node) => {
                self.memory_chunks_used.remove_by_ref(node);
            }
            ChunkLocation::Free(_) | ChunkLocation::Unowned => {
                log::warn!(
                    "[MemoryPartitioner::release] Reserved chunk is not indexed: {chunk_id}"
                );
            }
        }

        if let Some(prev) = self.chunks[index].prev {
            if let ChunkLocation::Free(node) = self.chunks[prev].location {
                self.memory_chunks_free.remove_by_ref(node);
                let (prev_start, prev_bytes, before) = {
                    let p = &self.chunks[prev];
                    (p.start, p.n_bytes, p.prev)
                };
                {
                    let chunk = &mut self.chunks[index];
                    chunk.start = prev_start;
                    chunk.n_bytes += prev_bytes;
                }
                match before {
                    Some(before) => self.link(before, Some(index)),
                    None => {
                        self.chunks[index].prev = None;
                        self.head = index;
                    }
                }
                self.deallocate_chunk(prev);
            }
        }

        if let Some(next) = self.chunks[index].next {
            if let ChunkLocation::Free(node) = self.chunks[next].location {
                self.memory_chunks_free.remove_by_ref(node);
                self.chunks[index].n_bytes += self.chunks[next].n_bytes;
                let beyond = self.chunks[next].next;
                self.link(index, beyond);
                self.deallocate_chunk(next);
            }
        }

        let obj = {
            let chunk = &mut self.chunks[index];
            chunk.n_locks = 0;
            chunk.update = 0;
            chunk.id = None;
            chunk.obj.take()
        };
        self.index_free(index);
        obj
    }

    /// Bytes held by free chunks.
    pub fn free_bytes(&self) -> usize {
        let mut free_bytes = 0;
        self.memory_chunks_free
            .for_each(|entry| free_bytes += entry.n_bytes);
        free_bytes
    }

    /// Number of free chunks.
    pub fn free_chunk_count(&self) -> usize {
        self.memory_chunks_free.get_count()
    }

    /// Number of reserved, unlocked chunks.
    pub fn used_chunk_count(&self) -> usize {
        self.memory_chunks_used.count()
    }

    /// Number of locked chunks.
    pub fn locked_chunk_count(&self) -> usize {
        self.memory_chunks_locked.count()
    }

    /// Iterates over every chunk in address order.
    pub fn chunks(&self) -> impl Iterator<Item = &MemoryChunk<O>> + '_ {
        let mut cursor = (self.n_bytes > 0).then_some(self.head);
        std::iter::from_fn(move || {
            let chunk = &self.chunks[cursor?];
            cursor = chunk.next;
            Some(chunk)
        })
    }

    /// Takes a snapshot of the partitioner's bookkeeping.
    pub fn stats(&self) -> PartitionStats {
        let mut largest_free_chunk = 0;
        self.memory_chunks_free
            .for_each(|entry| largest_free_chunk = largest_free_chunk.max(entry.n_bytes));
        PartitionStats {
            arena_bytes: self.n_bytes,
            free_bytes: self.free_bytes(),
            largest_free_chunk,
            free_chunks: self.free_chunk_count(),
            used_chunks: self.used_chunk_count(),
            locked_chunks: self.locked_chunk_count(),
        }
    }

    /// Dumps every free, used and locked chunk at `debug` level.
    pub fn log_state(&self) {
        let stats = self.stats();
        log::debug!(
            "***** Partitioner ({}) ***** {:.1}% free",
            self.label,
            stats.free_percentage()
        );
        log::debug!(" FREE CHUNKS");
        self.memory_chunks_free
            .for_each(|entry| self.log_chunk(entry.chunk));
        log::debug!(" USED CHUNKS");
        self.memory_chunks_used
            .for_each(|entry| self.log_chunk(entry.chunk));
        log::debug!(" LOCKED CHUNKS");
        self.memory_chunks_locked.for_each(|&index| self.log_chunk(index));
    }

    fn log_chunk(&self, index: usize) {
        let chunk = &self.chunks[index];
        log::debug!(
            "  [{}, {}) {} bytes, id={:?}, update={}, locks={}",
            chunk.start,
            chunk.end(),
            chunk.n_bytes,
            chunk.id,
            chunk.update,
            chunk.n_locks
        );
    }

    // --- Chunk selection ---

    fn select_chunks(&self, n_bytes_required: usize) -> PartitionResult<Vec<usize>> {
        let probe = FreeEntry {
            n_bytes: n_bytes_required,
            chunk: usize::MAX,
        };
        if let Some(entry) = self.memory_chunks_free.get_smallest_above(&probe) {
            return Ok(vec![entry.chunk]);
        }

        let Some(oldest) = self.memory_chunks_used.first() else {
            return Err(self.exhausted(n_bytes_required));
        };
        if let Some(entry) = self.memory_chunks_used.get(oldest) {
            if self.chunks[entry.chunk].n_bytes >= n_bytes_required {
                return Ok(vec![entry.chunk]);
            }
        }

        let mut best: Option<(u64, VecDeque<usize>)> = None;
        let mut trial = 0;
        let mut cursor = Some(oldest);
        while let Some(node) = cursor {
            if trial >= self.reclaim_trials && best.is_some() {
                break;
            }
            if let Some(entry) = self.memory_chunks_used.get(node) {
                if let Some((age, window)) = self.grow_window(entry.chunk, n_bytes_required) {
                    if best.as_ref().map_or(true, |(best_age, _)| age < *best_age) {
                        best = Some((age, window));
                    }
                }
            }
            cursor = self.memory_chunks_used.next_of(node);
            trial += 1;
        }

        match best {
            Some((_, window)) => Ok(window.into()),
            None => Err(self.exhausted(n_bytes_required)),
        }
    }

    /// Grows a window of adjacent chunks around `origin`, absorbing the
    /// staler neighbour at each step, until it holds `n_bytes_required`.
    ///
    /// Returns the freshest update stamp in the window along with the window
    /// in address order, or `None` if the window would touch a locked chunk
    /// or runs out of arena.
    fn grow_window(&self, origin: usize, n_bytes_required: usize) -> Option<(u64, VecDeque<usize>)> {
        let mut window = VecDeque::from([origin]);
        let mut n_bytes = self.chunks[origin].n_bytes;
        let mut age = self.chunks[origin].update;
        let mut prev = self.chunks[origin].prev;
        let mut next = self.chunks[origin].next;

        while n_bytes < n_bytes_required {
            let take_next = match (prev, next) {
                (None, None) => return None,
                (None, Some(_)) => true,
                (Some(_), None) => false,
                (Some(p), Some(n)) => self.chunks[n].update <= self.chunks[p].update,
            };
            let index = if take_next { next? } else { prev? };
            let chunk = &self.chunks[index];
            if chunk.is_locked() {
                return None;
            }
            age = age.max(chunk.update);
            n_bytes += chunk.n_bytes;
            if take_next {
                window.push_back(index);
                next = chunk.next;
            } else {
                window.push_front(index);
                prev = chunk.prev;
            }
        }
        Some((age, window))
    }

    // --- Arena plumbing ---

    fn exhausted(&self, requested: usize) -> PartitionError {
        PartitionError::Exhausted {
            requested,
            arena: self.n_bytes,
        }
    }

    fn index_free(&mut self, index: usize) {
        let node = self.memory_chunks_free.add(FreeEntry {
            n_bytes: self.chunks[index].n_bytes,
            chunk: index,
        });
        let chunk = &mut self.chunks[index];
        chunk.update = 0;
        chunk.location = ChunkLocation::Free(node);
    }

    /// Makes `index` and `next` physical neighbours.
    fn link(&mut self, index: usize, next: Option<usize>) {
        self.chunks[index].next = next;
        if let Some(next) = next {
            self.chunks[next].prev = Some(index);
        }
    }

    fn allocate_chunk(&mut self, start: usize, n_bytes: usize) -> usize {
        match self.free_slots.pop() {
            Some(index) => {
                self.chunks[index] = MemoryChunk::new(start, n_bytes);
                index
            }
            None => {
                self.chunks.push(MemoryChunk::new(start, n_bytes));
                self.chunks.len() - 1
            }
        }
    }

    fn deallocate_chunk(&mut self, index: usize) {
        let chunk = &mut self.chunks[index];
        chunk.location = ChunkLocation::Unowned;
        chunk.id = None;
        chunk.obj = None;
        chunk.prev = None;
        chunk.next = None;
        self.free_slots.push(index);
    }
}

impl<O> ResidencyMonitor for MemoryPartitioner<O> {
    fn monitor_id(&self) -> Cow<'static, str> {
        self.label.clone()
    }

    fn residency_report(&self) -> ResidencyReport {
        ResidencyReport {
            used_bytes: (self.n_bytes - self.free_bytes()) as u64,
            capacity_bytes: self.n_bytes as u64,
            resident_count: self.chunks_by_id.len(),
            pinned_count: self.memory_chunks_locked.count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn starts(partitioner: &MemoryPartitioner<u32>) -> Vec<(usize, usize, bool)> {
        partitioner
            .chunks()
            .map(|c| (c.start(), c.n_bytes(), c.is_free()))
            .collect()
    }

    #[test]
    fn test_new_arena_is_one_free_chunk() {
        let partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(64, 1064);
        assert_eq!(partitioner.n_bytes(), 1000);
        assert_eq!(partitioner.free_bytes(), 1000);
        assert_eq!(partitioner.free_chunk_count(), 1);
        assert_eq!(starts(&partitioner), vec![(64, 1000, true)]);
    }

    #[test]
    fn test_freed_region_is_reused_before_the_tail() {
        // --- 1. SETUP ---
        let mut partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(0, 1000);

        // --- 2. ACTION ---
        let a = partitioner.reserve("a", 100).unwrap().start();
        let b = partitioner.reserve("b", 200).unwrap().start();
        partitioner.release("a");
        let c = partitioner.reserve("c", 50).unwrap().start();

        // --- 3. ASSERTIONS ---
        assert_eq!(a, 0);
        assert_eq!(b, 100);
        assert_eq!(c, 0, "The freed region must be reused, not the tail");
        assert_eq!(
            starts(&partitioner),
            vec![(0, 50, false), (50, 50, true), (100, 200, false), (300, 700, true)]
        );
    }

    #[test]
    fn test_release_merges_free_neighbours() {
        let mut partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(0, 300);
        partitioner.reserve("a", 100).unwrap();
        partitioner.reserve("b", 100).unwrap();
        partitioner.reserve("c", 100).unwrap();

        partitioner.release("a");
        partitioner.release("c");
        assert_eq!(partitioner.free_chunk_count(), 2);

        partitioner.release("b");
        assert_eq!(partitioner.free_chunk_count(), 1);
        assert_eq!(starts(&partitioner), vec![(0, 300, true)]);
        assert!(!partitioner.possess("b"));
    }

    #[test]
    fn test_oldest_used_chunk_is_reclaimed_alone() {
        let mut partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(0, 200);
        partitioner.reserve("a", 100).unwrap();
        partitioner.reserve("b", 100).unwrap();
        partitioner.touch("a");

        let chunk = partitioner.reserve("c", 60).unwrap();
        assert_eq!(chunk.start(), 100, "'b' is the least recently used chunk");
        assert!(partitioner.possess("a"));
        assert!(!partitioner.possess("b"));
        assert_eq!(
            starts(&partitioner),
            vec![(0, 100, false), (100, 60, false), (160, 40, true)]
        );
    }

    #[test]
    fn test_window_spares_recently_touched_chunks() {
        // --- 1. SETUP ---
        let mut partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(0, 300);
        let reclaimed = Rc::new(RefCell::new(Vec::new()));
        let sink = reclaimed.clone();
        partitioner.set_on_reclaimed(Box::new(move |id: String, obj: Option<u32>| {
            sink.borrow_mut().push((id, obj))
        }));
        for id in ["a", "b", "c"] {
            partitioner.reserve(id, 100).unwrap();
        }
        partitioner.bind_object("b", 2);
        partitioner.touch("a");

        // --- 2. ACTION ---
        let chunk = partitioner.reserve("d", 150).unwrap();

        // --- 3. ASSERTIONS ---
        assert_eq!(chunk.start(), 100);
        assert_eq!(chunk.n_bytes(), 150);
        assert!(partitioner.possess("a"), "The freshest chunk must survive");
        assert_eq!(
            *reclaimed.borrow(),
            vec![("b".to_owned(), Some(2)), ("c".to_owned(), None)]
        );
        assert_eq!(
            starts(&partitioner),
            vec![(0, 100, false), (100, 150, false), (250, 50, true)]
        );
    }

    #[test]
    fn test_trials_continue_past_the_bound_until_a_window_fits() {
        // --- 1. SETUP ---
        let mut partitioner: MemoryPartitioner<u32> =
            MemoryPartitioner::new(0, 400).with_reclaim_trials(1);
        for id in ["a", "b", "c", "d"] {
            partitioner.reserve(id, 100).unwrap();
        }
        // The window grown from 'a', the oldest chunk, runs into 'b'.
        partitioner.add_lock("b");

        // --- 2. ACTION ---
        let chunk = partitioner.reserve("e", 150).unwrap();

        // --- 3. ASSERTIONS ---
        assert_eq!(chunk.start(), 200, "The window starting at 'c' must be used");
        assert_eq!(chunk.n_bytes(), 150);
        assert!(partitioner.possess("a"));
        assert!(partitioner.possess("b"));
        assert!(!partitioner.possess("c"), "'c' must be reclaimed");
        assert!(!partitioner.possess("d"), "'d' must be reclaimed");
        assert_eq!(
            starts(&partitioner),
            vec![
                (0, 100, false),
                (100, 100, false),
                (200, 150, false),
                (350, 50, true)
            ]
        );
    }

    #[test]
    fn test_stalest_window_wins_among_many() {
        // --- 1. SETUP ---
        // Stamps: a=7, b=2, c=6, d=4, e=5. Windows grown from each used chunk,
        // oldest first, have freshest stamps 6 (b+c), 5 (d+e), 5 (d+e), 6 (b+c)
        // and 7 (a+b).
        let build = |reclaim_trials: usize| {
            let mut partitioner: MemoryPartitioner<u32> =
                MemoryPartitioner::new(0, 500).with_reclaim_trials(reclaim_trials);
            for id in ["a", "b", "c", "d", "e"] {
                partitioner.reserve(id, 100).unwrap();
            }
            partitioner.touch("c");
            partitioner.touch("a");
            partitioner
        };
        let mut partitioner = build(7);
        let mut single_trial = build(1);

        // --- 2. ACTION ---
        let start = partitioner.reserve("f", 150).unwrap().start();
        let single_trial_start = single_trial.reserve("f", 150).unwrap().start();

        // --- 3. ASSERTIONS ---
        assert_eq!(start, 300, "The window with the stalest freshest chunk must win");
        for id in ["a", "b", "c"] {
            assert!(partitioner.possess(id), "'{}' must survive", id);
        }
        assert!(!partitioner.possess("d"));
        assert!(!partitioner.possess("e"));
        assert_eq!(
            starts(&partitioner),
            vec![
                (0, 100, false),
                (100, 100, false),
                (200, 100, false),
                (300, 150, false),
                (450, 50, true)
            ]
        );

        assert_eq!(
            single_trial_start, 100,
            "A single trial settles on the window of the oldest chunk"
        );
        assert!(!single_trial.possess("b"));
        assert!(!single_trial.possess("c"));
    }

    #[test]
    fn test_locked_chunks_are_never_reclaimed() {
        let mut partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(0, 200);
        partitioner.reserve("a", 100).unwrap();
        partitioner.reserve("b", 100).unwrap();
        partitioner.add_lock("a");

        let err = partitioner.reserve("c", 150).unwrap_err();
        assert_eq!(
            err,
            PartitionError::Exhausted {
                requested: 150,
                arena: 200
            }
        );
        assert!(partitioner.possess("a"));
        assert!(partitioner.possess("b"));

        partitioner.remove_lock("a");
        let chunk = partitioner.reserve("c", 150).unwrap();
        assert_eq!(chunk.start(), 0);
        assert!(!partitioner.possess("a"));
    }

    #[test]
    fn test_nested_locks() {
        let mut partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(0, 100);
        partitioner.reserve("a", 10).unwrap();
        partitioner.bind_object("a", 7);

        assert_eq!(partitioner.add_lock("a"), Some(&7));
        partitioner.add_lock("a");
        assert_eq!(partitioner.lock_count("a"), Some(2));
        assert_eq!(partitioner.locked_chunk_count(), 1);
        assert_eq!(partitioner.get_chunk("a").unwrap().update(), u64::MAX);

        partitioner.remove_lock("a");
        assert_eq!(partitioner.locked_chunk_count(), 1);
        partitioner.remove_lock("a");
        assert_eq!(partitioner.locked_chunk_count(), 0);
        assert_eq!(partitioner.used_chunk_count(), 1);

        // Unbalanced unlock is ignored.
        partitioner.remove_lock("a");
        assert_eq!(partitioner.lock_count("a"), Some(0));
        assert_eq!(partitioner.used_chunk_count(), 1);
    }

    #[test]
    fn test_touch_returns_payload_and_skips_locked() {
        let mut partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(0, 100);
        partitioner.reserve("a", 10).unwrap();
        assert!(partitioner.bind_object("a", 42));
        assert!(!partitioner.bind_object("missing", 1));

        let before = partitioner.get_chunk("a").unwrap().update();
        assert_eq!(partitioner.touch("a"), Some(&42));
        assert!(partitioner.get_chunk("a").unwrap().update() > before);

        partitioner.add_lock("a");
        partitioner.touch("a");
        assert_eq!(partitioner.get_chunk("a").unwrap().update(), u64::MAX);
        assert_eq!(partitioner.touch("missing"), None);
    }

    #[test]
    fn test_invalid_requests() {
        let mut partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(0, 100);
        assert_eq!(partitioner.reserve("a", 0).unwrap_err(), PartitionError::ZeroSized);
        assert!(matches!(
            partitioner.reserve("a", 101),
            Err(PartitionError::Exhausted { requested: 101, arena: 100 })
        ));
        assert_eq!(partitioner.free_bytes(), 100);
    }

    #[test]
    fn test_re_reserving_an_id_releases_it_first() {
        let mut partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(0, 100);
        partitioner.reserve("a", 40).unwrap();
        partitioner.bind_object("a", 1);

        let chunk = partitioner.reserve("a", 60).unwrap();
        assert_eq!(chunk.start(), 0);
        assert_eq!(chunk.n_bytes(), 60);
        assert_eq!(chunk.obj(), None);
        assert_eq!(partitioner.used_chunk_count(), 1);
        assert_eq!(partitioner.free_bytes(), 40);
    }

    #[test]
    fn test_release_returns_payload_even_when_locked() {
        let mut partitioner: MemoryPartitioner<u32> = MemoryPartitioner::new(0, 100);
        partitioner.reserve("a", 40).unwrap();
        partitioner.bind_object("a", 9);
        partitioner.add_lock("a");

        assert_eq!(partitioner.release("a"), Some(9));
        assert_eq!(partitioner.release("a"), None);
        assert_eq!(partitioner.locked_chunk_count(), 0);
        assert_eq!(partitioner.free_bytes(), 100);
    }

    #[test]
    fn test_stats_and_report() {
        let mut partitioner: MemoryPartitioner<u32> =
            MemoryPartitioner::new(0, 1000).with_label("batches");
        partitioner.reserve("a", 100).unwrap();
        partitioner.reserve("b", 300).unwrap();
        partitioner.add_lock("b");
        partitioner.release("a");

        let stats = partitioner.stats();
        assert_eq!(stats.free_bytes, 700);
        assert_eq!(stats.largest_free_chunk, 600);
        assert_eq!(stats.free_chunks, 2);
        assert_eq!(stats.used_chunks, 0);
        assert_eq!(stats.locked_chunks, 1);
        assert!((stats.free_percentage() - 70.0).abs() < 1e-9);

        let report = partitioner.residency_report();
        assert_eq!(report.used_bytes, 300);
        assert_eq!(report.pinned_count, 1);
        assert_eq!(partitioner.monitor_id(), "batches");
    }

    #[test]
    fn test_from_settings() {
        let settings = MemorySettings {
            arena_first_byte: 16,
            arena_bytes: 512,
            reclaim_trials: 2,
            ..MemorySettings::default()
        };
        let partitioner: MemoryPartitioner<()> =
            MemoryPartitioner::from_settings(&settings).unwrap();
        assert_eq!(partitioner.first_byte(), 16);
        assert_eq!(partitioner.n_bytes(), 512);
    }

    #[test]
    fn test_from_settings_rejects_invalid_arenas() {
        // --- 1. SETUP ---
        let overflowing = MemorySettings {
            arena_first_byte: usize::MAX,
            arena_bytes: 2,
            ..MemorySettings::default()
        };
        let empty = MemorySettings {
            arena_bytes: 0,
            ..MemorySettings::default()
        };

        // --- 2. ACTION ---
        let overflowing = MemoryPartitioner::<()>::from_settings(&overflowing);
        let empty = MemoryPartitioner::<()>::from_settings(&empty);

        // --- 3. ASSERTIONS ---
        assert!(
            matches!(overflowing, Err(SettingsError::Invalid(_))),
            "An arena ending past usize::MAX must be rejected"
        );
        assert!(
            matches!(empty, Err(SettingsError::Invalid(_))),
            "An empty arena must be rejected"
        );
    }
}
