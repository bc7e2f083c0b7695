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

//! Generational slot storage backing every container node.

use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_CONTAINER_ID: AtomicU32 = AtomicU32::new(1);

/// A process-unique identifier assigned to a container when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(u32);

impl ContainerId {
    /// Draws the next unused container identifier.
    pub fn next() -> Self {
        Self(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A handle to a node stored in a container.
///
/// It combines the owning container, a slot index and a generation count.
/// When a node is removed its slot can be recycled for a new node, but the
/// generation is incremented, so a handle pointing to a recycled slot is no
/// longer accepted by the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    container: ContainerId,
    index: u32,
    generation: u32,
}

impl NodeRef {
    /// The container that produced this handle.
    pub fn container(&self) -> ContainerId {
        self.container
    }

    /// The raw slot index of the node.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// The slot generation this handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot<N> {
    generation: u32,
    node: Option<N>,
}

/// A dense arena of nodes addressed by [`NodeRef`].
///
/// Vacant slots are recycled through a free list, enabling $O(1)$ insertion
/// for previously removed nodes.
#[derive(Debug)]
pub struct NodeSlots<N> {
    id: ContainerId,
    slots: Vec<Slot<N>>,
    freed: Vec<u32>,
    len: usize,
}

impl<N> Default for NodeSlots<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> NodeSlots<N> {
    /// Creates an empty arena with a fresh container identity.
    pub fn new() -> Self {
        Self {
            id: ContainerId::next(),
            slots: Vec::new(),
            freed: Vec::new(),
            len: 0,
        }
    }

    /// The identity stamped on every handle this arena issues.
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a node in a new or recycled slot and returns its handle.
    pub fn insert(&mut self, node: N) -> NodeRef {
        self.len += 1;
        if let Some(index) = self.freed.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeRef {
                container: self.id,
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeRef {
                container: self.id,
                index,
                generation: 0,
            }
        }
    }

    /// Returns `true` if `node` was issued by this arena and is still alive.
    pub fn contains(&self, node: NodeRef) -> bool {
        self.get(node).is_some()
    }

    /// Borrows a live node.
    pub fn get(&self, node: NodeRef) -> Option<&N> {
        if node.container != self.id {
            return None;
        }
        self.slots
            .get(node.index as usize)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// Mutably borrows a live node.
    pub fn get_mut(&mut self, node: NodeRef) -> Option<&mut N> {
        if node.container != self.id {
            return None;
        }
        self.slots
            .get_mut(node.index as usize)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Removes a live node, invalidating every outstanding handle to it.
    pub fn remove(&mut self, node: NodeRef) -> Option<N> {
        if !self.contains(node) {
            return None;
        }
        Some(self.vacate(node.index))
    }

    /// Vacates every occupied slot.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.freed.push(index as u32);
            }
        }
        self.len = 0;
    }

    // --- Raw index access, used by containers while chasing their own links ---

    /// Builds the handle of an occupied slot.
    pub(crate) fn handle(&self, index: u32) -> NodeRef {
        NodeRef {
            container: self.id,
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    pub(crate) fn at(&self, index: u32) -> &N {
        self.slots[index as usize]
            .node
            .as_ref()
            .expect("container link points to a vacant slot")
    }

    pub(crate) fn at_mut(&mut self, index: u32) -> &mut N {
        self.slots[index as usize]
            .node
            .as_mut()
            .expect("container link points to a vacant slot")
    }

    pub(crate) fn vacate(&mut self, index: u32) -> N {
        let slot = &mut self.slots[index as usize];
        let node = slot
            .node
            .take()
            .expect("container link points to a vacant slot");
        slot.generation = slot.generation.wrapping_add(1);
        self.freed.push(index);
        self.len -= 1;
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut slots = NodeSlots::new();
        let a = slots.insert("a");
        let b = slots.insert("b");

        assert_eq!(slots.len(), 2);
        assert_eq!(slots.get(a), Some(&"a"));
        assert_eq!(slots.get(b), Some(&"b"));
        assert_eq!(a.container(), slots.id());
    }

    #[test]
    fn test_removed_handle_is_stale_after_recycling() {
        let mut slots = NodeSlots::new();
        let a = slots.insert(1);
        assert_eq!(slots.remove(a), Some(1));

        // The slot is recycled, but with a new generation.
        let b = slots.insert(2);
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(slots.get(a).is_none(), "Stale handle must be rejected");
        assert_eq!(slots.remove(a), None);
        assert_eq!(slots.get(b), Some(&2));
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut first = NodeSlots::new();
        let mut second = NodeSlots::new();
        let a = first.insert(10);
        let _ = second.insert(20);

        assert!(!second.contains(a));
        assert_eq!(second.remove(a), None);
        assert!(first.contains(a));
    }

    #[test]
    fn test_clear_invalidates_all_handles() {
        let mut slots = NodeSlots::new();
        let handles: Vec<_> = (0..4).map(|i| slots.insert(i)).collect();
        slots.clear();

        assert!(slots.is_empty());
        assert!(handles.iter().all(|h| !slots.contains(*h)));
    }
}
