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

//! # Ordered List
//!
//! A doubly linked list kept sorted by a signed-distance comparison function.
//!
//! | Method              | Time complexity                          |
//! |---------------------|------------------------------------------|
//! | add                 | O(n), O(1) when inserting near either end |
//! | remove by reference | O(1)                                     |
//! | pop (first, last)   | O(1)                                     |
//! | reposition          | O(k), k = number of elements crossed     |
//! | clear               | O(n)                                     |

use super::slots::{NodeRef, NodeSlots};

#[derive(Debug)]
struct OrderedNode<T> {
    object: T,
    previous: Option<u32>,
    next: Option<u32>,
}

/// A sorted doubly linked list whose nodes are addressed by [`NodeRef`] handles.
///
/// The comparator returns a signed distance: negative when the first
/// argument sorts before the second, zero when they are equal, positive
/// otherwise. Its magnitude tells [`add`](OrderedList::add) which end of the
/// list the new element is closer to.
///
/// Equal elements keep their insertion order: a new element is placed after
/// every element it compares equal to.
#[derive(Debug)]
pub struct OrderedList<T> {
    nodes: NodeSlots<OrderedNode<T>>,
    first: Option<u32>,
    last: Option<u32>,
    cmp: fn(&T, &T) -> i64,
}

impl<T> OrderedList<T> {
    /// Creates an empty list ordered by `cmp`.
    pub fn new(cmp: fn(&T, &T) -> i64) -> Self {
        Self {
            nodes: NodeSlots::new(),
            first: None,
            last: None,
            cmp,
        }
    }

    /// Number of elements in the list.
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the list holds no element.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Handle of the first (smallest) node.
    pub fn first(&self) -> Option<NodeRef> {
        self.first.map(|index| self.nodes.handle(index))
    }

    /// Handle of the last (greatest) node.
    pub fn last(&self) -> Option<NodeRef> {
        self.last.map(|index| self.nodes.handle(index))
    }

    /// Handle of the node following `node`, if `node` belongs to this list.
    pub fn next_of(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes
            .get(node)
            .and_then(|n| n.next)
            .map(|index| self.nodes.handle(index))
    }

    /// Handle of the node preceding `node`, if `node` belongs to this list.
    pub fn previous_of(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes
            .get(node)
            .and_then(|n| n.previous)
            .map(|index| self.nodes.handle(index))
    }

    /// The smallest element.
    pub fn get_first(&self) -> Option<&T> {
        self.first.map(|index| &self.nodes.at(index).object)
    }

    /// The greatest element.
    pub fn get_last(&self) -> Option<&T> {
        self.last.map(|index| &self.nodes.at(index).object)
    }

    /// Borrows the payload of `node`.
    pub fn get(&self, node: NodeRef) -> Option<&T> {
        self.nodes.get(node).map(|n| &n.object)
    }

    /// Mutably borrows the payload of `node`.
    ///
    /// Changing the sort key through this reference leaves the node out of
    /// place until [`reposition`](OrderedList::reposition) or one of the move
    /// operations is called.
    pub fn get_mut(&mut self, node: NodeRef) -> Option<&mut T> {
        self.nodes.get_mut(node).map(|n| &mut n.object)
    }

    /// Returns `true` if `node` currently belongs to this list.
    pub fn possess(&self, node: NodeRef) -> bool {
        self.nodes.contains(node)
    }

    /// Inserts `object` at its sorted position.
    ///
    /// The scan starts from whichever end `object` is closer to, so insertions
    /// clustered near either end run in $O(1)$.
    pub fn add(&mut self, object: T) -> NodeRef {
        let (Some(first), Some(last)) = (self.first, self.last) else {
            let node = self.nodes.insert(OrderedNode {
                object,
                previous: None,
                next: None,
            });
            let index = node.index() as u32;
            self.first = Some(index);
            self.last = Some(index);
            return node;
        };

        let cmp_first = (self.cmp)(&object, &self.nodes.at(first).object);
        if cmp_first < 0 {
            return self.insert_between(object, None, Some(first));
        }

        let cmp_last = (self.cmp)(&object, &self.nodes.at(last).object);
        if cmp_last >= 0 {
            return self.insert_between(object, Some(last), None);
        }

        if cmp_first.saturating_add(cmp_last) < 0 {
            // Closer to the front: walk forward to the first greater element.
            let mut current = self.nodes.at(first).next;
            while let Some(index) = current {
                if (self.cmp)(&object, &self.nodes.at(index).object) < 0 {
                    break;
                }
                current = self.nodes.at(index).next;
            }
            let previous = current.map_or(self.last, |index| self.nodes.at(index).previous);
            self.insert_between(object, previous, current)
        } else {
            // Closer to the back: walk backward to the last element not greater.
            let mut current = self.nodes.at(last).previous;
            while let Some(index) = current {
                if (self.cmp)(&object, &self.nodes.at(index).object) >= 0 {
                    break;
                }
                current = self.nodes.at(index).previous;
            }
            let next = current.map_or(self.first, |index| self.nodes.at(index).next);
            self.insert_between(object, current, next)
        }
    }

    /// Detaches `node` and returns its payload.
    ///
    /// A node that does not belong to the list is left untouched and a
    /// warning is logged.
    pub fn remove_by_ref(&mut self, node: NodeRef) -> Option<T> {
        if !self.nodes.contains(node) {
            log::warn!(
                "[OrderedList::remove_by_ref] Trying to remove a node that does not belong to the list"
            );
            return None;
        }
        let index = node.index() as u32;
        self.unlink(index);
        Some(self.nodes.vacate(index).object)
    }

    /// Moves `node` to the front of the list, regardless of order.
    ///
    /// Returns `false` if `node` does not belong to this list.
    pub fn move_to_the_beginning(&mut self, node: NodeRef) -> bool {
        if !self.nodes.contains(node) {
            return false;
        }
        let index = node.index() as u32;
        if self.first != Some(index) {
            self.unlink(index);
            self.link(index, None, self.first);
        }
        true
    }

    /// Moves `node` to the back of the list, regardless of order.
    ///
    /// Returns `false` if `node` does not belong to this list.
    pub fn move_to_the_end(&mut self, node: NodeRef) -> bool {
        if !self.nodes.contains(node) {
            return false;
        }
        let index = node.index() as u32;
        if self.last != Some(index) {
            self.unlink(index);
            self.link(index, self.last, None);
        }
        true
    }

    /// Replaces the payload of `node` with `object` and moves the node to its
    /// sorted position, crossing only the elements it must.
    ///
    /// If the list does not own `node`, `object` is inserted as a fresh
    /// element instead. The returned handle is the live one in both cases.
    pub fn reposition(&mut self, node: NodeRef, object: T) -> NodeRef {
        if !self.nodes.contains(node) {
            return self.add(object);
        }
        let index = node.index() as u32;
        let (mut previous, mut next) = {
            let n = self.nodes.at(index);
            (n.previous, n.next)
        };
        self.unlink(index);
        self.nodes.at_mut(index).object = object;

        while let Some(p) = previous {
            if (self.cmp)(&self.nodes.at(index).object, &self.nodes.at(p).object) >= 0 {
                break;
            }
            next = Some(p);
            previous = self.nodes.at(p).previous;
        }
        while let Some(n) = next {
            if (self.cmp)(&self.nodes.at(index).object, &self.nodes.at(n).object) < 0 {
                break;
            }
            previous = Some(n);
            next = self.nodes.at(n).next;
        }

        self.link(index, previous, next);
        node
    }

    /// Removes and returns the smallest element.
    pub fn pop_first(&mut self) -> Option<T> {
        let first = self.first?;
        self.unlink(first);
        Some(self.nodes.vacate(first).object)
    }

    /// Removes and returns the greatest element.
    pub fn pop_last(&mut self) -> Option<T> {
        let last = self.last?;
        self.unlink(last);
        Some(self.nodes.vacate(last).object)
    }

    /// Removes every element, invalidating all outstanding handles.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.first = None;
        self.last = None;
    }

    /// Iterates over elements in list order.
    pub fn iter(&self) -> OrderedListIter<'_, T> {
        OrderedListIter {
            list: self,
            current: self.first,
        }
    }

    /// Applies `f` to every element in list order.
    pub fn for_each<F: FnMut(&T)>(&self, f: F) {
        self.iter().for_each(f);
    }

    /// Clones every element into a vector, in list order.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    fn insert_between(&mut self, object: T, previous: Option<u32>, next: Option<u32>) -> NodeRef {
        let node = self.nodes.insert(OrderedNode {
            object,
            previous: None,
            next: None,
        });
        self.link(node.index() as u32, previous, next);
        node
    }

    /// Links a detached node between two adjacent nodes (or list ends).
    fn link(&mut self, index: u32, previous: Option<u32>, next: Option<u32>) {
        {
            let n = self.nodes.at_mut(index);
            n.previous = previous;
            n.next = next;
        }
        match previous {
            Some(previous) => self.nodes.at_mut(previous).next = Some(index),
            None => self.first = Some(index),
        }
        match next {
            Some(next) => self.nodes.at_mut(next).previous = Some(index),
            None => self.last = Some(index),
        }
    }

    fn unlink(&mut self, index: u32) {
        let (previous, next) = {
            let n = self.nodes.at(index);
            (n.previous, n.next)
        };
        match next {
            Some(next) => self.nodes.at_mut(next).previous = previous,
            None => self.last = previous,
        }
        match previous {
            Some(previous) => self.nodes.at_mut(previous).next = next,
            None => self.first = next,
        }
    }
}

/// Iterator over the elements of an [`OrderedList`], in list order.
pub struct OrderedListIter<'a, T> {
    list: &'a OrderedList<T>,
    current: Option<u32>,
}

impl<'a, T> Iterator for OrderedListIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current?;
        let node = self.list.nodes.at(index);
        self.current = node.next;
        Some(&node.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric() -> OrderedList<i32> {
        OrderedList::new(|a, b| i64::from(*a) - i64::from(*b))
    }

    #[test]
    fn test_add_keeps_order() {
        let mut list = numeric();
        for value in [5, 1, 9, 3, 7, 3, 10, 0] {
            list.add(value);
        }
        assert_eq!(list.to_vec(), vec![0, 1, 3, 3, 5, 7, 9, 10]);
        assert_eq!(list.count(), 8);
        assert_eq!(list.get_first(), Some(&0));
        assert_eq!(list.get_last(), Some(&10));
    }

    #[test]
    fn test_insertion_near_either_end_scans_few_elements() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static COMPARISONS: AtomicUsize = AtomicUsize::new(0);

        // --- 1. SETUP ---
        let mut list: OrderedList<i64> = OrderedList::new(|a, b| {
            COMPARISONS.fetch_add(1, Ordering::Relaxed);
            a - b
        });
        for value in (0..100_000).step_by(10) {
            list.add(value);
        }

        // --- 2. ACTION ---
        COMPARISONS.store(0, Ordering::Relaxed);
        list.add(15);
        let near_front = COMPARISONS.load(Ordering::Relaxed);

        COMPARISONS.store(0, Ordering::Relaxed);
        list.add(99_975);
        let near_back = COMPARISONS.load(Ordering::Relaxed);

        // --- 3. ASSERTIONS ---
        assert!(
            near_front < 8,
            "Inserting near the front took {} comparisons",
            near_front
        );
        assert!(
            near_back < 8,
            "Inserting near the back took {} comparisons",
            near_back
        );
        assert_eq!(list.count(), 10_002);
        let values = list.to_vec();
        assert!(
            values.windows(2).all(|pair| pair[0] <= pair[1]),
            "List must stay sorted"
        );
        assert_eq!(&values[..4], &[0, 10, 15, 20]);
        assert_eq!(&values[values.len() - 4..], &[99_970, 99_975, 99_980, 99_990]);
    }

    #[test]
    fn test_remove_of_foreign_node_is_ignored() {
        // --- 1. SETUP ---
        let mut list = numeric();
        let mut other = numeric();
        list.add(1);
        let foreign = other.add(2);

        // --- 2. ACTION ---
        let removed = list.remove_by_ref(foreign);

        // --- 3. ASSERTIONS ---
        assert_eq!(removed, None, "A foreign node must not be removed");
        assert_eq!(list.to_vec(), vec![1]);
        assert!(other.possess(foreign), "The owning list keeps its node");
    }

    #[test]
    fn test_equal_elements_keep_insertion_order() {
        let mut list: OrderedList<(i32, char)> = OrderedList::new(|a, b| i64::from(a.0 - b.0));
        list.add((1, 'a'));
        list.add((2, 'b'));
        list.add((1, 'c'));
        list.add((1, 'd'));
        let order: Vec<char> = list.iter().map(|(_, c)| *c).collect();
        assert_eq!(order, vec!['a', 'c', 'd', 'b']);
    }

    #[test]
    fn test_remove_and_pop() {
        let mut list = numeric();
        let nodes: Vec<_> = (0..5).map(|v| list.add(v)).collect();

        assert_eq!(list.remove_by_ref(nodes[2]), Some(2));
        assert_eq!(list.remove_by_ref(nodes[2]), None);
        assert_eq!(list.pop_first(), Some(0));
        assert_eq!(list.pop_last(), Some(4));
        assert_eq!(list.to_vec(), vec![1, 3]);
        assert!(!list.possess(nodes[0]));
        assert!(list.possess(nodes[1]));
    }

    #[test]
    fn test_reposition_moves_node_both_ways() {
        let mut list = numeric();
        let nodes: Vec<_> = [10, 20, 30, 40].into_iter().map(|v| list.add(v)).collect();

        let node = list.reposition(nodes[0], 35);
        assert_eq!(node, nodes[0]);
        assert_eq!(list.to_vec(), vec![20, 30, 35, 40]);

        list.reposition(nodes[3], 5);
        assert_eq!(list.to_vec(), vec![5, 20, 30, 35]);
        assert_eq!(list.first(), Some(nodes[3]));
    }

    #[test]
    fn test_reposition_of_foreign_node_adds() {
        let mut list = numeric();
        let stale = list.add(1);
        list.remove_by_ref(stale);
        list.add(4);

        let node = list.reposition(stale, 2);
        assert_ne!(node, stale);
        assert!(list.possess(node));
        assert_eq!(list.to_vec(), vec![2, 4]);
    }

    #[test]
    fn test_always_greater_comparator_is_fifo() {
        let mut list: OrderedList<u32> = OrderedList::new(|_, _| 1);
        for value in [3, 1, 2] {
            list.add(value);
        }
        assert_eq!(list.to_vec(), vec![3, 1, 2]);
    }

    #[test]
    fn test_move_ignores_order_and_foreign_nodes() {
        let mut list = numeric();
        let a = list.add(1);
        let b = list.add(2);
        let mut other = numeric();
        let foreign = other.add(3);

        assert!(list.move_to_the_end(a));
        assert_eq!(list.to_vec(), vec![2, 1]);
        assert!(list.move_to_the_beginning(a));
        assert_eq!(list.to_vec(), vec![1, 2]);
        assert!(!list.move_to_the_end(foreign));
        assert_eq!(list.last(), Some(b));

        list.clear();
        assert!(list.is_empty());
        assert!(!list.possess(a));
    }
}
