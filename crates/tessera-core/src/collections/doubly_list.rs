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

//! # Doubly List
//!
//! A doubly linked list with $O(1)$ insertion, removal and relinking by handle.
//!
//! | Method                | Time complexity |
//! |-----------------------|-----------------|
//! | add (front and back)  | O(1)            |
//! | pop (front and back)  | O(1)            |
//! | remove by reference   | O(1)            |
//! | remove                | O(n)            |
//! | move to beginning/end | O(1)            |
//! | clear                 | O(n)            |

use super::slots::{NodeRef, NodeSlots};

#[derive(Debug)]
struct ListNode<T> {
    object: T,
    previous: Option<u32>,
    next: Option<u32>,
}

/// A doubly linked list whose nodes are addressed by [`NodeRef`] handles.
///
/// Mutating the list while iterating over it is not possible through the
/// borrow checker; callers needing removal during a walk use
/// [`next_of`](DoublyList::next_of) to fetch the follower before removing.
#[derive(Debug)]
pub struct DoublyList<T> {
    nodes: NodeSlots<ListNode<T>>,
    first: Option<u32>,
    last: Option<u32>,
}

impl<T> Default for DoublyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DoublyList<T> {
    /// Creates a new, empty list.
    pub fn new() -> Self {
        Self {
            nodes: NodeSlots::new(),
            first: None,
            last: None,
        }
    }

    /// Number of nodes in the list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the list holds no node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Handle of the first node.
    pub fn first(&self) -> Option<NodeRef> {
        self.first.map(|index| self.nodes.handle(index))
    }

    /// Handle of the last node.
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

    /// Returns `true` if `node` currently belongs to this list.
    pub fn possess(&self, node: NodeRef) -> bool {
        self.nodes.contains(node)
    }

    /// Borrows the payload of `node`.
    pub fn get(&self, node: NodeRef) -> Option<&T> {
        self.nodes.get(node).map(|n| &n.object)
    }

    /// Mutably borrows the payload of `node`.
    pub fn get_mut(&mut self, node: NodeRef) -> Option<&mut T> {
        self.nodes.get_mut(node).map(|n| &mut n.object)
    }

    /// Inserts `object` at the front of the list.
    pub fn add_front(&mut self, object: T) -> NodeRef {
        let node = self.nodes.insert(ListNode {
            object,
            previous: None,
            next: self.first,
        });
        let index = node.index() as u32;
        match self.first {
            Some(first) => self.nodes.at_mut(first).previous = Some(index),
            None => self.last = Some(index),
        }
        self.first = Some(index);
        node
    }

    /// Alias of [`add_front`](DoublyList::add_front).
    pub fn add(&mut self, object: T) -> NodeRef {
        self.add_front(object)
    }

    /// Inserts `object` at the back of the list.
    pub fn add_back(&mut self, object: T) -> NodeRef {
        let node = self.nodes.insert(ListNode {
            object,
            previous: self.last,
            next: None,
        });
        let index = node.index() as u32;
        match self.last {
            Some(last) => self.nodes.at_mut(last).next = Some(index),
            None => self.first = Some(index),
        }
        self.last = Some(index);
        node
    }

    /// Inserts `object` right before `node`.
    ///
    /// Returns `None` if `node` does not belong to this list.
    pub fn add_before(&mut self, node: NodeRef, object: T) -> Option<NodeRef> {
        let Some(previous) = self.nodes.get(node).map(|n| n.previous) else {
            log::warn!("[DoublyList::add_before] Node does not belong to the list");
            return None;
        };
        let anchor = node.index() as u32;
        let new_node = self.nodes.insert(ListNode {
            object,
            previous,
            next: Some(anchor),
        });
        let index = new_node.index() as u32;
        match previous {
            Some(previous) => self.nodes.at_mut(previous).next = Some(index),
            None => self.first = Some(index),
        }
        self.nodes.at_mut(anchor).previous = Some(index);
        Some(new_node)
    }

    /// Inserts `object` right after `node`.
    ///
    /// Returns `None` if `node` does not belong to this list.
    pub fn add_after(&mut self, node: NodeRef, object: T) -> Option<NodeRef> {
        let Some(next) = self.nodes.get(node).map(|n| n.next) else {
            log::warn!("[DoublyList::add_after] Node does not belong to the list");
            return None;
        };
        let anchor = node.index() as u32;
        let new_node = self.nodes.insert(ListNode {
            object,
            previous: Some(anchor),
            next,
        });
        let index = new_node.index() as u32;
        match next {
            Some(next) => self.nodes.at_mut(next).previous = Some(index),
            None => self.last = Some(index),
        }
        self.nodes.at_mut(anchor).next = Some(index);
        Some(new_node)
    }

    /// Removes and returns the first payload.
    pub fn pop_front(&mut self) -> Option<T> {
        let first = self.first?;
        self.unlink(first);
        Some(self.nodes.vacate(first).object)
    }

    /// Alias of [`pop_front`](DoublyList::pop_front).
    pub fn pop(&mut self) -> Option<T> {
        self.pop_front()
    }

    /// Removes and returns the last payload.
    pub fn pop_back(&mut self) -> Option<T> {
        let last = self.last?;
        self.unlink(last);
        Some(self.nodes.vacate(last).object)
    }

    /// Detaches `node` from the list and returns its payload.
    ///
    /// A node that does not belong to the list is left untouched and a
    /// warning is logged.
    pub fn remove_by_reference(&mut self, node: NodeRef) -> Option<T> {
        if !self.nodes.contains(node) {
            log::warn!(
                "[DoublyList::remove_by_reference] Trying to remove a node that does not belong to the list"
            );
            return None;
        }
        let index = node.index() as u32;
        self.unlink(index);
        Some(self.nodes.vacate(index).object)
    }

    /// Moves `node` to the front of the list.
    ///
    /// Returns `false` if `node` does not belong to this list.
    pub fn move_to_the_beginning(&mut self, node: NodeRef) -> bool {
        if !self.nodes.contains(node) {
            return false;
        }
        let index = node.index() as u32;
        if self.first == Some(index) {
            return true;
        }
        self.unlink(index);
        let first = self.first;
        {
            let n = self.nodes.at_mut(index);
            n.previous = None;
            n.next = first;
        }
        match first {
            Some(first) => self.nodes.at_mut(first).previous = Some(index),
            None => self.last = Some(index),
        }
        self.first = Some(index);
        true
    }

    /// Moves `node` to the back of the list.
    ///
    /// Returns `false` if `node` does not belong to this list.
    pub fn move_to_the_end(&mut self, node: NodeRef) -> bool {
        if !self.nodes.contains(node) {
            return false;
        }
        let index = node.index() as u32;
        if self.last == Some(index) {
            return true;
        }
        self.unlink(index);
        let last = self.last;
        {
            let n = self.nodes.at_mut(index);
            n.previous = last;
            n.next = None;
        }
        match last {
            Some(last) => self.nodes.at_mut(last).next = Some(index),
            None => self.first = Some(index),
        }
        self.last = Some(index);
        true
    }

    /// Detaches every node, invalidating all outstanding handles.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.first = None;
        self.last = None;
    }

    /// Iterates over payloads from front to back.
    pub fn iter(&self) -> DoublyListIter<'_, T> {
        DoublyListIter {
            list: self,
            current: self.first,
        }
    }

    /// Applies `f` to every payload from front to back.
    pub fn for_each<F: FnMut(&T)>(&self, f: F) {
        self.iter().for_each(f);
    }

    /// Clones every payload into a vector, front to back.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    /// Removes the first node whose payload equals `object`.
    pub fn remove(&mut self, object: &T) -> bool
    where
        T: PartialEq,
    {
        let mut current = self.first;
        while let Some(index) = current {
            let (matches, next) = {
                let node = self.nodes.at(index);
                (node.object == *object, node.next)
            };
            if matches {
                self.unlink(index);
                self.nodes.vacate(index);
                return true;
            }
            current = next;
        }
        false
    }

    /// Joins the neighbours of `index` together, leaving the node's own links stale.
    fn unlink(&mut self, index: u32) {
        let (previous, next) = {
            let node = self.nodes.at(index);
            (node.previous, node.next)
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

/// Front-to-back iterator over the payloads of a [`DoublyList`].
pub struct DoublyListIter<'a, T> {
    list: &'a DoublyList<T>,
    current: Option<u32>,
}

impl<'a, T> Iterator for DoublyListIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current?;
        let node = self.list.nodes.at(index);
        self.current = node.next;
        Some(&node.object)
    }
}

impl<'a, T> IntoIterator for &'a DoublyList<T> {
    type Item = &'a T;
    type IntoIter = DoublyListIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_front_and_back() {
        let mut list = DoublyList::new();
        list.add_back(2);
        list.add_front(1);
        list.add_back(3);

        assert_eq!(list.len(), 3);
        assert_eq!(list.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_by_reference_invalidates_node() {
        let mut list = DoublyList::new();
        let a = list.add_back("a");
        let b = list.add_back("b");
        let c = list.add_back("c");

        assert_eq!(list.remove_by_reference(b), Some("b"));
        assert!(!list.possess(b));
        assert_eq!(list.to_vec(), vec!["a", "c"]);

        // Removing twice is a logged no-op.
        assert_eq!(list.remove_by_reference(b), None);
        assert_eq!(list.len(), 2);

        assert_eq!(list.next_of(a), Some(c));
        assert_eq!(list.previous_of(c), Some(a));
    }

    #[test]
    fn test_foreign_node_is_ignored() {
        let mut first = DoublyList::new();
        let mut second = DoublyList::new();
        let foreign = first.add_back(1);
        second.add_back(2);

        assert_eq!(second.remove_by_reference(foreign), None);
        assert!(!second.move_to_the_end(foreign));
        assert!(!second.move_to_the_beginning(foreign));
        assert!(second.add_before(foreign, 3).is_none());
        assert_eq!(second.to_vec(), vec![2]);
        assert_eq!(first.to_vec(), vec![1]);
    }

    #[test]
    fn test_move_to_the_end_and_beginning() {
        let mut list = DoublyList::new();
        let a = list.add_back('a');
        let b = list.add_back('b');
        let c = list.add_back('c');

        assert!(list.move_to_the_end(a));
        assert_eq!(list.to_vec(), vec!['b', 'c', 'a']);
        assert_eq!(list.last(), Some(a));

        assert!(list.move_to_the_beginning(c));
        assert_eq!(list.to_vec(), vec!['c', 'b', 'a']);
        assert_eq!(list.first(), Some(c));

        // Already in place.
        assert!(list.move_to_the_beginning(c));
        assert!(list.move_to_the_end(a));
        assert_eq!(list.to_vec(), vec!['c', 'b', 'a']);
        assert_eq!(list.get(b), Some(&'b'));
    }

    #[test]
    fn test_pop_both_ends() {
        let mut list = DoublyList::new();
        assert_eq!(list.pop_front(), None);
        assert_eq!(list.pop_back(), None);

        list.add_back(1);
        list.add_back(2);
        list.add_back(3);

        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_back(), Some(3));
        assert_eq!(list.pop(), Some(2));
        assert!(list.is_empty());
        assert_eq!(list.first(), None);
        assert_eq!(list.last(), None);
    }

    #[test]
    fn test_add_before_and_after() {
        let mut list = DoublyList::new();
        let b = list.add_back(2);
        list.add_before(b, 1).unwrap();
        let d = list.add_after(b, 4).unwrap();
        list.add_before(d, 3).unwrap();
        list.add_after(d, 5).unwrap();

        assert_eq!(list.to_vec(), vec![1, 2, 3, 4, 5]);
        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_back(), Some(5));
    }

    #[test]
    fn test_remove_by_value_and_clear() {
        let mut list = DoublyList::new();
        let nodes: Vec<_> = [5, 6, 5].into_iter().map(|v| list.add_back(v)).collect();

        assert!(list.remove(&5));
        assert_eq!(list.to_vec(), vec![6, 5]);
        assert!(!list.remove(&7));

        list.clear();
        assert!(list.is_empty());
        assert!(nodes.iter().all(|n| !list.possess(*n)));
    }
}
