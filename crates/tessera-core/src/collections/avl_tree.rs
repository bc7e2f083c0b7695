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

//! # AVL Tree
//!
//! A self-balancing binary search tree ordered by a comparison function.
//! Insertion and removal by handle run in $O(\log n)$, and
//! [`get_smallest_above`](AvlTree::get_smallest_above) answers best-fit
//! queries in $O(\log n)$.

use super::slots::{NodeRef, NodeSlots};
use std::cmp::Ordering;

#[derive(Debug)]
struct AvlNode<T> {
    object: T,
    /// Height of the subtree rooted here (1 for leaves).
    height: u32,
    parent: Option<u32>,
    left: Option<u32>,
    right: Option<u32>,
}

/// An AVL tree whose nodes are addressed by [`NodeRef`] handles.
#[derive(Debug)]
pub struct AvlTree<T> {
    nodes: NodeSlots<AvlNode<T>>,
    root: Option<u32>,
    cmp: fn(&T, &T) -> Ordering,
}

impl<T> AvlTree<T> {
    /// Creates an empty tree ordered by `cmp`.
    pub fn new(cmp: fn(&T, &T) -> Ordering) -> Self {
        Self {
            nodes: NodeSlots::new(),
            root: None,
            cmp,
        }
    }

    /// Number of elements in the tree.
    pub fn get_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree holds no element.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Height of the tree (0 when empty).
    pub fn get_height(&self) -> u32 {
        self.height(self.root)
    }

    /// Payload stored at the root.
    pub fn get_root(&self) -> Option<&T> {
        self.root.map(|index| &self.nodes.at(index).object)
    }

    /// Returns `true` if `node` currently belongs to this tree.
    pub fn possess(&self, node: NodeRef) -> bool {
        self.nodes.contains(node)
    }

    /// Borrows the payload of `node`.
    pub fn get(&self, node: NodeRef) -> Option<&T> {
        self.nodes.get(node).map(|n| &n.object)
    }

    /// Inserts `object` and returns the handle of its node.
    ///
    /// Duplicates descend into whichever child subtree is shorter, preferring
    /// the left one on ties.
    pub fn add(&mut self, object: T) -> NodeRef {
        let Some(mut current) = self.root else {
            let node = self.nodes.insert(AvlNode {
                object,
                height: 1,
                parent: None,
                left: None,
                right: None,
            });
            self.root = Some(node.index() as u32);
            return node;
        };

        let go_left = loop {
            let node = self.nodes.at(current);
            match (self.cmp)(&object, &node.object) {
                Ordering::Less => match node.left {
                    Some(left) => current = left,
                    None => break true,
                },
                Ordering::Greater => match node.right {
                    Some(right) => current = right,
                    None => break false,
                },
                Ordering::Equal => match (node.left, node.right) {
                    (None, _) => break true,
                    (Some(_), None) => break false,
                    (Some(left), Some(right)) => {
                        current = if self.nodes.at(right).height < self.nodes.at(left).height {
                            right
                        } else {
                            left
                        };
                    }
                },
            }
        };

        let node = self.nodes.insert(AvlNode {
            object,
            height: 1,
            parent: Some(current),
            left: None,
            right: None,
        });
        let index = node.index() as u32;
        if go_left {
            self.nodes.at_mut(current).left = Some(index);
        } else {
            self.nodes.at_mut(current).right = Some(index);
        }

        self.rebalance(Some(current));
        node
    }

    /// Removes `node` from the tree and returns its payload.
    ///
    /// A node without a right child is replaced by its left child; otherwise
    /// it is replaced by its in-order successor. A node that does not belong
    /// to the tree is left untouched and a warning is logged.
    pub fn remove_by_ref(&mut self, node: NodeRef) -> Option<T> {
        if !self.nodes.contains(node) {
            log::warn!("[AvlTree::remove_by_ref] Trying to remove a node that does not belong to the tree");
            return None;
        }
        let index = node.index() as u32;
        let (parent, left, right, height) = {
            let n = self.nodes.at(index);
            (n.parent, n.left, n.right, n.height)
        };

        let balance_from = match right {
            None => {
                self.replace_child(parent, index, left);
                if let Some(left) = left {
                    self.nodes.at_mut(left).parent = parent;
                }
                parent
            }
            Some(right) if self.nodes.at(right).left.is_none() => {
                // The right child is the successor: it adopts the left subtree.
                {
                    let r = self.nodes.at_mut(right);
                    r.left = left;
                    r.parent = parent;
                    r.height = height;
                }
                if let Some(left) = left {
                    self.nodes.at_mut(left).parent = Some(right);
                }
                self.replace_child(parent, index, Some(right));
                Some(right)
            }
            Some(right) => {
                let mut successor = right;
                while let Some(next) = self.nodes.at(successor).left {
                    successor = next;
                }
                let (successor_parent, successor_right) = {
                    let s = self.nodes.at(successor);
                    (s.parent, s.right)
                };

                // Splice the successor out, handing its right subtree to its parent.
                if let Some(successor_parent) = successor_parent {
                    self.nodes.at_mut(successor_parent).left = successor_right;
                }
                if let Some(successor_right) = successor_right {
                    self.nodes.at_mut(successor_right).parent = successor_parent;
                }

                {
                    let s = self.nodes.at_mut(successor);
                    s.left = left;
                    s.right = Some(right);
                    s.parent = parent;
                    s.height = height;
                }
                self.nodes.at_mut(right).parent = Some(successor);
                if let Some(left) = left {
                    self.nodes.at_mut(left).parent = Some(successor);
                }
                self.replace_child(parent, index, Some(successor));
                successor_parent
            }
        };

        let removed = self.nodes.vacate(index);
        self.rebalance(balance_from);
        Some(removed.object)
    }

    /// Returns the smallest element that is not smaller than `object`.
    ///
    /// An exact match is returned as soon as it is met.
    pub fn get_smallest_above(&self, object: &T) -> Option<&T> {
        let mut smallest_above = None;
        let mut current = self.root;
        while let Some(index) = current {
            let node = self.nodes.at(index);
            match (self.cmp)(object, &node.object) {
                Ordering::Less => {
                    smallest_above = Some(&node.object);
                    current = node.left;
                }
                Ordering::Greater => current = node.right,
                Ordering::Equal => return Some(&node.object),
            }
        }
        smallest_above
    }

    /// Applies `f` to every element in pre-order.
    pub fn for_each<F: FnMut(&T)>(&self, mut f: F) {
        self.for_each_from(self.root, &mut f);
    }

    fn for_each_from<F: FnMut(&T)>(&self, node: Option<u32>, f: &mut F) {
        if let Some(index) = node {
            let n = self.nodes.at(index);
            f(&n.object);
            self.for_each_from(n.left, f);
            self.for_each_from(n.right, f);
        }
    }

    /// Collects references to every element in sorted order.
    pub fn in_order(&self) -> Vec<&T> {
        let mut sorted = Vec::with_capacity(self.nodes.len());
        let mut stack = Vec::with_capacity(self.get_height() as usize);
        let mut current = self.root;
        loop {
            while let Some(index) = current {
                stack.push(index);
                current = self.nodes.at(index).left;
            }
            let Some(index) = stack.pop() else {
                break;
            };
            let node = self.nodes.at(index);
            sorted.push(&node.object);
            current = node.right;
        }
        sorted
    }

    /// Removes every element, invalidating all outstanding handles.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Verifies the structural invariants of the tree: parent links, stored
    /// heights, balance factors and ordering.
    pub fn is_balanced(&self) -> bool {
        self.check_subtree(self.root, None).is_some()
    }

    fn check_subtree(&self, node: Option<u32>, parent: Option<u32>) -> Option<u32> {
        let Some(index) = node else {
            return Some(0);
        };
        let n = self.nodes.at(index);
        if n.parent != parent {
            return None;
        }
        if let Some(left) = n.left {
            if (self.cmp)(&self.nodes.at(left).object, &n.object) == Ordering::Greater {
                return None;
            }
        }
        if let Some(right) = n.right {
            if (self.cmp)(&self.nodes.at(right).object, &n.object) == Ordering::Less {
                return None;
            }
        }
        let left_height = self.check_subtree(n.left, Some(index))?;
        let right_height = self.check_subtree(n.right, Some(index))?;
        let height = 1 + left_height.max(right_height);
        if left_height.abs_diff(right_height) > 1 || height != n.height {
            return None;
        }
        Some(height)
    }

    // --- Balancing (Tree Rotations) ---

    fn height(&self, node: Option<u32>) -> u32 {
        node.map_or(0, |index| self.nodes.at(index).height)
    }

    fn update_height(&mut self, index: u32) {
        let (left, right) = {
            let n = self.nodes.at(index);
            (n.left, n.right)
        };
        self.nodes.at_mut(index).height = 1 + self.height(left).max(self.height(right));
    }

    /// Points the slot of `parent` that held `old` (or the root) to `new`.
    fn replace_child(&mut self, parent: Option<u32>, old: u32, new: Option<u32>) {
        match parent {
            None => self.root = new,
            Some(parent) => {
                let p = self.nodes.at_mut(parent);
                if p.left == Some(old) {
                    p.left = new;
                } else {
                    p.right = new;
                }
            }
        }
    }

    /// Lifts the left child of `index` above it. Returns the new subtree root.
    fn rotate_right(&mut self, index: u32) -> u32 {
        let pivot = self.nodes.at(index).left.expect("right rotation without left child");
        let parent = self.nodes.at(index).parent;
        let inner = self.nodes.at(pivot).right;

        self.nodes.at_mut(index).left = inner;
        if let Some(inner) = inner {
            self.nodes.at_mut(inner).parent = Some(index);
        }

        self.replace_child(parent, index, Some(pivot));
        self.nodes.at_mut(pivot).parent = parent;
        self.nodes.at_mut(pivot).right = Some(index);
        self.nodes.at_mut(index).parent = Some(pivot);

        self.update_height(index);
        self.update_height(pivot);
        pivot
    }

    /// Lifts the right child of `index` above it. Returns the new subtree root.
    fn rotate_left(&mut self, index: u32) -> u32 {
        let pivot = self.nodes.at(index).right.expect("left rotation without right child");
        let parent = self.nodes.at(index).parent;
        let inner = self.nodes.at(pivot).left;

        self.nodes.at_mut(index).right = inner;
        if let Some(inner) = inner {
            self.nodes.at_mut(inner).parent = Some(index);
        }

        self.replace_child(parent, index, Some(pivot));
        self.nodes.at_mut(pivot).parent = parent;
        self.nodes.at_mut(pivot).left = Some(index);
        self.nodes.at_mut(index).parent = Some(pivot);

        self.update_height(index);
        self.update_height(pivot);
        pivot
    }

    /// Walks from `start` towards the root, restoring heights and balance.
    ///
    /// Stops at the first subtree whose height is unchanged, since nothing
    /// above it can have been affected.
    fn rebalance(&mut self, start: Option<u32>) {
        let mut current = start;
        while let Some(index) = current {
            let (old_height, parent, left, right) = {
                let n = self.nodes.at(index);
                (n.height, n.parent, n.left, n.right)
            };
            let left_height = self.height(left);
            let right_height = self.height(right);

            let subtree_root = if left_height > right_height + 1 {
                let left = left.expect("left-heavy node without left child");
                let (left_left, left_right) = {
                    let l = self.nodes.at(left);
                    (l.left, l.right)
                };
                if self.height(left_left) < self.height(left_right) {
                    // Left-right case
                    self.rotate_left(left);
                }
                // Left-left case
                self.rotate_right(index)
            } else if right_height > left_height + 1 {
                let right = right.expect("right-heavy node without right child");
                let (right_left, right_right) = {
                    let r = self.nodes.at(right);
                    (r.left, r.right)
                };
                if self.height(right_right) < self.height(right_left) {
                    // Right-left case
                    self.rotate_right(right);
                }
                // Right-right case
                self.rotate_left(index)
            } else {
                self.update_height(index);
                index
            };

            if self.nodes.at(subtree_root).height == old_height {
                break;
            }
            current = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric() -> AvlTree<i32> {
        AvlTree::new(|a, b| a.cmp(b))
    }

    #[test]
    fn test_ascending_insertions_stay_balanced() {
        let mut tree = numeric();
        for value in 0..100 {
            tree.add(value);
            assert!(tree.is_balanced(), "Unbalanced after inserting {value}");
        }
        assert_eq!(tree.get_count(), 100);
        // A perfectly balanced tree of 100 nodes has height 7; AVL allows a bit more.
        assert!(tree.get_height() <= 9);
        let sorted: Vec<i32> = tree.in_order().into_iter().copied().collect();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_get_smallest_above() {
        let mut tree = numeric();
        assert_eq!(tree.get_smallest_above(&5), None);

        for value in [10, 20, 30, 40, 50] {
            tree.add(value);
        }

        assert_eq!(tree.get_smallest_above(&5), Some(&10));
        assert_eq!(tree.get_smallest_above(&20), Some(&20));
        assert_eq!(tree.get_smallest_above(&21), Some(&30));
        assert_eq!(tree.get_smallest_above(&50), Some(&50));
        assert_eq!(tree.get_smallest_above(&51), None);
    }

    #[test]
    fn test_remove_by_ref_all_shapes() {
        let mut tree = numeric();
        let handles: Vec<_> = [50, 30, 70, 20, 40, 60, 80, 35, 45, 65]
            .into_iter()
            .map(|v| (v, tree.add(v)))
            .collect();

        // Leaves first, then inner nodes with two children, then the root.
        for target in [20, 65, 40, 50] {
            let (_, node) = handles.iter().find(|(v, _)| *v == target).unwrap();
            assert_eq!(tree.remove_by_ref(*node), Some(target));
            assert!(!tree.possess(*node));
            assert!(tree.is_balanced(), "Unbalanced after removing {target}");
        }

        let sorted: Vec<i32> = tree.in_order().into_iter().copied().collect();
        assert_eq!(sorted, vec![30, 35, 45, 60, 70, 80]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut tree = numeric();
        let nodes: Vec<_> = (0..16).map(|_| tree.add(7)).collect();
        assert!(tree.is_balanced());
        assert_eq!(tree.get_count(), 16);

        for node in nodes.iter().step_by(2) {
            assert_eq!(tree.remove_by_ref(*node), Some(7));
        }
        assert!(tree.is_balanced());
        assert_eq!(tree.get_count(), 8);
        assert_eq!(tree.get_smallest_above(&7), Some(&7));
    }

    #[test]
    fn test_removing_foreign_node_is_noop() {
        let mut tree = numeric();
        let mut other = numeric();
        tree.add(1);
        let foreign = other.add(1);

        assert_eq!(tree.remove_by_ref(foreign), None);
        assert_eq!(tree.get_count(), 1);
    }

    #[test]
    fn test_for_each_is_pre_order() {
        let mut tree = numeric();
        for value in [2, 1, 3] {
            tree.add(value);
        }
        let mut visited = Vec::new();
        tree.for_each(|v| visited.push(*v));
        assert_eq!(visited, vec![2, 1, 3]);
        assert_eq!(tree.get_root(), Some(&2));

        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.get_height(), 0);
        assert_eq!(tree.get_root(), None);
    }
}
