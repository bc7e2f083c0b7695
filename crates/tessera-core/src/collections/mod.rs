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

//! Handle-addressed containers.
//!
//! Every container stores its nodes in a [`NodeSlots`] arena and hands out
//! [`NodeRef`] handles on insertion. A handle carries the identity of the
//! container that produced it and the generation of its slot, so that any
//! container can check in O(1) whether it still owns a node before relinking
//! or removing it.

mod avl_tree;
mod doubly_list;
mod ordered_list;
mod slots;

pub use avl_tree::AvlTree;
pub use doubly_list::{DoublyList, DoublyListIter};
pub use ordered_list::{OrderedList, OrderedListIter};
pub use slots::{ContainerId, NodeRef, NodeSlots};
