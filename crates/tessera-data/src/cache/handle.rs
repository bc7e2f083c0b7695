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

//! Element handles and their management types.

use tessera_core::NodeRef;

/// How the cache treats an element once nobody holds it anymore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagementType {
    /// Never evicted, never lock-counted.
    Permanent,
    /// Kept in the archives once released, evicted under memory pressure.
    Archivable,
    /// Evicted as soon as its last lock is released.
    Throwable,
}

/// A generational key identifying one handle of a [`Cache3State`](super::Cache3State).
///
/// Keys of evicted or replaced elements are rejected by the cache, even if
/// another element reuses the same id afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementKey(pub(crate) NodeRef);

/// Which recency list currently tracks a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Active(NodeRef),
    Archived(NodeRef),
}

/// Everything the cache needs to manage one element.
#[derive(Debug)]
pub struct ElementHandle<E, A = ()> {
    pub(crate) id: String,
    pub(crate) element: E,
    pub(crate) memory_size: usize,
    pub(crate) management_type: ManagementType,
    pub(crate) n_locks: u32,
    /// `None` for permanent elements, which are never tracked for eviction.
    pub(crate) placement: Option<Placement>,
    pub(crate) attachment: Option<A>,
}

impl<E, A> ElementHandle<E, A> {
    pub(crate) fn new(
        element: E,
        memory_size: usize,
        id: String,
        management_type: ManagementType,
    ) -> Self {
        Self {
            id,
            element,
            memory_size,
            management_type,
            n_locks: 0,
            placement: None,
            attachment: None,
        }
    }

    /// The id the element is cached under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The cached element.
    pub fn element(&self) -> &E {
        &self.element
    }

    /// The memory accounted for this element.
    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    /// The eviction strategy of this element.
    pub fn management_type(&self) -> ManagementType {
        self.management_type
    }

    /// The number of outstanding holds.
    pub fn lock_count(&self) -> u32 {
        self.n_locks
    }

    /// Returns `true` if nobody holds the element.
    pub fn is_free(&self) -> bool {
        self.n_locks == 0
    }

    /// Returns `true` if the element is never evicted.
    pub fn is_permanent(&self) -> bool {
        self.management_type == ManagementType::Permanent
    }

    /// Returns `true` if the element sits in the archives.
    pub fn is_archived(&self) -> bool {
        matches!(self.placement, Some(Placement::Archived(_)))
    }

    /// The user data attached to this handle, if any.
    pub fn attachment(&self) -> Option<&A> {
        self.attachment.as_ref()
    }
}
