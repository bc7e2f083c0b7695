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

//! A reference-counted element cache with three lifecycle states.
//!
//! Elements (typically GPU textures) are either *active* (held by at least one
//! caller), *archived* (released, kept for possible reuse) or *permanent*.
//! Whenever the accounted memory exceeds the budget, archived elements are
//! evicted, least recently released first. Held elements are never evicted,
//! so the cache may exceed its budget while callers hold too much.

mod handle;

pub use handle::{ElementHandle, ElementKey, ManagementType};

use handle::Placement;
use std::borrow::Cow;
use std::collections::HashMap;
use tessera_core::{DoublyList, NodeSlots, ResidencyMonitor, ResidencyReport};

/// Callback receiving the payload of every evicted element.
pub type RemovalCallback<E> = Box<dyn FnMut(E)>;

/// A snapshot of the cache's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Elements currently held by at least one caller.
    pub actives: usize,
    /// Released elements waiting for reuse or eviction.
    pub archives: usize,
    /// Every resident element, permanent ones included.
    pub total: usize,
    /// Accounted memory of every resident element.
    pub memory_used: usize,
    /// The memory budget.
    pub memory_allocated: usize,
    /// Number of elements ever added.
    pub add_count: u64,
    /// Number of elements ever evicted or replaced.
    pub remove_count: u64,
}

impl CacheStats {
    /// The accounted memory as a percentage of the budget.
    pub fn usage_percentage(&self) -> f64 {
        if self.memory_allocated == 0 {
            0.0
        } else {
            100.0 * self.memory_used as f64 / self.memory_allocated as f64
        }
    }
}

/// A memory-bounded cache of held, archived and permanent elements.
///
/// # Type Parameters
///
/// * `E`: The cached element, handed to the removal callback on eviction.
/// * `A`: Optional user data attached to handles. Defaults to `()`.
pub struct Cache3State<E, A = ()> {
    memory_allocated: usize,
    memory_used: usize,
    on_element_removed: Option<RemovalCallback<E>>,
    handles: NodeSlots<ElementHandle<E, A>>,
    elements_by_id: HashMap<String, ElementKey>,
    actives: DoublyList<ElementKey>,
    archives: DoublyList<ElementKey>,
    unidentified_elements_count: u64,
    add_count: u64,
    remove_count: u64,
    label: Cow<'static, str>,
}

impl<E, A> std::fmt::Debug for Cache3State<E, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache3State")
            .field("label", &self.label)
            .field("memory_used", &self.memory_used)
            .field("memory_allocated", &self.memory_allocated)
            .field("actives", &self.actives.len())
            .field("archives", &self.archives.len())
            .field("total", &self.handles.len())
            .finish()
    }
}

impl<E, A> Cache3State<E, A> {
    /// Creates an empty cache with the given memory budget.
    ///
    /// `on_element_removed` receives the payload of every element leaving the
    /// cache, so the caller can release the underlying GPU resource.
    pub fn new(memory_allocated: usize, on_element_removed: Option<RemovalCallback<E>>) -> Self {
        Self {
            memory_allocated,
            memory_used: 0,
            on_element_removed,
            handles: NodeSlots::new(),
            elements_by_id: HashMap::new(),
            actives: DoublyList::new(),
            archives: DoublyList::new(),
            unidentified_elements_count: 0,
            add_count: 0,
            remove_count: 0,
            label: Cow::Borrowed("cache_3state"),
        }
    }

    /// Sets the identifier this cache reports to telemetry.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Registers `element` under `id` and holds it once.
    ///
    /// * Without an `id`, a synthetic `unidentified<N>` id is generated.
    /// * Without a `management_type`, identified elements are
    ///   [`Archivable`](ManagementType::Archivable) and unidentified ones
    ///   [`Throwable`](ManagementType::Throwable).
    /// * If `id` is already cached, the existing element is held instead and
    ///   `element` is dropped, unless `replace` is set and nobody holds the
    ///   existing element, in which case it is evicted and replaced.
    pub fn add_and_hold_element(
        &mut self,
        element: E,
        memory_size: usize,
        id: Option<&str>,
        management_type: Option<ManagementType>,
        replace: bool,
    ) -> ElementKey {
        let management_type = management_type.unwrap_or(if id.is_some() {
            ManagementType::Archivable
        } else {
            ManagementType::Throwable
        });
        let id = match id {
            Some(id) => id.to_owned(),
            None => {
                let id = format!("unidentified{}", self.unidentified_elements_count);
                self.unidentified_elements_count += 1;
                id
            }
        };

        if let Some(&key) = self.elements_by_id.get(&id) {
            let existing = self.handles.get(key.0).map(|h| (h.is_free(), h.management_type));
            if let Some((is_free, existing_type)) = existing {
                if replace {
                    if !is_free {
                        log::warn!(
                            "[Cache3State::add_and_hold_element] Trying to replace a locked element: {id}"
                        );
                        return self.hold_key(key);
                    }
                    self.remove_element(key);
                } else {
                    if existing_type != management_type {
                        log::warn!(
                            "[Cache3State::add_and_hold_element] Trying to change type of an existing element: {id}"
                        );
                    }
                    return self.hold_key(key);
                }
            }
        }

        let key = self.add_element(ElementHandle::new(element, memory_size, id, management_type));
        self.hold_key(key)
    }

    /// Holds the element cached under `id`, bringing it back from the
    /// archives if needed.
    pub fn hold_element(&mut self, id: &str) -> Option<ElementKey> {
        let key = *self.elements_by_id.get(id)?;
        Some(self.hold_key(key))
    }

    /// Looks up the element cached under `id` without holding it.
    pub fn use_element(&self, id: &str) -> Option<ElementKey> {
        self.elements_by_id.get(id).copied()
    }

    /// Holds the element behind `key` once more.
    ///
    /// Returns `None` if the key is stale.
    pub fn hold(&mut self, key: ElementKey) -> Option<ElementKey> {
        if !self.handles.contains(key.0) {
            log::warn!("[Cache3State::hold] Element is no longer cached");
            return None;
        }
        Some(self.hold_key(key))
    }

    /// Releases one hold on the element behind `key`.
    ///
    /// Releasing the last hold archives the element, or evicts it right away
    /// if it is [`Throwable`](ManagementType::Throwable).
    pub fn release(&mut self, key: ElementKey) {
        let Some(handle) = self.handles.get_mut(key.0) else {
            log::warn!("[Cache3State::release] Element is no longer cached");
            return;
        };
        if handle.is_permanent() {
            return;
        }
        if handle.n_locks == 0 {
            log::error!(
                "[Cache3State::release] Number of locks is negative: {}",
                handle.id
            );
            return;
        }
        handle.n_locks -= 1;
        if handle.n_locks == 0 {
            self.archive_element(key);
        }
    }

    /// The element behind `key`.
    pub fn element(&self, key: ElementKey) -> Option<&E> {
        self.handles.get(key.0).map(|h| &h.element)
    }

    /// The handle behind `key`.
    pub fn handle(&self, key: ElementKey) -> Option<&ElementHandle<E, A>> {
        self.handles.get(key.0)
    }

    /// The handle cached under `id`.
    pub fn handle_by_id(&self, id: &str) -> Option<&ElementHandle<E, A>> {
        self.elements_by_id
            .get(id)
            .and_then(|key| self.handles.get(key.0))
    }

    /// Attaches user data to the handle behind `key`, returning the previous one.
    pub fn set_attachment(&mut self, key: ElementKey, attachment: A) -> Option<A> {
        let handle = self.handles.get_mut(key.0)?;
        handle.attachment.replace(attachment)
    }

    /// The user data attached to the handle behind `key`.
    pub fn attachment(&self, key: ElementKey) -> Option<&A> {
        self.handles.get(key.0).and_then(|h| h.attachment.as_ref())
    }

    /// Returns `true` if an element is cached under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.elements_by_id.contains_key(id)
    }

    /// Number of resident elements.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if no element is resident.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Accounted memory of every resident element.
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// The memory budget.
    pub fn memory_allocated(&self) -> usize {
        self.memory_allocated
    }

    /// Changes the memory budget, evicting archived elements if it shrank.
    pub fn set_memory_allocated(&mut self, memory_allocated: usize) {
        self.memory_allocated = memory_allocated;
        self.clean();
    }

    /// Number of held elements.
    pub fn active_count(&self) -> usize {
        self.actives.len()
    }

    /// Number of archived elements.
    pub fn archived_count(&self) -> usize {
        self.archives.len()
    }

    /// Number of elements ever added.
    pub fn add_count(&self) -> u64 {
        self.add_count
    }

    /// Number of elements ever evicted or replaced.
    pub fn remove_count(&self) -> u64 {
        self.remove_count
    }

    /// Takes a snapshot of the cache's bookkeeping.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            actives: self.actives.len(),
            archives: self.archives.len(),
            total: self.handles.len(),
            memory_used: self.memory_used,
            memory_allocated: self.memory_allocated,
            add_count: self.add_count,
            remove_count: self.remove_count,
        }
    }

    /// Logs the cache's bookkeeping at `info` level.
    pub fn log_stats(&self) {
        let stats = self.stats();
        log::info!("***** Cache Stats ({}) *****", self.label);
        log::info!("  Actives: {}", stats.actives);
        log::info!("  Archives: {}", stats.archives);
        log::info!("  Total: {}", stats.total);
        log::info!("  Usage (units): {}", stats.memory_used);
        log::info!("  Usage (percentage): {:.0}%", stats.usage_percentage());
    }

    // --- Internal lifecycle ---

    fn hold_key(&mut self, key: ElementKey) -> ElementKey {
        let Some(handle) = self.handles.get_mut(key.0) else {
            return key;
        };
        if handle.is_permanent() {
            return key;
        }
        handle.n_locks += 1;

        match handle.placement {
            Some(Placement::Active(node)) => {
                self.actives.move_to_the_end(node);
            }
            Some(Placement::Archived(node)) => {
                self.archives.remove_by_reference(node);
                let node = self.actives.add_back(key);
                if let Some(handle) = self.handles.get_mut(key.0) {
                    handle.placement = Some(Placement::Active(node));
                }
            }
            None => {
                log::warn!(
                    "[Cache3State::hold] Element is not tracked by the cache: {}",
                    handle.id
                );
            }
        }
        key
    }

    fn archive_element(&mut self, key: ElementKey) {
        let Some(handle) = self.handles.get(key.0) else {
            return;
        };
        let Some(Placement::Active(node)) = handle.placement else {
            log::warn!(
                "[Cache3State::archive_element] The element cannot be archived: {}",
                handle.id
            );
            return;
        };

        if handle.management_type == ManagementType::Throwable {
            self.remove_element(key);
        } else {
            self.actives.remove_by_reference(node);
            let node = self.archives.add_back(key);
            if let Some(handle) = self.handles.get_mut(key.0) {
                handle.placement = Some(Placement::Archived(node));
            }
            self.clean();
        }
    }

    fn add_element(&mut self, handle: ElementHandle<E, A>) -> ElementKey {
        let is_permanent = handle.is_permanent();
        let memory_size = handle.memory_size;
        let id = handle.id.clone();

        let key = ElementKey(self.handles.insert(handle));
        self.elements_by_id.insert(id, key);
        self.memory_used += memory_size;

        // The new element is not archived yet, so it cannot be evicted here.
        self.clean();

        if !is_permanent {
            let node = self.actives.add_back(key);
            if let Some(handle) = self.handles.get_mut(key.0) {
                handle.placement = Some(Placement::Active(node));
            }
        }

        self.add_count += 1;
        key
    }

    fn remove_element(&mut self, key: ElementKey) {
        let Some(handle) = self.handles.remove(key.0) else {
            log::warn!("[Cache3State::remove_element] Element is no longer cached");
            return;
        };

        if self.elements_by_id.get(&handle.id) == Some(&key) {
            self.elements_by_id.remove(&handle.id);
        }
        self.memory_used -= handle.memory_size;

        match handle.placement {
            Some(Placement::Active(node)) => {
                self.actives.remove_by_reference(node);
            }
            Some(Placement::Archived(node)) => {
                self.archives.remove_by_reference(node);
            }
            None => {}
        }

        log::trace!("Evicting cached element '{}'", handle.id);
        if let Some(callback) = self.on_element_removed.as_mut() {
            callback(handle.element);
        }
        self.remove_count += 1;
    }

    /// Evicts archived elements, oldest first, until the budget is met or no
    /// evictable element remains.
    fn clean(&mut self) {
        let mut cursor = self.archives.first();
        while let Some(node) = cursor {
            if self.memory_used <= self.memory_allocated {
                break;
            }
            cursor = self.archives.next_of(node);

            let Some(&key) = self.archives.get(node) else {
                continue;
            };
            let evictable = self.handles.get(key.0).is_some_and(|h| h.n_locks == 0);
            if evictable {
                self.remove_element(key);
            }
        }
    }
}

impl<E, A> ResidencyMonitor for Cache3State<E, A> {
    fn monitor_id(&self) -> Cow<'static, str> {
        self.label.clone()
    }

    fn residency_report(&self) -> ResidencyReport {
        ResidencyReport {
            used_bytes: self.memory_used as u64,
            capacity_bytes: self.memory_allocated as u64,
            resident_count: self.handles.len(),
            pinned_count: self.actives.len(),
        }
    }
}
