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

//! # Draw List
//!
//! Keeps a set of drawables as an ordered sequence of compiled GPU commands.
//!
//! Entries are ordered by a sort id handed out on insertion. Each entry resolves a program
//! and one shared [`Setting`](setting::Setting) per state category, and stores the
//! commands that take the GPU from its predecessor's state to its own. A traversal then
//! only replays what differs between neighbours.
//!
//! Mutation (`add`, `remove`, `update`, `dispose`) needs `&mut self` and comes from one
//! update actor. [`DrawList::execute`] and [`DrawList::recompile_dependents`] only need
//! `&self`; they synchronise through the epoch of the setting cells.

mod double_buffer;
mod error;
mod executor;
mod setting;
mod slot_render;
mod transition;
mod tree;

#[cfg(test)]
mod tests;

pub use self::double_buffer::{BufferedCell, DoubleBuffer, EpochGuard, Publish};
pub use self::error::{DrawListError, DrawListResult};
pub use self::executor::BaseState;
pub use self::setting::{
    CacheStats, DepView, Setting, SettingCache, SettingCategory, SettingHandle, SettingKey,
    SettingSource,
};
pub use self::transition::Transition;
pub use self::tree::{NodeId, SortTree, TreeError};

use self::transition::{compile_transition, DrawSlot, IDX_VAO};
use ahash::AHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_core::renderer::{
    Drawable, DrawListSettings, EnvironmentId, GroupPipe, PipeId, ProgramId, RenderEnvironment,
};

/// The caller-side identity of a drawable in a draw list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

impl SlotId {
    /// Allocates a fresh identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SlotId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A drawable together with the resolved state it is drawn with.
#[derive(Clone)]
pub struct RenderSlot {
    id: SlotId,
    drawable: Arc<dyn Drawable>,
    state: Arc<dyn GroupPipe>,
}

impl RenderSlot {
    /// Creates a slot with a fresh identity.
    pub fn new(drawable: Arc<dyn Drawable>, state: Arc<dyn GroupPipe>) -> Self {
        Self {
            id: SlotId::next(),
            drawable,
            state,
        }
    }

    /// The same slot drawn with another state.
    pub fn with_state(&self, state: Arc<dyn GroupPipe>) -> Self {
        Self {
            id: self.id,
            drawable: self.drawable.clone(),
            state,
        }
    }

    /// The identity the slot is tracked under in a list.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// The object asked to record the draw call.
    pub fn drawable(&self) -> &Arc<dyn Drawable> {
        &self.drawable
    }

    /// The resolved state the slot is drawn with.
    pub fn state(&self) -> &Arc<dyn GroupPipe> {
        &self.state
    }
}

impl fmt::Debug for RenderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderSlot")
            .field("id", &self.id)
            .field("state", &self.state.id())
            .finish_non_exhaustive()
    }
}

/// An ordered, incrementally compiled list of draw calls.
pub struct DrawList {
    env: Arc<dyn RenderEnvironment>,
    settings: DrawListSettings,
    tree: SortTree<DrawSlot>,
    slots: AHashMap<SlotId, NodeId>,
    cache: SettingCache,
    next_sort_id: u64,
    disposed: bool,
}

impl DrawList {
    /// Creates an empty list for `env` with default settings.
    pub fn new(env: Arc<dyn RenderEnvironment>) -> Self {
        Self::with_settings(env, DrawListSettings::default())
    }

    /// Creates an empty list for `env`, tuned by `settings`.
    pub fn with_settings(env: Arc<dyn RenderEnvironment>, settings: DrawListSettings) -> Self {
        log::debug!(
            "Creating draw list for environment {:?} ({} expected entries).",
            env.id(),
            settings.expected_entries
        );
        Self {
            tree: SortTree::with_capacity(settings.expected_entries),
            slots: AHashMap::with_capacity(settings.expected_entries),
            env,
            settings,
            cache: SettingCache::new(),
            next_sort_id: 0,
            disposed: false,
        }
    }

    /// Adds `slot` at the end of the sort order.
    ///
    /// The slot's drawable is asked to record its draw call once, with the slot's state.
    /// On failure the list is left as it was.
    pub fn add(&mut self, slot: RenderSlot) -> DrawListResult<()> {
        self.ensure_live()?;
        let id = slot.id;
        if self.slots.contains_key(&id) {
            return Err(DrawListError::AlreadyPresent(id));
        }
        let sort_id = self.next_sort_id;

        let entry = DrawSlot::build(self.env.as_ref(), &mut self.cache, slot)?;
        self.next_sort_id += 1;
        let node = self.tree.insert(sort_id, entry)?;
        self.slots.insert(id, node);

        let prev = self.tree.prev(node);
        self.recompile(prev, node);
        if let Some(next) = self.tree.next(node) {
            self.recompile(Some(node), next);
        }
        log::debug!("Added slot {id:?} with sort id {sort_id}.");

        self.check()
    }

    /// Removes the slot `id` and hands it back.
    ///
    /// The successor's transition is recompiled against the new predecessor, and every
    /// setting reference and program lock held by the entry is released.
    pub fn remove(&mut self, id: SlotId) -> DrawListResult<RenderSlot> {
        self.ensure_live()?;
        let node = self
            .slots
            .remove(&id)
            .ok_or(DrawListError::UnknownSlot(id))?;
        let prev = self.tree.prev(node);
        let next = self.tree.next(node);
        let entry = self
            .tree
            .remove(node)
            .ok_or(DrawListError::UnknownSlot(id))?;
        if let Some(next) = next {
            self.recompile(prev, next);
        }
        log::debug!("Removed slot {id:?}.");

        let slot = entry.release(&mut self.cache)?;
        self.check()?;
        Ok(slot)
    }

    /// Replaces the entry of `slot` by removing it and adding it again.
    ///
    /// The entry moves to the end of the sort order. If adding fails, the slot is no
    /// longer in the list.
    pub fn update(&mut self, slot: RenderSlot) -> DrawListResult<()> {
        self.remove(slot.id)?;
        self.add(slot)
    }

    /// Recompiles every shared setting reading from the state group `pipe`.
    ///
    /// The new commands are visible to the next traversal. Returns the number of
    /// recompiled settings.
    pub fn recompile_dependents(&self, pipe: PipeId) -> DrawListResult<usize> {
        self.ensure_live()?;
        self.cache.recompile_dependents(pipe)
    }

    /// Releases every entry, setting and program lock.
    ///
    /// Every later operation fails with [`DrawListError::Disposed`].
    pub fn dispose(&mut self) -> DrawListResult<()> {
        self.ensure_live()?;
        self.disposed = true;

        let mut first_error = None;
        let mut released = 0;
        while let Some(node) = self.tree.first() {
            let Some(entry) = self.tree.remove(node) else {
                break;
            };
            released += 1;
            if let Err(err) = entry.release(&mut self.cache) {
                first_error.get_or_insert(err);
            }
        }
        self.slots.clear();

        if !self.cache.is_empty() {
            log::warn!(
                "{} setting(s) still cached after disposing the draw list.",
                self.cache.len()
            );
        }
        log::debug!("Disposed draw list ({released} entries).");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Checks the ordering and balance invariants of the list.
    pub fn verify(&self) -> DrawListResult<()> {
        self.tree.verify()?;
        if self.slots.len() != self.tree.len() {
            return Err(TreeError::CountMismatch {
                reached: self.tree.len(),
                tracked: self.slots.len(),
            }
            .into());
        }
        Ok(())
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the list holds no entry.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns `true` once [`dispose`](DrawList::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Returns `true` if `id` is in the list.
    pub fn contains(&self, id: SlotId) -> bool {
        self.slots.contains_key(&id)
    }

    /// The environment the list compiles for.
    pub fn environment(&self) -> EnvironmentId {
        self.env.id()
    }

    /// The settings the list was created with.
    pub fn settings(&self) -> &DrawListSettings {
        &self.settings
    }

    /// The slots in traversal order.
    pub fn slots_in_order(&self) -> Vec<SlotId> {
        self.tree.iter().map(|(_, entry)| entry.slot.id).collect()
    }

    /// The compiled transition of `id`.
    pub fn transition(&self, id: SlotId) -> Option<&Transition> {
        self.entry(id).map(|entry| &entry.transition)
    }

    /// The program resolved for `id`.
    pub fn program(&self, id: SlotId) -> Option<ProgramId> {
        self.entry(id).map(|entry| entry.program.id())
    }

    /// The reference count of the setting `id` holds at `category_index`.
    ///
    /// Returns `None` for the entry's private vertex array setting.
    pub fn ref_count(&self, id: SlotId, category_index: usize) -> Option<usize> {
        let entry = self.entry(id)?;
        let handle = entry.settings.get(category_index)?;
        self.cache.ref_count(handle)
    }

    /// Counters of the shared setting cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The base state a traversal of the current list must start from.
    pub fn base_state(&self) -> Option<BaseState> {
        let entry = self.tree.first().and_then(|first| self.tree.get(first))?;
        debug_assert_eq!(
            entry.settings.get(IDX_VAO).map(|handle| handle.setting().category()),
            Some(SettingCategory::VertexArray)
        );
        Some(BaseState {
            environment: self.env.id(),
            program: Some(entry.program.id()),
            vertex_array: Some(entry.vertex_array),
            element_buffer: entry.element_buffer,
        })
    }

    fn entry(&self, id: SlotId) -> Option<&DrawSlot> {
        self.slots.get(&id).and_then(|&node| self.tree.get(node))
    }

    fn ensure_live(&self) -> DrawListResult<()> {
        if self.disposed {
            Err(DrawListError::Disposed)
        } else {
            Ok(())
        }
    }

    fn check(&self) -> DrawListResult<()> {
        if self.settings.verify_on_mutation {
            self.verify()?;
        }
        Ok(())
    }

    /// Recompiles the transition of `node` against `prev`.
    fn recompile(&mut self, prev: Option<NodeId>, node: NodeId) {
        let Some(current) = self.tree.get(node) else {
            return;
        };
        let transition = compile_transition(prev.and_then(|p| self.tree.get(p)), current);
        if self.settings.log_transitions {
            log::trace!(
                "Slot {:?}: {} setting(s){}.",
                current.slot.id,
                transition.setting_count(),
                if transition.switches_program() {
                    " after a program switch"
                } else {
                    ""
                }
            );
        }
        if let Some(current) = self.tree.get_mut(node) {
            current.transition = transition;
        }
    }
}

impl Drop for DrawList {
    fn drop(&mut self) {
        if !self.disposed {
            if let Err(err) = self.dispose() {
                log::warn!("Tearing down the draw list failed: {err}");
            }
        }
    }
}

impl fmt::Debug for DrawList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawList")
            .field("environment", &self.env.id())
            .field("entries", &self.tree.len())
            .field("settings", &self.cache.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}
