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

//! The setting cache.
//!
//! A setting is one compiled piece of GPU state setup (a framebuffer binding, one pipeline
//! state category, one uniform upload). Settings are keyed by the identities of the state
//! groups they read from, shared between every entry that resolves the same key, and
//! evicted as soon as the last entry lets go of them.

use super::double_buffer::{BufferedCell, DoubleBuffer};
use super::error::{DrawListError, DrawListResult};
use ahash::AHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_core::renderer::{
    BufferId, CommandList, CommandSink, FragData, GpuCommand, Pipe, PipeId, PipelineState,
    ProgramId, StateError, StateReader, StateSlot, StateValue, Uniform, UniformId, VertexArrayId,
};

/// The kind of state a setting applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingCategory {
    /// The entry's own vertex array binding.
    VertexArray,
    /// The framebuffer made of the depth buffer and the program's outputs.
    Framebuffer,
    /// One generic pipeline state.
    PipelineState(PipelineState),
    /// One uniform of the entry's program.
    Uniform(UniformId),
}

/// The identity of a cached setting.
///
/// Two keys are equal when they name the same program, the same category and the same
/// dependency groups, compared by [`PipeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettingKey {
    pub program: Option<ProgramId>,
    pub category: SettingCategory,
    pub deps: Vec<PipeId>,
}

/// A read-only view over the dependency slots of a setting.
///
/// Holds either one group serving every slot, or one group per slot. Reading a slot the
/// setting did not declare is a [`StateError::NonDependentSlot`].
#[derive(Clone)]
pub struct DepView {
    slots: Vec<StateSlot>,
    pipes: Vec<Option<Arc<dyn Pipe>>>,
}

impl DepView {
    pub(crate) fn new(slots: Vec<StateSlot>, pipes: Vec<Option<Arc<dyn Pipe>>>) -> Self {
        Self { slots, pipes }
    }

    /// The dependency identities, for use in a [`SettingKey`].
    pub fn ids(&self) -> Vec<PipeId> {
        self.pipes
            .iter()
            .map(|pipe| pipe.as_ref().map_or(PipeId::NONE, |p| p.id()))
            .collect()
    }

    /// The declared dependency slots.
    pub fn slots(&self) -> &[StateSlot] {
        &self.slots
    }
}

impl StateReader for DepView {
    fn read(&self, slot: StateSlot) -> Result<Option<StateValue>, StateError> {
        let position = self
            .slots
            .iter()
            .position(|&s| s == slot)
            .ok_or(StateError::NonDependentSlot { slot })?;
        let pipe = if self.pipes.len() == 1 {
            &self.pipes[0]
        } else {
            match self.pipes.get(position) {
                Some(pipe) => pipe,
                None => return Err(StateError::NonDependentSlot { slot }),
            }
        };
        match pipe {
            Some(pipe) => pipe.read(slot),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for DepView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepView")
            .field("slots", &self.slots)
            .field("deps", &self.ids())
            .finish()
    }
}

/// What a setting compiles from.
#[derive(Debug, Clone)]
pub enum SettingSource {
    VertexArray {
        vertex_array: Option<VertexArrayId>,
        element_buffer: Option<BufferId>,
    },
    Framebuffer {
        outputs: Vec<FragData>,
        view: DepView,
    },
    PipelineState {
        state: PipelineState,
        view: DepView,
    },
    Uniform {
        program: ProgramId,
        uniform: Uniform,
        view: DepView,
    },
}

impl SettingSource {
    /// The category this source compiles into.
    pub fn category(&self) -> SettingCategory {
        match self {
            SettingSource::VertexArray { .. } => SettingCategory::VertexArray,
            SettingSource::Framebuffer { .. } => SettingCategory::Framebuffer,
            SettingSource::PipelineState { state, .. } => SettingCategory::PipelineState(*state),
            SettingSource::Uniform { uniform, .. } => SettingCategory::Uniform(uniform.id),
        }
    }

    fn compile(&self, out: &mut dyn CommandSink) -> Result<(), StateError> {
        match self {
            SettingSource::VertexArray {
                vertex_array,
                element_buffer,
            } => out.record(GpuCommand::BindVertexArray {
                vertex_array: *vertex_array,
                element_buffer: *element_buffer,
            }),
            SettingSource::Framebuffer { outputs, view } => {
                let reader: &dyn StateReader = view;
                let depth = reader.read(StateSlot::DEPTH_BUFFER)?;
                let colors = outputs
                    .iter()
                    .map(|output| (output.value)(reader))
                    .collect::<Result<Vec<_>, _>>()?;
                out.record(GpuCommand::BindFramebuffer { depth, colors });
            }
            SettingSource::PipelineState { state, view } => {
                out.record(GpuCommand::SetPipelineState {
                    state: *state,
                    value: view.read(state.slot())?,
                });
            }
            SettingSource::Uniform {
                program,
                uniform,
                view,
            } => {
                let reader: &dyn StateReader = view;
                out.record(GpuCommand::SetUniform {
                    program: *program,
                    uniform: uniform.id,
                    value: (uniform.value)(reader)?,
                });
            }
        }
        Ok(())
    }
}

/// A compiled, double-buffered piece of GPU state setup.
#[derive(Debug)]
pub struct Setting {
    key: Option<SettingKey>,
    source: SettingSource,
    cell: BufferedCell,
}

impl Setting {
    /// The cache key, or `None` for a setting private to one entry.
    pub fn key(&self) -> Option<&SettingKey> {
        self.key.as_ref()
    }

    pub fn category(&self) -> SettingCategory {
        self.source.category()
    }

    /// The command cell read by traversals.
    pub fn cell(&self) -> &BufferedCell {
        &self.cell
    }

    fn compile(&self) -> Result<CommandList, StateError> {
        let mut list = CommandList::new();
        self.source.compile(&mut list)?;
        Ok(list)
    }
}

/// An entry's counted reference to a [`Setting`].
///
/// Handles are not `Clone`: each one accounts for exactly one reference and must be
/// given back to [`SettingCache::release`].
#[derive(Debug)]
pub struct SettingHandle(Arc<Setting>);

impl SettingHandle {
    pub fn setting(&self) -> &Arc<Setting> {
        &self.0
    }

    /// Returns `true` if both handles refer to the same setting instance.
    pub fn ptr_eq(&self, other: &SettingHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Counters describing the cache's activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Acquires served by an existing setting.
    pub hits: u64,
    /// Acquires that created a new setting.
    pub misses: u64,
    /// Settings removed because their last reference was released.
    pub evictions: u64,
    /// Command lists compiled, including recompilations.
    pub compilations: u64,
    /// Settings currently cached.
    pub live: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    compilations: AtomicU64,
}

#[derive(Debug)]
struct CacheEntry {
    setting: Arc<Setting>,
    refs: usize,
}

/// Identity-keyed, reference-counted store of shared settings.
#[derive(Debug, Default)]
pub struct SettingCache {
    entries: AHashMap<SettingKey, CacheEntry>,
    /// Reverse index from a dependency group to the settings reading it.
    dependents: AHashMap<PipeId, Vec<Arc<Setting>>>,
    buffer: DoubleBuffer,
    counters: Counters,
}

impl SettingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The double buffer every setting cell of this cache belongs to.
    pub fn buffer(&self) -> &DoubleBuffer {
        &self.buffer
    }

    /// Returns the setting for `key`, creating and compiling it from `source` on a miss.
    ///
    /// Nothing is cached if compilation fails.
    pub fn acquire(
        &mut self,
        key: SettingKey,
        source: impl FnOnce() -> SettingSource,
    ) -> DrawListResult<SettingHandle> {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.refs += 1;
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("Setting {:?} shared ({} holders).", key, entry.refs);
            return Ok(SettingHandle(entry.setting.clone()));
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let setting = Arc::new(Setting {
            key: Some(key.clone()),
            source: source(),
            cell: self.buffer.cell(),
        });
        self.publish(&setting)?;
        self.index(&setting);
        log::trace!("Setting {:?} created.", key);
        self.entries.insert(
            key,
            CacheEntry {
                setting: setting.clone(),
                refs: 1,
            },
        );
        Ok(SettingHandle(setting))
    }

    /// Compiles a setting owned by a single entry. It is neither cached nor indexed.
    pub fn private(&self, source: SettingSource) -> Result<SettingHandle, StateError> {
        let setting = Arc::new(Setting {
            key: None,
            source,
            cell: self.buffer.cell(),
        });
        self.publish(&setting)?;
        Ok(SettingHandle(setting))
    }

    /// Gives back one reference. The setting is evicted when its count reaches zero.
    pub fn release(&mut self, handle: SettingHandle) -> DrawListResult<()> {
        let Some(key) = handle.0.key.as_ref() else {
            return Ok(());
        };
        let refs = match self.entries.get_mut(key) {
            Some(entry) if entry.refs > 0 && Arc::ptr_eq(&entry.setting, &handle.0) => {
                entry.refs -= 1;
                entry.refs
            }
            _ => return Err(DrawListError::ReleaseUnreferenced(format!("{key:?}"))),
        };
        if refs == 0 {
            self.entries.remove(key);
            self.unindex(&handle.0);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            log::trace!("Setting {:?} evicted.", key);
        }
        Ok(())
    }

    /// Recompiles every live setting reading from `pipe`.
    ///
    /// The new command lists are published as one batch and become visible to the next
    /// traversal. Returns the number of recompiled settings.
    pub fn recompile_dependents(&self, pipe: PipeId) -> DrawListResult<usize> {
        let Some(settings) = self.dependents.get(&pipe) else {
            return Ok(0);
        };
        let compiled = settings
            .iter()
            .map(|setting| setting.compile().map(|list| (setting, list)))
            .collect::<Result<Vec<_>, _>>()?;

        let batch = self.buffer.publish();
        for (setting, list) in compiled {
            batch.write(&setting.cell, list);
        }
        self.counters
            .compilations
            .fetch_add(settings.len() as u64, Ordering::Relaxed);
        log::debug!(
            "Recompiled {} setting(s) depending on {:?} for epoch {}.",
            settings.len(),
            pipe,
            batch.epoch()
        );
        Ok(settings.len())
    }

    /// The number of outstanding references on the setting behind `handle`.
    ///
    /// Returns `None` for private settings and for settings no longer cached.
    pub fn ref_count(&self, handle: &SettingHandle) -> Option<usize> {
        let key = handle.0.key.as_ref()?;
        self.entries
            .get(key)
            .filter(|entry| Arc::ptr_eq(&entry.setting, &handle.0))
            .map(|entry| entry.refs)
    }

    /// Returns `true` if a setting is cached under `key`.
    pub fn contains_key(&self, key: &SettingKey) -> bool {
        self.entries.contains_key(key)
    }

    /// The number of settings indexed under `pipe`.
    pub fn dependents_of(&self, pipe: PipeId) -> usize {
        self.dependents.get(&pipe).map_or(0, Vec::len)
    }

    /// The number of cached settings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            compilations: self.counters.compilations.load(Ordering::Relaxed),
            live: self.entries.len(),
        }
    }

    fn publish(&self, setting: &Setting) -> Result<(), StateError> {
        let list = setting.compile()?;
        self.buffer.publish().write(&setting.cell, list);
        self.counters.compilations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn index(&mut self, setting: &Arc<Setting>) {
        for pipe in Self::indexed_deps(setting) {
            self.dependents
                .entry(pipe)
                .or_default()
                .push(setting.clone());
        }
    }

    fn unindex(&mut self, setting: &Arc<Setting>) {
        for pipe in Self::indexed_deps(setting) {
            if let Some(list) = self.dependents.get_mut(&pipe) {
                list.retain(|s| !Arc::ptr_eq(s, setting));
                if list.is_empty() {
                    self.dependents.remove(&pipe);
                }
            }
        }
    }

    /// The distinct, assigned dependency ids of a keyed setting.
    fn indexed_deps(setting: &Setting) -> Vec<PipeId> {
        let mut deps: Vec<PipeId> = setting
            .key
            .iter()
            .flat_map(|key| key.deps.iter().copied())
            .filter(|pipe| !pipe.is_none())
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug)]
    struct TestPipe {
        id: PipeId,
        value: Mutex<Option<StateValue>>,
    }

    impl TestPipe {
        fn new(value: StateValue) -> Arc<Self> {
            Arc::new(Self {
                id: PipeId::next(),
                value: Mutex::new(Some(value)),
            })
        }
    }

    impl StateReader for TestPipe {
        fn read(&self, _slot: StateSlot) -> Result<Option<StateValue>, StateError> {
            Ok(self.value.lock().clone())
        }
    }

    impl Pipe for TestPipe {
        fn id(&self) -> PipeId {
            self.id
        }
    }

    fn blend_source(pipe: &Arc<TestPipe>) -> (SettingKey, SettingSource) {
        let view = DepView::new(vec![StateSlot::BLEND], vec![Some(pipe.clone() as Arc<dyn Pipe>)]);
        let key = SettingKey {
            program: None,
            category: SettingCategory::PipelineState(PipelineState::Blend),
            deps: view.ids(),
        };
        (
            key,
            SettingSource::PipelineState {
                state: PipelineState::Blend,
                view,
            },
        )
    }

    #[test]
    fn identical_keys_share_one_setting() {
        let mut cache = SettingCache::new();
        let pipe = TestPipe::new(StateValue::Bool(true));

        let (key, source) = blend_source(&pipe);
        let a = cache.acquire(key.clone(), || source.clone()).unwrap();
        let b = cache.acquire(key, || unreachable!("cached")).unwrap();

        assert!(a.ptr_eq(&b));
        assert_eq!(cache.ref_count(&a), Some(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.dependents_of(pipe.id), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                evictions: 0,
                compilations: 1,
                live: 1
            }
        );
    }

    #[test]
    fn last_release_evicts_and_next_acquire_recompiles() {
        let mut cache = SettingCache::new();
        let pipe = TestPipe::new(StateValue::Bool(false));
        let (key, source) = blend_source(&pipe);

        let a = cache.acquire(key.clone(), || source.clone()).unwrap();
        let first = a.setting().clone();
        cache.release(a).unwrap();
        assert!(!cache.contains_key(&key));
        assert_eq!(cache.dependents_of(pipe.id), 0);

        let b = cache.acquire(key, || source.clone()).unwrap();
        assert!(!Arc::ptr_eq(&first, b.setting()));
        assert_eq!(cache.stats().compilations, 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn releasing_an_evicted_setting_is_a_fault() {
        let mut cache = SettingCache::new();
        let pipe = TestPipe::new(StateValue::Bool(false));
        let (key, source) = blend_source(&pipe);

        let a = cache.acquire(key.clone(), || source.clone()).unwrap();
        let stale = SettingHandle(a.setting().clone());
        cache.release(a).unwrap();

        let err = cache.release(stale).unwrap_err();
        assert!(matches!(err, DrawListError::ReleaseUnreferenced(_)));
        assert!(err.is_usage_violation());
    }

    #[test]
    fn failed_compilation_caches_nothing() {
        let mut cache = SettingCache::new();
        let pipe = TestPipe::new(StateValue::Bool(false));
        // Reads a slot the view does not declare.
        let view = DepView::new(vec![StateSlot::CULL_FACE], vec![Some(pipe as Arc<dyn Pipe>)]);
        let key = SettingKey {
            program: None,
            category: SettingCategory::PipelineState(PipelineState::Blend),
            deps: view.ids(),
        };
        let err = cache
            .acquire(key.clone(), || SettingSource::PipelineState {
                state: PipelineState::Blend,
                view,
            })
            .unwrap_err();

        assert!(matches!(
            err,
            DrawListError::Render(tessera_core::renderer::RenderError::State(
                StateError::NonDependentSlot { .. }
            ))
        ));
        assert!(!cache.contains_key(&key));
    }

    #[test]
    fn dependents_are_recompiled_for_the_next_epoch() {
        let mut cache = SettingCache::new();
        let pipe = TestPipe::new(StateValue::Bool(false));
        let (key, source) = blend_source(&pipe);
        let handle = cache.acquire(key, || source.clone()).unwrap();

        let guard = cache.buffer().acquire();
        *pipe.value.lock() = Some(StateValue::Bool(true));
        assert_eq!(cache.recompile_dependents(pipe.id).unwrap(), 1);

        let expect = |value: bool| {
            vec![GpuCommand::SetPipelineState {
                state: PipelineState::Blend,
                value: Some(StateValue::Bool(value)),
            }]
        };
        let current = handle.setting().cell().read(&guard).unwrap();
        assert_eq!(current.commands(), expect(false).as_slice());
        drop(guard);

        let guard = cache.buffer().acquire();
        let current = handle.setting().cell().read(&guard).unwrap();
        assert_eq!(current.commands(), expect(true).as_slice());
    }

    #[test]
    fn multi_group_views_route_reads_per_slot() {
        let depth = TestPipe::new(StateValue::Int(1));
        let color = TestPipe::new(StateValue::Int(2));
        let view = DepView::new(
            vec![StateSlot::DEPTH_BUFFER, StateSlot::user(0)],
            vec![
                Some(depth.clone() as Arc<dyn Pipe>),
                Some(color.clone() as Arc<dyn Pipe>),
            ],
        );
        assert_eq!(view.ids(), vec![depth.id, color.id]);
        assert_eq!(
            view.read(StateSlot::DEPTH_BUFFER).unwrap(),
            Some(StateValue::Int(1))
        );
        assert_eq!(view.read(StateSlot::user(0)).unwrap(), Some(StateValue::Int(2)));
        assert_eq!(
            view.read(StateSlot::BLEND),
            Err(StateError::NonDependentSlot {
                slot: StateSlot::BLEND
            })
        );
    }
}
