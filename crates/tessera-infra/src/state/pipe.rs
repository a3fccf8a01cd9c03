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

use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tessera_core::renderer::{
    Pipe, PipeId, ShaderId, StateError, StateReader, StateSlot, StateValue,
};

/// The content of one slot of a [`StatePipe`].
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    /// The value is available.
    Ready(StateValue),
    /// The value exists but cannot be produced yet.
    Pending,
}

/// A group of state slots with a stable identity.
///
/// Values can be changed in place with [`StatePipe::set`]; the identity does not change,
/// so settings that depend on the group must be recompiled explicitly.
#[derive(Debug)]
pub struct StatePipe {
    id: PipeId,
    values: RwLock<AHashMap<StateSlot, SlotValue>>,
    shaders: AHashMap<StateSlot, ShaderId>,
}

impl StatePipe {
    /// Starts building a group.
    pub fn builder() -> StatePipeBuilder {
        StatePipeBuilder::default()
    }

    /// Replaces the value of `slot`.
    pub fn set(&self, slot: StateSlot, value: SlotValue) {
        self.values.write().insert(slot, value);
    }

    /// Every slot this group defines, sorted.
    pub fn slots(&self) -> Vec<StateSlot> {
        let values = self.values.read();
        let mut slots: Vec<StateSlot> = values
            .keys()
            .chain(self.shaders.keys())
            .copied()
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    /// The shader this group contributes for `slot`, if any.
    pub fn shader(&self, slot: StateSlot) -> Option<ShaderId> {
        self.shaders.get(&slot).copied()
    }
}

impl StateReader for StatePipe {
    fn read(&self, slot: StateSlot) -> Result<Option<StateValue>, StateError> {
        match self.values.read().get(&slot) {
            Some(SlotValue::Ready(value)) => Ok(Some(value.clone())),
            Some(SlotValue::Pending) => Err(StateError::NotReady { slot }),
            None => Ok(None),
        }
    }
}

impl Pipe for StatePipe {
    fn id(&self) -> PipeId {
        self.id
    }
}

/// Builder for [`StatePipe`].
#[derive(Debug, Default)]
pub struct StatePipeBuilder {
    values: AHashMap<StateSlot, SlotValue>,
    shaders: AHashMap<StateSlot, ShaderId>,
}

impl StatePipeBuilder {
    /// Sets a ready value.
    pub fn value(mut self, slot: StateSlot, value: StateValue) -> Self {
        self.values.insert(slot, SlotValue::Ready(value));
        self
    }

    /// Marks a slot as not ready yet.
    pub fn pending(mut self, slot: StateSlot) -> Self {
        self.values.insert(slot, SlotValue::Pending);
        self
    }

    /// Declares the shader the group contributes for `slot`.
    pub fn shader(mut self, slot: StateSlot, shader: ShaderId) -> Self {
        self.shaders.insert(slot, shader);
        self
    }

    /// Builds the group under a fresh identity.
    pub fn build(self) -> Arc<StatePipe> {
        Arc::new(StatePipe {
            id: PipeId::next(),
            values: RwLock::new(self.values),
            shaders: self.shaders,
        })
    }
}
