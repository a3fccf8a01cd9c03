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

//! Linked GPU programs and the variables they require.

use crate::renderer::api::state::{StateReader, StateSlot, StateValue};
use crate::renderer::error::{ProgramError, StateError};
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// An opaque handle representing a shader contributed by one piece of state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub usize);

/// An opaque handle representing a linked program.
///
/// Environments never reuse program ids, so the id doubles as the program's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub usize);

/// Identifies a uniform variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformId(pub usize);

/// Computes a variable's value from the state slots it depends on.
pub type ValueFn =
    Arc<dyn Fn(&dyn StateReader) -> Result<Option<StateValue>, StateError> + Send + Sync>;

fn read_slot(slot: StateSlot) -> ValueFn {
    Arc::new(move |state: &dyn StateReader| state.read(slot))
}

/// A uniform variable required by a program.
#[derive(Clone)]
pub struct Uniform {
    /// The identity of the variable.
    pub id: UniformId,
    /// A debug name.
    pub name: Cow<'static, str>,
    /// The slots the value is computed from.
    pub deps: Vec<StateSlot>,
    /// Computes the value from a view over `deps`.
    pub value: ValueFn,
}

impl Uniform {
    /// Creates a uniform computed by `value` from `deps`.
    pub fn new(
        id: UniformId,
        name: impl Into<Cow<'static, str>>,
        deps: Vec<StateSlot>,
        value: ValueFn,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            deps,
            value,
        }
    }

    /// Creates a uniform whose value is the content of a single slot.
    pub fn from_slot(id: UniformId, name: impl Into<Cow<'static, str>>, slot: StateSlot) -> Self {
        Self::new(id, name, vec![slot], read_slot(slot))
    }
}

impl fmt::Debug for Uniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uniform")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

/// An output target written by a program's fragment stage.
#[derive(Clone)]
pub struct FragData {
    /// A debug name.
    pub name: Cow<'static, str>,
    /// The slots the target is computed from.
    pub deps: Vec<StateSlot>,
    /// Computes the target from a view over `deps`.
    pub value: ValueFn,
}

impl FragData {
    /// Creates an output computed by `value` from `deps`.
    pub fn new(name: impl Into<Cow<'static, str>>, deps: Vec<StateSlot>, value: ValueFn) -> Self {
        Self {
            name: name.into(),
            deps,
            value,
        }
    }

    /// Creates an output whose target is the content of a single slot.
    pub fn from_slot(name: impl Into<Cow<'static, str>>, slot: StateSlot) -> Self {
        Self::new(name, vec![slot], read_slot(slot))
    }
}

impl fmt::Debug for FragData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragData")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

/// What a single shader contributes to a linked program.
#[derive(Debug, Clone, Default)]
pub struct ShaderDefinition {
    /// Uniform variables the shader reads.
    pub uniforms: Vec<Uniform>,
    /// Output targets the shader writes.
    pub outputs: Vec<FragData>,
}

/// A linked program.
///
/// Programs are shared between every entry that resolves to the same shader
/// combination. Each entry pins the program with [`lock`](Program::lock) for its
/// whole lifetime and releases it exactly once with [`unlock`](Program::unlock).
#[derive(Debug)]
pub struct Program {
    id: ProgramId,
    shaders: Vec<ShaderId>,
    uniforms: Vec<Uniform>,
    outputs: Vec<FragData>,
    locks: AtomicUsize,
}

impl Program {
    /// Creates an unlocked program.
    pub fn new(
        id: ProgramId,
        shaders: Vec<ShaderId>,
        uniforms: Vec<Uniform>,
        outputs: Vec<FragData>,
    ) -> Self {
        Self {
            id,
            shaders,
            uniforms,
            outputs,
            locks: AtomicUsize::new(0),
        }
    }

    /// The identity of the program.
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// The shader combination this program was linked from.
    pub fn shaders(&self) -> &[ShaderId] {
        &self.shaders
    }

    /// The uniforms the program requires, in setting order.
    pub fn uniforms(&self) -> &[Uniform] {
        &self.uniforms
    }

    /// The output targets the program writes.
    pub fn outputs(&self) -> &[FragData] {
        &self.outputs
    }

    /// Pins the program.
    pub fn lock(&self) {
        let count = self.locks.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("Program {:?} locked ({count} holders).", self.id);
    }

    /// Releases one pin.
    ///
    /// Unlocking a program that is not locked is a [`ProgramError::LockImbalance`].
    pub fn unlock(&self) -> Result<(), ProgramError> {
        match self
            .locks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => {
                log::trace!("Program {:?} unlocked ({} holders).", self.id, previous - 1);
                Ok(())
            }
            Err(_) => Err(ProgramError::LockImbalance { program: self.id }),
        }
    }

    /// The number of outstanding pins.
    pub fn lock_count(&self) -> usize {
        self.locks.load(Ordering::Acquire)
    }

    /// Returns `true` while at least one holder pins the program.
    pub fn is_locked(&self) -> bool {
        self.lock_count() > 0
    }
}
