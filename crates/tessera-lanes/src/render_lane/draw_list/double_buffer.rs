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

//! Epoch-gated double buffering of compiled command lists.
//!
//! A [`DoubleBuffer`] owns the single epoch counter shared by many [`BufferedCell`]s.
//! The render side brackets a traversal with [`DoubleBuffer::acquire`] and
//! [`EpochGuard::submit`]; the update side writes new generations through a [`Publish`]
//! batch. Everything written in one batch becomes visible to the next traversal at once,
//! and never to a traversal that is already running.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use tessera_core::renderer::CommandList;

#[derive(Debug, Default)]
struct EpochState {
    /// The epoch of the latest traversal.
    epoch: u64,
    /// Whether a traversal is in progress.
    reading: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<EpochState>,
    turn: Condvar,
}

/// The shared epoch of a family of [`BufferedCell`]s.
#[derive(Debug, Clone, Default)]
pub struct DoubleBuffer {
    shared: Arc<Shared>,
}

impl DoubleBuffer {
    /// Creates a buffer at epoch zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The epoch of the latest traversal.
    pub fn epoch(&self) -> u64 {
        self.shared.state.lock().epoch
    }

    /// Creates an empty cell.
    pub fn cell(&self) -> BufferedCell {
        BufferedCell::default()
    }

    /// Starts a traversal.
    ///
    /// Blocks while another traversal is running or while a [`Publish`] batch is open.
    pub fn acquire(&self) -> EpochGuard<'_> {
        let mut state = self.shared.state.lock();
        while state.reading {
            self.shared.turn.wait(&mut state);
        }
        state.epoch += 1;
        state.reading = true;
        log::trace!("Draw list epoch {} acquired.", state.epoch);
        EpochGuard {
            shared: &self.shared,
            epoch: state.epoch,
        }
    }

    /// Starts a traversal if that can be done without blocking.
    pub fn try_acquire(&self) -> Option<EpochGuard<'_>> {
        let mut state = self.shared.state.try_lock()?;
        if state.reading {
            return None;
        }
        state.epoch += 1;
        state.reading = true;
        log::trace!("Draw list epoch {} acquired.", state.epoch);
        Some(EpochGuard {
            shared: &self.shared,
            epoch: state.epoch,
        })
    }

    /// Opens a write batch.
    ///
    /// Traversals cannot start while the batch is open.
    pub fn publish(&self) -> Publish<'_> {
        Publish {
            state: self.shared.state.lock(),
        }
    }
}

/// The render side's hold on one epoch.
///
/// Dropping the guard has the same effect as [`submit`](EpochGuard::submit).
pub struct EpochGuard<'a> {
    shared: &'a Shared,
    epoch: u64,
}

impl EpochGuard<'_> {
    /// The epoch this traversal reads at.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Ends the traversal and returns its epoch.
    pub fn submit(self) -> u64 {
        self.epoch
    }
}

impl Drop for EpochGuard<'_> {
    fn drop(&mut self) {
        self.shared.state.lock().reading = false;
        self.shared.turn.notify_all();
        log::trace!("Draw list epoch {} submitted.", self.epoch);
    }
}

impl fmt::Debug for EpochGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochGuard")
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// An open write batch.
pub struct Publish<'a> {
    state: MutexGuard<'a, EpochState>,
}

impl Publish<'_> {
    /// The epoch at which writes of this batch become visible.
    pub fn epoch(&self) -> u64 {
        self.state.epoch + 1
    }

    /// Stores `commands` as the pending generation of `cell`.
    pub fn write(&self, cell: &BufferedCell, commands: CommandList) {
        let tag = self.epoch();
        let mut slots = cell.slots.lock();
        let target = match slots
            .iter()
            .position(|slot| matches!(slot, Some(generation) if generation.epoch == tag))
        {
            Some(pending) => pending,
            None => {
                // Keep the newest visible generation; a running traversal may still read it.
                let age = |i: usize| slots[i].as_ref().map_or(0, |g: &Generation| g.epoch);
                if age(0) <= age(1) {
                    0
                } else {
                    1
                }
            }
        };
        slots[target] = Some(Generation {
            epoch: tag,
            commands: Arc::new(commands),
        });
    }
}

#[derive(Debug, Clone)]
struct Generation {
    epoch: u64,
    commands: Arc<CommandList>,
}

/// Two generations of one compiled command list.
#[derive(Debug, Default)]
pub struct BufferedCell {
    slots: Mutex<[Option<Generation>; 2]>,
}

impl BufferedCell {
    /// The newest generation visible at the guard's epoch.
    pub fn read(&self, guard: &EpochGuard<'_>) -> Option<Arc<CommandList>> {
        self.read_at(guard.epoch())
    }

    /// The newest generation visible at `epoch`.
    pub fn read_at(&self, epoch: u64) -> Option<Arc<CommandList>> {
        let slots = self.slots.lock();
        slots
            .iter()
            .flatten()
            .filter(|generation| generation.epoch <= epoch)
            .max_by_key(|generation| generation.epoch)
            .map(|generation| generation.commands.clone())
    }

    /// The most recently written generation, visible or not.
    pub fn latest(&self) -> Option<Arc<CommandList>> {
        let slots = self.slots.lock();
        slots
            .iter()
            .flatten()
            .max_by_key(|generation| generation.epoch)
            .map(|generation| generation.commands.clone())
    }
}
