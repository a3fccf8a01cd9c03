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

use super::error::{DrawListError, DrawListResult};
use super::transition::IDX_FBO;
use super::DrawList;
use tessera_core::renderer::{BufferId, CommandSink, EnvironmentId, ProgramId, VertexArrayId};

/// The GPU state a traversal starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseState {
    /// The environment the sink records for.
    pub environment: EnvironmentId,
    /// The program bound before the traversal.
    pub program: Option<ProgramId>,
    /// The vertex array bound before the traversal.
    pub vertex_array: Option<VertexArrayId>,
    /// The element buffer bound before the traversal.
    pub element_buffer: Option<BufferId>,
}

impl DrawList {
    /// Replays the whole list into `sink`, in sort order.
    ///
    /// `base` must describe the environment of the list and the program and vertex array
    /// of its first entry (see [`DrawList::base_state`]). The first entry's remaining
    /// settings are replayed ahead of its compiled commands, then every entry's compiled
    /// commands follow.
    ///
    /// Blocks while another traversal or a setting update is in progress. Returns the
    /// number of entries replayed.
    pub fn execute(&self, sink: &mut dyn CommandSink, base: &BaseState) -> DrawListResult<usize> {
        self.ensure_live()?;
        let environment = self.env.id();
        if base.environment != environment {
            return Err(DrawListError::EnvironmentMismatch {
                expected: environment,
                found: base.environment,
            });
        }

        let guard = self.cache.buffer().acquire();
        let Some(first) = self.tree.first() else {
            guard.submit();
            return Ok(0);
        };
        let Some(entry) = self.tree.get(first) else {
            return Ok(0);
        };

        if base.program != Some(entry.program.id()) {
            return Err(DrawListError::ProgramMismatch {
                expected: entry.program.id(),
                found: base.program,
            });
        }
        if base.vertex_array != Some(entry.vertex_array) {
            return Err(DrawListError::VertexArrayMismatch {
                expected: entry.vertex_array,
                found: base.vertex_array,
            });
        }
        if base.element_buffer != entry.element_buffer {
            return Err(DrawListError::ElementBufferMismatch {
                expected: entry.element_buffer,
                found: base.element_buffer,
            });
        }

        for handle in entry.settings.iter().skip(IDX_FBO) {
            if let Some(list) = handle.setting().cell().read(&guard) {
                sink.call_list(&list);
            }
        }

        let mut replayed = 0;
        let mut cursor = Some(first);
        while let Some(node) = cursor {
            if let Some(entry) = self.tree.get(node) {
                entry.transition.replay(sink, &guard);
                replayed += 1;
            }
            cursor = self.tree.next(node);
        }

        let epoch = guard.submit();
        log::trace!("Replayed {replayed} draw list entries at epoch {epoch}.");
        Ok(replayed)
    }
}
