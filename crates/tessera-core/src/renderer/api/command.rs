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

//! Defines the recorded GPU operations and the lists they are stored in.

use crate::renderer::api::program::{ProgramId, UniformId};
use crate::renderer::api::resource::{BufferId, VertexArrayId};
use crate::renderer::api::state::{PipelineState, StateValue};
use crate::renderer::traits::CommandSink;

/// The primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    /// Independent points.
    Points,
    /// Independent line segments.
    Lines,
    /// A connected line strip.
    LineStrip,
    /// Independent triangles.
    Triangles,
    /// A triangle strip.
    TriangleStrip,
    /// A triangle fan.
    TriangleFan,
}

/// The format of the indices in an element buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    Uint16,
    /// 32-bit unsigned indices.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub fn size(self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// A single recorded GPU operation.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Switches the active program. `from` is the program being replaced, if known,
    /// so a backend can perform whatever fixed setup the switch requires.
    UseProgram {
        /// The program active before the switch.
        from: Option<ProgramId>,
        /// The program to activate.
        to: ProgramId,
    },
    /// Binds a vertex array and its element buffer.
    BindVertexArray {
        /// The vertex array, or `None` to unbind.
        vertex_array: Option<VertexArrayId>,
        /// The element buffer, or `None` for non-indexed geometry.
        element_buffer: Option<BufferId>,
    },
    /// Binds the framebuffer made of a depth attachment and the program's color outputs.
    BindFramebuffer {
        /// The depth attachment, if any.
        depth: Option<StateValue>,
        /// One entry per program output.
        colors: Vec<Option<StateValue>>,
    },
    /// Applies one generic pipeline-state category.
    SetPipelineState {
        /// The category being applied.
        state: PipelineState,
        /// The new value, or `None` to restore the default.
        value: Option<StateValue>,
    },
    /// Uploads one uniform of a program.
    SetUniform {
        /// The program owning the uniform.
        program: ProgramId,
        /// The uniform variable.
        uniform: UniformId,
        /// The new value, or `None` to restore the default.
        value: Option<StateValue>,
    },
    /// Draws non-indexed primitives.
    DrawArrays {
        /// The primitive topology.
        mode: PrimitiveMode,
        /// The first vertex.
        first: u32,
        /// The number of vertices.
        count: u32,
    },
    /// Draws indexed primitives from the bound element buffer.
    DrawElements {
        /// The primitive topology.
        mode: PrimitiveMode,
        /// The number of indices.
        count: u32,
        /// The format of the indices.
        format: IndexFormat,
        /// Byte offset into the element buffer.
        offset: u64,
    },
}

impl GpuCommand {
    /// Returns `true` for draw calls.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            GpuCommand::DrawArrays { .. } | GpuCommand::DrawElements { .. }
        )
    }
}

/// An ordered, immutable-once-built sequence of [`GpuCommand`]s.
///
/// A `CommandList` is itself a [`CommandSink`], which is how settings and entries
/// record their commands before they are shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<GpuCommand>,
}

impl CommandList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn push(&mut self, command: GpuCommand) {
        self.commands.push(command);
    }

    /// The number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no command was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterates over the commands in recording order.
    pub fn iter(&self) -> std::slice::Iter<'_, GpuCommand> {
        self.commands.iter()
    }

    /// The commands as a slice.
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }
}

impl CommandSink for CommandList {
    fn record(&mut self, command: GpuCommand) {
        self.commands.push(command);
    }

    fn call_list(&mut self, list: &CommandList) {
        self.commands.extend_from_slice(&list.commands);
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a GpuCommand;
    type IntoIter = std::slice::Iter<'a, GpuCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

impl FromIterator<GpuCommand> for CommandList {
    fn from_iter<I: IntoIterator<Item = GpuCommand>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}
