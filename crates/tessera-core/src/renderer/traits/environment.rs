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

use crate::renderer::api::model::{IndexBuffer, Model};
use crate::renderer::api::program::{Program, ShaderId};
use crate::renderer::api::resource::{BufferId, EnvironmentId, VertexArrayId};
use crate::renderer::error::{ProgramError, ResourceError};
use std::sync::Arc;

/// The device-side services a draw list depends on.
///
/// An environment compiles programs and prepares geometry. Both are treated as
/// black boxes: the draw list only relies on the identity of what comes back.
pub trait RenderEnvironment: Send + Sync {
    /// The identity of this environment.
    fn id(&self) -> EnvironmentId;

    /// Resolves the program for an ordered shader combination.
    ///
    /// The same combination must always resolve to the same [`Program`] instance for
    /// as long as any holder keeps it locked.
    fn program_for(&self, shaders: &[ShaderId]) -> Result<Arc<Program>, ProgramError>;

    /// Prepares the vertex array binding `model`'s geometry to `program`'s inputs.
    fn prepare_model(&self, model: &Model, program: &Program)
        -> Result<VertexArrayId, ResourceError>;

    /// Prepares the element buffer holding `indices`.
    fn prepare_indices(&self, indices: &IndexBuffer) -> Result<BufferId, ResourceError>;
}
