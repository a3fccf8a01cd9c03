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

use super::tree::TreeError;
use super::SlotId;
use tessera_core::renderer::{
    BufferId, EnvironmentId, ProgramError, ProgramId, RenderError, StateError, VertexArrayId,
};
use thiserror::Error;

/// Errors raised by [`DrawList`](super::DrawList) operations.
#[derive(Error, Debug)]
pub enum DrawListError {
    #[error("The draw list has been disposed")]
    Disposed,
    #[error("Slot {0:?} is already in the draw list")]
    AlreadyPresent(SlotId),
    #[error("Slot {0:?} is not in the draw list")]
    UnknownSlot(SlotId),
    #[error("Slot {0:?} did not record a draw call")]
    NothingDrawn(SlotId),
    #[error("Released a setting with no outstanding reference: {0}")]
    ReleaseUnreferenced(String),
    #[error("Draw list belongs to environment {expected:?}, not {found:?}")]
    EnvironmentMismatch {
        expected: EnvironmentId,
        found: EnvironmentId,
    },
    #[error("Base state uses program {found:?} but the first entry uses {expected:?}")]
    ProgramMismatch {
        expected: ProgramId,
        found: Option<ProgramId>,
    },
    #[error("Base state binds vertex array {found:?} but the first entry binds {expected:?}")]
    VertexArrayMismatch {
        expected: VertexArrayId,
        found: Option<VertexArrayId>,
    },
    #[error("Base state binds element buffer {found:?} but the first entry binds {expected:?}")]
    ElementBufferMismatch {
        expected: Option<BufferId>,
        found: Option<BufferId>,
    },
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl DrawListError {
    /// Returns `true` for transient unavailability; the caller may retry on a later pass.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, DrawListError::Render(err) if err.is_not_ready())
    }

    /// Returns `true` for caller bugs and broken internal invariants.
    pub fn is_usage_violation(&self) -> bool {
        match self {
            DrawListError::Render(err) => err.is_usage_violation(),
            DrawListError::NothingDrawn(_) => false,
            _ => true,
        }
    }

    /// Returns `true` for explicitly unimplemented paths.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, DrawListError::Render(err) if err.is_unsupported())
    }
}

impl From<StateError> for DrawListError {
    fn from(err: StateError) -> Self {
        DrawListError::Render(err.into())
    }
}

impl From<ProgramError> for DrawListError {
    fn from(err: ProgramError) -> Self {
        DrawListError::Render(err.into())
    }
}

/// A specialized `Result` for draw list operations.
pub type DrawListResult<T> = Result<T, DrawListError>;
