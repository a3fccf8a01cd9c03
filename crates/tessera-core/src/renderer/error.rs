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

//! Defines the hierarchy of error types for the rendering contracts.
//!
//! Errors fall in three families:
//! - usage violations (a caller bug, never retried),
//! - unsupported features (paths that are deliberately not implemented),
//! - transient unavailability ([`StateError::NotReady`]), which the scene layer retries.

use crate::renderer::api::program::{ProgramId, ShaderId};
use crate::renderer::api::state::{PipeId, StateSlot};
use std::fmt;

/// An error raised while reading a state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The value of the slot exists but cannot be produced yet.
    NotReady {
        /// The slot that was read.
        slot: StateSlot,
    },
    /// A setting read a slot outside its declared dependencies.
    NonDependentSlot {
        /// The slot that was read.
        slot: StateSlot,
    },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::NotReady { slot } => {
                write!(f, "State slot {slot:?} is not ready yet")
            }
            StateError::NonDependentSlot { slot } => {
                write!(f, "Read of non-dependent state slot {slot:?}")
            }
        }
    }
}

impl std::error::Error for StateError {}

/// An error related to program resolution or program lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// A shader in the requested combination is unknown to the environment.
    UnknownShader {
        /// The unknown shader.
        shader: ShaderId,
    },
    /// A program was unlocked more often than it was locked.
    LockImbalance {
        /// The program.
        program: ProgramId,
    },
    /// The environment failed to link the shader combination.
    LinkFailed {
        /// Detailed error messages from the backend.
        details: String,
    },
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::UnknownShader { shader } => {
                write!(f, "Unknown shader {shader:?} in program combination")
            }
            ProgramError::LockImbalance { program } => {
                write!(f, "Program {program:?} unlocked more times than locked")
            }
            ProgramError::LinkFailed { details } => {
                write!(f, "Program link failed: {details}")
            }
        }
    }
}

impl std::error::Error for ProgramError {}

/// An error related to the preparation of a GPU resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A resource could not be found.
    NotFound,
    /// The handle used to reference a resource is invalid.
    InvalidHandle,
    /// An error originating from the environment implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => write!(f, "Resource not found."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// An error raised while a drawable records into the draw list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The drawable recorded more than one draw call.
    AlreadyDrawn,
    /// The drawable recorded with a state other than the one it was added with.
    StateMismatch {
        /// The state the entry was added with.
        expected: PipeId,
        /// The state passed to the draw call.
        found: PipeId,
    },
    /// The requested operation is deliberately not implemented.
    NotImplemented(&'static str),
    /// A state snapshot could not be read.
    State(StateError),
    /// A program could not be resolved or released.
    Program(ProgramError),
    /// A resource could not be prepared.
    Resource(ResourceError),
}

impl RenderError {
    /// Returns `true` for transient unavailability that the caller may retry later.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, RenderError::State(StateError::NotReady { .. }))
    }

    /// Returns `true` for caller bugs.
    pub fn is_usage_violation(&self) -> bool {
        matches!(
            self,
            RenderError::AlreadyDrawn
                | RenderError::StateMismatch { .. }
                | RenderError::State(StateError::NonDependentSlot { .. })
                | RenderError::Program(ProgramError::LockImbalance { .. })
        )
    }

    /// Returns `true` for paths that are explicitly unimplemented.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, RenderError::NotImplemented(_))
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::AlreadyDrawn => write!(f, "Can only render once in a draw list"),
            RenderError::StateMismatch { expected, found } => write!(
                f,
                "Must render with the state the entry was added with (expected {expected:?}, got {found:?})"
            ),
            RenderError::NotImplemented(what) => write!(f, "Not implemented: {what}"),
            RenderError::State(err) => write!(f, "State error: {err}"),
            RenderError::Program(err) => write!(f, "Program error: {err}"),
            RenderError::Resource(err) => write!(f, "Resource error: {err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::State(err) => Some(err),
            RenderError::Program(err) => Some(err),
            RenderError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StateError> for RenderError {
    fn from(err: StateError) -> Self {
        RenderError::State(err)
    }
}

impl From<ProgramError> for RenderError {
    fn from(err: ProgramError) -> Self {
        RenderError::Program(err)
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}
