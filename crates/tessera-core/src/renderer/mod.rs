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

//! Provides the public, backend-agnostic rendering contracts used by the draw list.
//!
//! This module defines the "common language" between the scheduler and its
//! collaborators. It contains the abstract `traits` (like [`RenderEnvironment`] and
//! [`CommandSink`]), the data structures that flow through them (like [`GpuCommand`]
//! and [`Program`]), and the error types.
//!
//! The 'what' is defined here; the 'how' is provided by a concrete environment
//! (e.g. the recording environment in `tessera-infra`).

pub mod api;
pub mod error;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{ProgramError, RenderError, ResourceError, StateError};
pub use self::traits::{CommandSink, Drawable, Render, RenderEnvironment};
