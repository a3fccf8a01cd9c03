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

//! Geometry handed to [`Render::draw`](crate::renderer::traits::Render::draw).

use crate::renderer::api::command::{IndexFormat, PrimitiveMode};
use crate::renderer::api::resource::MeshId;
use std::sync::Arc;

/// Where the vertex data of a [`Model`] lives.
#[derive(Debug, Clone)]
pub enum MeshSource {
    /// Geometry owned by the asset layer; the environment prepares it once.
    Managed(MeshId),
    /// Transient geometry rebuilt every frame and not backed by a managed resource.
    Ephemeral(Arc<[u8]>),
}

/// Index data of a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBuffer {
    /// The managed index data.
    pub source: MeshId,
    /// The format of one index.
    pub format: IndexFormat,
}

/// A drawable range of geometry.
#[derive(Debug, Clone)]
pub struct Model {
    /// The vertex data.
    pub mesh: MeshSource,
    /// The primitive topology.
    pub mode: PrimitiveMode,
    /// First vertex (or first index when indexed).
    pub first: u32,
    /// Number of vertices (or indices when indexed).
    pub count: u32,
    /// Optional index data.
    pub indices: Option<IndexBuffer>,
}

impl Model {
    /// Creates a non-indexed model over managed geometry.
    pub fn managed(mesh: MeshId, mode: PrimitiveMode, first: u32, count: u32) -> Self {
        Self {
            mesh: MeshSource::Managed(mesh),
            mode,
            first,
            count,
            indices: None,
        }
    }

    /// Creates a model over transient geometry.
    pub fn ephemeral(data: Arc<[u8]>, mode: PrimitiveMode, count: u32) -> Self {
        Self {
            mesh: MeshSource::Ephemeral(data),
            mode,
            first: 0,
            count,
            indices: None,
        }
    }

    /// Attaches index data.
    pub fn with_indices(mut self, indices: IndexBuffer) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Returns `true` for transient geometry.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self.mesh, MeshSource::Ephemeral(_))
    }
}
