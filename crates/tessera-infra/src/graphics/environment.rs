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

use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_core::renderer::{
    BufferId, EnvironmentId, IndexBuffer, MeshId, MeshSource, Model, Program, ProgramError,
    ProgramId, RenderEnvironment, ResourceError, ShaderDefinition, ShaderId, Uniform, VertexArrayId,
};

/// A [`RenderEnvironment`] that links programs and prepares geometry without a GPU.
///
/// Programs are cached by shader combination and stay cached while they are locked.
/// Vertex arrays are keyed by mesh and program, index buffers by mesh.
#[derive(Debug)]
pub struct RecordingEnvironment {
    id: EnvironmentId,
    shaders: RwLock<AHashMap<ShaderId, ShaderDefinition>>,
    programs: Mutex<AHashMap<Vec<ShaderId>, Arc<Program>>>,
    vertex_arrays: Mutex<AHashMap<(MeshId, ProgramId), VertexArrayId>>,
    index_buffers: Mutex<AHashMap<MeshId, BufferId>>,
    missing_meshes: RwLock<AHashSet<MeshId>>,

    next_program_id: AtomicUsize,
    next_vertex_array_id: AtomicUsize,
    next_buffer_id: AtomicUsize,
    links: AtomicUsize,
}

impl Default for RecordingEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingEnvironment {
    /// Creates an environment with a fresh identity and no shader.
    pub fn new() -> Self {
        static NEXT_ENVIRONMENT: AtomicU64 = AtomicU64::new(1);
        Self {
            id: EnvironmentId(NEXT_ENVIRONMENT.fetch_add(1, Ordering::Relaxed)),
            shaders: RwLock::new(AHashMap::new()),
            programs: Mutex::new(AHashMap::new()),
            vertex_arrays: Mutex::new(AHashMap::new()),
            index_buffers: Mutex::new(AHashMap::new()),
            missing_meshes: RwLock::new(AHashSet::new()),
            next_program_id: AtomicUsize::new(1),
            next_vertex_array_id: AtomicUsize::new(1),
            next_buffer_id: AtomicUsize::new(1),
            links: AtomicUsize::new(0),
        }
    }

    /// Makes `shader` available to program combinations.
    pub fn register_shader(&self, shader: ShaderId, definition: ShaderDefinition) {
        self.shaders.write().insert(shader, definition);
    }

    /// Makes every later preparation of `mesh` fail with [`ResourceError::NotFound`].
    pub fn remove_mesh(&self, mesh: MeshId) {
        self.missing_meshes.write().insert(mesh);
    }

    /// The number of programs linked so far.
    pub fn link_count(&self) -> usize {
        self.links.load(Ordering::Relaxed)
    }

    /// The number of cached programs.
    pub fn program_count(&self) -> usize {
        self.programs.lock().len()
    }

    /// Drops every cached program that no holder has locked. Returns how many were dropped.
    pub fn collect_unlocked(&self) -> usize {
        let mut programs = self.programs.lock();
        let before = programs.len();
        programs.retain(|_, program| program.is_locked());
        let dropped = before - programs.len();
        if dropped > 0 {
            log::debug!("Dropped {dropped} unlocked program(s).");
        }
        dropped
    }

    fn link(&self, shaders: &[ShaderId]) -> Result<Program, ProgramError> {
        let definitions = self.shaders.read();
        let mut uniforms: Vec<Uniform> = Vec::new();
        let mut outputs = Vec::new();
        for shader in shaders {
            let definition = definitions
                .get(shader)
                .ok_or(ProgramError::UnknownShader { shader: *shader })?;
            for uniform in &definition.uniforms {
                if uniforms.iter().any(|u| u.id == uniform.id) {
                    return Err(ProgramError::LinkFailed {
                        details: format!(
                            "uniform {:?} ({}) is declared by more than one shader",
                            uniform.id, uniform.name
                        ),
                    });
                }
                uniforms.push(uniform.clone());
            }
            outputs.extend(definition.outputs.iter().cloned());
        }

        let id = ProgramId(self.next_program_id.fetch_add(1, Ordering::Relaxed));
        self.links.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Linked program {:?} ({} uniform(s), {} output(s)).",
            id,
            uniforms.len(),
            outputs.len()
        );
        Ok(Program::new(id, shaders.to_vec(), uniforms, outputs))
    }
}

impl RenderEnvironment for RecordingEnvironment {
    fn id(&self) -> EnvironmentId {
        self.id
    }

    fn program_for(&self, shaders: &[ShaderId]) -> Result<Arc<Program>, ProgramError> {
        let mut programs = self.programs.lock();
        if let Some(program) = programs.get(shaders) {
            return Ok(program.clone());
        }
        let program = Arc::new(self.link(shaders)?);
        programs.insert(shaders.to_vec(), program.clone());
        Ok(program)
    }

    fn prepare_model(
        &self,
        model: &Model,
        program: &Program,
    ) -> Result<VertexArrayId, ResourceError> {
        let mesh = match &model.mesh {
            MeshSource::Managed(mesh) => *mesh,
            MeshSource::Ephemeral(_) => return Err(ResourceError::InvalidHandle),
        };
        if self.missing_meshes.read().contains(&mesh) {
            return Err(ResourceError::NotFound);
        }
        let mut vertex_arrays = self.vertex_arrays.lock();
        let id = *vertex_arrays
            .entry((mesh, program.id()))
            .or_insert_with(|| {
                VertexArrayId(self.next_vertex_array_id.fetch_add(1, Ordering::Relaxed))
            });
        Ok(id)
    }

    fn prepare_indices(&self, indices: &IndexBuffer) -> Result<BufferId, ResourceError> {
        if self.missing_meshes.read().contains(&indices.source) {
            return Err(ResourceError::NotFound);
        }
        let mut buffers = self.index_buffers.lock();
        let id = *buffers
            .entry(indices.source)
            .or_insert_with(|| BufferId(self.next_buffer_id.fetch_add(1, Ordering::Relaxed)));
        Ok(id)
    }
}
