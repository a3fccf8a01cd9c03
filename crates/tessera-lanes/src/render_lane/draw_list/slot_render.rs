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

use super::setting::{SettingCache, SettingHandle, SettingSource};
use super::{DrawListError, DrawListResult, SlotId};
use tessera_core::renderer::{
    BufferId, CommandList, CommandSink, GpuCommand, GroupPipe, Model, Program, Render,
    RenderEnvironment, RenderError, VertexArrayId,
};

/// What a drawable recorded for its entry.
#[derive(Debug)]
pub(crate) struct Recorded {
    pub(crate) vertex_array_setting: SettingHandle,
    pub(crate) vertex_array: VertexArrayId,
    pub(crate) element_buffer: Option<BufferId>,
    pub(crate) main: CommandList,
}

/// The [`Render`] handed to a drawable while its entry is being built.
///
/// Accepts exactly one draw call, made with the entry's own state. The first error handed
/// back to the drawable is kept and fails the entry, even if the drawable ignored it.
pub(crate) struct SlotRender<'a> {
    env: &'a dyn RenderEnvironment,
    cache: &'a SettingCache,
    state: &'a dyn GroupPipe,
    program: &'a Program,
    recorded: Option<Recorded>,
    violation: Option<RenderError>,
}

impl<'a> SlotRender<'a> {
    pub(crate) fn new(
        env: &'a dyn RenderEnvironment,
        cache: &'a SettingCache,
        state: &'a dyn GroupPipe,
        program: &'a Program,
    ) -> Self {
        Self {
            env,
            cache,
            state,
            program,
            recorded: None,
            violation: None,
        }
    }

    /// The recording of `slot`, or the first error raised while it was drawn.
    pub(crate) fn finish(self, slot: SlotId) -> DrawListResult<Recorded> {
        if let Some(err) = self.violation {
            return Err(err.into());
        }
        self.recorded.ok_or(DrawListError::NothingDrawn(slot))
    }

    fn keep<T>(&mut self, result: Result<T, RenderError>) -> Result<T, RenderError> {
        if let Err(err) = &result {
            log::debug!("Draw list recording failed: {err}");
            self.violation.get_or_insert_with(|| err.clone());
        }
        result
    }

    fn record(&mut self, state: &dyn GroupPipe, model: &Model) -> Result<(), RenderError> {
        if self.recorded.is_some() {
            return Err(RenderError::AlreadyDrawn);
        }
        if state.id() != self.state.id() {
            return Err(RenderError::StateMismatch {
                expected: self.state.id(),
                found: state.id(),
            });
        }
        if model.is_ephemeral() {
            return Err(RenderError::NotImplemented("ephemeral models in a draw list"));
        }

        let vertex_array = self.env.prepare_model(model, self.program)?;
        let element_buffer = model
            .indices
            .as_ref()
            .map(|indices| self.env.prepare_indices(indices))
            .transpose()?;
        let vertex_array_setting = self
            .cache
            .private(SettingSource::VertexArray {
                vertex_array: Some(vertex_array),
                element_buffer,
            })?;

        let mut main = CommandList::new();
        match &model.indices {
            None => main.record(GpuCommand::DrawArrays {
                mode: model.mode,
                first: model.first,
                count: model.count,
            }),
            Some(indices) => main.record(GpuCommand::DrawElements {
                mode: model.mode,
                count: model.count,
                format: indices.format,
                offset: u64::from(model.first) * indices.format.size(),
            }),
        }

        self.recorded = Some(Recorded {
            vertex_array_setting,
            vertex_array,
            element_buffer,
            main,
        });
        Ok(())
    }
}

impl Render for SlotRender<'_> {
    fn environment(&self) -> &dyn RenderEnvironment {
        self.env
    }

    fn draw(&mut self, state: &dyn GroupPipe, model: &Model) -> Result<(), RenderError> {
        let result = self.record(state, model);
        self.keep(result)
    }

    fn clear_color(
        &mut self,
        _state: &dyn GroupPipe,
        _output: usize,
        _color: [f32; 4],
    ) -> Result<(), RenderError> {
        self.keep(Err(RenderError::NotImplemented(
            "clearing a color output in a draw list",
        )))
    }

    fn clear_depth(&mut self, _state: &dyn GroupPipe, _depth: f64) -> Result<(), RenderError> {
        self.keep(Err(RenderError::NotImplemented("clearing depth in a draw list")))
    }
}
