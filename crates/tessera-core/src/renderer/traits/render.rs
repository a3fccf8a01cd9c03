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

use crate::renderer::api::model::Model;
use crate::renderer::api::state::GroupPipe;
use crate::renderer::error::RenderError;
use crate::renderer::traits::RenderEnvironment;

/// The recording interface handed to a [`Drawable`].
pub trait Render {
    /// The environment the recording targets.
    fn environment(&self) -> &dyn RenderEnvironment;

    /// Records a draw of `model` with `state`.
    fn draw(&mut self, state: &dyn GroupPipe, model: &Model) -> Result<(), RenderError>;

    /// Clears one color output of `state`'s framebuffer.
    fn clear_color(
        &mut self,
        state: &dyn GroupPipe,
        output: usize,
        color: [f32; 4],
    ) -> Result<(), RenderError>;

    /// Clears the depth attachment of `state`'s framebuffer.
    fn clear_depth(&mut self, state: &dyn GroupPipe, depth: f64) -> Result<(), RenderError>;
}

/// Anything the scene layer can put in a draw list.
pub trait Drawable: Send + Sync {
    /// Records this object's draw calls with `state` into `render`.
    fn draw(&self, state: &dyn GroupPipe, render: &mut dyn Render) -> Result<(), RenderError>;
}
