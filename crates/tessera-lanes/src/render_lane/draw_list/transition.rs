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

//! Entry construction and state-transition compilation.
//!
//! An entry holds one setting per category, laid out as:
//!
//! | index | category |
//! |---|---|
//! | `0` | vertex array (private to the entry) |
//! | `1` | framebuffer |
//! | `2..9` | one per [`PipelineState`] |
//! | `9..` | one per uniform of the entry's program |
//!
//! Two entries with the same program therefore have settings that line up index by index,
//! which is what lets a transition be computed by comparing them pairwise.

use super::double_buffer::EpochGuard;
use super::error::DrawListResult;
use super::setting::{
    DepView, Setting, SettingCache, SettingCategory, SettingHandle, SettingKey, SettingSource,
};
use super::slot_render::{Recorded, SlotRender};
use super::RenderSlot;
use std::sync::Arc;
use tessera_core::renderer::{
    BufferId, CommandList, CommandSink, GpuCommand, GroupPipe, PipelineState, Program,
    RenderEnvironment, RenderError, StateSlot, VertexArrayId,
};

pub(crate) const IDX_VAO: usize = 0;
pub(crate) const IDX_FBO: usize = 1;
pub(crate) const IDX_PIPE: usize = 2;
pub(crate) const IDX_UNIFORM: usize = IDX_PIPE + PipelineState::ALL.len();

/// Builds the view a setting reads its dependency `slots` through.
///
/// No slots yield no group. Slots all served by one group yield that group alone, so the
/// setting is keyed by a single identity. Otherwise every slot keeps its own group.
/// Slots served by no group read as unset and are keyed as [`PipeId::NONE`].
///
/// [`PipeId::NONE`]: tessera_core::renderer::PipeId::NONE
pub(crate) fn dependency_view(state: &dyn GroupPipe, slots: Vec<StateSlot>) -> DepView {
    let groups: Vec<Option<usize>> = slots.iter().map(|&slot| state.group_of(slot)).collect();
    let pipe = |group: &Option<usize>| group.and_then(|i| state.groups().get(i).cloned());
    let pipes = match groups.split_first() {
        None => Vec::new(),
        Some((first, rest)) if rest.iter().all(|group| group == first) => vec![pipe(first)],
        Some(_) => groups.iter().map(pipe).collect(),
    };
    DepView::new(slots, pipes)
}

/// The depth buffer slot followed by the dependencies of every program output.
fn framebuffer_slots(program: &Program) -> Vec<StateSlot> {
    std::iter::once(StateSlot::DEPTH_BUFFER)
        .chain(
            program
                .outputs()
                .iter()
                .flat_map(|output| output.deps.iter().copied()),
        )
        .collect()
}

/// Acquires the shared settings of an entry, framebuffer first, in category order.
///
/// On error the settings acquired so far stay in `out` for the caller to release.
fn resolve_settings(
    cache: &mut SettingCache,
    program: &Program,
    state: &dyn GroupPipe,
    out: &mut Vec<SettingHandle>,
) -> DrawListResult<()> {
    let view = dependency_view(state, framebuffer_slots(program));
    let key = SettingKey {
        program: Some(program.id()),
        category: SettingCategory::Framebuffer,
        deps: view.ids(),
    };
    out.push(cache.acquire(key, || SettingSource::Framebuffer {
        outputs: program.outputs().to_vec(),
        view,
    })?);

    for pipeline_state in PipelineState::ALL {
        let view = dependency_view(state, vec![pipeline_state.slot()]);
        let key = SettingKey {
            program: None,
            category: SettingCategory::PipelineState(pipeline_state),
            deps: view.ids(),
        };
        out.push(cache.acquire(key, || SettingSource::PipelineState {
            state: pipeline_state,
            view,
        })?);
    }

    for uniform in program.uniforms() {
        let view = dependency_view(state, uniform.deps.clone());
        let key = SettingKey {
            program: Some(program.id()),
            category: SettingCategory::Uniform(uniform.id),
            deps: view.ids(),
        };
        out.push(cache.acquire(key, || SettingSource::Uniform {
            program: program.id(),
            uniform: uniform.clone(),
            view,
        })?);
    }
    Ok(())
}

fn record_main(
    env: &dyn RenderEnvironment,
    cache: &SettingCache,
    slot: &RenderSlot,
    program: &Program,
) -> DrawListResult<Recorded> {
    let mut render = SlotRender::new(env, cache, slot.state.as_ref(), program);
    let drawn = slot.drawable.draw(slot.state.as_ref(), &mut render);
    let recorded = render.finish(slot.id);
    drawn?;
    recorded
}

/// One entry of the draw list.
#[derive(Debug)]
pub(crate) struct DrawSlot {
    pub(crate) slot: RenderSlot,
    pub(crate) program: Arc<Program>,
    pub(crate) settings: Vec<SettingHandle>,
    pub(crate) main: Arc<CommandList>,
    pub(crate) vertex_array: VertexArrayId,
    pub(crate) element_buffer: Option<BufferId>,
    /// Commands to run when this entry is reached, valid for its current predecessor.
    pub(crate) transition: Transition,
}

impl DrawSlot {
    /// Resolves the program and settings of `slot` and records its draw call.
    ///
    /// Either the whole entry is built, or every reference taken along the way is given
    /// back before the error is returned.
    pub(crate) fn build(
        env: &dyn RenderEnvironment,
        cache: &mut SettingCache,
        slot: RenderSlot,
    ) -> DrawListResult<Self> {
        let program = env
            .program_for(&slot.state.shaders())
            .map_err(RenderError::from)?;
        program.lock();

        let mut shared = Vec::with_capacity(IDX_UNIFORM - IDX_FBO + program.uniforms().len());
        let recorded = resolve_settings(cache, &program, slot.state.as_ref(), &mut shared)
            .and_then(|()| record_main(env, cache, &slot, &program));

        match recorded {
            Ok(recorded) => {
                let mut settings = Vec::with_capacity(1 + shared.len());
                settings.push(recorded.vertex_array_setting);
                settings.extend(shared);
                Ok(DrawSlot {
                    slot,
                    program,
                    settings,
                    main: Arc::new(recorded.main),
                    vertex_array: recorded.vertex_array,
                    element_buffer: recorded.element_buffer,
                    transition: Transition::default(),
                })
            }
            Err(err) => {
                for handle in shared {
                    if let Err(release) = cache.release(handle) {
                        log::warn!("Rollback of slot {:?} failed: {release}", slot.id);
                    }
                }
                if let Err(unlock) = program.unlock() {
                    log::warn!("Rollback of slot {:?} failed: {unlock}", slot.id);
                }
                Err(err)
            }
        }
    }

    /// Gives back every setting and the program lock, then returns the caller's slot.
    ///
    /// Keeps releasing after a failure and reports the first one.
    pub(crate) fn release(self, cache: &mut SettingCache) -> DrawListResult<RenderSlot> {
        let DrawSlot {
            slot,
            program,
            settings,
            ..
        } = self;

        let mut first_error = None;
        for handle in settings {
            if let Err(err) = cache.release(handle) {
                log::warn!("Releasing a setting of slot {:?} failed: {err}", slot.id);
                first_error.get_or_insert(err);
            }
        }
        if let Err(err) = program.unlock() {
            log::warn!("Unlocking the program of slot {:?} failed: {err}", slot.id);
            first_error.get_or_insert(err.into());
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(slot),
        }
    }
}

#[derive(Debug, Clone)]
enum Step {
    Commands(Arc<CommandList>),
    /// Read from the setting's cell at the traversal's epoch.
    Setting(Arc<Setting>),
}

/// The compiled commands run when an entry is reached during a traversal.
#[derive(Debug, Clone, Default)]
pub struct Transition {
    steps: Vec<Step>,
    switches_program: bool,
}

impl Transition {
    /// Returns `true` if the transition switches programs.
    pub fn switches_program(&self) -> bool {
        self.switches_program
    }

    /// The number of settings the transition applies.
    pub fn setting_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::Setting(_)))
            .count()
    }

    /// The categories of the applied settings, in order.
    pub fn categories(&self) -> Vec<SettingCategory> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Setting(setting) => Some(setting.category()),
                Step::Commands(_) => None,
            })
            .collect()
    }

    /// Records the transition into `sink` as seen at the guard's epoch.
    pub(crate) fn replay(&self, sink: &mut dyn CommandSink, guard: &EpochGuard<'_>) {
        for step in &self.steps {
            match step {
                Step::Commands(list) => sink.call_list(list),
                Step::Setting(setting) => {
                    if let Some(list) = setting.cell().read(guard) {
                        sink.call_list(&list);
                    }
                }
            }
        }
    }
}

/// Compiles the commands that take the GPU from `prev`'s state to `current`'s.
///
/// - Without predecessor, only the entry's draw call.
/// - With the same program, the settings that differ by identity, then the draw call.
/// - Otherwise a program switch, every setting, then the draw call.
pub(crate) fn compile_transition(prev: Option<&DrawSlot>, current: &DrawSlot) -> Transition {
    let mut steps = Vec::new();
    let mut switches_program = false;

    match prev {
        None => {}
        Some(prev) if Arc::ptr_eq(&prev.program, &current.program) => {
            for (index, handle) in current.settings.iter().enumerate() {
                let unchanged = prev
                    .settings
                    .get(index)
                    .is_some_and(|other| other.ptr_eq(handle));
                if !unchanged {
                    steps.push(Step::Setting(handle.setting().clone()));
                }
            }
        }
        Some(prev) => {
            switches_program = true;
            let mut switch = CommandList::new();
            switch.record(GpuCommand::UseProgram {
                from: Some(prev.program.id()),
                to: current.program.id(),
            });
            steps.push(Step::Commands(Arc::new(switch)));
            steps.extend(
                current
                    .settings
                    .iter()
                    .map(|handle| Step::Setting(handle.setting().clone())),
            );
        }
    }

    steps.push(Step::Commands(current.main.clone()));
    Transition {
        steps,
        switches_program,
    }
}
