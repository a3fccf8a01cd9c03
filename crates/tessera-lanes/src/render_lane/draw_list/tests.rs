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

use super::*;
use tessera_core::renderer::{
    FragData, GpuCommand, IndexBuffer, IndexFormat, MeshId, Model, Pipe, PipelineState,
    PrimitiveMode, Program, Render, RenderError, RenderTargetId, ResourceError, ShaderDefinition,
    ShaderId, StateSlot, StateValue, Uniform, UniformId,
};
use tessera_infra::graphics::{RecordingEnvironment, RecordingSink};
use tessera_infra::state::{SlotValue, StateGroup, StatePipe};

const COLOR: StateSlot = StateSlot::user(0);
const TARGET: StateSlot = StateSlot::user(1);
const MATERIAL: StateSlot = StateSlot::user(2);

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

/// Shared settings of a program with one uniform: framebuffer, pipeline states, uniform.
const SHARED_SETTINGS: usize = 1 + PipelineState::ALL.len() + 1;

struct Quad(Model);

impl Drawable for Quad {
    fn draw(&self, state: &dyn GroupPipe, render: &mut dyn Render) -> Result<(), RenderError> {
        render.draw(state, &self.0)
    }
}

enum Misbehaving {
    DrawsTwice(Model),
    DrawsWith(Arc<dyn GroupPipe>, Model),
    DrawsNothing,
    ClearsDepth,
    /// Draws once, then ignores the errors of a second draw and of a foreign-state draw.
    IgnoresErrors(Arc<dyn GroupPipe>, Model),
}

impl Drawable for Misbehaving {
    fn draw(&self, state: &dyn GroupPipe, render: &mut dyn Render) -> Result<(), RenderError> {
        match self {
            Misbehaving::DrawsTwice(model) => {
                render.draw(state, model)?;
                render.draw(state, model)
            }
            Misbehaving::DrawsWith(other, model) => render.draw(other.as_ref(), model),
            Misbehaving::DrawsNothing => Ok(()),
            Misbehaving::ClearsDepth => render.clear_depth(state, 1.0),
            Misbehaving::IgnoresErrors(other, model) => {
                render.draw(state, model)?;
                let _ = render.draw(state, model);
                let _ = render.draw(other.as_ref(), model);
                Ok(())
            }
        }
    }
}

fn triangles(mesh: u64) -> Model {
    Model::managed(MeshId(mesh), PrimitiveMode::Triangles, 0, 6)
}

struct Scene {
    env: Arc<RecordingEnvironment>,
    target: Arc<StatePipe>,
    pipeline: Arc<StatePipe>,
    material: Arc<StatePipe>,
}

impl Scene {
    fn new() -> Self {
        let env = Arc::new(RecordingEnvironment::new());
        env.register_shader(
            ShaderId(1),
            ShaderDefinition {
                uniforms: vec![Uniform::from_slot(UniformId(0), "u_color", COLOR)],
                outputs: vec![FragData::from_slot("color", TARGET)],
            },
        );
        env.register_shader(
            ShaderId(2),
            ShaderDefinition {
                uniforms: vec![
                    Uniform::from_slot(UniformId(1), "u_tint", COLOR),
                    Uniform::from_slot(UniformId(2), "u_offset", StateSlot::POLYGON_OFFSET),
                ],
                outputs: vec![],
            },
        );

        let target = StatePipe::builder()
            .value(
                StateSlot::DEPTH_BUFFER,
                StateValue::Target(RenderTargetId(1)),
            )
            .value(TARGET, StateValue::Target(RenderTargetId(2)))
            .build();
        let pipeline = StatePipe::builder()
            .value(StateSlot::DEPTH_TEST, StateValue::Bool(true))
            .value(StateSlot::BLEND, StateValue::Bool(false))
            .build();
        let material = Self::material(ShaderId(1), RED);

        Self {
            env,
            target,
            pipeline,
            material,
        }
    }

    fn material(shader: ShaderId, color: [f32; 4]) -> Arc<StatePipe> {
        StatePipe::builder()
            .shader(MATERIAL, shader)
            .value(COLOR, StateValue::Vec4(color))
            .build()
    }

    fn state(&self) -> Arc<dyn GroupPipe> {
        self.state_with(&self.material)
    }

    fn state_with(&self, material: &Arc<StatePipe>) -> Arc<dyn GroupPipe> {
        StateGroup::new(vec![
            self.target.clone(),
            self.pipeline.clone(),
            material.clone(),
        ])
    }

    fn list(&self) -> DrawList {
        DrawList::with_settings(
            self.env.clone(),
            DrawListSettings {
                verify_on_mutation: true,
                log_transitions: true,
                ..Default::default()
            },
        )
    }

    fn quad(&self, mesh: u64) -> RenderSlot {
        RenderSlot::new(Arc::new(Quad(triangles(mesh))), self.state())
    }

    fn slot(&self, drawable: impl Drawable + 'static) -> RenderSlot {
        RenderSlot::new(Arc::new(drawable), self.state())
    }

    fn program(&self) -> Arc<Program> {
        self.env.program_for(&self.state().shaders()).unwrap()
    }
}

fn uniform_values(sink: &RecordingSink) -> Vec<Option<StateValue>> {
    sink.commands()
        .iter()
        .filter_map(|command| match command {
            GpuCommand::SetUniform { value, .. } => Some(value.clone()),
            _ => None,
        })
        .collect()
}

fn count(sink: &RecordingSink, pred: impl Fn(&GpuCommand) -> bool) -> usize {
    sink.commands().iter().filter(|c| pred(c)).count()
}

fn add_all(list: &mut DrawList, slots: Vec<RenderSlot>) -> Vec<SlotId> {
    slots
        .into_iter()
        .map(|slot| {
            let id = slot.id();
            list.add(slot).unwrap();
            id
        })
        .collect()
}

#[test]
fn neighbours_with_the_same_state_only_switch_vertex_arrays() {
    let scene = Scene::new();
    let mut list = scene.list();
    let ids = add_all(
        &mut list,
        vec![scene.quad(1), scene.quad(2), scene.quad(3)],
    );
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    assert_eq!(list.len(), 3);
    assert_eq!(list.slots_in_order(), vec![a, b, c]);
    assert_eq!(list.cache_stats().live, SHARED_SETTINGS);
    assert_eq!(list.ref_count(b, 1), Some(3));
    assert_eq!(list.ref_count(b, 1 + PipelineState::ALL.len() + 1), Some(3));
    assert_eq!(list.ref_count(b, 0), None);

    let first = list.transition(a).unwrap();
    assert_eq!(first.setting_count(), 0);
    assert!(!first.switches_program());
    for id in [b, c] {
        let transition = list.transition(id).unwrap();
        assert_eq!(transition.categories(), vec![SettingCategory::VertexArray]);
        assert!(!transition.switches_program());
    }
    assert_eq!(scene.program().lock_count(), 3);
}

#[test]
fn removing_an_entry_relinks_its_neighbours() {
    let scene = Scene::new();
    let mut list = scene.list();
    let ids = add_all(
        &mut list,
        vec![scene.quad(1), scene.quad(2), scene.quad(3)],
    );
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    let removed = list.remove(b).unwrap();
    assert_eq!(removed.id(), b);
    assert!(!list.contains(b));
    assert_eq!(list.slots_in_order(), vec![a, c]);
    assert_eq!(
        list.transition(c).unwrap().categories(),
        vec![SettingCategory::VertexArray]
    );
    assert_eq!(list.ref_count(a, 1), Some(2));
    assert_eq!(scene.program().lock_count(), 2);

    list.remove(a).unwrap();
    assert_eq!(list.transition(c).unwrap().setting_count(), 0);
    assert_eq!(list.ref_count(c, 1), Some(1));

    assert!(matches!(
        list.remove(a),
        Err(DrawListError::UnknownSlot(id)) if id == a
    ));
}

#[test]
fn a_different_program_replays_every_setting() {
    let scene = Scene::new();
    let mut list = scene.list();
    let other = Scene::material(ShaderId(2), BLUE);
    let d = RenderSlot::new(Arc::new(Quad(triangles(4))), scene.state_with(&other));
    let ids = add_all(&mut list, vec![scene.quad(1), d, scene.quad(3)]);
    let (a, d, c) = (ids[0], ids[1], ids[2]);

    assert_ne!(list.program(a), list.program(d));
    assert_eq!(list.program(a), list.program(c));

    let to_d = list.transition(d).unwrap();
    assert!(to_d.switches_program());
    assert_eq!(to_d.setting_count(), 2 + PipelineState::ALL.len() + 2);
    let categories = to_d.categories();
    assert_eq!(categories[0], SettingCategory::VertexArray);
    assert_eq!(categories[1], SettingCategory::Framebuffer);
    assert_eq!(
        categories[2],
        SettingCategory::PipelineState(PipelineState::DepthTest)
    );
    assert_eq!(
        categories.last(),
        Some(&SettingCategory::Uniform(UniformId(2)))
    );

    let back_to_c = list.transition(c).unwrap();
    assert!(back_to_c.switches_program());
    assert_eq!(back_to_c.setting_count(), 1 + SHARED_SETTINGS);

    // Pipeline states do not depend on the program and are shared across both.
    assert_eq!(list.ref_count(d, 2), Some(3));
    assert_eq!(list.ref_count(d, 1), Some(1));

    list.remove(d).unwrap();
    let c_after = list.transition(c).unwrap();
    assert!(!c_after.switches_program());
    assert_eq!(c_after.categories(), vec![SettingCategory::VertexArray]);
}

#[test]
fn execute_replays_the_prologue_then_every_transition() {
    let scene = Scene::new();
    let mut list = scene.list();
    add_all(
        &mut list,
        vec![scene.quad(1), scene.quad(2), scene.quad(3)],
    );

    let base = list.base_state().unwrap();
    assert_eq!(base.environment, list.environment());
    let mut sink = RecordingSink::new();
    assert_eq!(list.execute(&mut sink, &base).unwrap(), 3);

    assert_eq!(sink.draw_count(), 3);
    assert!(matches!(
        sink.commands()[0],
        GpuCommand::BindFramebuffer { .. }
    ));
    // Prologue (shared settings), first draw, then a vertex array and a draw per neighbour.
    assert_eq!(sink.commands().len(), SHARED_SETTINGS + 1 + 2 * 2);
    assert_eq!(
        count(&sink, |c| matches!(c, GpuCommand::BindVertexArray { .. })),
        2
    );
    assert_eq!(
        count(&sink, |c| matches!(c, GpuCommand::UseProgram { .. })),
        0
    );
    assert_eq!(
        uniform_values(&sink),
        vec![Some(StateValue::Vec4(RED))]
    );
}

#[test]
fn execute_switches_programs_between_entries() {
    let scene = Scene::new();
    let mut list = scene.list();
    let other = Scene::material(ShaderId(2), BLUE);
    add_all(
        &mut list,
        vec![
            scene.quad(1),
            RenderSlot::new(Arc::new(Quad(triangles(2))), scene.state_with(&other)),
            scene.quad(3),
        ],
    );

    let mut sink = RecordingSink::new();
    let base = list.base_state().unwrap();
    assert_eq!(list.execute(&mut sink, &base).unwrap(), 3);
    assert_eq!(sink.draw_count(), 3);
    assert_eq!(
        count(&sink, |c| matches!(c, GpuCommand::UseProgram { .. })),
        2
    );
    assert_eq!(
        uniform_values(&sink),
        vec![
            Some(StateValue::Vec4(RED)),
            Some(StateValue::Vec4(BLUE)),
            None,
            Some(StateValue::Vec4(RED)),
        ]
    );
}

#[test]
fn indexed_models_draw_elements_from_their_buffer() {
    let scene = Scene::new();
    let mut list = scene.list();
    let model = Model::managed(MeshId(9), PrimitiveMode::TriangleStrip, 6, 12).with_indices(
        IndexBuffer {
            source: MeshId(9),
            format: IndexFormat::Uint32,
        },
    );
    add_all(&mut list, vec![scene.slot(Quad(model))]);

    let base = list.base_state().unwrap();
    assert!(base.element_buffer.is_some());
    let mut sink = RecordingSink::new();

    let err = list
        .execute(
            &mut sink,
            &BaseState {
                element_buffer: None,
                ..base
            },
        )
        .unwrap_err();
    match &err {
        DrawListError::ElementBufferMismatch { expected, found } => {
            assert_eq!(*expected, base.element_buffer);
            assert_eq!(*found, None);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("element buffer None"));
    assert!(err.is_usage_violation());

    list.execute(&mut sink, &base).unwrap();
    assert_eq!(
        sink.commands().last(),
        Some(&GpuCommand::DrawElements {
            mode: PrimitiveMode::TriangleStrip,
            count: 12,
            format: IndexFormat::Uint32,
            offset: 24,
        })
    );
}

#[test]
fn execute_rejects_a_foreign_base_state() {
    let scene = Scene::new();
    let mut list = scene.list();
    add_all(&mut list, vec![scene.quad(1)]);
    let base = list.base_state().unwrap();
    let mut sink = RecordingSink::new();

    let err = list
        .execute(
            &mut sink,
            &BaseState {
                program: Some(ProgramId(usize::MAX)),
                ..base
            },
        )
        .unwrap_err();
    assert!(matches!(err, DrawListError::ProgramMismatch { .. }));
    assert!(err.is_usage_violation());

    let err = list
        .execute(
            &mut sink,
            &BaseState {
                vertex_array: None,
                ..base
            },
        )
        .unwrap_err();
    assert!(matches!(err, DrawListError::VertexArrayMismatch { .. }));

    let err = list
        .execute(
            &mut sink,
            &BaseState {
                environment: EnvironmentId(u64::MAX),
                ..base
            },
        )
        .unwrap_err();
    assert!(matches!(err, DrawListError::EnvironmentMismatch { .. }));
    assert!(sink.commands().is_empty());

    // A rejected traversal does not hold the buffer.
    assert_eq!(list.execute(&mut sink, &base).unwrap(), 1);
}

#[test]
fn an_empty_list_executes_nothing() {
    let scene = Scene::new();
    let list = scene.list();
    assert!(list.base_state().is_none());

    let mut sink = RecordingSink::new();
    let base = BaseState {
        environment: list.environment(),
        program: None,
        vertex_array: None,
        element_buffer: None,
    };
    assert_eq!(list.execute(&mut sink, &base).unwrap(), 0);
    assert!(sink.commands().is_empty());
}

#[test]
fn recompiled_dependents_show_up_at_the_next_traversal() {
    let scene = Scene::new();
    let mut list = scene.list();
    add_all(&mut list, vec![scene.quad(1), scene.quad(2)]);
    let base = list.base_state().unwrap();

    scene
        .material
        .set(COLOR, SlotValue::Ready(StateValue::Vec4(BLUE)));
    let mut sink = RecordingSink::new();
    list.execute(&mut sink, &base).unwrap();
    assert_eq!(uniform_values(&sink), vec![Some(StateValue::Vec4(RED))]);

    assert_eq!(list.recompile_dependents(scene.material.id()).unwrap(), 1);
    assert_eq!(list.recompile_dependents(scene.pipeline.id()).unwrap(), 2);
    assert_eq!(list.recompile_dependents(PipeId::next()).unwrap(), 0);

    sink.take();
    list.execute(&mut sink, &base).unwrap();
    assert_eq!(uniform_values(&sink), vec![Some(StateValue::Vec4(BLUE))]);
}

#[test]
fn settings_are_evicted_with_their_last_holder() {
    let scene = Scene::new();
    let mut list = scene.list();
    let slot = scene.quad(1);
    let id = slot.id();

    list.add(slot).unwrap();
    let first = list.cache_stats();
    assert_eq!(first.live, SHARED_SETTINGS);
    assert_eq!(first.misses, SHARED_SETTINGS as u64);

    let slot = list.remove(id).unwrap();
    let removed = list.cache_stats();
    assert_eq!(removed.live, 0);
    assert_eq!(removed.evictions, SHARED_SETTINGS as u64);

    list.add(slot).unwrap();
    let again = list.cache_stats();
    assert_eq!(again.live, SHARED_SETTINGS);
    assert_eq!(again.misses, 2 * SHARED_SETTINGS as u64);
    assert!(again.compilations > first.compilations);
}

#[test]
fn adding_a_present_slot_is_rejected() {
    let scene = Scene::new();
    let mut list = scene.list();
    let slot = scene.quad(1);
    list.add(slot.clone()).unwrap();

    let err = list.add(slot.clone()).unwrap_err();
    assert!(matches!(err, DrawListError::AlreadyPresent(id) if id == slot.id()));
    assert!(err.is_usage_violation());
    assert_eq!(list.len(), 1);
    assert_eq!(scene.program().lock_count(), 1);
}

fn assert_rolled_back(scene: &Scene, list: &DrawList) {
    assert!(list.is_empty());
    assert_eq!(list.cache_stats().live, 0);
    assert_eq!(scene.program().lock_count(), 0);
    list.verify().unwrap();
}

#[test]
fn drawing_twice_is_a_usage_violation() {
    let scene = Scene::new();
    let mut list = scene.list();
    let err = list
        .add(scene.slot(Misbehaving::DrawsTwice(triangles(1))))
        .unwrap_err();
    assert!(matches!(
        err,
        DrawListError::Render(RenderError::AlreadyDrawn)
    ));
    assert!(err.is_usage_violation());
    assert_rolled_back(&scene, &list);
}

#[test]
fn drawing_with_another_state_is_a_usage_violation() {
    let scene = Scene::new();
    let mut list = scene.list();
    let err = list
        .add(scene.slot(Misbehaving::DrawsWith(scene.state(), triangles(1))))
        .unwrap_err();
    assert!(matches!(
        err,
        DrawListError::Render(RenderError::StateMismatch { .. })
    ));
    assert!(err.is_usage_violation());
    assert_rolled_back(&scene, &list);
}

#[test]
fn ignored_usage_violations_still_reject_the_slot() {
    let scene = Scene::new();
    let mut list = scene.list();
    let slot = scene.slot(Misbehaving::IgnoresErrors(scene.state(), triangles(1)));
    let id = slot.id();
    let err = list.add(slot).unwrap_err();
    assert!(matches!(
        err,
        DrawListError::Render(RenderError::AlreadyDrawn)
    ));
    assert!(err.is_usage_violation());
    assert!(!list.contains(id));
    assert_rolled_back(&scene, &list);
}

#[test]
fn an_ignored_unsupported_clear_still_rejects_the_slot() {
    struct ClearsThenDraws;

    impl Drawable for ClearsThenDraws {
        fn draw(
            &self,
            state: &dyn GroupPipe,
            render: &mut dyn Render,
        ) -> Result<(), RenderError> {
            let _ = render.clear_color(state, 0, [0.0; 4]);
            render.draw(state, &triangles(1))
        }
    }

    let scene = Scene::new();
    let mut list = scene.list();
    let err = list.add(scene.slot(ClearsThenDraws)).unwrap_err();
    assert!(err.is_unsupported());
    assert_rolled_back(&scene, &list);
}

#[test]
fn ephemeral_geometry_and_clears_are_unsupported() {
    let scene = Scene::new();
    let mut list = scene.list();

    let ephemeral = Model::ephemeral(Arc::from(vec![0u8; 36]), PrimitiveMode::Triangles, 3);
    let err = list.add(scene.slot(Quad(ephemeral))).unwrap_err();
    assert!(err.is_unsupported());
    assert!(!err.is_usage_violation());

    let err = list.add(scene.slot(Misbehaving::ClearsDepth)).unwrap_err();
    assert!(err.is_unsupported());
    assert_rolled_back(&scene, &list);
}

#[test]
fn a_slot_that_draws_nothing_is_rejected() {
    let scene = Scene::new();
    let mut list = scene.list();
    let slot = scene.slot(Misbehaving::DrawsNothing);
    let id = slot.id();
    let err = list.add(slot).unwrap_err();
    assert!(matches!(err, DrawListError::NothingDrawn(found) if found == id));
    assert!(!list.contains(id));
    assert_rolled_back(&scene, &list);
}

#[test]
fn missing_geometry_fails_without_side_effects() {
    let scene = Scene::new();
    let mut list = scene.list();
    scene.env.remove_mesh(MeshId(5));
    let err = list.add(scene.quad(5)).unwrap_err();
    assert!(matches!(
        err,
        DrawListError::Render(RenderError::Resource(ResourceError::NotFound))
    ));
    assert_rolled_back(&scene, &list);
}

#[test]
fn pending_state_can_be_retried_once_ready() {
    let scene = Scene::new();
    let mut list = scene.list();
    scene.pipeline.set(StateSlot::DEPTH_TEST, SlotValue::Pending);

    let slot = scene.quad(1);
    let err = list.add(slot.clone()).unwrap_err();
    assert!(err.is_not_ready());
    assert!(!err.is_usage_violation());
    assert_rolled_back(&scene, &list);

    scene.pipeline.set(
        StateSlot::DEPTH_TEST,
        SlotValue::Ready(StateValue::Bool(false)),
    );
    list.add(slot).unwrap();
    assert_eq!(list.len(), 1);
}

#[test]
fn failed_recompilation_keeps_the_published_commands() {
    let scene = Scene::new();
    let mut list = scene.list();
    add_all(&mut list, vec![scene.quad(1)]);
    let base = list.base_state().unwrap();

    scene.material.set(COLOR, SlotValue::Pending);
    let err = list.recompile_dependents(scene.material.id()).unwrap_err();
    assert!(err.is_not_ready());

    let mut sink = RecordingSink::new();
    list.execute(&mut sink, &base).unwrap();
    assert_eq!(uniform_values(&sink), vec![Some(StateValue::Vec4(RED))]);
}

#[test]
fn failed_adds_leave_the_sort_order_intact() {
    let scene = Scene::new();
    let mut list = scene.list();
    let first = scene.quad(1);
    let second = scene.quad(2);
    let ids = [first.id(), second.id()];

    list.add(first).unwrap();
    list.add(scene.slot(Misbehaving::DrawsNothing)).unwrap_err();
    list.add(second).unwrap();

    assert_eq!(list.slots_in_order(), ids.to_vec());
    list.verify().unwrap();
}

#[test]
fn update_moves_the_slot_to_the_end() {
    let scene = Scene::new();
    let mut list = scene.list();
    let a = scene.quad(1);
    let ids = add_all(&mut list, vec![a.clone(), scene.quad(2), scene.quad(3)]);

    let recolored = Scene::material(ShaderId(1), BLUE);
    list.update(a.with_state(scene.state_with(&recolored))).unwrap();

    assert_eq!(list.slots_in_order(), vec![ids[1], ids[2], ids[0]]);
    assert_eq!(list.transition(ids[1]).unwrap().setting_count(), 0);
    // Only the uniform reads the new material.
    assert_eq!(
        list.transition(ids[0]).unwrap().categories(),
        vec![
            SettingCategory::VertexArray,
            SettingCategory::Uniform(UniformId(0))
        ]
    );
    assert_eq!(scene.program().lock_count(), 3);

    let unknown = scene.quad(7);
    assert!(matches!(
        list.update(unknown),
        Err(DrawListError::UnknownSlot(_))
    ));
}

#[test]
fn dispose_releases_everything() {
    let scene = Scene::new();
    let mut list = scene.list();
    add_all(
        &mut list,
        vec![scene.quad(1), scene.quad(2), scene.quad(3)],
    );
    let base = list.base_state().unwrap();

    list.dispose().unwrap();
    assert!(list.is_disposed());
    assert!(list.is_empty());
    assert_eq!(list.cache_stats().live, 0);
    assert_eq!(scene.program().lock_count(), 0);

    let mut sink = RecordingSink::new();
    assert!(matches!(
        list.add(scene.quad(4)),
        Err(DrawListError::Disposed)
    ));
    assert!(matches!(
        list.execute(&mut sink, &base),
        Err(DrawListError::Disposed)
    ));
    assert!(matches!(
        list.recompile_dependents(scene.material.id()),
        Err(DrawListError::Disposed)
    ));
    assert!(matches!(list.dispose(), Err(DrawListError::Disposed)));
}

#[test]
fn dropping_the_list_unlocks_its_programs() {
    let scene = Scene::new();
    {
        let mut list = scene.list();
        add_all(&mut list, vec![scene.quad(1), scene.quad(2)]);
        assert_eq!(scene.program().lock_count(), 2);
    }
    assert_eq!(scene.program().lock_count(), 0);
    assert_eq!(scene.env.collect_unlocked(), 1);
}

#[test]
fn settings_can_be_loaded_from_ron() {
    let scene = Scene::new();
    let settings =
        DrawListSettings::from_ron("(verify_on_mutation: true, expected_entries: 4)").unwrap();
    let mut list = DrawList::with_settings(scene.env.clone(), settings.clone());
    assert_eq!(list.settings(), &settings);
    add_all(&mut list, vec![scene.quad(1)]);
    list.verify().unwrap();
}

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn random_churn_keeps_order_and_minimal_transitions() {
    let scene = Scene::new();
    let mut list = scene.list();
    let materials = [
        scene.material.clone(),
        Scene::material(ShaderId(2), BLUE),
    ];
    let mut rng = Lcg(0x5eed);
    let mut expected: Vec<SlotId> = Vec::new();

    for step in 0..300u64 {
        if expected.is_empty() || rng.next() % 3 != 0 {
            let material = &materials[(rng.next() % 2) as usize];
            let slot = RenderSlot::new(
                Arc::new(Quad(triangles(step % 5))),
                scene.state_with(material),
            );
            expected.push(slot.id());
            list.add(slot).unwrap();
        } else {
            let index = (rng.next() as usize) % expected.len();
            let id = expected.remove(index);
            list.remove(id).unwrap();
        }

        list.verify().unwrap();
        assert_eq!(list.slots_in_order(), expected);
    }

    for pair in expected.windows(2) {
        let transition = list.transition(pair[1]).unwrap();
        if list.program(pair[0]) == list.program(pair[1]) {
            assert!(!transition.switches_program());
            assert_eq!(
                transition.categories()[0],
                SettingCategory::VertexArray
            );
        } else {
            assert!(transition.switches_program());
        }
    }

    let base = list.base_state().unwrap();
    let mut sink = RecordingSink::new();
    assert_eq!(list.execute(&mut sink, &base).unwrap(), expected.len());
    assert_eq!(sink.draw_count(), expected.len());
}
