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

use super::pipe::StatePipe;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::renderer::{GroupPipe, Pipe, PipeId, ShaderId, StateSlot};

/// A resolved state snapshot made of several [`StatePipe`] groups.
///
/// Each slot is served by the last group that defines it.
#[derive(Debug)]
pub struct StateGroup {
    id: PipeId,
    groups: Vec<Arc<dyn Pipe>>,
    owners: BTreeMap<StateSlot, usize>,
    shaders: BTreeMap<StateSlot, ShaderId>,
}

impl StateGroup {
    /// Combines `groups`, later groups overriding earlier ones slot by slot.
    pub fn new(groups: Vec<Arc<StatePipe>>) -> Arc<Self> {
        let mut owners = BTreeMap::new();
        let mut shaders = BTreeMap::new();
        for (index, group) in groups.iter().enumerate() {
            for slot in group.slots() {
                owners.insert(slot, index);
                match group.shader(slot) {
                    Some(shader) => shaders.insert(slot, shader),
                    None => shaders.remove(&slot),
                };
            }
        }
        Arc::new(Self {
            id: PipeId::next(),
            groups: groups
                .into_iter()
                .map(|group| group as Arc<dyn Pipe>)
                .collect(),
            owners,
            shaders,
        })
    }
}

impl GroupPipe for StateGroup {
    fn id(&self) -> PipeId {
        self.id
    }

    fn groups(&self) -> &[Arc<dyn Pipe>] {
        &self.groups
    }

    fn group_of(&self, slot: StateSlot) -> Option<usize> {
        self.owners.get(&slot).copied()
    }

    fn shaders(&self) -> Vec<ShaderId> {
        self.shaders.values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::renderer::StateValue;

    #[test]
    fn later_groups_override_earlier_ones() {
        let base = StatePipe::builder()
            .value(StateSlot::BLEND, StateValue::Bool(false))
            .value(StateSlot::DEPTH_TEST, StateValue::Bool(true))
            .build();
        let overlay = StatePipe::builder()
            .value(StateSlot::BLEND, StateValue::Bool(true))
            .build();
        let group = StateGroup::new(vec![base.clone(), overlay.clone()]);

        assert_eq!(group.group_of(StateSlot::DEPTH_TEST), Some(0));
        assert_eq!(group.group_of(StateSlot::BLEND), Some(1));
        assert_eq!(group.group_of(StateSlot::CULL_FACE), None);
        assert_eq!(
            group.pipe_for(StateSlot::BLEND).map(|pipe| pipe.id()),
            Some(overlay.id())
        );
    }

    #[test]
    fn shaders_are_listed_in_slot_order() {
        let material = StatePipe::builder()
            .shader(StateSlot::user(2), ShaderId(9))
            .shader(StateSlot::user(0), ShaderId(3))
            .build();
        let group = StateGroup::new(vec![material]);

        assert_eq!(group.shaders(), vec![ShaderId(3), ShaderId(9)]);
    }

    #[test]
    fn shaders_on_distant_slots_stay_compact() {
        let material = StatePipe::builder()
            .shader(StateSlot(u32::MAX), ShaderId(4))
            .shader(StateSlot::user(0), ShaderId(1))
            .build();
        let group = StateGroup::new(vec![material]);
        assert_eq!(group.shaders(), vec![ShaderId(1), ShaderId(4)]);
    }

    #[test]
    fn each_snapshot_has_its_own_identity() {
        let pipe = StatePipe::builder().build();
        let a = StateGroup::new(vec![pipe.clone()]);
        let b = StateGroup::new(vec![pipe]);
        assert_ne!(a.id(), b.id());
        assert!(a.shaders().is_empty());
    }
}
