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

//! Identity-stable state snapshots.
//!
//! The scene layer resolves every drawable to a [`GroupPipe`]: an immutable snapshot
//! made of one or more [`Pipe`] groups, each of which serves a subset of the
//! [`StateSlot`]s. The draw list never compares snapshot *contents*. It compares
//! [`PipeId`]s, which are handed out once and never reused, so two snapshots are
//! "the same" exactly when their identities are equal.

use crate::renderer::api::program::ShaderId;
use crate::renderer::api::resource::{RenderTargetId, TextureId};
use crate::renderer::error::StateError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies one category of state inside a [`GroupPipe`].
///
/// The first [`StateSlot::FIRST_USER`] ids are reserved for the well-known slots
/// read by the scheduler itself; everything above is free for uniforms and
/// output targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateSlot(pub u32);

impl StateSlot {
    /// Depth attachment used when binding the framebuffer.
    pub const DEPTH_BUFFER: StateSlot = StateSlot(0);
    /// Depth comparison toggle.
    pub const DEPTH_TEST: StateSlot = StateSlot(1);
    /// Depth write mask.
    pub const DEPTH_WRITE: StateSlot = StateSlot(2);
    /// Blend equation.
    pub const BLEND: StateSlot = StateSlot(3);
    /// Face culling mode.
    pub const CULL_FACE: StateSlot = StateSlot(4);
    /// Polygon depth offset.
    pub const POLYGON_OFFSET: StateSlot = StateSlot(5);
    /// Rasterized line width.
    pub const LINE_WIDTH: StateSlot = StateSlot(6);
    /// Color write mask.
    pub const COLOR_MASK: StateSlot = StateSlot(7);

    /// First slot id available for user-defined state.
    pub const FIRST_USER: u32 = 16;

    /// Returns the `n`-th user-defined slot.
    pub const fn user(n: u32) -> Self {
        StateSlot(Self::FIRST_USER + n)
    }

    /// Returns the slot id as an index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The identity of a state snapshot.
///
/// Identities are allocated from a process-wide counter and never reused, which is
/// what makes identity comparison a safe cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeId(pub u64);

impl PipeId {
    /// Stands in for "no group serves this slot".
    pub const NONE: PipeId = PipeId(0);

    /// Allocates a fresh, never-before-seen identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        PipeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns `true` for [`PipeId::NONE`].
    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// A value stored in a state slot.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    /// A boolean toggle (depth test, depth write, ...).
    Bool(bool),
    /// An integer or enumerated mode.
    Int(i32),
    /// A scalar.
    Float(f32),
    /// A four-component vector (colors, masks, offsets).
    Vec4([f32; 4]),
    /// A column-major 4x4 matrix.
    Mat4([f32; 16]),
    /// A sampled texture.
    Texture(TextureId),
    /// A render target attachment.
    Target(RenderTargetId),
}

/// The generic pipeline-state categories every entry carries a setting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineState {
    /// Depth comparison.
    DepthTest,
    /// Depth writes.
    DepthWrite,
    /// Color blending.
    Blend,
    /// Face culling.
    CullFace,
    /// Polygon depth offset.
    PolygonOffset,
    /// Line width.
    LineWidth,
    /// Color write mask.
    ColorMask,
}

impl PipelineState {
    /// Every category, in setting order.
    pub const ALL: [PipelineState; 7] = [
        PipelineState::DepthTest,
        PipelineState::DepthWrite,
        PipelineState::Blend,
        PipelineState::CullFace,
        PipelineState::PolygonOffset,
        PipelineState::LineWidth,
        PipelineState::ColorMask,
    ];

    /// The slot this category reads its value from.
    pub fn slot(self) -> StateSlot {
        match self {
            PipelineState::DepthTest => StateSlot::DEPTH_TEST,
            PipelineState::DepthWrite => StateSlot::DEPTH_WRITE,
            PipelineState::Blend => StateSlot::BLEND,
            PipelineState::CullFace => StateSlot::CULL_FACE,
            PipelineState::PolygonOffset => StateSlot::POLYGON_OFFSET,
            PipelineState::LineWidth => StateSlot::LINE_WIDTH,
            PipelineState::ColorMask => StateSlot::COLOR_MASK,
        }
    }
}

/// Read access to state slots.
pub trait StateReader {
    /// Reads the value of `slot`.
    ///
    /// `Ok(None)` means the slot is unset. [`StateError::NotReady`] means the value
    /// exists but cannot be produced yet; callers are expected to retry later.
    fn read(&self, slot: StateSlot) -> Result<Option<StateValue>, StateError>;
}

/// One immutable, identity-stable group of state.
pub trait Pipe: StateReader + Send + Sync + fmt::Debug {
    /// The identity of this group.
    fn id(&self) -> PipeId;
}

/// The resolved state of one drawable: a set of [`Pipe`] groups plus the mapping
/// from slots to the group that serves them.
pub trait GroupPipe: Send + Sync + fmt::Debug {
    /// The identity of the snapshot as a whole.
    fn id(&self) -> PipeId;

    /// The groups this snapshot is made of.
    fn groups(&self) -> &[Arc<dyn Pipe>];

    /// Index into [`groups`](GroupPipe::groups) of the group serving `slot`, if any.
    fn group_of(&self, slot: StateSlot) -> Option<usize>;

    /// The shaders contributed by the snapshot's slots, in slot order.
    ///
    /// Slots without a shader are skipped. The ordered list is the key under which the
    /// environment resolves a program.
    fn shaders(&self) -> Vec<ShaderId>;

    /// The group serving `slot`, if any.
    fn pipe_for(&self, slot: StateSlot) -> Option<&Arc<dyn Pipe>> {
        self.group_of(slot).and_then(|i| self.groups().get(i))
    }
}
