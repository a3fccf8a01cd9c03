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

//! # Sort Tree
//!
//! A height-balanced (AVL) binary search tree keyed by a `u64` sort id.
//!
//! Nodes live in an arena and refer to each other through [`NodeId`]s. A node keeps its id
//! for as long as it is in the tree: removal splices nodes structurally instead of moving
//! values around, so ids held by callers stay valid for every other node.

use std::cmp::Ordering;
use thiserror::Error;

/// A stable handle to a node of a [`SortTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A structural fault reported by [`SortTree::insert`] or [`SortTree::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The sort id is already used by another node.
    #[error("sort id {0} is already present in the tree")]
    DuplicateSortId(u64),
    /// A child does not point back at its parent, or the root has a parent.
    #[error("node {node:?} has a broken parent link")]
    BrokenLink {
        /// The offending node.
        node: NodeId,
    },
    /// In-order traversal is not strictly ascending.
    #[error("sort ids out of order: {previous} is followed by {next}")]
    OutOfOrder {
        /// The sort id visited first.
        previous: u64,
        /// The sort id visited after it.
        next: u64,
    },
    /// A node's cached height is stale.
    #[error("node {node:?} stores height {stored} but its subtree has height {actual}")]
    HeightMismatch {
        /// The offending node.
        node: NodeId,
        /// The cached height.
        stored: i32,
        /// The recomputed height.
        actual: i32,
    },
    /// The subtrees of a node differ in height by more than one.
    #[error("node {node:?} is out of balance by {balance}")]
    Unbalanced {
        /// The offending node.
        node: NodeId,
        /// Left height minus right height.
        balance: i32,
    },
    /// The number of reachable nodes differs from the number of live nodes.
    #[error("{reached} nodes are reachable from the root but {tracked} are live")]
    CountMismatch {
        /// Nodes reachable from the root.
        reached: usize,
        /// Nodes the tree believes are live.
        tracked: usize,
    },
}

#[derive(Debug, Clone)]
struct Node<T> {
    sort_id: u64,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    /// Height of the subtree rooted here (1 for leaves).
    height: i32,
    /// `None` while the node sits on the free list.
    value: Option<T>,
}

/// An ordered arena tree with O(log n) insert, remove and neighbor lookup.
#[derive(Debug, Clone)]
pub struct SortTree<T> {
    root: Option<NodeId>,
    nodes: Vec<Node<T>>,
    free_list: Vec<NodeId>,
    len: usize,
}

impl<T> Default for SortTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SortTree<T> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty tree with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            root: None,
            nodes: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// The number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree holds no node.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the whole tree (0 when empty).
    pub fn height(&self) -> i32 {
        self.height_of(self.root)
    }

    /// Returns `true` if `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.live(id).is_some()
    }

    /// Returns the value stored at `id`.
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.live(id).and_then(|node| node.value.as_ref())
    }

    /// Returns the value stored at `id`, mutably.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes
            .get_mut(id.index())
            .and_then(|node| node.value.as_mut())
    }

    /// Returns the sort id of `id`.
    pub fn sort_id(&self, id: NodeId) -> Option<u64> {
        self.live(id).map(|node| node.sort_id)
    }

    /// Finds the node holding `sort_id`.
    pub fn find(&self, sort_id: u64) -> Option<NodeId> {
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let node = &self.nodes[id.index()];
            cursor = match sort_id.cmp(&node.sort_id) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    /// Inserts `value` under `sort_id` and rebalances the path to the root.
    pub fn insert(&mut self, sort_id: u64, value: T) -> Result<NodeId, TreeError> {
        let mut parent = None;
        let mut go_left = false;
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let node = &self.nodes[id.index()];
            parent = Some(id);
            go_left = match sort_id.cmp(&node.sort_id) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => return Err(TreeError::DuplicateSortId(sort_id)),
            };
            cursor = if go_left { node.left } else { node.right };
        }

        let id = self.allocate(sort_id, value);
        self.nodes[id.index()].parent = parent;
        match parent {
            None => self.root = Some(id),
            Some(p) if go_left => self.nodes[p.index()].left = Some(id),
            Some(p) => self.nodes[p.index()].right = Some(id),
        }
        self.len += 1;
        self.retrace(parent);
        Ok(id)
    }

    /// Removes the node `id` and returns its value.
    ///
    /// A node with two children is replaced by its in-order successor.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let (left, right, parent) = {
            let node = self.live(id)?;
            (node.left, node.right, node.parent)
        };

        let retrace_from = match (left, right) {
            (Some(left), Some(right)) => {
                let successor = self.leftmost(right);
                let successor_parent = self.nodes[successor.index()].parent;
                let start = match successor_parent {
                    Some(p) if p != id => {
                        let successor_right = self.nodes[successor.index()].right;
                        self.transplant(successor, successor_right);
                        self.nodes[successor.index()].right = Some(right);
                        self.nodes[right.index()].parent = Some(successor);
                        p
                    }
                    _ => successor,
                };
                self.transplant(id, Some(successor));
                self.nodes[successor.index()].left = Some(left);
                self.nodes[left.index()].parent = Some(successor);
                Some(start)
            }
            (Some(child), None) | (None, Some(child)) => {
                self.transplant(id, Some(child));
                parent
            }
            (None, None) => {
                self.transplant(id, None);
                parent
            }
        };

        let value = self.deallocate(id);
        self.len -= 1;
        self.retrace(retrace_from);
        value
    }

    /// The node with the lowest sort id.
    pub fn first(&self) -> Option<NodeId> {
        self.root.map(|root| self.leftmost(root))
    }

    /// The node with the highest sort id.
    pub fn last(&self) -> Option<NodeId> {
        self.root.map(|root| self.rightmost(root))
    }

    /// The in-order predecessor of `id`.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        let node = self.live(id)?;
        if let Some(left) = node.left {
            return Some(self.rightmost(left));
        }
        let mut child = id;
        let mut parent = node.parent;
        while let Some(p) = parent {
            if self.nodes[p.index()].right == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p.index()].parent;
        }
        None
    }

    /// The in-order successor of `id`.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        let node = self.live(id)?;
        if let Some(right) = node.right {
            return Some(self.leftmost(right));
        }
        let mut child = id;
        let mut parent = node.parent;
        while let Some(p) = parent {
            if self.nodes[p.index()].left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p.index()].parent;
        }
        None
    }

    /// Iterates over `(id, value)` pairs in ascending sort id order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            tree: self,
            cursor: self.first(),
        }
    }

    /// Checks every structural invariant of the tree.
    ///
    /// Parent links must be mutual, in-order traversal strictly ascending, cached heights
    /// exact, and no node may be out of balance by more than one.
    pub fn verify(&self) -> Result<(), TreeError> {
        if let Some(root) = self.root {
            if self.nodes[root.index()].parent.is_some() {
                return Err(TreeError::BrokenLink { node: root });
            }
        }

        let mut reached = 0;
        self.verify_subtree(self.root, &mut reached)?;
        if reached != self.len {
            return Err(TreeError::CountMismatch {
                reached,
                tracked: self.len,
            });
        }

        let mut previous: Option<u64> = None;
        let mut cursor = self.first();
        while let Some(id) = cursor {
            let sort_id = self.nodes[id.index()].sort_id;
            if let Some(previous) = previous {
                if sort_id <= previous {
                    return Err(TreeError::OutOfOrder {
                        previous,
                        next: sort_id,
                    });
                }
            }
            previous = Some(sort_id);
            cursor = self.next(id);
        }
        Ok(())
    }

    fn verify_subtree(&self, id: Option<NodeId>, reached: &mut usize) -> Result<i32, TreeError> {
        let Some(id) = id else {
            return Ok(0);
        };
        let node = &self.nodes[id.index()];
        if node.value.is_none() {
            return Err(TreeError::BrokenLink { node: id });
        }
        *reached += 1;

        for child in [node.left, node.right].into_iter().flatten() {
            if self.nodes[child.index()].parent != Some(id) {
                return Err(TreeError::BrokenLink { node: child });
            }
        }

        let left = self.verify_subtree(node.left, reached)?;
        let right = self.verify_subtree(node.right, reached)?;
        let actual = 1 + left.max(right);
        if node.height != actual {
            return Err(TreeError::HeightMismatch {
                node: id,
                stored: node.height,
                actual,
            });
        }
        if (left - right).abs() > 1 {
            return Err(TreeError::Unbalanced {
                node: id,
                balance: left - right,
            });
        }
        Ok(actual)
    }

    // --- Balancing ---

    /// Walks from `cursor` to the root, fixing heights and rotating where needed.
    fn retrace(&mut self, mut cursor: Option<NodeId>) {
        while let Some(id) = cursor {
            let top = self.rebalance(id);
            cursor = self.nodes[top.index()].parent;
        }
    }

    /// Restores the balance of the subtree rooted at `id` and returns its new root.
    fn rebalance(&mut self, id: NodeId) -> NodeId {
        self.update_height(id);
        let balance = self.balance_of(id);
        if balance > 1 {
            if let Some(left) = self.nodes[id.index()].left {
                if self.balance_of(left) < 0 {
                    self.rotate_left(left);
                }
            }
            return self.rotate_right(id);
        }
        if balance < -1 {
            if let Some(right) = self.nodes[id.index()].right {
                if self.balance_of(right) > 0 {
                    self.rotate_right(right);
                }
            }
            return self.rotate_left(id);
        }
        id
    }

    fn rotate_left(&mut self, x: NodeId) -> NodeId {
        let Some(y) = self.nodes[x.index()].right else {
            return x;
        };
        let parent = self.nodes[x.index()].parent;
        let inner = self.nodes[y.index()].left;

        self.nodes[x.index()].right = inner;
        if let Some(inner) = inner {
            self.nodes[inner.index()].parent = Some(x);
        }
        self.replace_child(parent, x, Some(y));
        self.nodes[y.index()].parent = parent;
        self.nodes[y.index()].left = Some(x);
        self.nodes[x.index()].parent = Some(y);

        self.update_height(x);
        self.update_height(y);
        y
    }

    fn rotate_right(&mut self, x: NodeId) -> NodeId {
        let Some(y) = self.nodes[x.index()].left else {
            return x;
        };
        let parent = self.nodes[x.index()].parent;
        let inner = self.nodes[y.index()].right;

        self.nodes[x.index()].left = inner;
        if let Some(inner) = inner {
            self.nodes[inner.index()].parent = Some(x);
        }
        self.replace_child(parent, x, Some(y));
        self.nodes[y.index()].parent = parent;
        self.nodes[y.index()].right = Some(x);
        self.nodes[x.index()].parent = Some(y);

        self.update_height(x);
        self.update_height(y);
        y
    }

    #[inline]
    fn height_of(&self, id: Option<NodeId>) -> i32 {
        id.map_or(0, |id| self.nodes[id.index()].height)
    }

    #[inline]
    fn balance_of(&self, id: NodeId) -> i32 {
        let node = &self.nodes[id.index()];
        self.height_of(node.left) - self.height_of(node.right)
    }

    fn update_height(&mut self, id: NodeId) {
        let (left, right) = {
            let node = &self.nodes[id.index()];
            (node.left, node.right)
        };
        self.nodes[id.index()].height = 1 + self.height_of(left).max(self.height_of(right));
    }

    // --- Links ---

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.nodes[id.index()].left {
            id = left;
        }
        id
    }

    fn rightmost(&self, mut id: NodeId) -> NodeId {
        while let Some(right) = self.nodes[id.index()].right {
            id = right;
        }
        id
    }

    /// Makes `parent` (or the root) point at `new` where it pointed at `old`.
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let node = &mut self.nodes[p.index()];
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    node.right = new;
                }
            }
        }
    }

    /// Puts the subtree `v` in the place of `u`.
    fn transplant(&mut self, u: NodeId, v: Option<NodeId>) {
        let parent = self.nodes[u.index()].parent;
        self.replace_child(parent, u, v);
        if let Some(v) = v {
            self.nodes[v.index()].parent = parent;
        }
    }

    // --- Node Allocation ---

    fn live(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes
            .get(id.index())
            .filter(|node| node.value.is_some())
    }

    fn allocate(&mut self, sort_id: u64, value: T) -> NodeId {
        let node = Node {
            sort_id,
            parent: None,
            left: None,
            right: None,
            height: 1,
            value: Some(value),
        };
        match self.free_list.pop() {
            Some(id) => {
                self.nodes[id.index()] = node;
                id
            }
            None => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(node);
                id
            }
        }
    }

    fn deallocate(&mut self, id: NodeId) -> Option<T> {
        let node = &mut self.nodes[id.index()];
        node.parent = None;
        node.left = None;
        node.right = None;
        node.height = 0;
        let value = node.value.take();
        self.free_list.push(id);
        value
    }
}

/// In-order iterator over a [`SortTree`].
pub struct Iter<'a, T> {
    tree: &'a SortTree<T>,
    cursor: Option<NodeId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        self.cursor = self.tree.next(id);
        self.tree.get(id).map(|value| (id, value))
    }
}
