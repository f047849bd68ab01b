//! Recursive split layout for one tab.
//!
//! A layout is a tree where internal nodes divide space among two or more
//! children along an axis and leaves reference exactly one session by id.
//! The tree never owns session metadata; that lives in the
//! [`SessionRegistry`](crate::session::SessionRegistry).
//!
//! ```text
//! Split (Horizontal)
//! ├── Leaf (session 1)
//! └── Split (Vertical)
//!     ├── Leaf (session 2)
//!     └── Leaf (session 3)
//! ```
//!
//! Every mutation restores the structural invariants before returning: a
//! split always has at least two children, child weights stay positive and
//! sum to [`TOTAL_WEIGHT`], and a split left with a single child is replaced
//! by that child.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::session::SessionId;

/// Unique identifier for a split node within a tab's layout.
pub type NodeId = u64;

/// Weights are percentages normalised to this total per split node.
pub const TOTAL_WEIGHT: f32 = 100.0;

/// Floor and ceiling for an explicitly resized child, in percent.
pub const MIN_WEIGHT: f32 = 10.0;
pub const MAX_WEIGHT: f32 = 90.0;

/// Direction of a split between panes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    /// Side-by-side (left | right)
    Horizontal,
    /// Stacked (top / bottom)
    Vertical,
}

/// A layout node: either an internal split or a leaf session reference.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayoutNode {
    Split {
        id: NodeId,
        direction: SplitDirection,
        children: Vec<LayoutNode>,
        /// Parallel to `children`; positive, summing to [`TOTAL_WEIGHT`].
        weights: Vec<f32>,
    },
    Leaf { session: SessionId },
}

/// Result of removing a leaf from a tree.
#[derive(Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The leaf was removed and the tree repaired.
    Removed,
    /// The removed leaf was the root; the tree is now empty and the owning
    /// tab must be closed.
    BecameEmpty,
    NotFound,
}

impl LayoutNode {
    pub fn leaf(session: SessionId) -> Self {
        LayoutNode::Leaf { session }
    }

    /// Replace the leaf holding `target` with a split of the given direction
    /// containing the original leaf first (top/left) and a new leaf for
    /// `new_session` second, weighted 50/50.
    ///
    /// Returns `false` (leaving the tree untouched) if `target` is not in
    /// the tree.
    pub fn split_leaf(
        &mut self,
        target: SessionId,
        direction: SplitDirection,
        new_session: SessionId,
        split_id: NodeId,
    ) -> bool {
        match self {
            LayoutNode::Leaf { session } if *session == target => {
                let original = LayoutNode::leaf(*session);
                *self = LayoutNode::Split {
                    id: split_id,
                    direction,
                    children: vec![original, LayoutNode::leaf(new_session)],
                    weights: vec![TOTAL_WEIGHT / 2.0, TOTAL_WEIGHT / 2.0],
                };
                true
            }
            LayoutNode::Leaf { .. } => false,
            LayoutNode::Split { children, .. } => children
                .iter_mut()
                .any(|child| child.split_leaf(target, direction, new_session, split_id)),
        }
    }

    /// Remove the leaf holding `target`, collapsing any split left with a
    /// single child by promoting that child in its place.
    pub fn remove_leaf(&mut self, target: SessionId) -> RemoveOutcome {
        if let LayoutNode::Leaf { session } = self {
            return if *session == target {
                RemoveOutcome::BecameEmpty
            } else {
                RemoveOutcome::NotFound
            };
        }
        if self.remove_leaf_inner(target) {
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::NotFound
        }
    }

    fn remove_leaf_inner(&mut self, target: SessionId) -> bool {
        let LayoutNode::Split {
            children, weights, ..
        } = self
        else {
            return false;
        };

        if let Some(idx) = children
            .iter()
            .position(|c| matches!(c, LayoutNode::Leaf { session } if *session == target))
        {
            children.remove(idx);
            weights.remove(idx);
            normalize(weights);
            if children.len() == 1 {
                // A split of one is not a split; promote the survivor.
                let survivor = children.remove(0);
                *self = survivor;
            }
            return true;
        }

        for child in children.iter_mut() {
            if child.remove_leaf_inner(target) {
                return true;
            }
        }
        false
    }

    /// All session ids in the tree, depth-first, left to right.
    pub fn collect_session_ids(&self) -> Vec<SessionId> {
        match self {
            LayoutNode::Leaf { session } => vec![*session],
            LayoutNode::Split { children, .. } => children
                .iter()
                .flat_map(|child| child.collect_session_ids())
                .collect(),
        }
    }

    /// The first (leftmost/topmost) session, used for default focus.
    pub fn first_session(&self) -> Option<SessionId> {
        match self {
            LayoutNode::Leaf { session } => Some(*session),
            LayoutNode::Split { children, .. } => {
                children.first().and_then(|child| child.first_session())
            }
        }
    }

    pub fn contains_session(&self, target: SessionId) -> bool {
        match self {
            LayoutNode::Leaf { session } => *session == target,
            LayoutNode::Split { children, .. } => {
                children.iter().any(|child| child.contains_session(target))
            }
        }
    }

    /// Reassign the weight of one child of the split node `split_id`.
    ///
    /// The new weight is clamped to `[MIN_WEIGHT, MAX_WEIGHT]` and the
    /// complement is redistributed over the remaining siblings in proportion
    /// to their current weights, so no sibling is ever driven to zero.
    pub fn resize_child(
        &mut self,
        split_id: NodeId,
        child_index: usize,
        new_weight: f32,
    ) -> Result<(), CoreError> {
        let Some((weights, _)) = self.find_split_mut(split_id) else {
            return Err(CoreError::NodeNotFound(split_id));
        };
        if child_index >= weights.len() {
            return Err(CoreError::BadChildIndex {
                node: split_id,
                index: child_index,
            });
        }

        let new_weight = new_weight.clamp(MIN_WEIGHT, MAX_WEIGHT);
        let old_rest = TOTAL_WEIGHT - weights[child_index];
        let new_rest = TOTAL_WEIGHT - new_weight;
        for (i, w) in weights.iter_mut().enumerate() {
            if i == child_index {
                *w = new_weight;
            } else {
                *w *= new_rest / old_rest;
            }
        }
        Ok(())
    }

    fn find_split_mut(&mut self, split_id: NodeId) -> Option<(&mut Vec<f32>, SplitDirection)> {
        match self {
            LayoutNode::Leaf { .. } => None,
            LayoutNode::Split {
                id,
                direction,
                children,
                weights,
            } => {
                if *id == split_id {
                    return Some((weights, *direction));
                }
                children
                    .iter_mut()
                    .find_map(|child| child.find_split_mut(split_id))
            }
        }
    }

    /// Check every structural invariant of the tree. Mutations maintain
    /// these internally; this exists for tests and debug assertions.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = std::collections::HashSet::new();
        for id in self.collect_session_ids() {
            if !seen.insert(id) {
                return Err(CoreError::Invariant(format!(
                    "session {id} appears in more than one pane"
                )));
            }
        }
        self.validate_node()
    }

    fn validate_node(&self) -> Result<(), CoreError> {
        let LayoutNode::Split {
            id,
            children,
            weights,
            ..
        } = self
        else {
            return Ok(());
        };

        if children.len() < 2 {
            return Err(CoreError::Invariant(format!(
                "split {id} has {} children",
                children.len()
            )));
        }
        if children.len() != weights.len() {
            return Err(CoreError::Invariant(format!(
                "split {id} has {} children but {} weights",
                children.len(),
                weights.len()
            )));
        }
        if weights.iter().any(|w| *w <= 0.0) {
            return Err(CoreError::Invariant(format!(
                "split {id} has a non-positive weight"
            )));
        }
        let sum: f32 = weights.iter().sum();
        if (sum - TOTAL_WEIGHT).abs() > 0.01 {
            return Err(CoreError::Invariant(format!(
                "split {id} weights sum to {sum}"
            )));
        }
        for child in children {
            child.validate_node()?;
        }
        Ok(())
    }
}

/// Rescale weights so they sum to [`TOTAL_WEIGHT`] again.
fn normalize(weights: &mut [f32]) {
    let sum: f32 = weights.iter().sum();
    if sum <= 0.0 {
        return;
    }
    for w in weights.iter_mut() {
        *w *= TOTAL_WEIGHT / sum;
    }
}
