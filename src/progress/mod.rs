//! Per-player progress trees.
//!
//! Every criterion of an advancement gets exactly one progress node per
//! player. Leaf and score nodes hold state; combinator nodes derive theirs
//! from their children and memoize it; empty nodes are achieved from the
//! start. Nodes live in an arena owned by [`AdvancementProgress`], and each
//! node records its parents at construction time so that invalidating a node
//! always reaches the root.

pub mod advancement;
mod arena;
pub mod combinator;
pub mod empty;
pub mod leaf;
pub mod score;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::criterion::Criterion;
use crate::external::Timestamp;

pub use advancement::{AdvancementProgress, ProgressOptions};
pub use arena::NodeView;
pub use combinator::{CombinatorProgress, Mode};
pub use empty::EmptyProgress;
pub use leaf::LeafProgress;
pub use score::ScoreProgress;

/// Persisted progress: criterion name or score sub-identifier to the epoch
/// millis it was achieved at.
pub type SavedProgress = BTreeMap<String, i64>;

/// Wire progress: sub-identifier to epoch millis, or [`UNACHIEVED`].
pub type WireProgress = BTreeMap<String, i64>;

/// Wire value for a sub-identifier that is not achieved.
pub const UNACHIEVED: i64 = -1;

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Evaluation state for one criterion.
#[derive(Debug)]
pub enum ProgressNode {
    Empty(EmptyProgress),
    Leaf(LeafProgress),
    Score(ScoreProgress),
    And(CombinatorProgress),
    Or(CombinatorProgress),
}

impl ProgressNode {
    /// The criterion this node tracks.
    pub fn criterion(&self) -> &Arc<Criterion> {
        match self {
            ProgressNode::Empty(node) => node.criterion(),
            ProgressNode::Leaf(node) => node.criterion(),
            ProgressNode::Score(node) => node.criterion(),
            ProgressNode::And(node) | ProgressNode::Or(node) => node.criterion(),
        }
    }

    /// Short lowercase name of the node kind, for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ProgressNode::Empty(_) => "empty",
            ProgressNode::Leaf(_) => "leaf",
            ProgressNode::Score(_) => "score",
            ProgressNode::And(_) => "and",
            ProgressNode::Or(_) => "or",
        }
    }

    /// The combinator state, for And and Or nodes.
    pub fn as_combinator(&self) -> Option<&CombinatorProgress> {
        match self {
            ProgressNode::And(node) | ProgressNode::Or(node) => Some(node),
            _ => None,
        }
    }

    /// Whether this node carries persisted and synced state.
    pub fn is_stateful(&self) -> bool {
        matches!(self, ProgressNode::Leaf(_) | ProgressNode::Score(_))
    }
}

/// Achieving timestamp stored as epoch millis, with `UNACHIEVED` for `None`.
pub(crate) fn wire_value(at: Option<Timestamp>) -> i64 {
    at.map(crate::external::to_millis).unwrap_or(UNACHIEVED)
}
