//! Criterion definition trees.
//!
//! A criterion tree describes what an advancement requires. It is built once
//! when advancement definitions are loaded, shared between every player's
//! progress via `Arc`, and never mutated afterwards. Parsing definitions is
//! the loader's job; this module only provides validated constructors.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{ProgressError, Result};

/// An immutable node of an advancement's definition tree.
#[derive(Debug, PartialEq, Eq)]
pub struct Criterion {
    name: String,
    kind: CriterionKind,
}

/// The shape of a criterion.
#[derive(Debug, PartialEq, Eq)]
pub enum CriterionKind {
    /// Atomic condition, achieved by a trigger or an explicit grant.
    Leaf,
    /// Counting condition. One sub-identifier per unit of score, in order.
    Score { goal: u32, sub_ids: Vec<String> },
    /// Always satisfied.
    Empty,
    /// Satisfied when every child is.
    And(Vec<Arc<Criterion>>),
    /// Satisfied when any child is.
    Or(Vec<Arc<Criterion>>),
}

impl Criterion {
    /// Create a leaf criterion.
    pub fn leaf(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind: CriterionKind::Leaf,
        })
    }

    /// Create a criterion that is satisfied from the start.
    pub fn empty(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind: CriterionKind::Empty,
        })
    }

    /// Create a score criterion with sub-identifiers `<name>.0` to
    /// `<name>.<goal-1>`.
    pub fn score(name: impl Into<String>, goal: u32) -> Result<Arc<Self>> {
        let name = name.into();
        let sub_ids = (0..goal).map(|i| format!("{}.{}", name, i)).collect();
        Self::score_with_ids(name, sub_ids)
    }

    /// Create a score criterion with explicit sub-identifiers.
    ///
    /// The goal is the number of sub-identifiers, which must be at least one
    /// and pairwise distinct.
    pub fn score_with_ids(name: impl Into<String>, sub_ids: Vec<String>) -> Result<Arc<Self>> {
        let name = name.into();
        if sub_ids.is_empty() {
            return Err(ProgressError::invalid_argument(format!(
                "score criterion '{}' needs a goal greater than zero",
                name
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = sub_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(ProgressError::invalid_argument(format!(
                "score criterion '{}' repeats sub-identifier '{}'",
                name, dup
            )));
        }
        let goal = u32::try_from(sub_ids.len()).map_err(|_| {
            ProgressError::invalid_argument(format!("score criterion '{}' goal too large", name))
        })?;
        Ok(Arc::new(Self {
            name,
            kind: CriterionKind::Score { goal, sub_ids },
        }))
    }

    /// Create a conjunction over `children`.
    pub fn and(name: impl Into<String>, children: Vec<Arc<Criterion>>) -> Result<Arc<Self>> {
        let name = name.into();
        Self::require_children(&name, &children)?;
        Ok(Arc::new(Self {
            name,
            kind: CriterionKind::And(children),
        }))
    }

    /// Create a disjunction over `children`.
    pub fn or(name: impl Into<String>, children: Vec<Arc<Criterion>>) -> Result<Arc<Self>> {
        let name = name.into();
        Self::require_children(&name, &children)?;
        Ok(Arc::new(Self {
            name,
            kind: CriterionKind::Or(children),
        }))
    }

    fn require_children(name: &str, children: &[Arc<Criterion>]) -> Result<()> {
        if children.is_empty() {
            return Err(ProgressError::invalid_argument(format!(
                "combinator criterion '{}' has no children",
                name
            )));
        }
        Ok(())
    }

    /// Stable name of the criterion.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape of the criterion.
    pub fn kind(&self) -> &CriterionKind {
        &self.kind
    }

    /// Child criteria of a combinator; empty for everything else.
    pub fn children(&self) -> &[Arc<Criterion>] {
        match &self.kind {
            CriterionKind::And(children) | CriterionKind::Or(children) => children,
            _ => &[],
        }
    }

    /// Goal of a score criterion.
    pub fn goal(&self) -> Option<u32> {
        match &self.kind {
            CriterionKind::Score { goal, .. } => Some(*goal),
            _ => None,
        }
    }

    /// Whether this criterion carries state that is persisted and synced.
    pub fn is_stateful(&self) -> bool {
        matches!(self.kind, CriterionKind::Leaf | CriterionKind::Score { .. })
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An advancement definition: an identifier and its root criterion.
#[derive(Debug, Clone)]
pub struct Advancement {
    id: String,
    root: Arc<Criterion>,
}

impl Advancement {
    /// Create an advancement definition.
    pub fn new(id: impl Into<String>, root: Arc<Criterion>) -> Self {
        Self {
            id: id.into(),
            root,
        }
    }

    /// Identifier of the advancement.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Root criterion.
    pub fn root(&self) -> &Arc<Criterion> {
        &self.root
    }
}
