//! Action types produced by the diff engine

use crate::error::ReconcileError;
use crate::model::UserBinding;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of mutation an action performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Bring a desired entity into existence
    Create,
    /// Replace an entity in place
    Update,
    /// Remove an entity that is no longer desired
    Delete,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Create => write!(f, "create"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for ActionKind {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ActionKind::Create),
            "update" => Ok(ActionKind::Update),
            "delete" => Ok(ActionKind::Delete),
            other => Err(ReconcileError::InvalidAction(other.to_string())),
        }
    }
}

/// Entities that live on exactly one account or cluster
pub trait Targeted {
    fn target(&self) -> &str;
}

impl Targeted for UserBinding {
    fn target(&self) -> &str {
        &self.cluster
    }
}

/// One mutation attempt against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action<T> {
    pub kind: ActionKind,
    pub subject: T,
    /// Account or cluster the action runs against
    pub target: String,
}

impl<T: Targeted> Action<T> {
    pub fn new(kind: ActionKind, subject: T) -> Self {
        let target = subject.target().to_string();
        Self {
            kind,
            subject,
            target,
        }
    }
}

/// Counts of actions by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl ActionSummary {
    pub fn from_actions<T>(actions: &[Action<T>]) -> Self {
        let mut summary = Self::default();
        for action in actions {
            match action.kind {
                ActionKind::Create => summary.create += 1,
                ActionKind::Update => summary.update += 1,
                ActionKind::Delete => summary.delete += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.create + self.update + self.delete
    }

    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

impl std::fmt::Display for ActionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete",
            self.create, self.update, self.delete
        )
    }
}
