//! Diff computation between current and desired snapshots

use crate::action::{Action, ActionKind, Targeted};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Which action kinds a diff is allowed to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffPolicy {
    pub create: bool,
    pub delete: bool,
}

impl DiffPolicy {
    pub fn full() -> Self {
        Self {
            create: true,
            delete: true,
        }
    }

    pub fn delete_only() -> Self {
        Self {
            create: false,
            delete: true,
        }
    }
}

impl Default for DiffPolicy {
    fn default() -> Self {
        Self::full()
    }
}

/// Compute the set delta between `current` and `desired`
///
/// Equality is structural: an entity present in both collections with the same
/// shape yields no action. Creates come first in `desired` order, then deletes
/// in `current` order. Duplicates within one collection are reported once.
pub fn diff<T>(current: &[T], desired: &[T], policy: DiffPolicy) -> Vec<Action<T>>
where
    T: Clone + Eq + Hash + Targeted,
{
    let mut actions = Vec::new();
    if policy.create {
        actions.extend(subtract(desired, current, ActionKind::Create));
    }
    if policy.delete {
        actions.extend(subtract(current, desired, ActionKind::Delete));
    }
    actions
}

/// Elements of `from` missing in `other`, tagged with `kind`
fn subtract<T>(from: &[T], other: &[T], kind: ActionKind) -> Vec<Action<T>>
where
    T: Clone + Eq + Hash + Targeted,
{
    let other: HashSet<&T> = other.iter().collect();
    let mut seen: HashSet<&T> = HashSet::new();

    from.iter()
        .filter(|item| !other.contains(item))
        .filter(|item| seen.insert(*item))
        .map(|item| Action::new(kind, item.clone()))
        .collect()
}

/// Compute a delta where entities sharing an identity but differing in shape
/// produce an `Update` carrying the desired value
pub fn diff_by_identity<T, K, F>(
    current: &[T],
    desired: &[T],
    identity: F,
    policy: DiffPolicy,
) -> Vec<Action<T>>
where
    T: Clone + PartialEq + Targeted,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let current_by_id: HashMap<K, &T> = current.iter().map(|c| (identity(c), c)).collect();
    let desired_ids: HashSet<K> = desired.iter().map(&identity).collect();

    let mut actions = Vec::new();
    let mut emitted: HashSet<K> = HashSet::new();

    for d in desired {
        let id = identity(d);
        match current_by_id.get(&id) {
            None if policy.create => {
                if emitted.insert(id) {
                    actions.push(Action::new(ActionKind::Create, d.clone()));
                }
            }
            Some(c) if *c != d => {
                if emitted.insert(id) {
                    actions.push(Action::new(ActionKind::Update, d.clone()));
                }
            }
            _ => {}
        }
    }

    if policy.delete {
        let mut deleted: HashSet<K> = HashSet::new();
        for c in current {
            let id = identity(c);
            if !desired_ids.contains(&id) && deleted.insert(id) {
                actions.push(Action::new(ActionKind::Delete, c.clone()));
            }
        }
    }

    actions
}
