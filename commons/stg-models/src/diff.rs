use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::member::{DesiredMember, ObservedMember};
use crate::state::DesiredState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffMode {
    /// Members are added and removed individually and carry a health state.
    Incremental,
    /// The whole member list is published as one value and replaced as one.
    Replace,
}

/// Corrective actions for one backend. Both lists are sorted by key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub to_add: Vec<DesiredMember>,
    pub to_remove: Vec<ObservedMember>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

pub fn diff(
    mode: DiffMode,
    desired: &DesiredState,
    observed: &[ObservedMember],
) -> ChangeSet {
    match mode {
        DiffMode::Incremental => diff_incremental(desired, observed),
        DiffMode::Replace => diff_replace(desired, observed),
    }
}

fn diff_incremental(
    desired: &DesiredState,
    observed: &[ObservedMember],
) -> ChangeSet {
    // A draining member is leaving rotation; it only counts as present if a
    // non-draining entry with the same key exists too.
    let live: HashSet<String> = observed
        .iter()
        .filter(|o| !o.is_draining())
        .map(|o| o.key())
        .collect();

    let to_add = desired
        .members()
        .filter(|m| !live.contains(&m.key()))
        .cloned()
        .collect();

    let to_remove = unique_by_key(
        observed.iter().filter(|o| !desired.contains_key(&o.key())),
    );

    ChangeSet { to_add, to_remove }
}

fn diff_replace(desired: &DesiredState, observed: &[ObservedMember]) -> ChangeSet {
    let published: BTreeSet<String> = observed.iter().map(|o| o.key()).collect();
    let wanted: BTreeSet<String> = desired.keys().cloned().collect();
    if published == wanted {
        return ChangeSet::default();
    }
    if desired.is_empty() {
        return ChangeSet {
            to_add: Vec::new(),
            to_remove: unique_by_key(observed.iter()),
        };
    }
    ChangeSet {
        to_add: desired.members().cloned().collect(),
        to_remove: Vec::new(),
    }
}

fn unique_by_key<'a>(
    members: impl Iterator<Item = &'a ObservedMember>,
) -> Vec<ObservedMember> {
    let mut by_key: BTreeMap<String, ObservedMember> = BTreeMap::new();
    for m in members {
        by_key.entry(m.key()).or_insert_with(|| m.clone());
    }
    by_key.into_values().collect()
}
