use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::BackendKind;
use crate::member::DesiredMember;

/// Desired members for one resource and one backend kind, keyed by composite
/// key. Two snapshots are equal when their key sets are equal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    kind: BackendKind,
    members: BTreeMap<String, DesiredMember>,
}

impl DesiredState {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            members: BTreeMap::new(),
        }
    }

    pub fn from_members(
        kind: BackendKind,
        members: impl IntoIterator<Item = DesiredMember>,
    ) -> Self {
        let mut state = Self::new(kind);
        for m in members {
            state.insert(m);
        }
        state
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Later inserts with the same key replace earlier ones.
    pub fn insert(&mut self, member: DesiredMember) {
        self.members.insert(member.key(), member);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.members.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.members.keys()
    }

    pub fn members(&self) -> impl Iterator<Item = &DesiredMember> {
        self.members.values()
    }

    /// Addresses in key order, which is the order DNS values are published in.
    pub fn addresses(&self) -> Vec<String> {
        self.members.values().map(|m| m.address.clone()).collect()
    }
}
