use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diff::DiffMode;

/// Namespace + name of one Service/Endpoints pair.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ResourceIdentity {
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum BackendKind {
    TargetGroup,
    Dns,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::TargetGroup, BackendKind::Dns];

    /// Target groups are edited member by member; DNS records are replaced
    /// wholesale.
    pub fn diff_mode(self) -> DiffMode {
        match self {
            BackendKind::TargetGroup => DiffMode::Incremental,
            BackendKind::Dns => DiffMode::Replace,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::TargetGroup => write!(f, "target-group"),
            BackendKind::Dns => write!(f, "dns"),
        }
    }
}
