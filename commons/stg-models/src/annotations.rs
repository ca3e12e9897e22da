use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnnotationError;
use crate::identity::BackendKind;

pub const TARGET_GROUP_ANNOTATION: &str = "stg.monder.cc/target-group";
pub const DNS_ZONE_ANNOTATION: &str = "route53.monder.cc/zone";
pub const DNS_DOMAIN_ANNOTATION: &str = "route53.monder.cc/domain-name";

/// A parsed `arn:<partition>:elasticloadbalancing:<region>:<account>:targetgroup/...`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetGroupArn {
    arn: String,
    partition: String,
    region: String,
    account: String,
}

impl TargetGroupArn {
    pub fn as_str(&self) -> &str {
        &self.arn
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

impl FromStr for TargetGroupArn {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arn = s.trim();
        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" || parts[1].is_empty() {
            return Err(AnnotationError::InvalidArn(arn.to_string()));
        }
        if parts[2] != "elasticloadbalancing"
            || !parts[5].starts_with("targetgroup/")
        {
            return Err(AnnotationError::NotTargetGroup(arn.to_string()));
        }
        if parts[3].is_empty() {
            return Err(AnnotationError::MissingRegion(arn.to_string()));
        }
        Ok(Self {
            arn: arn.to_string(),
            partition: parts[1].to_string(),
            region: parts[3].to_string(),
            account: parts[4].to_string(),
        })
    }
}

impl fmt::Display for TargetGroupArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.arn)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DnsTarget {
    pub zone: String,
    pub domain: String,
}

impl DnsTarget {
    /// Both name the same record set in the same hosted zone.
    pub fn same_record(&self, other: &DnsTarget) -> bool {
        self.zone == other.zone && same_domain(&self.domain, &other.domain)
    }
}

/// DNS names compare case-insensitively; Route 53 returns them fully
/// qualified with a trailing dot.
pub fn same_domain(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

impl fmt::Display for DnsTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.domain)
    }
}

/// One configured backend for a Service, resolved from its annotations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendSpec {
    TargetGroup(TargetGroupArn),
    Dns(DnsTarget),
}

impl BackendSpec {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendSpec::TargetGroup(_) => BackendKind::TargetGroup,
            BackendSpec::Dns(_) => BackendKind::Dns,
        }
    }

    /// True when both specs write to the same external object, even if the
    /// annotation text differs.
    pub fn same_target(&self, other: &BackendSpec) -> bool {
        match (self, other) {
            (BackendSpec::TargetGroup(a), BackendSpec::TargetGroup(b)) => a == b,
            (BackendSpec::Dns(a), BackendSpec::Dns(b)) => a.same_record(b),
            _ => false,
        }
    }

    /// Resolves every backend the annotations configure. A backend whose
    /// annotations are missing or empty is left out; a present but malformed
    /// identifier is reported as an error for that backend only.
    pub fn from_annotations(
        annotations: Option<&BTreeMap<String, String>>,
    ) -> Vec<Result<BackendSpec, AnnotationError>> {
        let Some(annotations) = annotations else {
            return Vec::new();
        };
        let value = |key: &str| {
            annotations
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let mut specs = Vec::with_capacity(2);
        if let Some(arn) = value(TARGET_GROUP_ANNOTATION) {
            specs.push(arn.parse().map(BackendSpec::TargetGroup));
        }
        if let (Some(zone), Some(domain)) =
            (value(DNS_ZONE_ANNOTATION), value(DNS_DOMAIN_ANNOTATION))
        {
            specs.push(Ok(BackendSpec::Dns(DnsTarget {
                zone: zone.to_string(),
                domain: domain.to_string(),
            })));
        }
        specs
    }
}

impl fmt::Display for BackendSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendSpec::TargetGroup(arn) => write!(f, "target-group {}", arn),
            BackendSpec::Dns(t) => write!(f, "dns {}", t),
        }
    }
}
