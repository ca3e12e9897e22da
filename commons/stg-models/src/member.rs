use std::fmt;

use serde::{Deserialize, Serialize};

/// Composite key shared by desired and observed members: `address:port` for
/// target-group members, the bare address for DNS values.
pub fn member_key(address: &str, port: Option<i32>) -> String {
    match port {
        Some(port) => format!("{}:{}", address, port),
        None => address.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesiredMember {
    pub address: String,
    pub port: Option<i32>,
}

impl DesiredMember {
    pub fn target(address: impl Into<String>, port: i32) -> Self {
        Self {
            address: address.into(),
            port: Some(port),
        }
    }

    pub fn address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: None,
        }
    }

    pub fn key(&self) -> String {
        member_key(&self.address, self.port)
    }
}

impl fmt::Display for DesiredMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Target health as reported by the load balancer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    Initial,
    Healthy,
    Unhealthy,
    Unused,
    Draining,
    Unavailable,
}

impl HealthState {
    /// Maps the API's wire value. `unhealthy.draining` is still on its way
    /// out and counts as draining; anything unrecognised is kept as present.
    pub fn parse(value: &str) -> Self {
        match value {
            "initial" => HealthState::Initial,
            "healthy" => HealthState::Healthy,
            "unhealthy" => HealthState::Unhealthy,
            "unused" => HealthState::Unused,
            "draining" | "unhealthy.draining" => HealthState::Draining,
            _ => HealthState::Unavailable,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthState::Initial => "initial",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Unused => "unused",
            HealthState::Draining => "draining",
            HealthState::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// An entry the backend currently reports. DNS values carry no port and no
/// health.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservedMember {
    pub address: String,
    pub port: Option<i32>,
    pub health: Option<HealthState>,
}

impl ObservedMember {
    pub fn target(
        address: impl Into<String>,
        port: i32,
        health: HealthState,
    ) -> Self {
        Self {
            address: address.into(),
            port: Some(port),
            health: Some(health),
        }
    }

    pub fn record_value(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: None,
            health: None,
        }
    }

    pub fn key(&self) -> String {
        member_key(&self.address, self.port)
    }

    pub fn is_draining(&self) -> bool {
        self.health == Some(HealthState::Draining)
    }
}

impl fmt::Display for ObservedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.health {
            Some(h) => write!(f, "{}({})", self.key(), h),
            None => f.write_str(&self.key()),
        }
    }
}
