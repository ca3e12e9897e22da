use k8s_openapi::api::core::v1::Endpoints;

use crate::identity::BackendKind;
use crate::member::DesiredMember;
use crate::state::DesiredState;

/// `None` means the Endpoints object does not exist, which is not the same as
/// an Endpoints object with no ready addresses.
pub fn desired_state(
    endpoints: Option<&Endpoints>,
    kind: BackendKind,
) -> Option<DesiredState> {
    endpoints.map(|ep| extract(ep, kind))
}

/// Builds the desired member set from the ready addresses of every subset.
/// Target groups get one member per (port, address); DNS gets one per address.
pub fn extract(endpoints: &Endpoints, kind: BackendKind) -> DesiredState {
    let mut state = DesiredState::new(kind);
    for subset in endpoints.subsets.iter().flatten() {
        let addresses = subset.addresses.iter().flatten();
        match kind {
            BackendKind::TargetGroup => {
                for port in subset.ports.iter().flatten() {
                    for addr in addresses.clone() {
                        state.insert(DesiredMember::target(&addr.ip, port.port));
                    }
                }
            }
            BackendKind::Dns => {
                for addr in addresses {
                    state.insert(DesiredMember::address(&addr.ip));
                }
            }
        }
    }
    state
}
