use k8s_openapi::api::core::v1::Service;
use kube::{
    Api, ResourceExt,
    api::{Patch, PatchParams},
};
use serde_json::json;
use tracing::info;

/// Held on annotated Services so their deletion waits for backend cleanup.
pub const FINALIZER: &str = "stg.monder.cc/cleanup";

pub fn has_finalizer(svc: &Service) -> bool {
    svc.finalizers().iter().any(|f| f == FINALIZER)
}

/// The finalizer list `svc` should carry, or `None` when it already matches.
/// Finalizers owned by other controllers are kept in their original order.
pub fn finalizers_for(svc: &Service, wanted: bool) -> Option<Vec<String>> {
    if has_finalizer(svc) == wanted {
        return None;
    }
    let mut finals: Vec<String> = svc
        .finalizers()
        .iter()
        .filter(|f| *f != FINALIZER)
        .cloned()
        .collect();
    if wanted {
        finals.push(FINALIZER.to_string());
    }
    Some(finals)
}

pub async fn sync(
    api: &Api<Service>,
    svc: &Service,
    wanted: bool,
) -> Result<(), kube::Error> {
    let Some(finals) = finalizers_for(svc, wanted) else {
        return Ok(());
    };
    let name = svc.name_any();
    info!(%name, wanted, "updating finalizer");
    let patch = json!({"metadata": {"finalizers": finals}});
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}
