use std::sync::Arc;

use k8s_openapi::api::core::v1::Endpoints;
use stg_models::{
    BackendKind, BackendSpec, ChangeSet, DesiredState, ObservedMember,
    ResourceIdentity, desired_state, diff,
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::backend::{Backend, Backends};
use crate::cache::{CacheEntry, StateCache};
use crate::source::ResourceSource;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("kubernetes read failed: {0}")]
    Kube(#[from] kube::Error),
}

/// What one pass did for one backend kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendOutcome {
    /// No annotations for this backend on the Service.
    NotConfigured,
    /// The Endpoints (or Service) is gone; the cache entry was dropped and
    /// the backend was not contacted.
    Evicted,
    /// Desired state equals the cached state; no backend calls.
    Unchanged,
    /// The backend already held the desired state.
    InSync,
    Applied {
        added: usize,
        removed: usize,
        failures: Vec<String>,
    },
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassReport {
    pub resource: ResourceIdentity,
    pub service_deleted: bool,
    pub outcomes: Vec<(BackendKind, BackendOutcome)>,
}

impl PassReport {
    fn new(resource: ResourceIdentity) -> Self {
        Self {
            resource,
            service_deleted: false,
            outcomes: Vec::with_capacity(BackendKind::ALL.len()),
        }
    }

    pub fn outcome(&self, kind: BackendKind) -> Option<&BackendOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, o)| o)
    }
}

/// Runs reconciliation passes. Owns the state cache.
#[derive(Clone)]
pub struct Dispatcher {
    source: Arc<dyn ResourceSource>,
    backends: Backends,
    cache: StateCache,
    cleanup_on_delete: bool,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn ResourceSource>,
        backends: Backends,
        cleanup_on_delete: bool,
    ) -> Self {
        Self {
            source,
            backends,
            cache: StateCache::new(),
            cleanup_on_delete,
        }
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    /// One pass for `id`. Backend failures are reported per backend in the
    /// returned report; only Kubernetes read errors fail the pass.
    #[instrument(skip_all, fields(resource = %id))]
    pub async fn reconcile(
        &self,
        id: &ResourceIdentity,
    ) -> Result<PassReport, DispatchError> {
        let guard = self.cache.lock(id).await;
        let report = self.run_pass(id).await;
        drop(guard);

        // Nothing stays cached for a deleted or unconfigured identity.
        if let Ok(report) = &report {
            if report.service_deleted
                || report
                    .outcomes
                    .iter()
                    .all(|(_, o)| *o == BackendOutcome::NotConfigured)
            {
                self.cache.release(id).await;
            }
        }
        report
    }

    async fn run_pass(
        &self,
        id: &ResourceIdentity,
    ) -> Result<PassReport, DispatchError> {
        let Some(service) = self.source.service(id).await? else {
            return Ok(self.on_service_deleted(id).await);
        };
        if service.metadata.deletion_timestamp.is_some() {
            debug!("service is being deleted");
            return Ok(self.on_service_deleted(id).await);
        }

        let mut report = PassReport::new(id.clone());
        let mut specs = Vec::with_capacity(2);
        for spec in
            BackendSpec::from_annotations(service.metadata.annotations.as_ref())
        {
            match spec {
                Ok(spec) => specs.push(spec),
                Err(e) => {
                    warn!(error = %e, "skipping backend with malformed identifier");
                    report
                        .outcomes
                        .push((e.kind(), BackendOutcome::Failed(e.to_string())));
                }
            }
        }

        let endpoints = if specs.is_empty() {
            None
        } else {
            self.source.endpoints(id).await?
        };

        for spec in &specs {
            let outcome =
                self.reconcile_backend(id, spec, endpoints.as_ref()).await;
            report.outcomes.push((spec.kind(), outcome));
        }

        for kind in BackendKind::ALL {
            if report.outcome(kind).is_some() {
                continue;
            }
            let outcome = match self.cache.evict(id, kind).await {
                Some(entry) if self.cleanup_on_delete => {
                    info!(%kind, "backend no longer configured; cleaning up");
                    self.clean_up(&entry).await
                }
                Some(_) => {
                    debug!(%kind, "backend no longer configured; cache entry dropped");
                    BackendOutcome::NotConfigured
                }
                None => BackendOutcome::NotConfigured,
            };
            report.outcomes.push((kind, outcome));
        }
        Ok(report)
    }

    #[instrument(skip_all, fields(backend = %spec))]
    async fn reconcile_backend(
        &self,
        id: &ResourceIdentity,
        spec: &BackendSpec,
        endpoints: Option<&Endpoints>,
    ) -> BackendOutcome {
        let kind = spec.kind();
        let Some(desired) = desired_state(endpoints, kind) else {
            self.cache.evict(id, kind).await;
            info!("endpoints not found; cache entry evicted");
            return BackendOutcome::Evicted;
        };

        if self.cache.is_current(id, spec, &desired).await {
            trace!(members = desired.len(), "desired state unchanged; skipping");
            return BackendOutcome::Unchanged;
        }
        let previous = self.cache.get(id, kind).await;

        let backend = self.backends.resolve(spec);
        let observed = match backend.fetch_observed().await {
            Ok(o) => o,
            Err(e) => {
                error!(error = %e, "reading backend state");
                return BackendOutcome::Failed(e.to_string());
            }
        };

        let mut changes = diff(kind.diff_mode(), &desired, &observed.members);
        if changes.is_empty() && observed.drifted && !desired.is_empty() {
            debug!("published attributes drifted; rewriting");
            changes.to_add = desired.members().cloned().collect();
        }
        let outcome = if changes.is_empty() {
            debug!(members = desired.len(), "backend already in sync");
            BackendOutcome::InSync
        } else {
            apply_changes(backend.as_ref(), &changes).await
        };
        // Stored even after a partial failure; the next change in endpoints
        // re-reads live state.
        self.cache.store(id, spec.clone(), desired).await;

        if let Some(previous) = previous.filter(|p| !p.spec.same_target(spec)) {
            if self.cleanup_on_delete {
                let retired = self.clean_up(&previous).await;
                info!(previous = %previous.spec, outcome = ?retired, "cleaned up replaced target");
            } else {
                debug!(previous = %previous.spec, "target replaced; old members left in place");
            }
        }
        outcome
    }

    async fn on_service_deleted(&self, id: &ResourceIdentity) -> PassReport {
        let mut report = PassReport::new(id.clone());
        report.service_deleted = true;
        let evicted = self.cache.evict_all(id).await;
        info!(entries = evicted.len(), cleanup = self.cleanup_on_delete, "service gone or terminating; cache evicted");

        for kind in BackendKind::ALL {
            let entry = evicted.iter().find(|(k, _)| *k == kind).map(|(_, e)| e);
            let outcome = match entry {
                Some(entry) if self.cleanup_on_delete => {
                    self.clean_up(entry).await
                }
                _ => BackendOutcome::Evicted,
            };
            report.outcomes.push((kind, outcome));
        }
        report
    }

    /// Removes what the cache entry says this controller published, leaving
    /// members it never registered alone.
    #[instrument(skip_all, fields(backend = %entry.spec))]
    async fn clean_up(&self, entry: &CacheEntry) -> BackendOutcome {
        let kind = entry.spec.kind();
        let backend = self.backends.resolve(&entry.spec);
        let observed = match backend.fetch_observed().await {
            Ok(o) => o,
            Err(e) => {
                error!(error = %e, "reading backend state for cleanup");
                return BackendOutcome::Failed(e.to_string());
            }
        };
        let owned: Vec<ObservedMember> = observed
            .members
            .into_iter()
            .filter(|o| entry.desired.contains_key(&o.key()))
            .collect();
        let changes = diff(kind.diff_mode(), &DesiredState::new(kind), &owned);
        if changes.is_empty() {
            return BackendOutcome::InSync;
        }
        apply_changes(backend.as_ref(), &changes).await
    }
}

/// Additions go first so a replaced member never leaves the backend empty.
/// The two steps are independent: a failed addition does not stop removal.
async fn apply_changes(backend: &dyn Backend, changes: &ChangeSet) -> BackendOutcome {
    info!(
        backend = %backend.spec(),
        add = changes.to_add.len(),
        remove = changes.to_remove.len(),
        "applying changes"
    );
    let mut failures = Vec::new();
    if let Err(e) = backend.apply_add(&changes.to_add).await {
        error!(error = %e, "adding members");
        failures.push(e.to_string());
    }
    if let Err(e) = backend.apply_remove(&changes.to_remove).await {
        error!(error = %e, "removing members");
        failures.push(e.to_string());
    }
    BackendOutcome::Applied {
        added: changes.to_add.len(),
        removed: changes.to_remove.len(),
        failures,
    }
}
