pub mod finalizer;

use std::sync::Arc;

use futures_util::{StreamExt, future};
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kube::{
    Client, ResourceExt,
    api::Api,
    runtime::{
        Controller,
        controller::{Action, Error as ControllerError},
        reflector::ObjectRef,
        watcher::Config,
    },
};
use stg_models::{BackendSpec, ResourceIdentity};
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

use crate::backend::Backends;
use crate::config::StgConfig;
use crate::dispatcher::{BackendOutcome, DispatchError, Dispatcher, PassReport};
use crate::source::KubeSource;

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("updating finalizer: {0}")]
    Finalizer(#[from] kube::Error),
}

#[derive(Clone)]
pub struct ControllerContext {
    pub client: Client,
    pub dispatcher: Dispatcher,
    pub cfg: StgConfig,
}

/// Watches Services, and Endpoints mapped onto their same-named Service, and
/// runs a dispatcher pass for every change. Runs until the watch stream ends
/// or the process receives a shutdown signal.
pub async fn run_controller(
    client: Client,
    cfg: StgConfig,
    backends: Backends,
) -> anyhow::Result<()> {
    let (services, endpoints): (Api<Service>, Api<Endpoints>) =
        match cfg.watch_namespace.as_deref() {
            Some(ns) => (
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client.clone(), ns),
            ),
            None => (Api::all(client.clone()), Api::all(client.clone())),
        };
    let dispatcher = Dispatcher::new(
        Arc::new(KubeSource::new(client.clone())),
        backends,
        cfg.cleanup_on_delete,
    );
    let ctx = Arc::new(ControllerContext {
        client,
        dispatcher,
        cfg,
    });
    info!(namespace = ?ctx.cfg.watch_namespace, "starting controller");

    let deletions = ctx.clone();
    Controller::new(services, Config::default())
        .watches(endpoints, Config::default(), |ep: Endpoints| {
            let ns = ep.namespace()?;
            Some(ObjectRef::<Service>::new(&ep.name_any()).within(&ns))
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| {
            match res {
                Ok((obj_ref, action)) => {
                    trace!(%obj_ref, ?action, "reconciled")
                }
                // The Service left the watch cache without passing through a
                // finalizer, so the controller has no object to hand to
                // `reconcile`. Run the pass by name; it takes the not-found
                // branch.
                Err(ControllerError::ObjectNotFound(obj_ref)) => {
                    if let Some(ns) = obj_ref.namespace {
                        let id = ResourceIdentity::new(ns, obj_ref.name);
                        spawn_deletion_pass(deletions.dispatcher.clone(), id);
                    }
                }
                Err(e) => error!(error = ?e, "reconcile error"),
            }
            future::ready(())
        })
        .await;

    info!("controller stopped");
    Ok(())
}

async fn reconcile(
    obj: Arc<Service>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileErr> {
    let ns = obj.namespace().unwrap_or_else(|| "default".to_string());
    let id = ResourceIdentity::new(ns, obj.name_any());

    let annotated =
        !BackendSpec::from_annotations(obj.metadata.annotations.as_ref())
            .is_empty();
    let tracked = finalizer::has_finalizer(&obj);

    // Most Services carry no backend annotations; skip them without a read
    // unless a previous pass left state or a finalizer behind.
    if !annotated && !tracked && !ctx.dispatcher.cache().contains(&id).await {
        return Ok(next_action(&ctx.cfg));
    }
    let api: Api<Service> = Api::namespaced(ctx.client.clone(), &id.namespace);

    if obj.metadata.deletion_timestamp.is_some() {
        info!(resource = %id, "deletion timestamp set; cleaning up");
        let report = ctx.dispatcher.reconcile(&id).await?;
        log_report(&report);
        finalizer::sync(&api, &obj, false).await?;
        return Ok(Action::await_change());
    }

    // Added before the pass so a delete racing with it still waits for
    // cleanup; removed only after the pass has cleaned up.
    let hold = annotated && ctx.cfg.cleanup_on_delete;
    if hold {
        finalizer::sync(&api, &obj, true).await?;
    }
    let report = ctx.dispatcher.reconcile(&id).await?;
    log_report(&report);
    if !hold {
        finalizer::sync(&api, &obj, false).await?;
    }
    Ok(next_action(&ctx.cfg))
}

/// Runs the pass for a vanished Service on its own task, so the controller
/// stream keeps being polled while backend cleanup is in flight.
pub fn spawn_deletion_pass(
    dispatcher: Dispatcher,
    id: ResourceIdentity,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match dispatcher.reconcile(&id).await {
            Ok(report) => log_report(&report),
            Err(e) => {
                error!(resource = %id, error = %e, "deletion pass failed")
            }
        }
    })
}

fn next_action(cfg: &StgConfig) -> Action {
    match cfg.resync_interval() {
        Some(every) => Action::requeue(every),
        None => Action::await_change(),
    }
}

fn error_policy(
    obj: Arc<Service>,
    error: &ReconcileErr,
    ctx: Arc<ControllerContext>,
) -> Action {
    warn!(name = %obj.name_any(), error = %error, "pass failed; requeueing");
    Action::requeue(ctx.cfg.error_requeue())
}

fn log_report(report: &PassReport) {
    for (kind, outcome) in &report.outcomes {
        match outcome {
            BackendOutcome::NotConfigured | BackendOutcome::Unchanged => {
                trace!(resource = %report.resource, %kind, ?outcome, "pass outcome")
            }
            BackendOutcome::Applied { failures, .. } if !failures.is_empty() => {
                warn!(resource = %report.resource, %kind, ?outcome, "pass applied with failures")
            }
            BackendOutcome::Failed(_) => {
                warn!(resource = %report.resource, %kind, ?outcome, "pass failed")
            }
            _ => {
                info!(resource = %report.resource, %kind, deleted = report.service_deleted, ?outcome, "pass outcome")
            }
        }
    }
}
