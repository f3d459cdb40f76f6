// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Manifest reconciler - propagates scheduled RemoteManifests to their
//! remote cluster and tears remote state down before deletion completes.

use crate::constants::{LONG_WAIT, RECONCILE_TIMEOUT, SHORT_WAIT};
use crate::error::{is_not_found, CaravelError, Result};
use crate::remote::cluster::ClusterSync;
use crate::remote::connect::ClusterConnector;
use crate::types::{Condition, ManifestState, RemoteManifest};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Patch, PatchParams, PostParams},
    runtime::{controller::Action, Controller},
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

pub struct ManifestReconciler<C> {
    client: Client,
    connector: C,
}

impl<C> ManifestReconciler<C>
where
    C: ClusterConnector + 'static,
{
    pub fn new(client: Client, connector: C) -> Self {
        Self { client, connector }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let manifests: Api<RemoteManifest> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(manifests, WatcherConfig::default())
            .run(reconcile::<C>, error_policy::<C>, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled manifest: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

fn identity(manifest: &RemoteManifest) -> String {
    format!(
        "RemoteManifest {}/{}",
        manifest.namespace().unwrap_or_default(),
        manifest.name_any()
    )
}

async fn reconcile<C: ClusterConnector + 'static>(
    manifest: Arc<RemoteManifest>,
    ctx: Arc<ManifestReconciler<C>>,
) -> Result<Action> {
    // Unscheduled manifests are filtered out entirely; the watcher wakes
    // us again once the scheduler sets a target.
    if !manifest.is_scheduled() {
        debug!("{} has no target, skipping", identity(&manifest));
        return Ok(Action::await_change());
    }

    match timeout(RECONCILE_TIMEOUT, reconcile_scheduled(manifest, ctx)).await {
        Ok(result) => result,
        Err(_) => Err(CaravelError::DeadlineExceeded),
    }
}

async fn reconcile_scheduled<C: ClusterConnector + 'static>(
    manifest: Arc<RemoteManifest>,
    ctx: Arc<ManifestReconciler<C>>,
) -> Result<Action> {
    let namespace = manifest.namespace().unwrap_or_default();
    let name = manifest.name_any();
    let api: Api<RemoteManifest> = Api::namespaced(ctx.client.clone(), &namespace);

    debug!("Reconciling manifest: {}/{}", namespace, name);

    // Work from a fresh read so finalizer and status writes are keyed on
    // the current resource version.
    let mut manifest = match api.get(&name).await {
        Ok(manifest) => manifest,
        Err(e) if is_not_found(&e) => {
            debug!("manifest {}/{} already deleted", namespace, name);
            return Ok(Action::await_change());
        }
        Err(source) => {
            return Err(CaravelError::StoreRead {
                what: format!("RemoteManifest {}/{}", namespace, name),
                source,
            })
        }
    };

    // Persist the finalizer up front so a later delete is intercepted.
    manifest.add_finalizer();
    let mut manifest = persist(&api, &manifest).await?;

    let cluster = match ctx.connector.connect(&manifest).await {
        Ok(cluster) => cluster,
        Err(e) => {
            // A deleted manifest whose target is gone has no remote state
            // left to tear down.
            if manifest.is_deleting() && matches!(e, CaravelError::TargetNotFound { .. }) {
                info!("{} released, its target is gone", identity(&manifest));
                manifest.remove_finalizer();
                persist(&api, &manifest).await?;
                return Ok(Action::await_change());
            }
            warn!("cannot connect to remote cluster: {}", e);
            manifest.set_condition(Condition::reconcile_error(&e));
            update_status(&api, &manifest).await?;
            return Ok(Action::requeue(SHORT_WAIT));
        }
    };

    let secrets = get_connection_secrets(&ctx.client, &mut manifest).await;

    if manifest.is_deleting() {
        if let Err(e) = cluster.delete(&mut manifest, &secrets).await {
            error!("cannot delete remote state: {}", e);
            manifest.set_state(ManifestState::Failed);
            manifest.set_condition(Condition::reconcile_error(&e));
            update_status(&api, &manifest).await?;
            return Ok(Action::requeue(SHORT_WAIT));
        }
        manifest.remove_finalizer();
        persist(&api, &manifest).await?;
        return Ok(Action::await_change());
    }

    match cluster.sync(&mut manifest, &secrets).await {
        Ok(state) => {
            manifest.set_state(state);
            manifest.set_condition(Condition::reconcile_success());
            manifest.set_condition(Condition::available());
            update_status(&api, &manifest).await?;
            Ok(Action::requeue(LONG_WAIT))
        }
        Err(e) => {
            error!("cannot sync remote state: {}", e);
            manifest.set_state(ManifestState::Failed);
            manifest.set_condition(Condition::reconcile_error(&e));
            update_status(&api, &manifest).await?;
            Ok(Action::requeue(SHORT_WAIT))
        }
    }
}

fn error_policy<C: ClusterConnector + 'static>(
    _manifest: Arc<RemoteManifest>,
    error: &CaravelError,
    _ctx: Arc<ManifestReconciler<C>>,
) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(SHORT_WAIT)
}

async fn persist(api: &Api<RemoteManifest>, manifest: &RemoteManifest) -> Result<RemoteManifest> {
    api.replace(&manifest.name_any(), &PostParams::default(), manifest)
        .await
        .map_err(|source| CaravelError::StoreWrite {
            what: identity(manifest),
            source,
        })
}

async fn update_status(api: &Api<RemoteManifest>, manifest: &RemoteManifest) -> Result<()> {
    let status = manifest.status.clone().unwrap_or_default();
    api.patch_status(
        &manifest.name_any(),
        &PatchParams::default(),
        &Patch::Merge(serde_json::json!({ "status": status })),
    )
    .await
    .map_err(|source| CaravelError::StoreWrite {
        what: format!("{} status", identity(manifest)),
        source,
    })?;
    Ok(())
}

/// Fetch the local secrets a manifest propagates. Unreadable secrets are
/// recorded on the manifest and skipped; sync proceeds with the rest.
async fn get_connection_secrets(client: &Client, manifest: &mut RemoteManifest) -> Vec<Secret> {
    let namespace = manifest.namespace().unwrap_or_default();
    let api: Api<Secret> = Api::namespaced(client.clone(), &namespace);

    let references = manifest.spec.secrets.clone();
    let mut secrets = Vec::with_capacity(references.len());
    for reference in references {
        match api.get(&reference.name).await {
            Ok(secret) => secrets.push(secret),
            Err(source) => {
                let err = CaravelError::SecretFetch {
                    secret: format!("{}/{}", namespace, reference.name),
                    source,
                };
                debug!("skipping connection secret: {}", err);
                manifest.set_condition(Condition::reconcile_error(&err));
            }
        }
    }
    secrets
}
