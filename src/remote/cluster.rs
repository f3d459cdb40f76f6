// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Facade over the resource and secret sync engines for one remote
//! cluster.

use crate::error::{CaravelError, Result};
use crate::remote::ownership::{set_owner, OwnerKeys};
use crate::remote::resources::ResourceClient;
use crate::remote::secrets::{build_secret_templates, SecretClient};
use crate::types::{ManifestState, RemoteManifest};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DynamicObject, ObjectMeta};
use kube::{Client, ResourceExt};
use tracing::instrument;

/// Sync and delete a manifest's remote state. An Err return means the
/// manifest is in state Failed; Ok carries the state to persist.
#[async_trait]
pub trait ClusterSync: Send + Sync {
    async fn sync(
        &self,
        manifest: &mut RemoteManifest,
        secrets: &[Secret],
    ) -> Result<ManifestState>;

    async fn delete(
        &self,
        manifest: &mut RemoteManifest,
        secrets: &[Secret],
    ) -> Result<ManifestState>;
}

pub struct RemoteCluster {
    resources: ResourceClient,
    secrets: SecretClient,
    owner_keys: OwnerKeys,
    fallback_namespace: String,
}

impl RemoteCluster {
    pub fn new(client: Client, owner_keys: OwnerKeys, fallback_namespace: String) -> Self {
        RemoteCluster {
            resources: ResourceClient::new(client.clone()),
            secrets: SecretClient::new(client),
            owner_keys,
            fallback_namespace,
        }
    }

    /// The manifest's resource template as an owned working copy. The
    /// stored spec is never mutated; namespace defaulting and owner
    /// stamping happen on the copy only.
    fn template(manifest: &RemoteManifest) -> Result<DynamicObject> {
        let raw = manifest
            .spec
            .template
            .as_ref()
            .ok_or(CaravelError::MissingTemplate)?;
        serde_json::from_value(raw.clone())
            .map_err(|e| CaravelError::InvalidTemplate(e.to_string()))
    }

    fn ensure_namespace(&self, meta: &mut ObjectMeta) {
        if meta.namespace.as_deref().unwrap_or_default().is_empty() {
            meta.namespace = Some(self.fallback_namespace.clone());
        }
    }

    fn secret_templates(
        &self,
        manifest: &RemoteManifest,
        template: &DynamicObject,
        secrets: &[Secret],
    ) -> Vec<Secret> {
        let mut templates = build_secret_templates(
            secrets,
            &template.namespace().unwrap_or_default(),
            &manifest.name_any(),
        );
        for template in &mut templates {
            self.ensure_namespace(&mut template.metadata);
            set_owner(&self.owner_keys, &manifest.metadata, &mut template.metadata);
        }
        templates
    }
}

#[async_trait]
impl ClusterSync for RemoteCluster {
    #[instrument(skip_all, fields(manifest = %manifest.name_any()))]
    async fn sync(
        &self,
        manifest: &mut RemoteManifest,
        secrets: &[Secret],
    ) -> Result<ManifestState> {
        manifest.add_finalizer();

        // The CRD schema requires a template, but just in case...
        let mut template = Self::template(manifest)?;

        for secret_template in self.secret_templates(manifest, &template, secrets) {
            self.secrets.sync(&self.owner_keys, &secret_template).await?;
        }

        self.ensure_namespace(&mut template.metadata);
        set_owner(&self.owner_keys, &manifest.metadata, &mut template.metadata);

        let outcome = self.resources.sync(&self.owner_keys, &template).await;
        // The status may have been read before a failing write; it is
        // still the latest observed remote status, so reflect it either
        // way.
        if let Some(status) = outcome.remote_status {
            manifest.status.get_or_insert_with(Default::default).remote = Some(status);
        }
        if let Some(error) = outcome.error {
            return Err(error);
        }

        Ok(ManifestState::Submitted)
    }

    #[instrument(skip_all, fields(manifest = %manifest.name_any()))]
    async fn delete(
        &self,
        manifest: &mut RemoteManifest,
        secrets: &[Secret],
    ) -> Result<ManifestState> {
        let mut template = Self::template(manifest)?;
        let secret_templates = self.secret_templates(manifest, &template, secrets);

        self.ensure_namespace(&mut template.metadata);
        set_owner(&self.owner_keys, &manifest.metadata, &mut template.metadata);
        self.resources.delete(&self.owner_keys, &template).await?;

        for secret_template in &secret_templates {
            self.secrets.delete(&self.owner_keys, secret_template).await?;
        }

        // Submitted is nominal here; the status never lands because the
        // finalizer removal that follows lets the local object be deleted.
        Ok(ManifestState::Submitted)
    }
}
