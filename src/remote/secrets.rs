// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Secret template derivation and the remote-secret sync/delete engine.

use crate::constants::SECRET_SYNC_MAX_ATTEMPTS;
use crate::error::{is_conflict, is_not_found, CaravelError, Result};
use crate::remote::ownership::{has_owner, owner_name, same_owner, OwnerKeys};
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{DeleteParams, ObjectMeta, PostParams},
    Api, Client, ResourceExt,
};
use tracing::{debug, instrument};

/// Derive the remote secrets for a manifest from its local secret
/// snapshots. Each remote secret is named `<name_prefix>-<local name>` and
/// copies labels, annotations, data and type verbatim. Pure; input order is
/// preserved. Local secrets sharing a name are not deduplicated.
pub fn build_secret_templates(local: &[Secret], namespace: &str, name_prefix: &str) -> Vec<Secret> {
    local
        .iter()
        .map(|l| Secret {
            metadata: ObjectMeta {
                namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
                name: Some(format!("{}-{}", name_prefix, l.name_any())),
                labels: l.metadata.labels.clone(),
                annotations: l.metadata.annotations.clone(),
                ..Default::default()
            },
            data: l.data.clone(),
            type_: l.type_.clone(),
            ..Default::default()
        })
        .collect()
}

/// Syncs and deletes secrets in the remote cluster, respecting ownership
/// annotations.
pub struct SecretClient {
    client: Client,
}

impl SecretClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_for(&self, template: &Secret) -> Api<Secret> {
        Api::namespaced(
            self.client.clone(),
            &template.namespace().unwrap_or_default(),
        )
    }

    fn identity(template: &Secret) -> String {
        format!(
            "secret {}/{}",
            template.namespace().unwrap_or_default(),
            template.name_any()
        )
    }

    /// Create the remote secret if absent, otherwise overwrite its mutable
    /// fields from the template. The update is keyed on the resource
    /// version read in the same attempt, so a concurrent writer surfaces as
    /// a conflict and the exchange restarts from a fresh read.
    #[instrument(skip(self, keys, template), fields(secret = %Self::identity(template)))]
    pub async fn sync(&self, keys: &OwnerKeys, template: &Secret) -> Result<()> {
        let api = self.api_for(template);
        let name = template.name_any();

        for _ in 0..SECRET_SYNC_MAX_ATTEMPTS {
            let remote = match api.get(&name).await {
                Ok(remote) => remote,
                Err(e) if is_not_found(&e) => {
                    match api.create(&PostParams::default(), template).await {
                        Ok(_) => return Ok(()),
                        // Lost the create race; reload and update instead
                        Err(e) if is_conflict(&e) => continue,
                        Err(e) => {
                            return Err(CaravelError::StoreWrite {
                                what: Self::identity(template),
                                source: e,
                            })
                        }
                    }
                }
                Err(e) => {
                    return Err(CaravelError::StoreRead {
                        what: Self::identity(template),
                        source: e,
                    })
                }
            };

            if has_owner(keys, &remote.metadata) && !same_owner(keys, &remote.metadata, &template.metadata)
            {
                return Err(CaravelError::OwnershipConflict {
                    kind: "Secret".to_string(),
                    namespace: remote.namespace().unwrap_or_default(),
                    name: remote.name_any(),
                    owner: owner_name(keys, &template.metadata),
                });
            }

            // Overwrite mutable fields from the template, but keep the
            // identity fields of the live object so the write is accepted
            // as an update.
            let mut desired = template.clone();
            desired.metadata.uid = remote.metadata.uid.clone();
            desired.metadata.resource_version = remote.metadata.resource_version.clone();
            desired.metadata.namespace = remote.metadata.namespace.clone();

            match api.replace(&name, &PostParams::default(), &desired).await {
                Ok(_) => return Ok(()),
                Err(e) if is_conflict(&e) => {
                    debug!("lost resource version race, retrying");
                    continue;
                }
                Err(e) => {
                    return Err(CaravelError::StoreWrite {
                        what: Self::identity(template),
                        source: e,
                    })
                }
            }
        }

        Err(CaravelError::WriteConflictExhausted {
            what: Self::identity(template),
        })
    }

    /// Delete the remote secret if this manifest owns it. Absent and
    /// foreign-owned secrets are both success.
    #[instrument(skip(self, keys, template), fields(secret = %Self::identity(template)))]
    pub async fn delete(&self, keys: &OwnerKeys, template: &Secret) -> Result<()> {
        let api = self.api_for(template);
        let name = template.name_any();

        let remote = match api.get(&name).await {
            Ok(remote) => remote,
            Err(e) if is_not_found(&e) => return Ok(()),
            Err(e) => {
                return Err(CaravelError::StoreRead {
                    what: Self::identity(template),
                    source: e,
                })
            }
        };

        // The secret exists, but we don't own it.
        if !same_owner(keys, &remote.metadata, &template.metadata) {
            return Ok(());
        }

        match api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(CaravelError::StoreWrite {
                what: Self::identity(template),
                source: e,
            }),
        }
    }
}
