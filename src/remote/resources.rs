// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Sync/delete engine for the arbitrary structured resource a manifest
//! templates, addressed dynamically by the template's apiVersion and kind.

use crate::error::{is_not_found, CaravelError, Result};
use crate::remote::ownership::{owner_name, same_owner, OwnerKeys};
use kube::{
    api::{ApiResource, DeleteParams, DynamicObject, Patch, PatchParams, PostParams},
    core::GroupVersion,
    Api, Client, ResourceExt,
};
use tracing::{debug, instrument};

/// Result of syncing the templated resource. The status snapshot and the
/// error are independent: a snapshot read before a failing write is still
/// handed to the caller, so the latest observed remote status can be
/// persisted even when the write itself failed.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub remote_status: Option<serde_json::Value>,
    pub error: Option<CaravelError>,
}

impl SyncOutcome {
    fn failed(error: CaravelError) -> Self {
        SyncOutcome {
            remote_status: None,
            error: Some(error),
        }
    }
}

/// Syncs and deletes the templated resource in the remote cluster,
/// respecting ownership annotations.
pub struct ResourceClient {
    client: Client,
}

impl ResourceClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_for(&self, template: &DynamicObject) -> Result<(Api<DynamicObject>, String)> {
        let types = template
            .types
            .as_ref()
            .ok_or_else(|| CaravelError::InvalidTemplate("missing apiVersion/kind".to_string()))?;
        let group_version: GroupVersion = types
            .api_version
            .parse()
            .map_err(|e| CaravelError::InvalidTemplate(format!("apiVersion: {}", e)))?;
        if template.metadata.name.as_deref().unwrap_or_default().is_empty() {
            return Err(CaravelError::InvalidTemplate("missing metadata.name".to_string()));
        }

        let resource = ApiResource::from_gvk(&group_version.with_kind(&types.kind));
        let api = Api::namespaced_with(
            self.client.clone(),
            &template.namespace().unwrap_or_default(),
            &resource,
        );
        Ok((api, types.kind.clone()))
    }

    fn identity(template: &DynamicObject) -> String {
        format!(
            "{} {}/{}",
            template
                .types
                .as_ref()
                .map(|t| t.kind.as_str())
                .unwrap_or("resource"),
            template.namespace().unwrap_or_default(),
            template.name_any()
        )
    }

    /// Create the remote object if absent, or merge-patch the template onto
    /// it if this manifest owns it. A pre-existing object with a different
    /// (or no) owner is a conflict and is left untouched.
    #[instrument(skip(self, keys, template), fields(resource = %Self::identity(template)))]
    pub async fn sync(&self, keys: &OwnerKeys, template: &DynamicObject) -> SyncOutcome {
        let (api, kind) = match self.api_for(template) {
            Ok(v) => v,
            Err(e) => return SyncOutcome::failed(e),
        };
        let name = template.name_any();

        let remote = match api.get(&name).await {
            Ok(remote) => remote,
            Err(e) if is_not_found(&e) => {
                debug!("remote resource absent, creating");
                return match api.create(&PostParams::default(), template).await {
                    Ok(_) => SyncOutcome::default(),
                    Err(e) => SyncOutcome::failed(CaravelError::StoreWrite {
                        what: Self::identity(template),
                        source: e,
                    }),
                };
            }
            Err(e) => {
                return SyncOutcome::failed(CaravelError::StoreRead {
                    what: Self::identity(template),
                    source: e,
                })
            }
        };

        if !same_owner(keys, &remote.metadata, &template.metadata) {
            return SyncOutcome::failed(CaravelError::OwnershipConflict {
                kind,
                namespace: remote.namespace().unwrap_or_default(),
                name: remote.name_any(),
                owner: owner_name(keys, &template.metadata),
            });
        }

        // Read the remote status before the patch overwrites our view of
        // the object.
        let remote_status = remote_status(&remote);

        let error = api
            .patch(&name, &PatchParams::default(), &Patch::Merge(template))
            .await
            .err()
            .map(|e| CaravelError::StoreWrite {
                what: Self::identity(template),
                source: e,
            });

        SyncOutcome {
            remote_status,
            error,
        }
    }

    /// Delete the remote object if this manifest owns it. Absent and
    /// foreign-owned objects are both success.
    #[instrument(skip(self, keys, template), fields(resource = %Self::identity(template)))]
    pub async fn delete(&self, keys: &OwnerKeys, template: &DynamicObject) -> Result<()> {
        let (api, _) = self.api_for(template)?;
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

        // The object exists, but we don't own it.
        if !same_owner(keys, &remote.metadata, &template.metadata) {
            return Ok(());
        }

        match api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            // Deleted out from under us between the get and the delete
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(CaravelError::StoreWrite {
                what: Self::identity(template),
                source: e,
            }),
        }
    }
}

/// Best-effort snapshot of the remote object's status field. Objects
/// without one yield None, not an error.
fn remote_status(remote: &DynamicObject) -> Option<serde_json::Value> {
    remote.data.get("status").filter(|s| !s.is_null()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MANIFEST_GROUP_KIND;
    use crate::test_utils::{internal_error_json, not_found_json, MockService};

    fn keys() -> OwnerKeys {
        OwnerKeys::for_group_kind(MANIFEST_GROUP_KIND)
    }

    fn make_template(uid: Option<&str>) -> DynamicObject {
        let mut annotations = serde_json::Map::new();
        if let Some(uid) = uid {
            annotations.insert(
                format!("{}/namespace", MANIFEST_GROUP_KIND),
                serde_json::json!("ns"),
            );
            annotations.insert(
                format!("{}/name", MANIFEST_GROUP_KIND),
                serde_json::json!("foo"),
            );
            annotations.insert(format!("{}/uid", MANIFEST_GROUP_KIND), serde_json::json!(uid));
        }

        serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "cm1",
                "namespace": "remote-ns",
                "annotations": annotations,
            },
            "data": {"key": "value"},
        }))
        .unwrap()
    }

    fn remote_json(uid: Option<&str>, status: Option<serde_json::Value>) -> String {
        let mut remote: serde_json::Value =
            serde_json::to_value(make_template(uid)).unwrap();
        if let Some(status) = status {
            remote["status"] = status;
        }
        remote.to_string()
    }

    const CM_PATH: &str = "/api/v1/namespaces/remote-ns/configmaps/cm1";
    const CM_COLLECTION: &str = "/api/v1/namespaces/remote-ns/configmaps";

    #[tokio::test]
    async fn test_sync_creates_when_absent() {
        let mock = MockService::new()
            .on_get(CM_PATH, 404, &not_found_json("configmaps", "cm1"))
            .on_post(CM_COLLECTION, 201, &remote_json(Some("uid-1"), None));
        let client = ResourceClient::new(mock.clone().into_client());

        let outcome = client.sync(&keys(), &make_template(Some("uid-1"))).await;

        assert!(outcome.error.is_none());
        assert!(outcome.remote_status.is_none());
        let posts = mock.requests_with_method("POST");
        assert_eq!(posts.len(), 1);
        // The template is created verbatim, owner annotations included
        let sent: serde_json::Value = serde_json::from_str(&posts[0].body).unwrap();
        assert_eq!(
            sent["metadata"]["annotations"][format!("{}/uid", MANIFEST_GROUP_KIND)],
            "uid-1"
        );
    }

    #[tokio::test]
    async fn test_sync_patches_owned_resource_and_returns_status() {
        let status = serde_json::json!({"phase": "Running"});
        let mock = MockService::new()
            .on_get(CM_PATH, 200, &remote_json(Some("uid-1"), Some(status.clone())))
            .on_patch(CM_PATH, 200, &remote_json(Some("uid-1"), Some(status.clone())));
        let client = ResourceClient::new(mock.clone().into_client());

        let outcome = client.sync(&keys(), &make_template(Some("uid-1"))).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.remote_status, Some(status));
        assert_eq!(mock.requests_with_method("PATCH").len(), 1);
    }

    #[tokio::test]
    async fn test_sync_conflicts_with_unowned_resource() {
        let mock = MockService::new().on_get(CM_PATH, 200, &remote_json(None, None));
        let client = ResourceClient::new(mock.clone().into_client());

        let outcome = client.sync(&keys(), &make_template(Some("uid-1"))).await;

        assert!(matches!(
            outcome.error,
            Some(CaravelError::OwnershipConflict { .. })
        ));
        // The foreign object is left untouched
        assert!(mock.requests_with_method("PATCH").is_empty());
        assert!(mock.requests_with_method("POST").is_empty());
    }

    #[tokio::test]
    async fn test_sync_conflicts_with_foreign_owner() {
        let mock = MockService::new().on_get(CM_PATH, 200, &remote_json(Some("other-uid"), None));
        let client = ResourceClient::new(mock.clone().into_client());

        let outcome = client.sync(&keys(), &make_template(Some("uid-1"))).await;

        assert!(matches!(
            outcome.error,
            Some(CaravelError::OwnershipConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_sync_returns_status_alongside_failed_patch() {
        let status = serde_json::json!({"phase": "Running"});
        let mock = MockService::new()
            .on_get(CM_PATH, 200, &remote_json(Some("uid-1"), Some(status.clone())))
            .on_patch(CM_PATH, 500, &internal_error_json("boom"));
        let client = ResourceClient::new(mock.clone().into_client());

        let outcome = client.sync(&keys(), &make_template(Some("uid-1"))).await;

        assert_eq!(outcome.remote_status, Some(status));
        assert!(matches!(outcome.error, Some(CaravelError::StoreWrite { .. })));
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let mock = MockService::new()
            .on_get(CM_PATH, 200, &remote_json(Some("uid-1"), None))
            .on_patch(CM_PATH, 200, &remote_json(Some("uid-1"), None));
        let client = ResourceClient::new(mock.clone().into_client());
        let template = make_template(Some("uid-1"));

        let first = client.sync(&keys(), &template).await;
        let second = client.sync(&keys(), &template).await;

        assert!(first.error.is_none() && second.error.is_none());
        assert_eq!(first.remote_status, second.remote_status);
        assert_eq!(mock.requests_with_method("PATCH").len(), 2);
    }

    #[tokio::test]
    async fn test_sync_rejects_template_without_types() {
        let client = ResourceClient::new(MockService::new().into_client());
        let template: DynamicObject = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "cm1", "namespace": "remote-ns"},
        }))
        .unwrap();

        let outcome = client.sync(&keys(), &template).await;

        assert!(matches!(
            outcome.error,
            Some(CaravelError::InvalidTemplate(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_absent_resource_is_success() {
        let mock =
            MockService::new().on_get(CM_PATH, 404, &not_found_json("configmaps", "cm1"));
        let client = ResourceClient::new(mock.clone().into_client());

        client
            .delete(&keys(), &make_template(Some("uid-1")))
            .await
            .unwrap();

        assert!(mock.requests_with_method("DELETE").is_empty());
    }

    #[tokio::test]
    async fn test_delete_skips_foreign_owned_resource() {
        let mock = MockService::new().on_get(CM_PATH, 200, &remote_json(None, None));
        let client = ResourceClient::new(mock.clone().into_client());

        client
            .delete(&keys(), &make_template(Some("uid-1")))
            .await
            .unwrap();

        assert!(mock.requests_with_method("DELETE").is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_owned_resource() {
        let mock = MockService::new()
            .on_get(CM_PATH, 200, &remote_json(Some("uid-1"), None))
            .on_delete(CM_PATH, 200, &remote_json(Some("uid-1"), None));
        let client = ResourceClient::new(mock.clone().into_client());

        client
            .delete(&keys(), &make_template(Some("uid-1")))
            .await
            .unwrap();

        assert_eq!(mock.requests_with_method("DELETE").len(), 1);
    }

    #[test]
    fn test_remote_status_absent_yields_none() {
        let remote: DynamicObject =
            serde_json::from_str(&remote_json(Some("uid-1"), None)).unwrap();
        assert_eq!(remote_status(&remote), None);
    }
}
