// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Remote cluster client configuration from ClusterTarget connection
//! secrets.

use crate::constants::secret_keys;
use crate::error::{is_not_found, CaravelError, Result};
use crate::remote::cluster::{ClusterSync, RemoteCluster};
use crate::remote::ownership::OwnerKeys;
use crate::types::{ClusterTarget, RemoteManifest};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, instrument};
use url::Url;

/// Resolves a manifest's target into something that can sync and delete
/// remote state. Production resolves real cluster credentials; tests
/// substitute their own implementation.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    type Cluster: ClusterSync;

    async fn connect(&self, manifest: &RemoteManifest) -> Result<Self::Cluster>;
}

/// Connects to the remote cluster a manifest is scheduled to by resolving
/// its ClusterTarget and connection secret.
pub struct RemoteConnector {
    client: Client,
    owner_keys: OwnerKeys,
    fallback_namespace: String,
}

impl RemoteConnector {
    pub fn new(client: Client, owner_keys: OwnerKeys, fallback_namespace: String) -> Self {
        Self {
            client,
            owner_keys,
            fallback_namespace,
        }
    }

    /// Resolve the manifest's target and connection secret into a client
    /// configuration. Rebuilt on every reconcile so rotated credentials
    /// take effect immediately.
    #[instrument(skip(self, manifest), fields(manifest = %format!("{}/{}", manifest.namespace().unwrap_or_default(), manifest.name_any())))]
    async fn resolve_config(&self, manifest: &RemoteManifest) -> Result<Config> {
        let namespace = manifest.namespace().unwrap_or_default();
        let target_ref = manifest
            .spec
            .target
            .as_ref()
            .ok_or_else(|| CaravelError::NotScheduled {
                manifest: format!("{}/{}", namespace, manifest.name_any()),
            })?;

        let target_id = format!("{}/{}", namespace, target_ref.name);
        let targets: Api<ClusterTarget> = Api::namespaced(self.client.clone(), &namespace);
        let target = match targets.get(&target_ref.name).await {
            Ok(target) => target,
            Err(e) if is_not_found(&e) => {
                return Err(CaravelError::TargetNotFound { target: target_id })
            }
            Err(source) => {
                return Err(CaravelError::TargetFetch {
                    target: target_id,
                    source,
                })
            }
        };

        let secret_ref = target
            .spec
            .connection_secret_ref
            .as_ref()
            .ok_or_else(|| CaravelError::NoConnectionSecret {
                target: target_id.clone(),
            })?;

        let secret_namespace = target.namespace().unwrap_or_default();
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &secret_namespace);
        let secret = secrets
            .get(&secret_ref.name)
            .await
            .map_err(|source| CaravelError::SecretFetch {
                secret: format!("{}/{}", secret_namespace, secret_ref.name),
                source,
            })?;

        config_from_connection_secret(&secret).await
    }
}

#[async_trait]
impl ClusterConnector for RemoteConnector {
    type Cluster = RemoteCluster;

    async fn connect(&self, manifest: &RemoteManifest) -> Result<RemoteCluster> {
        let config = self.resolve_config(manifest).await?;
        let client =
            Client::try_from(config).map_err(|e| CaravelError::RemoteClient(e.to_string()))?;

        Ok(RemoteCluster::new(
            client,
            self.owner_keys.clone(),
            self.fallback_namespace.clone(),
        ))
    }
}

fn field<'a>(data: &'a BTreeMap<String, ByteString>, key: &str) -> Option<&'a [u8]> {
    data.get(key)
        .map(|v| v.0.as_slice())
        .filter(|v| !v.is_empty())
}

/// Build a client configuration from a connection secret. A non-empty
/// kubeconfig blob wins; otherwise the discrete endpoint and credential
/// keys are assembled into an in-memory kubeconfig.
pub async fn config_from_connection_secret(secret: &Secret) -> Result<Config> {
    let empty = BTreeMap::new();
    let data = secret.data.as_ref().unwrap_or(&empty);

    if let Some(blob) = field(data, secret_keys::KUBECONFIG) {
        debug!("using kubeconfig blob from connection secret");
        let kubeconfig: Kubeconfig = serde_yaml::from_slice(blob)
            .map_err(|e| CaravelError::InvalidKubeconfig(e.to_string()))?;
        return Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| CaravelError::InvalidKubeconfig(e.to_string()));
    }

    let endpoint = String::from_utf8_lossy(field(data, secret_keys::ENDPOINT).unwrap_or_default())
        .trim()
        .to_string();
    let url = Url::parse(&endpoint).map_err(|source| CaravelError::InvalidEndpointUrl {
        endpoint: endpoint.clone(),
        source,
    })?;

    let mut cluster = serde_json::Map::new();
    cluster.insert("server".to_string(), serde_json::json!(endpoint));
    if let Some(host) = url.host_str() {
        // The hostname, not the full host string: TLS stacks send the
        // literal configured server name over the wire regardless of the
        // dialed address.
        cluster.insert("tls-server-name".to_string(), serde_json::json!(host));
    }
    if let Some(ca) = field(data, secret_keys::CLUSTER_CA) {
        cluster.insert(
            "certificate-authority-data".to_string(),
            serde_json::json!(BASE64.encode(ca)),
        );
    }

    let mut user = serde_json::Map::new();
    for (key, kubeconfig_key) in [
        (secret_keys::USERNAME, "username"),
        (secret_keys::PASSWORD, "password"),
        (secret_keys::TOKEN, "token"),
    ] {
        if let Some(value) = field(data, key) {
            user.insert(
                kubeconfig_key.to_string(),
                serde_json::json!(String::from_utf8_lossy(value)),
            );
        }
    }
    for (key, kubeconfig_key) in [
        (secret_keys::CLIENT_CERT, "client-certificate-data"),
        (secret_keys::CLIENT_KEY, "client-key-data"),
    ] {
        if let Some(value) = field(data, key) {
            user.insert(kubeconfig_key.to_string(), serde_json::json!(BASE64.encode(value)));
        }
    }

    let kubeconfig: Kubeconfig = serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{"name": "remote", "cluster": cluster}],
        "users": [{"name": "remote", "user": user}],
        "contexts": [{"name": "remote", "context": {"cluster": "remote", "user": "remote"}}],
        "current-context": "remote",
    }))
    .map_err(|e| CaravelError::InvalidKubeconfig(e.to_string()))?;

    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| CaravelError::InvalidKubeconfig(e.to_string()))
}
