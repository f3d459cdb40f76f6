// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::manifest::SecretReference;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A ClusterTarget identifies a remote cluster by pointing at the secret
/// that holds its connection credentials. Read-only input to this operator.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "caravel.dev", version = "v1alpha1", kind = "ClusterTarget")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTargetSpec {
    /// Connection secret in the target's own namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_secret_ref: Option<SecretReference>,
}
