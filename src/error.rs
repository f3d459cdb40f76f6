// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaravelError {
    #[error("RemoteManifest {manifest} is not scheduled to a target")]
    NotScheduled { manifest: String },

    #[error("ClusterTarget {target} not found")]
    TargetNotFound { target: String },

    #[error("cannot get ClusterTarget {target}: {source}")]
    TargetFetch {
        target: String,
        #[source]
        source: kube::Error,
    },

    #[error("ClusterTarget {target} has no connection secret")]
    NoConnectionSecret { target: String },

    #[error("cannot get secret {secret}: {source}")]
    SecretFetch {
        secret: String,
        #[source]
        source: kube::Error,
    },

    #[error("cannot parse kubeconfig: {0}")]
    InvalidKubeconfig(String),

    #[error("cannot parse endpoint {endpoint} as URL: {source}")]
    InvalidEndpointUrl {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("RemoteManifest must include a template")]
    MissingTemplate,

    #[error("invalid resource template: {0}")]
    InvalidTemplate(String),

    #[error("{kind} {namespace}/{name} exists and is not controlled by RemoteManifest {owner}")]
    OwnershipConflict {
        kind: String,
        namespace: String,
        name: String,
        owner: String,
    },

    #[error("cannot get {what}: {source}")]
    StoreRead {
        what: String,
        #[source]
        source: kube::Error,
    },

    #[error("cannot write {what}: {source}")]
    StoreWrite {
        what: String,
        #[source]
        source: kube::Error,
    },

    #[error("gave up syncing {what} after repeated write conflicts")]
    WriteConflictExhausted { what: String },

    #[error("cannot build remote cluster client: {0}")]
    RemoteClient(String),

    #[error("reconcile deadline exceeded")]
    DeadlineExceeded,
}

pub type Result<T> = std::result::Result<T, CaravelError>;

/// True if the error is a Kubernetes API NotFound response
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// True if the error is a Kubernetes API Conflict response. Covers both
/// resource-version conflicts on update and AlreadyExists on create.
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}
