// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

/// The operator name used for logging and server-side identification
pub const OPERATOR_NAME: &str = "caravel";

/// API group of the caravel CRDs
pub const GROUP: &str = "caravel.dev";

/// Group/kind identifier of the RemoteManifest CRD. Ownership annotation
/// keys and the finalizer are derived from this.
pub const MANIFEST_GROUP_KIND: &str = "remotemanifest.caravel.dev";

/// Finalizer placed on every RemoteManifest so remote teardown can run
/// before the local object disappears.
pub const FINALIZER: &str = "finalizer.remotemanifest.caravel.dev";

/// Well-known keys of a ClusterTarget connection secret
pub mod secret_keys {
    /// Full kubeconfig blob; takes precedence over the discrete keys below
    pub const KUBECONFIG: &str = "kubeconfig";
    /// API server endpoint URL
    pub const ENDPOINT: &str = "endpoint";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    /// Bearer token
    pub const TOKEN: &str = "token";
    /// Cluster CA bundle, PEM
    pub const CLUSTER_CA: &str = "clusterCA";
    /// Client certificate, PEM
    pub const CLIENT_CERT: &str = "clientCert";
    /// Client key, PEM
    pub const CLIENT_KEY: &str = "clientKey";
}

/// Upper bound on a single reconcile invocation. Every remote call runs
/// under this deadline so a wedged remote cluster cannot stall the
/// controller indefinitely.
pub const RECONCILE_TIMEOUT: Duration = Duration::from_secs(60);

/// Requeue interval after any transient failure
pub const SHORT_WAIT: Duration = Duration::from_secs(30);

/// Steady-state requeue interval for a speculative re-sync
pub const LONG_WAIT: Duration = Duration::from_secs(60);

/// Attempt ceiling for the remote secret create-or-update exchange when the
/// write keeps losing the resource-version race.
pub const SECRET_SYNC_MAX_ATTEMPTS: usize = 4;
