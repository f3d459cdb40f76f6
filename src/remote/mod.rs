// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Everything that touches the remote cluster: credential resolution,
//! ownership annotations, and the sync/delete engines.

pub mod cluster;
pub mod connect;
pub mod ownership;
pub mod resources;
pub mod secrets;

pub use cluster::{ClusterSync, RemoteCluster};
pub use connect::{ClusterConnector, RemoteConnector};
pub use ownership::OwnerKeys;
