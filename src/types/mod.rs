// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resource definitions for the caravel API group.

pub mod manifest;
pub mod target;

pub use manifest::{Condition, ManifestState, RemoteManifest, RemoteManifestStatus, SecretReference, TargetReference};
pub use target::{ClusterTarget, ClusterTargetSpec};
