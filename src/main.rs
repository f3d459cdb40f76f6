// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::{info, warn};

use caravel::config::Config;
use caravel::constants::MANIFEST_GROUP_KIND;
use caravel::controllers::ManifestReconciler;
use caravel::remote::{OwnerKeys, RemoteConnector};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting caravel operator");

    // Load configuration
    let config = Config::from_env();
    info!(
        "Configuration loaded: default_remote_namespace={}",
        config.default_remote_namespace
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let owner_keys = OwnerKeys::for_group_kind(MANIFEST_GROUP_KIND);
    let connector = RemoteConnector::new(
        client.clone(),
        owner_keys,
        config.default_remote_namespace.clone(),
    );

    info!("Starting reconciler...");
    ManifestReconciler::new(client, connector).run().await?;

    // This should never be reached as the reconciler runs forever
    warn!("Reconciler stopped unexpectedly");
    Ok(())
}
