// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::env;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace stamped onto resource and secret templates that carry none
    pub default_remote_namespace: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default_remote_namespace =
            env::var("DEFAULT_REMOTE_NAMESPACE").unwrap_or_else(|_| "default".to_string());

        Config {
            default_remote_namespace,
        }
    }
}
