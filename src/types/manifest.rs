// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::FINALIZER;
use k8s_openapi::chrono::{SecondsFormat, Utc};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A RemoteManifest holds an arbitrary resource template that caravel
/// propagates into the remote cluster its target points at, together with
/// the names of local secrets that travel along with it.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "caravel.dev", version = "v1alpha1", kind = "RemoteManifest")]
#[kube(namespaced)]
#[kube(status = "RemoteManifestStatus")]
#[serde(rename_all = "camelCase")]
pub struct RemoteManifestSpec {
    /// Desired remote object, verbatim. Must carry apiVersion, kind and a
    /// metadata.name; the namespace is defaulted at sync time if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<serde_json::Value>,
    /// Local secrets propagated alongside the template
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretReference>,
    /// Scheduling target; set by the scheduler, never by this controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetReference>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetReference {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
pub enum ManifestState {
    #[default]
    Unknown,
    Scheduled,
    Submitted,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteManifestStatus {
    #[serde(default)]
    pub state: ManifestState,
    /// Opaque mirror of the remote object's status field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    fn new(condition_type: &str, status: &str, reason: &str, message: String) -> Self {
        Condition {
            condition_type: condition_type.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            message,
            last_transition_time: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }

    /// The last reconcile completed without error
    pub fn reconcile_success() -> Self {
        Condition::new("Synced", "True", "ReconcileSuccess", String::new())
    }

    /// The last reconcile failed; the error is recorded verbatim
    pub fn reconcile_error(err: &dyn std::fmt::Display) -> Self {
        Condition::new("Synced", "False", "ReconcileError", err.to_string())
    }

    /// The remote object has been submitted and is assumed available
    pub fn available() -> Self {
        Condition::new("Ready", "True", "Available", String::new())
    }

    pub fn unavailable(err: &dyn std::fmt::Display) -> Self {
        Condition::new("Ready", "False", "Unavailable", err.to_string())
    }
}

impl RemoteManifest {
    /// A manifest is only reconciled once the scheduler has set its target
    pub fn is_scheduled(&self) -> bool {
        self.spec.target.is_some()
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn add_finalizer(&mut self) {
        let finalizers = self.metadata.finalizers.get_or_insert_with(Vec::new);
        if !finalizers.iter().any(|f| f == FINALIZER) {
            finalizers.push(FINALIZER.to_string());
        }
    }

    pub fn remove_finalizer(&mut self) {
        if let Some(finalizers) = self.metadata.finalizers.as_mut() {
            finalizers.retain(|f| f != FINALIZER);
        }
    }

    /// Record a condition, keeping the previous transition time when the
    /// condition's status has not changed.
    pub fn set_condition(&mut self, condition: Condition) {
        let status = self.status.get_or_insert_with(Default::default);
        match status
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            Some(existing) if existing.status == condition.status => {
                existing.reason = condition.reason;
                existing.message = condition.message;
            }
            Some(existing) => *existing = condition,
            None => status.conditions.push(condition),
        }
    }

    pub fn set_state(&mut self, state: ManifestState) {
        self.status.get_or_insert_with(Default::default).state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn make_manifest(target: Option<&str>) -> RemoteManifest {
        RemoteManifest {
            metadata: ObjectMeta {
                name: Some("foo".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            spec: RemoteManifestSpec {
                template: None,
                secrets: vec![],
                target: target.map(|name| TargetReference {
                    name: name.to_string(),
                }),
            },
            status: None,
        }
    }

    #[test]
    fn test_is_scheduled_with_target() {
        assert!(make_manifest(Some("t")).is_scheduled());
    }

    #[test]
    fn test_is_scheduled_without_target() {
        assert!(!make_manifest(None).is_scheduled());
    }

    #[test]
    fn test_add_finalizer_idempotent() {
        let mut manifest = make_manifest(Some("t"));
        manifest.add_finalizer();
        manifest.add_finalizer();

        assert_eq!(
            manifest.metadata.finalizers,
            Some(vec![FINALIZER.to_string()])
        );
    }

    #[test]
    fn test_remove_finalizer() {
        let mut manifest = make_manifest(Some("t"));
        manifest.metadata.finalizers = Some(vec![
            "other/finalizer".to_string(),
            FINALIZER.to_string(),
        ]);

        manifest.remove_finalizer();

        assert_eq!(
            manifest.metadata.finalizers,
            Some(vec!["other/finalizer".to_string()])
        );
    }

    #[test]
    fn test_set_condition_replaces_on_transition() {
        let mut manifest = make_manifest(Some("t"));
        manifest.set_condition(Condition::reconcile_success());
        manifest.set_condition(Condition::reconcile_error(&"boom"));

        let conditions = &manifest.status.as_ref().unwrap().conditions;
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, "False");
        assert_eq!(conditions[0].reason, "ReconcileError");
        assert_eq!(conditions[0].message, "boom");
    }

    #[test]
    fn test_set_condition_keeps_transition_time_when_unchanged() {
        let mut manifest = make_manifest(Some("t"));
        let mut first = Condition::reconcile_success();
        first.last_transition_time = Some("2026-01-01T00:00:00Z".to_string());
        manifest.set_condition(first);
        manifest.set_condition(Condition::reconcile_success());

        let conditions = &manifest.status.as_ref().unwrap().conditions;
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_set_condition_tracks_distinct_types() {
        let mut manifest = make_manifest(Some("t"));
        manifest.set_condition(Condition::reconcile_success());
        manifest.set_condition(Condition::available());

        assert_eq!(manifest.status.as_ref().unwrap().conditions.len(), 2);
    }

    #[test]
    fn test_state_serializes_as_text() {
        let state = serde_json::to_value(ManifestState::Submitted).unwrap();
        assert_eq!(state, serde_json::json!("Submitted"));
    }
}
