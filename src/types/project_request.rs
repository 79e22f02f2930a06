// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::annotations;
use crate::types::project::{ProjectRequest as Request, UserInfo};
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

/// Cluster-scoped intake object: its name is the requested project name.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "steward.geeko.me", version = "v1", kind = "ProjectRequest")]
#[kube(status = "ProjectRequestStatus")]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequestSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum RequestPhase {
    Provisioned,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequestStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<RequestPhase>,
    /// Machine-readable failure reason, e.g. `Conflict` or `Forbidden`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProjectRequest {
    /// Requests reach a terminal phase exactly once
    pub fn is_processed(&self) -> bool {
        self.status.as_ref().and_then(|s| s.phase).is_some()
    }

    /// The submitting user named by the requester annotation.
    ///
    /// Anyone allowed to create the object can write this annotation, so it
    /// only identifies the submitter when an admission layer stamps it.
    /// Check [`ProjectRequest::submitter_set_by`] before trusting it.
    pub fn submitter(&self) -> Option<UserInfo> {
        self.annotations()
            .get(annotations::REQUEST_SUBMITTER)
            .filter(|user| !user.is_empty())
            .map(UserInfo::new)
    }

    /// Whether one of `managers` owns the requester annotation, according
    /// to the object's managed fields
    pub fn submitter_set_by(&self, managers: &[String]) -> bool {
        let key = format!("f:{}", annotations::REQUEST_SUBMITTER);
        self.metadata.managed_fields.iter().flatten().any(|entry| {
            entry.manager.as_ref().is_some_and(|m| managers.contains(m))
                && entry.fields_v1.as_ref().is_some_and(|fields| {
                    fields
                        .0
                        .get("f:metadata")
                        .and_then(|m| m.get("f:annotations"))
                        .and_then(|a| a.get(&key))
                        .is_some()
                })
        })
    }

    pub fn to_request(&self) -> Request {
        Request {
            name: self.name_any(),
            display_name: self.spec.display_name.clone().unwrap_or_default(),
            description: self.spec.description.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{FieldsV1, ManagedFieldsEntry};
    use kube::api::ObjectMeta;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn make_request(annotations: Option<BTreeMap<String, String>>, status: Option<ProjectRequestStatus>) -> ProjectRequest {
        ProjectRequest {
            metadata: ObjectMeta {
                name: Some("myapp".to_string()),
                annotations,
                ..Default::default()
            },
            spec: ProjectRequestSpec {
                display_name: Some("My App".to_string()),
                description: None,
            },
            status,
        }
    }

    #[test]
    fn test_to_request() {
        let request = make_request(None, None).to_request();
        assert_eq!(request.name, "myapp");
        assert_eq!(request.display_name, "My App");
        assert_eq!(request.description, "");
    }

    #[test]
    fn test_submitter_from_annotation() {
        let cr = make_request(
            Some(BTreeMap::from([(
                annotations::REQUEST_SUBMITTER.to_string(),
                "alice".to_string(),
            )])),
            None,
        );
        assert_eq!(cr.submitter(), Some(UserInfo::new("alice")));
    }

    fn managed_by(cr: &mut ProjectRequest, manager: &str, fields: serde_json::Value) {
        cr.metadata
            .managed_fields
            .get_or_insert_with(Vec::new)
            .push(ManagedFieldsEntry {
                manager: Some(manager.to_string()),
                operation: Some("Update".to_string()),
                fields_type: Some("FieldsV1".to_string()),
                fields_v1: Some(FieldsV1(fields)),
                ..Default::default()
            });
    }

    #[test]
    fn test_submitter_set_by_trusted_manager() {
        let mut cr = make_request(None, None);
        managed_by(&mut cr, "kubectl", json!({"f:spec": {"f:displayName": {}}}));
        managed_by(
            &mut cr,
            "steward-webhook",
            json!({"f:metadata": {"f:annotations": {"f:steward.geeko.me/requester": {}}}}),
        );

        assert!(cr.submitter_set_by(&["steward-webhook".to_string()]));
        assert!(!cr.submitter_set_by(&["kubectl".to_string()]));
    }

    #[test]
    fn test_submitter_without_managed_fields_untrusted() {
        assert!(!make_request(None, None).submitter_set_by(&["steward-webhook".to_string()]));
    }

    #[test]
    fn test_submitter_missing() {
        assert_eq!(make_request(None, None).submitter(), None);
    }

    #[test]
    fn test_is_processed() {
        assert!(!make_request(None, None).is_processed());
        assert!(!make_request(None, Some(ProjectRequestStatus::default())).is_processed());
        let done = ProjectRequestStatus {
            phase: Some(RequestPhase::Failed),
            ..Default::default()
        };
        assert!(make_request(None, Some(done)).is_processed());
    }
}
