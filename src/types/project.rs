// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::annotations;
use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

/// A request to provision a new project
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

impl ProjectRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The authenticated identity behind a request
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// Read-only view of a project namespace
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl From<&Namespace> for Project {
    fn from(ns: &Namespace) -> Self {
        let annotation = |key: &str| ns.annotations().get(key).cloned();
        Project {
            name: ns.name_any(),
            display_name: annotation(annotations::DISPLAY_NAME),
            description: annotation(annotations::DESCRIPTION),
            requester: annotation(annotations::REQUESTER),
            phase: ns.status.as_ref().and_then(|s| s.phase.clone()),
        }
    }
}

/// Requester recorded on a namespace, if any
pub fn requester_of(ns: &Namespace) -> Option<&str> {
    ns.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(annotations::REQUESTER))
        .map(String::as_str)
}

/// Whether a namespace is being torn down
pub fn is_terminating(ns: &Namespace) -> bool {
    ns.metadata.deletion_timestamp.is_some()
        || ns
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .is_some_and(|phase| phase == "Terminating")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::NamespaceStatus;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn make_namespace(name: &str, annotations: Option<BTreeMap<String, String>>) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                annotations,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_project_from_namespace() {
        let mut ns = make_namespace(
            "myapp",
            Some(BTreeMap::from([
                (annotations::DISPLAY_NAME.to_string(), "My App".to_string()),
                (annotations::REQUESTER.to_string(), "alice".to_string()),
            ])),
        );
        ns.status = Some(NamespaceStatus {
            phase: Some("Active".to_string()),
            ..Default::default()
        });

        let project = Project::from(&ns);

        assert_eq!(project.name, "myapp");
        assert_eq!(project.display_name.as_deref(), Some("My App"));
        assert_eq!(project.description, None);
        assert_eq!(project.requester.as_deref(), Some("alice"));
        assert_eq!(project.phase.as_deref(), Some("Active"));
    }

    #[test]
    fn test_requester_of_missing_annotation() {
        let ns = make_namespace("myapp", None);
        assert_eq!(requester_of(&ns), None);
    }

    #[test]
    fn test_is_terminating_by_phase() {
        let mut ns = make_namespace("myapp", None);
        assert!(!is_terminating(&ns));
        ns.status = Some(NamespaceStatus {
            phase: Some("Terminating".to_string()),
            ..Default::default()
        });
        assert!(is_terminating(&ns));
    }
}
