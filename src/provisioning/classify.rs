// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Splits expanded template objects into the project and its dependents.

use crate::constants::groups;
use crate::error::{ProjectError, Result};
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::ObjectMeta,
    core::{DynamicObject, GroupVersionKind},
    ResourceExt,
};

/// A template object after expansion
#[derive(Debug, Clone)]
pub enum TemplateObject {
    Project(Namespace),
    RoleBinding(DependentObject),
    Other(DependentObject),
}

/// An object created inside the project once it exists
#[derive(Debug, Clone)]
pub struct DependentObject {
    pub gvk: GroupVersionKind,
    pub object: DynamicObject,
}

impl DependentObject {
    pub fn name(&self) -> String {
        self.object.name_any()
    }

    /// `Kind/name` for logs and errors
    pub fn describe(&self) -> String {
        format!("{}/{}", self.gvk.kind, self.name())
    }
}

impl TemplateObject {
    pub fn from_dynamic(object: DynamicObject) -> Result<Self> {
        let Some(types) = object.types.as_ref() else {
            return Err(ProjectError::InvalidTemplate(format!(
                "object {} has no apiVersion or kind",
                object.name_any()
            )));
        };
        if types.kind.is_empty() || types.api_version.is_empty() {
            return Err(ProjectError::InvalidTemplate(format!(
                "object {} has no apiVersion or kind",
                object.name_any()
            )));
        }
        if object.metadata.name.as_deref().unwrap_or_default().is_empty() {
            return Err(ProjectError::InvalidTemplate(format!(
                "{} object has no name",
                types.kind
            )));
        }

        let (group, version) = match types.api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", types.api_version.as_str()),
        };
        let gvk = GroupVersionKind::gvk(group, version, &types.kind);

        Ok(match gvk.kind.as_str() {
            "Project" if gvk.group == groups::PROJECT || gvk.group.is_empty() => {
                TemplateObject::Project(project_namespace(&object))
            }
            "RoleBinding" if gvk.group == groups::RBAC || gvk.group == groups::LEGACY_AUTHORIZATION => {
                TemplateObject::RoleBinding(DependentObject { gvk, object })
            }
            _ => TemplateObject::Other(DependentObject { gvk, object }),
        })
    }
}

/// The namespace backing a template's project object
fn project_namespace(object: &DynamicObject) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: object.metadata.name.clone(),
            labels: object.metadata.labels.clone(),
            annotations: object.metadata.annotations.clone(),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[derive(Debug, Clone)]
pub struct Classified {
    pub project: Namespace,
    pub dependents: Vec<DependentObject>,
    /// Name of the last RoleBinding seen, used as a convergence witness
    pub last_role_binding: Option<String>,
}

/// Classify expanded objects in a single ordered pass.
pub fn classify(objects: Vec<DynamicObject>) -> Result<Classified> {
    let mut project = None;
    let mut dependents = Vec::with_capacity(objects.len());
    let mut last_role_binding = None;

    for object in objects {
        match TemplateObject::from_dynamic(object)? {
            TemplateObject::Project(ns) => {
                if project.is_some() {
                    return Err(ProjectError::MultipleProjectObjects);
                }
                project = Some(ns);
            }
            TemplateObject::RoleBinding(dependent) => {
                last_role_binding = Some(dependent.name());
                dependents.push(dependent);
            }
            TemplateObject::Other(dependent) => dependents.push(dependent),
        }
    }

    let project = project.ok_or(ProjectError::NoProjectObject)?;
    Ok(Classified {
        project,
        dependents,
        last_role_binding,
    })
}
