// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Project templates: loading, parameter binding and expansion.

use crate::config::TemplateRef;
use crate::constants::groups;
use crate::error::{is_api_error, ProjectError, Result};
use kube::{
    api::Api,
    core::{ApiResource, DynamicObject, GroupVersionKind},
    Client, ResourceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, instrument};

const DEFAULT_TEMPLATE: &str = include_str!("default_template.yaml");

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A parameterized bundle of objects that make up a new project
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub objects: Vec<Value>,
}

impl Template {
    /// The template compiled into the binary
    pub fn builtin() -> Result<Self> {
        serde_yaml::from_str(DEFAULT_TEMPLATE)
            .map_err(|e| ProjectError::InvalidTemplate(format!("built-in template: {}", e)))
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Convert a `template.openshift.io` object read from the cluster
    fn from_dynamic(obj: DynamicObject) -> Result<Self> {
        let name = obj.name_any();
        let field = |key: &str| obj.data.get(key).cloned().unwrap_or(Value::Null);
        let invalid = |e: serde_json::Error| {
            ProjectError::InvalidTemplate(format!("template {}: {}", name, e))
        };

        let parameters = match field("parameters") {
            Value::Null => Vec::new(),
            v => serde_json::from_value(v).map_err(invalid)?,
        };
        let objects = match field("objects") {
            Value::Null => Vec::new(),
            v => serde_json::from_value(v).map_err(invalid)?,
        };

        Ok(Template {
            name,
            parameters,
            objects,
        })
    }
}

/// Overwrite the value of every parameter named in `values`.
/// Keys that match no parameter are ignored.
pub fn bind(mut template: Template, values: &HashMap<&str, String>) -> Template {
    for parameter in template.parameters.iter_mut() {
        if let Some(value) = values.get(parameter.name.as_str()) {
            parameter.value = Some(value.clone());
        }
    }
    template
}

/// Where the project template comes from. Loaded on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TemplateSource {
    #[default]
    Builtin,
    Cluster(TemplateRef),
}

impl TemplateSource {
    pub fn from_config(template: Option<TemplateRef>) -> Self {
        template.map_or(TemplateSource::Builtin, TemplateSource::Cluster)
    }

    #[instrument(skip(self, client))]
    pub async fn load(&self, client: &Client) -> Result<Template> {
        match self {
            TemplateSource::Builtin => Template::builtin(),
            TemplateSource::Cluster(reference) => {
                let ar = template_api_resource();
                let templates: Api<DynamicObject> =
                    Api::namespaced_with(client.clone(), &reference.namespace, &ar);
                debug!(
                    "Loading project template {}/{}",
                    reference.namespace, reference.name
                );
                match templates.get(&reference.name).await {
                    Ok(obj) => Template::from_dynamic(obj),
                    Err(e) if is_api_error(&e, 404) => Err(ProjectError::InvalidTemplate(format!(
                        "template {}/{} not found",
                        reference.namespace, reference.name
                    ))),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

pub fn template_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(groups::TEMPLATE, "v1", "Template"))
}

/// Turns a bound template into concrete objects
pub trait TemplateProcessor: Send + Sync {
    fn process(&self, template: &Template) -> Result<Vec<DynamicObject>>;
}

/// Replaces `${NAME}` references to declared parameters in every string
/// value. References to undeclared names are left as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterExpander;

impl TemplateProcessor for ParameterExpander {
    fn process(&self, template: &Template) -> Result<Vec<DynamicObject>> {
        let mut values = HashMap::new();
        for parameter in &template.parameters {
            let value = parameter.value.clone().unwrap_or_default();
            if parameter.required && value.is_empty() {
                return Err(ProjectError::InvalidTemplate(format!(
                    "template {}: required parameter {} has no value",
                    template.name, parameter.name
                )));
            }
            values.insert(parameter.name.as_str(), value);
        }

        template
            .objects
            .iter()
            .enumerate()
            .map(|(i, object)| {
                let expanded = substitute(object, &values);
                serde_json::from_value(expanded).map_err(|e| {
                    ProjectError::InvalidTemplate(format!(
                        "template {}: object {}: {}",
                        template.name, i, e
                    ))
                })
            })
            .collect()
    }
}

fn substitute(value: &Value, values: &HashMap<&str, String>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(s, values)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, values)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, values)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_str(input: &str, values: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match values.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
