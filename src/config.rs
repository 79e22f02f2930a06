// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use std::env;

/// Reference to a template stored in the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub namespace: String,
    pub name: String,
}

impl TemplateRef {
    /// Parse a `namespace/name` reference
    pub fn parse(value: &str) -> Result<Self> {
        let Some((namespace, name)) = value.split_once('/') else {
            bail!("template reference '{}' must be in the form namespace/templateName", value);
        };
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            bail!("template reference '{}' must be in the form namespace/templateName", value);
        }
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Template used for new projects; the embedded default when unset
    pub project_request_template: Option<TemplateRef>,
    /// Shown to users who may not request projects
    pub project_request_message: Option<String>,
    /// Maximum number of live projects a single user may request
    pub project_request_limit: Option<usize>,
    /// Field managers trusted to set the submitter annotation; any writer
    /// is trusted when empty
    pub submitter_managers: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let project_request_template = non_empty("PROJECT_REQUEST_TEMPLATE")
            .map(|v| TemplateRef::parse(v.trim()))
            .transpose()
            .context("PROJECT_REQUEST_TEMPLATE is invalid")?;

        let project_request_limit = non_empty("PROJECT_REQUEST_LIMIT")
            .map(|v| v.trim().parse::<usize>())
            .transpose()
            .context("PROJECT_REQUEST_LIMIT must be a non-negative integer")?;

        let submitter_managers = non_empty("PROJECT_REQUEST_SUBMITTER_MANAGERS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            project_request_template,
            project_request_message: non_empty("PROJECT_REQUEST_MESSAGE"),
            project_request_limit,
            submitter_managers,
        })
    }
}
