// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Which project names may be requested.

use crate::constants::forbidden;
use crate::error::{ProjectError, Result};
use crate::types::ProjectRequest;
use std::collections::BTreeSet;

/// Reserved names and prefixes, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePolicy {
    names: BTreeSet<String>,
    prefixes: Vec<String>,
}

impl Default for NamePolicy {
    fn default() -> Self {
        Self::new(forbidden::NAMES.iter().copied(), forbidden::PREFIXES.iter().copied())
    }
}

impl NamePolicy {
    pub fn new<'a>(
        names: impl IntoIterator<Item = &'a str>,
        prefixes: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            names: names.into_iter().map(str::to_string).collect(),
            prefixes: prefixes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn check(&self, name: &str) -> Result<()> {
        if self.names.contains(name) {
            return Err(ProjectError::ForbiddenName {
                name: name.to_string(),
                reason: "the name is reserved".to_string(),
            });
        }
        if let Some(prefix) = self.prefixes.iter().find(|p| name.starts_with(p.as_str())) {
            return Err(ProjectError::ForbiddenName {
                name: name.to_string(),
                reason: format!("names starting with '{}' are reserved", prefix),
            });
        }
        Ok(())
    }
}

const MAX_NAME_LENGTH: usize = 63;

/// Structural checks on a request: the name must be a DNS-1123 label and
/// the display name a single line.
pub fn validate_request(request: &ProjectRequest) -> Result<()> {
    let name = request.name.as_str();
    if name.is_empty() {
        return Err(ProjectError::Invalid("name is required".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ProjectError::Invalid(format!(
            "name '{}' must be no more than {} characters",
            name, MAX_NAME_LENGTH
        )));
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-';
    let alphanumeric = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.chars().all(allowed)
        || !name.starts_with(alphanumeric)
        || !name.ends_with(alphanumeric)
    {
        return Err(ProjectError::Invalid(format!(
            "name '{}' must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character",
            name
        )));
    }
    if request.display_name.contains('\n') {
        return Err(ProjectError::Invalid(
            "display name may not contain a new line".to_string(),
        ));
    }
    Ok(())
}
