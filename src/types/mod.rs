// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Request, identity and project types.

pub mod project;
pub mod project_request;

pub use project::{Project, ProjectRequest, UserInfo};
