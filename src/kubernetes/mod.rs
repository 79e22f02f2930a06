// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes collaborators: discovery, REST mapping, namespaces,
//! RoleBinding cache and access reviews.

pub mod access;
pub mod crd;
pub mod mapper;
pub mod namespaces;
pub mod rolebindings;

pub use access::{check_self_provisioning, AccessRequest, AccessReviewer, KubeAccessReviewer};
pub use crd::wait_for_project_request_crd;
pub use mapper::{DiscoveryMapper, RestMapper, RestMapping, StaticMapper};
pub use rolebindings::{RoleBindingCache, RoleBindingLister};
