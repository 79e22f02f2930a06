// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Project visibility: the namespace cache and the list/watch built on it.

pub mod lister;
pub mod namespaces;
pub mod selector;

pub use lister::ProjectLister;
pub use namespaces::{ProjectCache, ProjectEvent};
pub use selector::LabelSelector;
