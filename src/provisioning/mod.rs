// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Project provisioning from a template.

pub mod classify;
pub mod convergence;
pub mod policy;
pub mod provisioner;
pub mod template;

use std::fmt;

pub use convergence::AccessConvergenceWaiter;
pub use policy::NamePolicy;
pub use provisioner::ProjectProvisioner;
pub use template::{ParameterExpander, Template, TemplateProcessor, TemplateSource};

/// Where a create request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Creating,
    Populating,
    Converging,
    Done,
    RollingBack,
    Rejected,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Validating => "validating",
            Phase::Creating => "creating",
            Phase::Populating => "populating",
            Phase::Converging => "converging",
            Phase::Done => "done",
            Phase::RollingBack => "rolling back",
            Phase::Rejected => "rejected",
        };
        f.write_str(name)
    }
}
