// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Annotation keys carried by project namespaces
pub mod annotations {
    pub const DISPLAY_NAME: &str = "openshift.io/display-name";
    pub const DESCRIPTION: &str = "openshift.io/description";
    /// User who requested the project; backs the requester index
    pub const REQUESTER: &str = "openshift.io/requester";
    /// Set by the admission layer on ProjectRequest objects
    pub const REQUEST_SUBMITTER: &str = "steward.geeko.me/requester";
}

/// The operator name used as field manager
pub const OPERATOR_NAME: &str = "steward";

/// Template parameter names filled in for every request
pub mod parameters {
    pub const PROJECT_NAME: &str = "PROJECT_NAME";
    pub const PROJECT_DISPLAYNAME: &str = "PROJECT_DISPLAYNAME";
    pub const PROJECT_DESCRIPTION: &str = "PROJECT_DESCRIPTION";
    pub const PROJECT_ADMIN_USER: &str = "PROJECT_ADMIN_USER";
    pub const PROJECT_REQUESTING_USER: &str = "PROJECT_REQUESTING_USER";
}

/// API groups recognized while classifying template objects
pub mod groups {
    pub const PROJECT: &str = "project.openshift.io";
    pub const RBAC: &str = "rbac.authorization.k8s.io";
    pub const LEGACY_AUTHORIZATION: &str = "authorization.openshift.io";
    pub const TEMPLATE: &str = "template.openshift.io";
}

/// Names and prefixes no user may claim
pub mod forbidden {
    pub const NAMES: &[&str] = &["openshift", "kubernetes", "kube"];
    pub const PREFIXES: &[&str] = &["openshift-", "kubernetes-", "kube-"];
}

/// Retry and polling timings
pub mod timing {
    /// Attempts at resolving a REST mapping (one plus three retries)
    pub const MAPPING_ATTEMPTS: u32 = 4;
    /// Just over the RESTMapper refresh interval
    pub const MAPPING_RETRY_SECS: u64 = 11;
    /// How often the discovery-backed mapper refreshes
    pub const MAPPING_REFRESH_SECS: u64 = 10;

    pub const CONVERGENCE_STEPS: u32 = 6;
    pub const CONVERGENCE_INITIAL_MILLIS: u64 = 10;
    pub const CONVERGENCE_FACTOR: f64 = 5.0;

    /// Time given to the namespace watch to observe a recent create
    pub const CACHE_GRACE_MILLIS: u64 = 50;
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

pub const DEFAULT_PROJECT_REQUEST_MESSAGE: &str =
    "You may not request a new project via this API.";
