// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Waits for a new RoleBinding to reach the authorization cache.

use crate::backoff::{BackoffPolicy, Sleeper, TokioSleeper};
use crate::constants::timing;
use crate::kubernetes::RoleBindingLister;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Polls a RoleBinding cache until a binding shows up or the budget runs out.
/// Never fails: a timeout only means the caller may briefly see 403s.
#[derive(Clone)]
pub struct AccessConvergenceWaiter {
    lister: Arc<dyn RoleBindingLister>,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl AccessConvergenceWaiter {
    pub fn new(lister: Arc<dyn RoleBindingLister>) -> Self {
        Self {
            lister,
            policy: BackoffPolicy::exponential(
                timing::CONVERGENCE_STEPS,
                Duration::from_millis(timing::CONVERGENCE_INITIAL_MILLIS),
                timing::CONVERGENCE_FACTOR,
            ),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    /// Returns whether the binding became visible.
    #[instrument(skip(self))]
    pub async fn wait(&self, namespace: &str, role_binding: &str) -> bool {
        let lister = &self.lister;
        let seen = self
            .policy
            .retry(self.sleeper.as_ref(), |attempt| async move {
                lister
                    .role_binding(namespace, role_binding)
                    .map(|_| attempt)
            })
            .await;

        match seen {
            Some(attempt) => {
                debug!("RoleBinding visible after {} polls", attempt + 1);
                true
            }
            None => {
                debug!("RoleBinding not visible within {:?}", self.policy.budget());
                false
            }
        }
    }
}
