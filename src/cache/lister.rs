// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Authorization-filtered list and watch of projects

use crate::cache::namespaces::{ProjectCache, ProjectEvent};
use crate::cache::selector::LabelSelector;
use crate::constants::groups;
use crate::error::{ProjectError, Result};
use crate::kubernetes::{AccessRequest, AccessReviewer};
use crate::types::{Project, UserInfo};
use futures::stream::{self, BoxStream, StreamExt};
use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tracing::{instrument, warn};

/// Serves the projects a user is allowed to see
#[derive(Clone)]
pub struct ProjectLister {
    cache: ProjectCache,
    reviewer: Arc<dyn AccessReviewer>,
}

async fn visible(reviewer: &dyn AccessReviewer, user: &UserInfo, ns: &Namespace) -> bool {
    let name = ns.name_any();
    let request = AccessRequest::new("get", groups::PROJECT, "projects")
        .in_namespace(&name)
        .named(&name);
    match reviewer.allowed(user, &request).await {
        Ok(allowed) => allowed,
        Err(e) => {
            warn!("Access review for project {} failed: {}", name, e);
            false
        }
    }
}

impl ProjectLister {
    pub fn new(cache: ProjectCache, reviewer: Arc<dyn AccessReviewer>) -> Self {
        Self { cache, reviewer }
    }

    #[instrument(skip(self, user, selector), fields(user = %user.name))]
    pub async fn list(&self, user: &UserInfo, selector: Option<&LabelSelector>) -> Result<Vec<Project>> {
        if !self.cache.running() {
            return Err(ProjectError::NotReady);
        }

        let mut projects = Vec::new();
        for ns in self.cache.list() {
            if selector.is_some_and(|s| !s.matches(ns.labels())) {
                continue;
            }
            if visible(self.reviewer.as_ref(), user, &ns).await {
                projects.push(Project::from(ns.as_ref()));
            }
        }
        Ok(projects)
    }

    /// Stream project changes visible to `user`. With `include_existing`
    /// the stream starts with an `Added` event per current project.
    ///
    /// A project that was delivered and then deleted or made invisible to
    /// `user` always ends with a `Deleted` event. The stream ends if the
    /// consumer falls behind the cache; callers list again and re-watch.
    pub fn watch(&self, user: UserInfo, include_existing: bool) -> Result<BoxStream<'static, ProjectEvent>> {
        if !self.cache.running() {
            return Err(ProjectError::NotReady);
        }

        let (existing, receiver) = self.cache.subscribe();
        let initial: Vec<ProjectEvent> = if include_existing {
            existing.into_iter().map(ProjectEvent::Added).collect()
        } else {
            Vec::new()
        };

        let changes = stream::unfold(receiver, |mut receiver| async move {
            match receiver.recv().await {
                Ok(event) => Some((event, receiver)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Project watch fell behind by {} events, closing", skipped);
                    None
                }
                Err(RecvError::Closed) => None,
            }
        });

        let reviewer = self.reviewer.clone();
        let user = Arc::new(user);
        let delivered = Arc::new(Mutex::new(HashSet::new()));
        Ok(stream::iter(initial)
            .chain(changes)
            .filter_map(move |event| {
                let reviewer = reviewer.clone();
                let user = user.clone();
                let delivered = delivered.clone();
                async move {
                    let name = event.namespace().name_any();
                    if let ProjectEvent::Deleted(_) = event {
                        let seen = delivered
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&name);
                        return seen.then_some(event);
                    }

                    let allowed = visible(reviewer.as_ref(), &user, event.namespace()).await;
                    let mut delivered = delivered.lock().unwrap_or_else(PoisonError::into_inner);
                    if allowed {
                        delivered.insert(name);
                        Some(event)
                    } else if delivered.remove(&name) {
                        Some(ProjectEvent::Deleted(event.namespace().clone()))
                    } else {
                        None
                    }
                }
            })
            .boxed())
    }
}
