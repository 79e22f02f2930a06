// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ProjectRequest reconciler - turns submitted requests into projects.

use crate::error::{ProjectError, Result};
use crate::kubernetes::namespaces::get_namespace;
use crate::kubernetes::{check_self_provisioning, AccessReviewer};
use crate::provisioning::ProjectProvisioner;
use crate::types::project::{is_terminating, requester_of};
use crate::types::project_request::{ProjectRequest, ProjectRequestStatus, RequestPhase};
use crate::types::UserInfo;
use futures::StreamExt;
use kube::{
    api::{Patch, PatchParams},
    runtime::{controller::Action, Controller},
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct ProjectRequestReconciler {
    client: Client,
    provisioner: ProjectProvisioner,
    reviewer: Arc<dyn AccessReviewer>,
    message: Option<String>,
    trusted_submitters: Vec<String>,
}

impl ProjectRequestReconciler {
    pub fn new(client: Client, provisioner: ProjectProvisioner, reviewer: Arc<dyn AccessReviewer>) -> Self {
        Self {
            client,
            provisioner,
            reviewer,
            message: None,
            trusted_submitters: Vec::new(),
        }
    }

    /// Only accept a submitter annotation owned by one of these field
    /// managers. With none configured, the annotation is taken as given.
    pub fn with_trusted_submitters(mut self, managers: Vec<String>) -> Self {
        self.trusted_submitters = managers;
        self
    }

    fn submitter(&self, request: &ProjectRequest) -> Option<UserInfo> {
        if !self.trusted_submitters.is_empty() && !request.submitter_set_by(&self.trusted_submitters) {
            warn!(
                "Submitter of project request {} was not set by a trusted manager",
                request.name_any()
            );
            return None;
        }
        request.submitter()
    }

    /// Message shown to users who may not self-provision
    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let requests: Api<ProjectRequest> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(requests, WatcherConfig::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled project request: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    async fn set_status(&self, name: &str, status: ProjectRequestStatus) -> Result<()> {
        let requests: Api<ProjectRequest> = Api::all(self.client.clone());
        let patch = json!({ "status": status });
        requests
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Status `reason` for a failure with the given status code
fn reason_for(code: u16) -> &'static str {
    match code {
        403 => "Forbidden",
        404 => "NotFound",
        409 => "AlreadyExists",
        422 => "Invalid",
        503 => "ServiceUnavailable",
        _ => "InternalError",
    }
}

fn provisioned(project: &str) -> ProjectRequestStatus {
    ProjectRequestStatus {
        phase: Some(RequestPhase::Provisioned),
        reason: None,
        message: Some(format!("project {} created", project)),
    }
}

fn failed(error: &impl std::fmt::Display, code: u16) -> ProjectRequestStatus {
    ProjectRequestStatus {
        phase: Some(RequestPhase::Failed),
        reason: Some(reason_for(code).to_string()),
        message: Some(error.to_string()),
    }
}

#[instrument(skip(request, ctx), fields(request = %request.name_any()))]
async fn reconcile(request: Arc<ProjectRequest>, ctx: Arc<ProjectRequestReconciler>) -> Result<Action> {
    let name = request.name_any();

    if request.is_processed() {
        debug!("Project request {} already processed", name);
        return Ok(Action::await_change());
    }

    let Some(submitter) = ctx.submitter(&request) else {
        let error = ProjectError::Forbidden("request does not name a trusted submitting user".to_string());
        warn!("Rejecting project request {}: {}", name, error);
        ctx.set_status(&name, failed(&error, error.status_code())).await?;
        return Ok(Action::await_change());
    };

    match check_self_provisioning(ctx.reviewer.as_ref(), &submitter, ctx.message.as_deref()).await {
        Ok(()) => {}
        Err(e @ ProjectError::Forbidden(_)) => {
            info!("User {} may not request projects", submitter.name);
            ctx.set_status(&name, failed(&e, e.status_code())).await?;
            return Ok(Action::await_change());
        }
        // Review could not be performed; retry later
        Err(e) => return Err(e),
    }

    // A previous run created the project but could not record it
    if let Some(ns) = get_namespace(&ctx.client, &name).await? {
        if requester_of(&ns) == Some(submitter.name.as_str()) && !is_terminating(&ns) {
            info!("Project {} already provisioned for {}", name, submitter.name);
            ctx.set_status(&name, provisioned(&name)).await?;
            return Ok(Action::await_change());
        }
    }

    let status = match ctx.provisioner.create(&request.to_request(), &submitter).await {
        Ok(ns) => {
            info!("Project {} created for {}", ns.name_any(), submitter.name);
            provisioned(&ns.name_any())
        }
        Err(failure) => {
            warn!("Project request {} failed: {}", name, failure);
            failed(&failure, failure.status_code())
        }
    };
    ctx.set_status(&name, status).await?;

    Ok(Action::await_change())
}

fn error_policy(_request: Arc<ProjectRequest>, error: &ProjectError, _ctx: Arc<ProjectRequestReconciler>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}
