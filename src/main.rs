// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

use steward::cache::ProjectCache;
use steward::config::Config;
use steward::kubernetes::{
    wait_for_project_request_crd, DiscoveryMapper, KubeAccessReviewer, RoleBindingCache,
};
use steward::provisioning::{ProjectProvisioner, TemplateSource};
use steward::reconcilers::ProjectRequestReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Steward operator");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: template={:?}, request_limit={:?}",
        config.project_request_template, config.project_request_limit
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for ProjectRequest CRD to become available...");
    wait_for_project_request_crd(&client).await?;

    let projects = ProjectCache::new(client.clone());
    let role_bindings = RoleBindingCache::new(client.clone());
    let mapper = DiscoveryMapper::new(client.clone());

    let mut provisioner =
        ProjectProvisioner::new(client.clone(), Arc::new(mapper), Arc::new(role_bindings.reader()))
            .with_template_source(TemplateSource::from_config(
                config.project_request_template.clone(),
            ));
    if let Some(limit) = config.project_request_limit {
        provisioner = provisioner.with_request_limit(projects.clone(), limit);
    }

    let reconciler = ProjectRequestReconciler::new(
        client.clone(),
        provisioner,
        Arc::new(KubeAccessReviewer::new(client.clone())),
    )
    .with_message(config.project_request_message.clone())
    .with_trusted_submitters(config.submitter_managers.clone());
    if config.submitter_managers.is_empty() {
        warn!("PROJECT_REQUEST_SUBMITTER_MANAGERS unset, trusting any requester annotation");
    }

    info!("Starting caches and reconciler...");

    tokio::try_join!(projects.run(), role_bindings.run(), reconciler.run())?;

    // This should never be reached as the watches run forever
    warn!("All tasks stopped unexpectedly");
    Ok(())
}
