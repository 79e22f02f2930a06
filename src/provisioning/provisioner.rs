// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Creates a project and everything its template puts inside it.

use crate::backoff::{BackoffPolicy, Sleeper, TokioSleeper};
use crate::cache::ProjectCache;
use crate::constants::{parameters, timing};
use crate::error::{is_api_error, CreateFailure, ProjectError, Result};
use crate::kubernetes::namespaces::{create_namespace, delete_namespace, get_namespace};
use crate::kubernetes::{RestMapper, RestMapping, RoleBindingLister};
use crate::provisioning::classify::{classify, Classified, DependentObject};
use crate::provisioning::convergence::AccessConvergenceWaiter;
use crate::provisioning::policy::{validate_request, NamePolicy};
use crate::provisioning::template::{bind, ParameterExpander, TemplateProcessor, TemplateSource};
use crate::provisioning::Phase;
use crate::types::{ProjectRequest, UserInfo};
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{Api, PostParams},
    core::DynamicObject,
    Client, ResourceExt,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

type CreateResult<T> = std::result::Result<T, CreateFailure>;

fn reject(phase: Phase, error: ProjectError) -> CreateFailure {
    debug!("Phase {} -> {}: {}", phase, Phase::Rejected, error);
    CreateFailure::new(phase, error)
}

/// Provisions projects on behalf of users. Holds no per-request state, so
/// one instance serves any number of concurrent requests.
pub struct ProjectProvisioner {
    client: Client,
    templates: TemplateSource,
    processor: Arc<dyn TemplateProcessor>,
    mapper: Arc<dyn RestMapper>,
    waiter: AccessConvergenceWaiter,
    policy: NamePolicy,
    mapping_backoff: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
    request_limit: Option<(ProjectCache, usize)>,
}

impl ProjectProvisioner {
    pub fn new(
        client: Client,
        mapper: Arc<dyn RestMapper>,
        role_bindings: Arc<dyn RoleBindingLister>,
    ) -> Self {
        Self {
            client,
            templates: TemplateSource::Builtin,
            processor: Arc::new(ParameterExpander),
            mapper,
            waiter: AccessConvergenceWaiter::new(role_bindings),
            policy: NamePolicy::default(),
            mapping_backoff: BackoffPolicy::fixed(
                timing::MAPPING_ATTEMPTS,
                Duration::from_secs(timing::MAPPING_RETRY_SECS),
            ),
            sleeper: Arc::new(TokioSleeper),
            request_limit: None,
        }
    }

    pub fn with_template_source(mut self, templates: TemplateSource) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn TemplateProcessor>) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_name_policy(mut self, policy: NamePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_mapping_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.mapping_backoff = backoff;
        self
    }

    pub fn with_waiter(mut self, waiter: AccessConvergenceWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    /// Drives both the mapping retry and the convergence wait
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.waiter = self.waiter.with_sleeper(sleeper.clone());
        self.sleeper = sleeper;
        self
    }

    /// Cap the number of live projects per requester, counted in `cache`
    pub fn with_request_limit(mut self, cache: ProjectCache, limit: usize) -> Self {
        self.request_limit = Some((cache, limit));
        self
    }

    /// Create the project described by `request` for `requester`.
    ///
    /// The namespace is created before any dependent object. If a dependent
    /// object cannot be created the namespace is deleted again before the
    /// error is returned; a failed delete is reported in
    /// [`CreateFailure::rollback`].
    #[instrument(skip(self, request, requester), fields(project = %request.name, requester = %requester.name))]
    pub async fn create(&self, request: &ProjectRequest, requester: &UserInfo) -> CreateResult<Namespace> {
        let name = request.name.as_str();

        debug!("Phase {}", Phase::Validating);
        self.admit(request, requester)
            .await
            .map_err(|e| reject(Phase::Validating, e))?;

        debug!("Phase {}", Phase::Creating);
        let classified = self
            .render(request, requester)
            .await
            .map_err(|e| reject(Phase::Creating, e))?;
        let Classified {
            mut project,
            dependents,
            last_role_binding,
        } = classified;

        if project.name_any() != name {
            warn!(
                "Template names the project '{}', using requested name",
                project.name_any()
            );
            project.metadata.name = Some(name.to_string());
        }
        create_namespace(&self.client, &project)
            .await
            .map_err(|e| reject(Phase::Creating, e))?;

        debug!("Phase {}", Phase::Populating);
        for dependent in &dependents {
            if let Err(e) = self.create_dependent(name, dependent).await {
                error!("Failed to create {}: {}", dependent.describe(), e);
                debug!("Phase {}", Phase::RollingBack);
                let rollback = delete_namespace(&self.client, name).await;
                return Err(reject(Phase::Populating, e).with_rollback(rollback));
            }
        }

        if let Some(role_binding) = last_role_binding {
            debug!("Phase {}", Phase::Converging);
            self.waiter.wait(name, &role_binding).await;
        }

        let created = get_namespace(&self.client, name)
            .await
            .and_then(|ns| ns.ok_or_else(|| ProjectError::NotFound(name.to_string())))
            .map_err(|e| reject(Phase::Done, e))?;
        info!("Project {} provisioned with {} objects", name, dependents.len());
        Ok(created)
    }

    /// Policy checks, in order, before anything is written
    async fn admit(&self, request: &ProjectRequest, requester: &UserInfo) -> Result<()> {
        validate_request(request)?;
        self.policy.check(&request.name)?;

        if let Some((cache, limit)) = &self.request_limit {
            if cache.active_project_count(&requester.name) >= *limit {
                return Err(ProjectError::RequestLimitExceeded {
                    user: requester.name.clone(),
                    limit: *limit,
                });
            }
        }

        // Optimization only: the store's uniqueness check is authoritative
        if get_namespace(&self.client, &request.name).await?.is_some() {
            return Err(ProjectError::AlreadyExists(request.name.clone()));
        }
        Ok(())
    }

    /// Load, bind, expand and classify the template
    async fn render(&self, request: &ProjectRequest, requester: &UserInfo) -> Result<Classified> {
        let template = self.templates.load(&self.client).await?;
        let values = HashMap::from([
            (parameters::PROJECT_NAME, request.name.clone()),
            (parameters::PROJECT_DISPLAYNAME, request.display_name.clone()),
            (parameters::PROJECT_DESCRIPTION, request.description.clone()),
            (parameters::PROJECT_ADMIN_USER, requester.name.clone()),
            (parameters::PROJECT_REQUESTING_USER, requester.name.clone()),
        ]);
        let objects = self.processor.process(&bind(template, &values))?;
        classify(objects)
    }

    async fn resolve_mapping(&self, dependent: &DependentObject) -> Result<RestMapping> {
        let mapper = &self.mapper;
        let gvk = &dependent.gvk;
        self.mapping_backoff
            .retry(self.sleeper.as_ref(), |attempt| async move {
                let mapping = mapper.mapping(gvk).await;
                if mapping.is_none() {
                    warn!(
                        "No REST mapping for {}/{} {} (attempt {})",
                        gvk.group,
                        gvk.version,
                        gvk.kind,
                        attempt + 1
                    );
                }
                mapping
            })
            .await
            .ok_or_else(|| ProjectError::MappingUnresolved(dependent.describe()))
    }

    /// Create one dependent object inside the project. An object that
    /// already exists counts as created.
    async fn create_dependent(&self, namespace: &str, dependent: &DependentObject) -> Result<()> {
        let mapping = self.resolve_mapping(dependent).await?;

        let mut object: DynamicObject = dependent.object.clone();
        object.metadata.resource_version = None;
        let api: Api<DynamicObject> = if mapping.namespaced {
            object.metadata.namespace = Some(namespace.to_string());
            Api::namespaced_with(self.client.clone(), namespace, &mapping.resource)
        } else {
            Api::all_with(self.client.clone(), &mapping.resource)
        };

        match api.create(&PostParams::default(), &object).await {
            Ok(_) => {
                debug!("Created {}", dependent.describe());
                Ok(())
            }
            // Tolerated for every kind: a controller may have seeded it first
            Err(e) if is_api_error(&e, 409) => {
                info!("{} already exists, keeping it", dependent.describe());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
