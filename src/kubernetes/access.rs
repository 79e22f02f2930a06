// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! SubjectAccessReview-backed authorization checks

use crate::constants::{groups, DEFAULT_PROJECT_REQUEST_MESSAGE};
use crate::error::{ProjectError, Result};
use crate::types::UserInfo;
use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client,
};
use tracing::{debug, instrument};

/// The attributes of an action a user wants to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub verb: String,
    pub group: String,
    pub resource: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl AccessRequest {
    pub fn new(verb: &str, group: &str, resource: &str) -> Self {
        Self {
            verb: verb.to_string(),
            group: group.to_string(),
            resource: resource.to_string(),
            namespace: None,
            name: None,
        }
    }

    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

/// Authorization oracle
#[async_trait]
pub trait AccessReviewer: Send + Sync {
    async fn allowed(&self, user: &UserInfo, request: &AccessRequest) -> Result<bool>;
}

pub struct KubeAccessReviewer {
    client: Client,
}

impl KubeAccessReviewer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AccessReviewer for KubeAccessReviewer {
    #[instrument(skip(self, user), fields(user = %user.name))]
    async fn allowed(&self, user: &UserInfo, request: &AccessRequest) -> Result<bool> {
        let reviews: Api<SubjectAccessReview> = Api::all(self.client.clone());
        let review = SubjectAccessReview {
            metadata: ObjectMeta::default(),
            spec: SubjectAccessReviewSpec {
                user: Some(user.name.clone()),
                groups: (!user.groups.is_empty()).then(|| user.groups.clone()),
                resource_attributes: Some(ResourceAttributes {
                    verb: Some(request.verb.clone()),
                    group: Some(request.group.clone()),
                    resource: Some(request.resource.clone()),
                    namespace: request.namespace.clone(),
                    name: request.name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            status: None,
        };

        let result = reviews.create(&PostParams::default(), &review).await?;
        let allowed = result.status.is_some_and(|s| s.allowed);
        debug!("Access review {:?}: allowed={}", request, allowed);
        Ok(allowed)
    }
}

/// Fails with `Forbidden` carrying the operator message unless the user may
/// create project requests.
pub async fn check_self_provisioning(
    reviewer: &dyn AccessReviewer,
    user: &UserInfo,
    message: Option<&str>,
) -> Result<()> {
    let request = AccessRequest::new("create", groups::PROJECT, "projectrequests");
    if reviewer.allowed(user, &request).await? {
        Ok(())
    } else {
        Err(ProjectError::Forbidden(
            message.unwrap_or(DEFAULT_PROJECT_REQUEST_MESSAGE).to_string(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashSet;

    /// Grants exactly the listed (user, verb, resource, namespace) tuples
    #[derive(Debug, Default)]
    pub struct StaticReviewer {
        grants: HashSet<(String, String, String, Option<String>)>,
    }

    impl StaticReviewer {
        pub fn grant(mut self, user: &str, verb: &str, resource: &str, namespace: Option<&str>) -> Self {
            self.grants.insert((
                user.to_string(),
                verb.to_string(),
                resource.to_string(),
                namespace.map(str::to_string),
            ));
            self
        }
    }

    #[async_trait]
    impl AccessReviewer for StaticReviewer {
        async fn allowed(&self, user: &UserInfo, request: &AccessRequest) -> Result<bool> {
            Ok(self.grants.contains(&(
                user.name.clone(),
                request.verb.clone(),
                request.resource.clone(),
                request.namespace.clone(),
            )))
        }
    }
}
