// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resolution of group/version/kind to API resources

use crate::constants::timing::MAPPING_REFRESH_SECS;
use async_trait::async_trait;
use kube::{
    core::{ApiResource, GroupVersionKind},
    discovery::{Discovery, Scope},
    Client,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Where objects of a kind are served
#[derive(Debug, Clone)]
pub struct RestMapping {
    pub resource: ApiResource,
    pub namespaced: bool,
}

#[async_trait]
pub trait RestMapper: Send + Sync {
    /// `None` when the kind is not (yet) known to the server
    async fn mapping(&self, gvk: &GroupVersionKind) -> Option<RestMapping>;
}

/// Mapper backed by API discovery, refreshed at most every
/// [`MAPPING_REFRESH_SECS`] seconds.
pub struct DiscoveryMapper {
    client: Client,
    refresh: Duration,
    cached: RwLock<Option<(Instant, Arc<Discovery>)>>,
}

impl DiscoveryMapper {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            refresh: Duration::from_secs(MAPPING_REFRESH_SECS),
            cached: RwLock::new(None),
        }
    }

    fn fresh(&self, cached: &Option<(Instant, Arc<Discovery>)>) -> Option<Arc<Discovery>> {
        cached
            .as_ref()
            .filter(|(fetched, _)| fetched.elapsed() < self.refresh)
            .map(|(_, discovery)| discovery.clone())
    }

    async fn discovery(&self) -> Option<Arc<Discovery>> {
        if let Some(discovery) = self.fresh(&*self.cached.read().await) {
            return Some(discovery);
        }

        let mut cached = self.cached.write().await;
        if let Some(discovery) = self.fresh(&cached) {
            return Some(discovery);
        }

        match Discovery::new(self.client.clone()).run().await {
            Ok(discovery) => {
                debug!("Refreshed API discovery");
                let discovery = Arc::new(discovery);
                *cached = Some((Instant::now(), discovery.clone()));
                Some(discovery)
            }
            Err(e) => {
                warn!("API discovery failed, keeping previous mappings: {}", e);
                cached.as_ref().map(|(_, discovery)| discovery.clone())
            }
        }
    }
}

#[async_trait]
impl RestMapper for DiscoveryMapper {
    async fn mapping(&self, gvk: &GroupVersionKind) -> Option<RestMapping> {
        let discovery = self.discovery().await?;
        discovery
            .resolve_gvk(gvk)
            .map(|(resource, caps)| RestMapping {
                resource,
                namespaced: matches!(caps.scope, Scope::Namespaced),
            })
    }
}

/// Fixed set of mappings
#[derive(Debug, Clone, Default)]
pub struct StaticMapper {
    mappings: HashMap<(String, String, String), RestMapping>,
}

impl StaticMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind, deriving its plural name from the kind
    pub fn with(mut self, gvk: GroupVersionKind, namespaced: bool) -> Self {
        let resource = ApiResource::from_gvk(&gvk);
        self.mappings.insert(
            (gvk.group, gvk.version, gvk.kind),
            RestMapping {
                resource,
                namespaced,
            },
        );
        self
    }
}

#[async_trait]
impl RestMapper for StaticMapper {
    async fn mapping(&self, gvk: &GroupVersionKind) -> Option<RestMapping> {
        self.mappings
            .get(&(gvk.group.clone(), gvk.version.clone(), gvk.kind.clone()))
            .cloned()
    }
}
