// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Read-through RoleBinding cache shared with the authorizer

use futures::StreamExt;
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::{
    runtime::{
        reflector::{self, ObjectRef, Store},
        watcher, WatchStreamExt,
    },
    Api, Client,
};
use std::sync::Arc;
use tracing::{info, warn};

pub trait RoleBindingLister: Send + Sync {
    fn role_binding(&self, namespace: &str, name: &str) -> Option<Arc<RoleBinding>>;
}

impl RoleBindingLister for Store<RoleBinding> {
    fn role_binding(&self, namespace: &str, name: &str) -> Option<Arc<RoleBinding>> {
        Store::get(self, &ObjectRef::new(name).within(namespace))
    }
}

/// Reflects all RoleBindings into a local store
pub struct RoleBindingCache {
    client: Client,
    reader: Store<RoleBinding>,
    writer: reflector::store::Writer<RoleBinding>,
}

impl RoleBindingCache {
    pub fn new(client: Client) -> Self {
        let (reader, writer) = reflector::store();
        Self {
            client,
            reader,
            writer,
        }
    }

    pub fn reader(&self) -> Store<RoleBinding> {
        self.reader.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let role_bindings: Api<RoleBinding> = Api::all(self.client.clone());
        info!("Starting RoleBinding cache");

        watcher(role_bindings, watcher::Config::default())
            .default_backoff()
            .reflect(self.writer)
            .for_each(|res| async move {
                if let Err(e) = res {
                    warn!("RoleBinding watch error: {}", e);
                }
            })
            .await;

        Ok(())
    }
}
