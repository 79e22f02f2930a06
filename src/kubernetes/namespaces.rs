// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Direct namespace reads and writes against the API server

use crate::error::Result;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{DeleteParams, PostParams},
    Api, Client, ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

/// Read a namespace, bypassing any cache. `None` if it does not exist.
#[instrument(skip(client))]
pub async fn get_namespace(client: &Client, name: &str) -> Result<Option<Namespace>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    match namespaces.get_opt(name).await? {
        Some(ns) => {
            debug!("Namespace {} exists", name);
            Ok(Some(ns))
        }
        None => Ok(None),
    }
}

/// Create the project namespace. Store errors are returned untranslated so
/// callers can tell a conflict from other failures.
#[instrument(skip(client, namespace), fields(namespace = %namespace.name_any()))]
pub async fn create_namespace(client: &Client, namespace: &Namespace) -> Result<Namespace> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    match namespaces.create(&PostParams::default(), namespace).await {
        Ok(created) => {
            info!("Namespace {} created", created.name_any());
            Ok(created)
        }
        Err(kube::Error::Api(err)) if err.code == 409 || err.code == 403 => {
            debug!("Namespace create rejected: {}", err.message);
            Err(kube::Error::Api(err).into())
        }
        Err(e) => {
            error!("Failed to create namespace {}: {}", namespace.name_any(), e);
            Err(e.into())
        }
    }
}

/// Best-effort delete used for rollback. Failure is logged and returned,
/// never retried.
#[instrument(skip(client))]
pub async fn delete_namespace(client: &Client, name: &str) -> Option<kube::Error> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!("Rolled back namespace {}", name);
            None
        }
        Err(e) => {
            warn!("Failed to roll back namespace {}: {}", name, e);
            Some(e)
        }
    }
}
