// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: an in-memory API server behind a `kube::Client`.

use crate::kubernetes::RoleBindingLister;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::client::Body;
use kube::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

pub const NAMESPACES: &str = "/api/v1/namespaces";

pub fn role_bindings_path(namespace: &str) -> String {
    format!(
        "/apis/rbac.authorization.k8s.io/v1/namespaces/{}/rolebindings",
        namespace
    )
}

pub fn config_maps_path(namespace: &str) -> String {
    format!("/api/v1/namespaces/{}/configmaps", namespace)
}

struct Failure {
    method: String,
    path_prefix: String,
    status: u16,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Value>,
    failures: Vec<Failure>,
    requests: Vec<(String, String)>,
    resource_version: u64,
}

impl State {
    fn handle(&mut self, method: &str, path: &str, body: &[u8]) -> (u16, Value) {
        self.requests.push((method.to_string(), path.to_string()));

        if let Some(failure) = self
            .failures
            .iter()
            .find(|f| f.method == method && path.starts_with(&f.path_prefix))
        {
            return (
                failure.status,
                status_json(failure.status, "InternalError", "injected failure"),
            );
        }

        match method {
            "GET" => match self.objects.get(path) {
                Some(obj) => (200, obj.clone()),
                None => (404, status_json(404, "NotFound", &format!("{} not found", path))),
            },
            "POST" => self.create(path, body),
            "PATCH" => self.merge(path, body),
            "DELETE" => match self.objects.remove(path) {
                Some(obj) => {
                    // Namespace deletion cascades to everything inside it
                    if let Some(name) = path.strip_prefix(&format!("{}/", NAMESPACES)) {
                        let inner = format!("/namespaces/{}/", name);
                        self.objects.retain(|key, _| !key.contains(&inner));
                    }
                    (200, obj)
                }
                None => (404, status_json(404, "NotFound", &format!("{} not found", path))),
            },
            _ => (405, status_json(405, "MethodNotAllowed", method)),
        }
    }

    /// Shallow merge patch; a `/status` suffix targets the parent object
    fn merge(&mut self, path: &str, body: &[u8]) -> (u16, Value) {
        let Ok(Value::Object(patch)) = serde_json::from_slice::<Value>(body) else {
            return (400, status_json(400, "BadRequest", "invalid patch"));
        };
        let key = path.strip_suffix("/status").unwrap_or(path);
        let Some(obj) = self.objects.get_mut(key) else {
            return (404, status_json(404, "NotFound", &format!("{} not found", key)));
        };
        for (field, value) in patch {
            obj[field.as_str()] = value;
        }
        (200, obj.clone())
    }

    fn create(&mut self, collection: &str, body: &[u8]) -> (u16, Value) {
        let Ok(mut obj) = serde_json::from_slice::<Value>(body) else {
            return (400, status_json(400, "BadRequest", "invalid body"));
        };
        let Some(name) = obj["metadata"]["name"].as_str().map(str::to_string) else {
            return (422, status_json(422, "Invalid", "metadata.name is required"));
        };

        let key = format!("{}/{}", collection, name);
        if self.objects.contains_key(&key) {
            return (
                409,
                status_json(409, "AlreadyExists", &format!("\"{}\" already exists", name)),
            );
        }

        self.resource_version += 1;
        obj["metadata"]["uid"] = json!(format!("uid-{}", self.resource_version));
        obj["metadata"]["resourceVersion"] = json!(self.resource_version.to_string());
        if collection == NAMESPACES {
            obj["status"] = json!({"phase": "Active"});
        }
        self.objects.insert(key, obj.clone());
        (201, obj)
    }
}

/// A stateful fake of the API server: POST creates (409 on duplicates),
/// GET reads, PATCH merges, DELETE removes (cascading for namespaces).
/// Unknown paths 404.
#[derive(Clone, Default)]
pub struct FakeApiServer {
    state: Arc<Mutex<State>>,
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object into a collection
    pub fn with_object(self, collection: &str, obj: Value) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let body = serde_json::to_vec(&obj).unwrap();
            state.create(collection, &body);
        }
        self
    }

    /// Answer requests with `method` under `path_prefix` with `status`
    pub fn fail(self, method: &str, path_prefix: &str, status: u16) -> Self {
        self.state.lock().unwrap().failures.push(Failure {
            method: method.to_string(),
            path_prefix: path_prefix.to_string(),
            status,
        });
        self
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Build a kube Client backed by this server
    pub fn client(&self) -> Client {
        Client::new(self.clone(), "default")
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests other than reads
    pub fn writes(&self) -> Vec<(String, String)> {
        self.requests()
            .into_iter()
            .filter(|(method, _)| method != "GET")
            .collect()
    }

    pub fn object(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    /// Paths of all stored objects under a prefix
    pub fn paths_under(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.object(&format!("{}/{}", NAMESPACES, name))
            .map(|v| serde_json::from_value(v).unwrap())
    }
}

impl RoleBindingLister for FakeApiServer {
    fn role_binding(&self, namespace: &str, name: &str) -> Option<Arc<RoleBinding>> {
        self.object(&format!("{}/{}", role_bindings_path(namespace), name))
            .and_then(|v| serde_json::from_value(v).ok())
            .map(Arc::new)
    }
}

impl Service<Request<Body>> for FakeApiServer {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(_) => Bytes::new(),
            };

            let (status, value) =
                state
                    .lock()
                    .unwrap()
                    .handle(parts.method.as_str(), parts.uri.path(), &body);

            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&value).unwrap()))
                .unwrap())
        })
    }
}

/// A namespace as the API server would return it
pub fn namespace(name: &str, requester: Option<&str>) -> Namespace {
    let mut value = json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "resourceVersion": "1",
        },
        "status": {"phase": "Active"}
    });
    if let Some(requester) = requester {
        value["metadata"]["annotations"] = json!({ "openshift.io/requester": requester });
    }
    serde_json::from_value(value).unwrap()
}

/// A Status failure body
pub fn status_json(code: u16, reason: &str, message: &str) -> Value {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
}
