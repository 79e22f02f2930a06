// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch-fed snapshot of project namespaces.

use crate::backoff::{Sleeper, TokioSleeper};
use crate::constants::timing::CACHE_GRACE_MILLIS;
use crate::error::{ProjectError, Result};
use crate::kubernetes::namespaces::get_namespace;
use crate::types::project::{is_terminating, requester_of};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    runtime::{watcher, WatchStreamExt},
    Api, Client, ResourceExt,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

/// A change to the set of project namespaces
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectEvent {
    Added(Arc<Namespace>),
    Modified(Arc<Namespace>),
    Deleted(Arc<Namespace>),
}

impl ProjectEvent {
    pub fn namespace(&self) -> &Arc<Namespace> {
        match self {
            ProjectEvent::Added(ns) | ProjectEvent::Modified(ns) | ProjectEvent::Deleted(ns) => ns,
        }
    }
}

#[derive(Default)]
struct Snapshot {
    by_name: BTreeMap<String, Arc<Namespace>>,
    by_requester: BTreeMap<String, BTreeSet<String>>,
}

impl Snapshot {
    fn insert(&mut self, ns: Arc<Namespace>) -> Option<Arc<Namespace>> {
        let name = ns.name_any();
        let previous = self.remove(&name);
        if let Some(requester) = requester_of(&ns) {
            self.by_requester
                .entry(requester.to_string())
                .or_default()
                .insert(name.clone());
        }
        self.by_name.insert(name, ns);
        previous
    }

    fn remove(&mut self, name: &str) -> Option<Arc<Namespace>> {
        let previous = self.by_name.remove(name)?;
        if let Some(requester) = requester_of(&previous) {
            if let Some(names) = self.by_requester.get_mut(requester) {
                names.remove(name);
                if names.is_empty() {
                    self.by_requester.remove(requester);
                }
            }
        }
        Some(previous)
    }
}

struct Inner {
    client: Client,
    snapshot: RwLock<Snapshot>,
    relist: Mutex<Option<Vec<Arc<Namespace>>>>,
    synced: watch::Sender<bool>,
    events: broadcast::Sender<ProjectEvent>,
    grace: Duration,
    sleeper: Arc<dyn Sleeper>,
}

/// Read-through cache of namespaces, kept current by a single watch task.
/// Cheap to clone; clones share the snapshot.
#[derive(Clone)]
pub struct ProjectCache {
    inner: Arc<Inner>,
}

impl ProjectCache {
    /// `client` is used for the namespace watch and the fallback read
    pub fn new(client: Client) -> Self {
        Self::with_timing(
            client,
            Duration::from_millis(CACHE_GRACE_MILLIS),
            Arc::new(TokioSleeper),
        )
    }

    pub fn with_timing(client: Client, grace: Duration, sleeper: Arc<dyn Sleeper>) -> Self {
        let (synced, _) = watch::channel(false);
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                client,
                snapshot: RwLock::new(Snapshot::default()),
                relist: Mutex::new(None),
                synced,
                events,
                grace,
                sleeper,
            }),
        }
    }

    /// Feed the snapshot from a namespace watch until the stream ends
    pub async fn run(self) -> anyhow::Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.inner.client.clone());
        info!("Starting project namespace cache");

        watcher(namespaces, watcher::Config::default())
            .default_backoff()
            .for_each(|res| {
                match res {
                    Ok(event) => self.apply(event),
                    Err(e) => warn!("Namespace watch error: {}", e),
                }
                futures::future::ready(())
            })
            .await;

        Ok(())
    }

    /// Whether the initial list has been loaded. List and watch traffic
    /// must not be served before this is true.
    pub fn running(&self) -> bool {
        *self.inner.synced.borrow()
    }

    pub async fn wait_until_running(&self) {
        let mut synced = self.inner.synced.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = synced.wait_for(|done| *done).await;
    }

    /// Apply one watch event to the snapshot
    pub fn apply(&self, event: watcher::Event<Namespace>) {
        match event {
            watcher::Event::Init => {
                *self.relist_guard() = Some(Vec::new());
            }
            watcher::Event::InitApply(ns) => {
                self.relist_guard()
                    .get_or_insert_with(Vec::new)
                    .push(Arc::new(ns));
            }
            watcher::Event::InitDone => {
                let listed = self.relist_guard().take().unwrap_or_default();
                self.replace(listed);
                if !self.running() {
                    info!("Project namespace cache synced");
                }
                self.inner.synced.send_replace(true);
            }
            watcher::Event::Apply(ns) => {
                let ns = Arc::new(ns);
                let mut snapshot = self.write_guard();
                let event = match snapshot.insert(ns.clone()) {
                    Some(_) => ProjectEvent::Modified(ns),
                    None => ProjectEvent::Added(ns),
                };
                let _ = self.inner.events.send(event);
            }
            watcher::Event::Delete(ns) => {
                let mut snapshot = self.write_guard();
                if let Some(previous) = snapshot.remove(&ns.name_any()) {
                    let _ = self.inner.events.send(ProjectEvent::Deleted(previous));
                }
            }
        }
    }

    /// Swap in a relisted set, emitting the difference as events
    fn replace(&self, listed: Vec<Arc<Namespace>>) {
        let mut snapshot = self.write_guard();
        let mut fresh = Snapshot::default();
        let mut events = Vec::new();

        for ns in listed {
            match snapshot.by_name.get(&ns.name_any()) {
                None => events.push(ProjectEvent::Added(ns.clone())),
                Some(old) if old.resource_version() != ns.resource_version() => {
                    events.push(ProjectEvent::Modified(ns.clone()))
                }
                Some(_) => {}
            }
            fresh.insert(ns);
        }
        for (name, old) in &snapshot.by_name {
            if !fresh.by_name.contains_key(name) {
                events.push(ProjectEvent::Deleted(old.clone()));
            }
        }

        *snapshot = fresh;
        for event in events {
            let _ = self.inner.events.send(event);
        }
    }

    /// Snapshot lookup only
    pub fn get(&self, name: &str) -> Option<Arc<Namespace>> {
        self.read_guard().by_name.get(name).cloned()
    }

    /// Look a namespace up, tolerating watch lag: on a miss wait the grace
    /// period and look again, then fall back to a direct read.
    #[instrument(skip(self))]
    pub async fn get_namespace(&self, name: &str) -> Result<Arc<Namespace>> {
        if let Some(ns) = self.get(name) {
            return Ok(ns);
        }

        self.inner.sleeper.sleep(self.inner.grace).await;
        if let Some(ns) = self.get(name) {
            debug!("Found {} in cache after waiting", name);
            return Ok(ns);
        }

        match get_namespace(&self.inner.client, name).await? {
            Some(ns) => {
                debug!("Found {} via storage lookup", name);
                Ok(Arc::new(ns))
            }
            None => Err(ProjectError::NotFound(name.to_string())),
        }
    }

    /// All cached namespaces, ordered by name
    pub fn list(&self) -> Vec<Arc<Namespace>> {
        self.read_guard().by_name.values().cloned().collect()
    }

    /// Namespaces whose requester annotation names `user`
    pub fn namespaces_for_requester(&self, user: &str) -> Vec<Arc<Namespace>> {
        let snapshot = self.read_guard();
        snapshot
            .by_requester
            .get(user)
            .into_iter()
            .flatten()
            .filter_map(|name| snapshot.by_name.get(name).cloned())
            .collect()
    }

    /// Live (not terminating) projects requested by `user`
    pub fn active_project_count(&self, user: &str) -> usize {
        self.namespaces_for_requester(user)
            .iter()
            .filter(|ns| !is_terminating(ns))
            .count()
    }

    /// The current snapshot plus a receiver for every later change. Taken
    /// under the read lock so no change falls between the two.
    pub fn subscribe(&self) -> (Vec<Arc<Namespace>>, broadcast::Receiver<ProjectEvent>) {
        let snapshot = self.read_guard();
        let receiver = self.inner.events.subscribe();
        (snapshot.by_name.values().cloned().collect(), receiver)
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn relist_guard(&self) -> std::sync::MutexGuard<'_, Option<Vec<Arc<Namespace>>>> {
        self.inner.relist.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::testing::RecordingSleeper;
    use crate::test_utils::{namespace, FakeApiServer, NAMESPACES};
    use serde_json::json;

    fn cache(server: &FakeApiServer) -> (ProjectCache, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let cache = ProjectCache::with_timing(
            server.client(),
            Duration::from_millis(CACHE_GRACE_MILLIS),
            sleeper.clone(),
        );
        (cache, sleeper)
    }

    #[tokio::test]
    async fn test_watch_fed_namespace_served_without_store_read() {
        let server = FakeApiServer::new();
        let (cache, sleeper) = cache(&server);

        cache.apply(watcher::Event::Apply(namespace("myapp", Some("alice"))));
        let ns = cache.get_namespace("myapp").await.unwrap();

        assert_eq!(ns.name_any(), "myapp");
        assert!(server.requests().is_empty());
        assert!(sleeper.slept().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_watch_delivery_found_on_recheck() {
        let server = FakeApiServer::new();
        let cache = ProjectCache::new(server.client());

        let feeder = cache.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(CACHE_GRACE_MILLIS / 2)).await;
            feeder.apply(watcher::Event::Apply(namespace("late", None)));
        });

        let ns = cache.get_namespace("late").await.unwrap();

        assert_eq!(ns.name_any(), "late");
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_direct_read() {
        let server = FakeApiServer::new().with_object(
            NAMESPACES,
            json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "unseen"}}),
        );
        let (cache, sleeper) = cache(&server);

        let ns = cache.get_namespace("unseen").await.unwrap();

        assert_eq!(ns.name_any(), "unseen");
        assert_eq!(sleeper.slept(), vec![Duration::from_millis(CACHE_GRACE_MILLIS)]);
        assert_eq!(
            server.requests(),
            vec![("GET".to_string(), format!("{}/unseen", NAMESPACES))]
        );
    }

    #[tokio::test]
    async fn test_not_found_after_fallback() {
        let server = FakeApiServer::new();
        let (cache, _) = cache(&server);

        let err = cache.get_namespace("missing").await.unwrap_err();
        assert!(matches!(err, ProjectError::NotFound(ref name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_running_after_initial_sync() {
        let server = FakeApiServer::new();
        let (cache, _) = cache(&server);
        assert!(!cache.running());

        cache.apply(watcher::Event::Init);
        cache.apply(watcher::Event::InitApply(namespace("a", Some("alice"))));
        assert!(!cache.running());
        assert!(cache.get("a").is_none());

        cache.apply(watcher::Event::InitDone);
        assert!(cache.running());
        assert!(cache.get("a").is_some());
        cache.wait_until_running().await;
    }

    #[tokio::test]
    async fn test_requester_index_follows_updates() {
        let server = FakeApiServer::new();
        let (cache, _) = cache(&server);

        cache.apply(watcher::Event::Apply(namespace("a", Some("alice"))));
        cache.apply(watcher::Event::Apply(namespace("b", Some("alice"))));
        cache.apply(watcher::Event::Apply(namespace("c", Some("bob"))));
        assert_eq!(cache.active_project_count("alice"), 2);

        cache.apply(watcher::Event::Apply(namespace("b", Some("bob"))));
        assert_eq!(cache.active_project_count("alice"), 1);
        assert_eq!(cache.active_project_count("bob"), 2);

        cache.apply(watcher::Event::Delete(namespace("c", Some("bob"))));
        let names: Vec<_> = cache
            .namespaces_for_requester("bob")
            .iter()
            .map(|ns| ns.name_any())
            .collect();
        assert_eq!(names, vec!["b"]);
        assert!(cache.namespaces_for_requester("nobody").is_empty());
    }

    #[tokio::test]
    async fn test_relist_emits_differences() {
        let server = FakeApiServer::new();
        let (cache, _) = cache(&server);
        cache.apply(watcher::Event::Apply(namespace("kept", None)));
        cache.apply(watcher::Event::Apply(namespace("gone", None)));
        let (existing, mut events) = cache.subscribe();
        assert_eq!(existing.len(), 2);

        let mut changed = namespace("kept", None);
        changed.metadata.resource_version = Some("2".to_string());
        cache.apply(watcher::Event::Init);
        cache.apply(watcher::Event::InitApply(changed));
        cache.apply(watcher::Event::InitApply(namespace("new", None)));
        cache.apply(watcher::Event::InitDone);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            let kind = match &event {
                ProjectEvent::Added(_) => "added",
                ProjectEvent::Modified(_) => "modified",
                ProjectEvent::Deleted(_) => "deleted",
            };
            seen.push((kind, event.namespace().name_any()));
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("added", "new".to_string()),
                ("deleted", "gone".to_string()),
                ("modified", "kept".to_string()),
            ]
        );
        assert!(cache.get("gone").is_none());
    }
}
