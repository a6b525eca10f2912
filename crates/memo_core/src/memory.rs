//! In-memory backends
//!
//! Thread-safe stand-ins for the remote document store and the blob store.
//! Data is lost when the process exits. Both can be switched offline so every
//! call fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::remote::{BlobStore, Fields, RawSnapshot, RemoteStore};

const URL_SCHEME: &str = "memory://";

#[derive(Default)]
pub struct InMemoryRemoteStore {
    collections: RwLock<HashMap<String, watch::Sender<RawSnapshot>>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of acknowledged write, update and delete calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn document(&self, collection: &str, key: &str) -> Option<Value> {
        self.collections
            .read()
            .get(collection)
            .and_then(|sender| sender.borrow().get(key).cloned())
    }

    pub fn snapshot(&self, collection: &str) -> RawSnapshot {
        self.collections
            .read()
            .get(collection)
            .map(|sender| sender.borrow().clone())
            .unwrap_or_default()
    }

    /// Store a raw child as-is, bypassing any schema. Notifies subscribers.
    pub fn insert_raw(&self, collection: &str, key: &str, value: Value) {
        self.modify(collection, |children| {
            children.insert(key.to_string(), value);
        });
    }

    fn ensure_online(&self, op: &str) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("remote store is offline, {op} rejected");
        }
        Ok(())
    }

    fn modify(&self, collection: &str, f: impl FnOnce(&mut RawSnapshot)) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_insert_with(|| watch::channel(RawSnapshot::new()).0)
            .send_modify(f);
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn write(&self, collection: &str, key: &str, fields: Fields) -> Result<()> {
        self.ensure_online("write")?;
        self.modify(collection, |children| {
            children.insert(key.to_string(), Value::Object(fields));
        });
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(%collection, %key, "document written");
        Ok(())
    }

    async fn update(&self, collection: &str, key: &str, fields: Fields) -> Result<()> {
        self.ensure_online("update")?;
        let mut found = false;
        self.modify(collection, |children| {
            if let Some(entry) = children.get_mut(key) {
                found = true;
                match entry {
                    Value::Object(existing) => existing.extend(fields),
                    other => *other = Value::Object(fields),
                }
            }
        });
        if !found {
            bail!("no document at `{collection}/{key}`");
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(%collection, %key, "document updated");
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<()> {
        self.ensure_online("delete")?;
        let mut removed = false;
        self.modify(collection, |children| removed = children.remove(key).is_some());
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(%collection, %key, removed, "document deleted");
        Ok(())
    }

    fn subscribe(&self, collection: &str) -> BoxStream<'static, RawSnapshot> {
        let receiver = self
            .collections
            .write()
            .entry(collection.to_string())
            .or_insert_with(|| watch::channel(RawSnapshot::new()).0)
            .subscribe();
        WatchStream::new(receiver).boxed()
    }
}

#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    offline: AtomicBool,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    fn ensure_online(&self, op: &str) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("blob store is offline, {op} rejected");
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.ensure_online("upload")?;
        debug!(%path, size = bytes.len(), "blob uploaded");
        self.blobs.write().insert(path.to_string(), bytes);
        Ok(())
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        self.ensure_online("url lookup")?;
        if !self.contains(path) {
            bail!("no blob stored at `{path}`");
        }
        Ok(format!("{URL_SCHEME}{path}"))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.ensure_online("download")?;
        let path = url
            .strip_prefix(URL_SCHEME)
            .with_context(|| format!("`{url}` is not a memory url"))?;
        self.blobs
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no blob stored at `{path}`"))
    }
}
