//! Seams to the remote keyed document store and the blob store.
//!
//! Implementations must be `Send + Sync`; the synchronizer shares them across
//! tasks behind an `Arc`.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

/// Flat field map of a single remote document.
pub type Fields = Map<String, Value>;

/// Every child of a collection, keyed by document key, exactly as stored.
pub type RawSnapshot = BTreeMap<String, Value>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Replace the document at `key` with `fields`.
    async fn write(&self, collection: &str, key: &str, fields: Fields) -> Result<()>;

    /// Merge `fields` into the document at `key`.
    async fn update(&self, collection: &str, key: &str, fields: Fields) -> Result<()>;

    async fn delete(&self, collection: &str, key: &str) -> Result<()>;

    /// Full-collection snapshots: the current state first, then one per change.
    fn subscribe(&self, collection: &str) -> BoxStream<'static, RawSnapshot>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()>;

    async fn public_url(&self, path: &str) -> Result<String>;

    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}
