use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use memo_core::{
    memory::{InMemoryBlobStore, InMemoryRemoteStore},
    remote::{BlobStore, Fields, RawSnapshot, RemoteStore},
    schema::FIELD_IMAGE_URL,
    CollectionSnapshot, ReminderDraft, ReminderEdit, ReminderSync,
};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn next_snapshot(stream: &mut BoxStream<'static, CollectionSnapshot>) -> CollectionSnapshot {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("snapshot within timeout")
        .expect("subscription stays open")
}

#[tokio::test]
async fn buy_milk_scenario() {
    init_tracing();
    let remote = Arc::new(InMemoryRemoteStore::new());
    let sync = ReminderSync::builder()
        .remote(remote.clone())
        .blobs(Arc::new(InMemoryBlobStore::new()))
        .build()
        .expect("build synchronizer");
    let mut snapshots = sync.observe_all();
    assert!(next_snapshot(&mut snapshots).await.is_empty());

    let r1 = sync
        .create(ReminderDraft::new("Buy milk", "2%"))
        .await
        .expect("create");
    assert!(!r1.completed);

    let echoed = next_snapshot(&mut snapshots).await;
    assert_eq!(echoed.get(&r1.id), Some(&r1));
    sync.apply_snapshot(echoed);
    assert_eq!(sync.len(), 1, "echo must not duplicate the created record");

    assert!(sync.toggle_completed(&r1.id).await.expect("toggle"));
    let toggled = next_snapshot(&mut snapshots).await;
    assert!(toggled.get(&r1.id).expect("still present").completed);
    sync.apply_snapshot(toggled);

    sync.delete(&r1.id).await.expect("delete");
    let after_delete = next_snapshot(&mut snapshots).await;
    assert!(!after_delete.contains(&r1.id));
    sync.apply_snapshot(after_delete);

    assert!(sync.is_empty());
    assert!(sync.delete(&r1.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn update_is_visible_to_new_subscribers() {
    init_tracing();
    let sync = ReminderSync::builder()
        .remote(Arc::new(InMemoryRemoteStore::new()))
        .blobs(Arc::new(InMemoryBlobStore::new()))
        .build()
        .expect("build synchronizer");

    let created = sync
        .create(ReminderDraft::new("Dentist", "Tuesday"))
        .await
        .expect("create");
    sync.update(&created.id, ReminderEdit::new().title("Dentist at 9"))
        .await
        .expect("update");

    let mut fresh = sync.observe_all();
    let snapshot = next_snapshot(&mut fresh).await;
    let stored = snapshot.get(&created.id).expect("present");
    assert_eq!(stored.title, "Dentist at 9");
    assert_eq!(stored.created_at, created.created_at);
    assert_eq!(stored.completed, created.completed);
}

#[tokio::test]
async fn malformed_children_are_skipped() {
    init_tracing();
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote.insert_raw(
        "reminders",
        "good",
        json!({"id": "good", "title": "Water plants", "description": "balcony", "timestamp": 1_700_000_000.0, "isChecked": false, "imageURL": ""}),
    );
    remote.insert_raw("reminders", "no-title", json!({"description": "x", "timestamp": 1}));
    remote.insert_raw("reminders", "scalar", json!(42));

    let sync = ReminderSync::builder()
        .remote(remote)
        .blobs(Arc::new(InMemoryBlobStore::new()))
        .build()
        .expect("build synchronizer");
    let snapshot = next_snapshot(&mut sync.observe_all()).await;
    assert_eq!(snapshot.dropped, 2);
    sync.apply_snapshot(snapshot);

    let titles: Vec<String> = sync.reminders().into_iter().map(|r| r.title).collect();
    assert_eq!(titles, vec!["Water plants".to_string()]);
}

/// Refuses any record whose image reference does not already resolve.
struct ReferenceCheckingStore {
    inner: InMemoryRemoteStore,
    blobs: Arc<InMemoryBlobStore>,
}

#[async_trait]
impl RemoteStore for ReferenceCheckingStore {
    async fn write(&self, collection: &str, key: &str, fields: Fields) -> Result<()> {
        if let Some(url) = fields.get(FIELD_IMAGE_URL).and_then(|v| v.as_str()) {
            if !url.is_empty() {
                ensure!(
                    self.blobs.download(url).await.is_ok(),
                    "dangling reference {url}"
                );
            }
        }
        self.inner.write(collection, key, fields).await
    }

    async fn update(&self, collection: &str, key: &str, fields: Fields) -> Result<()> {
        self.inner.update(collection, key, fields).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<()> {
        self.inner.delete(collection, key).await
    }

    fn subscribe(&self, collection: &str) -> BoxStream<'static, RawSnapshot> {
        self.inner.subscribe(collection)
    }
}

#[tokio::test]
async fn attachment_exists_before_record_is_written() {
    init_tracing();
    let blobs = Arc::new(InMemoryBlobStore::new());
    let sync = ReminderSync::builder()
        .remote(Arc::new(ReferenceCheckingStore {
            inner: InMemoryRemoteStore::new(),
            blobs: blobs.clone(),
        }))
        .blobs(blobs.clone())
        .build()
        .expect("build synchronizer");

    let image = b"\x89PNG\r\n\x1a\nfake".to_vec();
    let created = sync
        .create(ReminderDraft::new("Receipt", "keep for taxes").with_attachment(image.clone()))
        .await
        .expect("create with attachment");

    let snapshot = next_snapshot(&mut sync.observe_all()).await;
    let stored = snapshot.get(&created.id).expect("record written");
    let url = stored.image_url.clone().expect("reference stored");
    assert_eq!(blobs.download(&url).await.expect("resolves"), image);
}
