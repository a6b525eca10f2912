use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::stream::{BoxStream, StreamExt};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::{MutationMode, SyncConfig},
    error::{NotFoundError, RemoteError, SyncError, ValidationError},
    model::{Reminder, ReminderDraft, ReminderEdit, ReminderId},
    remote::{BlobStore, RemoteStore},
    schema::{self, CollectionSnapshot},
};

/// Owns the local ordered collection of reminders and keeps it consistent
/// with the remote store.
///
/// The collection only changes through the mutation methods below or through
/// [`ReminderSync::apply_snapshot`]. A snapshot produced before an in-flight
/// create or update is acknowledged can overwrite that mutation locally until
/// the remote echo arrives.
pub struct ReminderSync {
    remote: Arc<dyn RemoteStore>,
    blobs: Arc<dyn BlobStore>,
    config: SyncConfig,
    reminders: RwLock<Vec<Reminder>>,
}

pub struct ReminderSyncBuilder {
    remote: Option<Arc<dyn RemoteStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    config: SyncConfig,
}

impl ReminderSyncBuilder {
    pub fn new() -> Self {
        Self {
            remote: None,
            blobs: None,
            config: SyncConfig::default(),
        }
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mutation_mode(mut self, mode: MutationMode) -> Self {
        self.config.mutation_mode = mode;
        self
    }

    pub fn build(self) -> Result<ReminderSync> {
        let remote = self
            .remote
            .ok_or_else(|| anyhow!("a remote store is required"))?;
        let blobs = self
            .blobs
            .ok_or_else(|| anyhow!("a blob store is required"))?;
        anyhow::ensure!(
            !self.config.collection.is_empty(),
            "collection name cannot be empty"
        );
        Ok(ReminderSync {
            remote,
            blobs,
            config: self.config,
            reminders: RwLock::new(Vec::new()),
        })
    }
}

impl Default for ReminderSyncBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderSync {
    pub fn builder() -> ReminderSyncBuilder {
        ReminderSyncBuilder::new()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        self.reminders.read().clone()
    }

    pub fn get(&self, id: &ReminderId) -> Option<Reminder> {
        self.reminders
            .read()
            .iter()
            .find(|reminder| &reminder.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.reminders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.read().is_empty()
    }

    /// Decoded full-collection snapshots, current state first. Each call is a
    /// fresh subscription.
    pub fn observe_all(&self) -> BoxStream<'static, CollectionSnapshot> {
        debug!(collection = %self.config.collection, "subscribing to collection");
        self.remote
            .subscribe(&self.config.collection)
            .map(|raw| schema::decode_snapshot(&raw))
            .boxed()
    }

    /// Replace the whole local collection with `snapshot`.
    pub fn apply_snapshot(&self, snapshot: CollectionSnapshot) {
        let mut reminders = self.reminders.write();
        debug!(
            before = reminders.len(),
            after = snapshot.reminders.len(),
            dropped = snapshot.dropped,
            "applying snapshot"
        );
        *reminders = snapshot.reminders;
    }

    #[instrument(skip(self, draft), fields(attachment = draft.attachment.is_some()))]
    pub async fn create(&self, draft: ReminderDraft) -> Result<Reminder, SyncError> {
        if draft.description.is_empty() {
            return Err(ValidationError::EmptyDescription.into());
        }
        let title = if draft.title.is_empty() {
            self.config.placeholder_title.clone()
        } else {
            draft.title
        };
        let mut reminder = Reminder {
            id: ReminderId::generate(),
            title,
            description: draft.description,
            created_at: schema::stamp_now(),
            completed: false,
            image_url: None,
        };

        if self.config.mutation_mode == MutationMode::Optimistic {
            self.upsert_local(reminder.clone());
        }

        if let Some(bytes) = draft.attachment {
            reminder.image_url = Some(self.store_attachment(&reminder.id, bytes).await?);
        }
        self.write_remote(&reminder).await?;

        self.upsert_local(reminder.clone());
        info!(id = %reminder.id, "reminder created");
        Ok(reminder)
    }

    /// Merge `edit` over the stored reminder and re-write it. An empty edit is a
    /// no-op that returns the local copy without touching the remote store.
    #[instrument(skip(self, edit))]
    pub async fn update(
        &self,
        id: &ReminderId,
        edit: ReminderEdit,
    ) -> Result<Reminder, SyncError> {
        let current = self.require(id)?;
        if edit.is_empty() {
            debug!(%id, "empty edit, nothing to write");
            return Ok(current);
        }
        if edit.description.as_deref() == Some("") {
            return Err(ValidationError::EmptyDescription.into());
        }

        let image_url = match edit.attachment {
            Some(bytes) => Some(self.store_attachment(id, bytes).await?),
            None => None,
        };

        // Re-read after the upload so a toggle that landed meanwhile is kept.
        let mut reminder = self.require(id)?;
        if let Some(description) = edit.description {
            reminder.description = description;
        }
        if let Some(title) = edit.title {
            reminder.title = if title.is_empty() {
                self.config.placeholder_title.clone()
            } else {
                title
            };
        }
        if let Some(completed) = edit.completed {
            reminder.completed = completed;
        }
        if image_url.is_some() {
            reminder.image_url = image_url;
        }

        self.write_remote(&reminder).await?;
        self.upsert_local(reminder.clone());
        info!(%id, "reminder updated");
        Ok(reminder)
    }

    /// Flip `completed`, re-write the full record and return the new value.
    #[instrument(skip(self))]
    pub async fn toggle_completed(&self, id: &ReminderId) -> Result<bool, SyncError> {
        let mut reminder = self.require(id)?;
        reminder.completed = !reminder.completed;
        self.write_remote(&reminder).await?;

        let completed = reminder.completed;
        if let Some(local) = self.reminders.write().iter_mut().find(|r| &r.id == id) {
            local.completed = completed;
        }
        info!(%id, completed, "reminder toggled");
        Ok(completed)
    }

    /// Remote delete first; the local record goes only once it is acknowledged.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &ReminderId) -> Result<(), SyncError> {
        self.require(id)?;
        self.remote
            .delete(&self.config.collection, id.as_str())
            .await
            .map_err(|source| {
                warn!(%id, error = %source, "delete rejected by remote store");
                RemoteError::DeleteFailed {
                    key: id.to_string(),
                    source,
                }
            })?;

        self.reminders.write().retain(|reminder| &reminder.id != id);
        info!(%id, "reminder deleted");
        Ok(())
    }

    /// Bytes of the image attached to `id`, if it has one.
    #[instrument(skip(self))]
    pub async fn attachment(&self, id: &ReminderId) -> Result<Option<Vec<u8>>, SyncError> {
        let Some(url) = self.require(id)?.image_url else {
            return Ok(None);
        };
        let bytes = self
            .blobs
            .download(&url)
            .await
            .map_err(|source| RemoteError::DownloadFailed { url, source })?;
        Ok(Some(bytes))
    }
}

impl ReminderSync {
    fn require(&self, id: &ReminderId) -> Result<Reminder, NotFoundError> {
        self.get(id).ok_or_else(|| NotFoundError(id.clone()))
    }

    /// Insert or replace by id, so an echo that already landed is not duplicated.
    fn upsert_local(&self, reminder: Reminder) {
        let mut reminders = self.reminders.write();
        match reminders
            .iter()
            .position(|existing| existing.id == reminder.id)
        {
            Some(idx) => reminders[idx] = reminder,
            None => reminders.push(reminder),
        }
    }

    async fn write_remote(&self, reminder: &Reminder) -> Result<(), RemoteError> {
        self.remote
            .write(
                &self.config.collection,
                reminder.id.as_str(),
                schema::encode(reminder),
            )
            .await
            .map_err(|source| {
                warn!(id = %reminder.id, error = %source, "write rejected by remote store");
                RemoteError::WriteFailed {
                    key: reminder.id.to_string(),
                    source,
                }
            })
    }

    /// Upload, then resolve the public url. The record is written by the caller
    /// only after this returns.
    async fn store_attachment(
        &self,
        id: &ReminderId,
        bytes: Vec<u8>,
    ) -> Result<String, RemoteError> {
        let path = self.config.blob_path(id.as_str());
        self.blobs
            .upload(&path, bytes)
            .await
            .map_err(|source| {
                warn!(%path, error = %source, "attachment upload failed");
                RemoteError::UploadFailed {
                    path: path.clone(),
                    source,
                }
            })?;
        self.blobs.public_url(&path).await.map_err(|source| {
            warn!(%path, error = %source, "attachment url lookup failed");
            RemoteError::UrlFetchFailed { path, source }
        })
    }
}
