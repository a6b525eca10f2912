use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use memo_core::{CollectionSnapshot, ReminderSync};

/// Carries snapshots from the remote subscription onto the thread that owns
/// the local collection.
///
/// The subscription runs on a tokio task that keeps only the newest snapshot
/// in a `watch` slot. The owner takes it with [`SnapshotPump::apply_pending`]
/// or [`SnapshotPump::apply_next`], so the collection is only replaced from the
/// owner's side and an idle owner holds at most one snapshot.
pub struct SnapshotPump {
    sync: Arc<ReminderSync>,
    pending: watch::Receiver<Option<CollectionSnapshot>>,
    received: Arc<AtomicUsize>,
    task: JoinHandle<()>,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpReport {
    /// Snapshots received since the last apply. Only the newest is applied.
    pub received: usize,
    pub reminders: usize,
    pub dropped: usize,
}

impl PumpReport {
    fn applied(received: usize, snapshot: &CollectionSnapshot) -> Self {
        Self {
            received,
            reminders: snapshot.len(),
            dropped: snapshot.dropped,
        }
    }
}

impl SnapshotPump {
    /// Subscribe on the current tokio runtime.
    pub fn spawn(sync: Arc<ReminderSync>) -> Result<Self> {
        let handle = Handle::try_current().context("snapshot pump needs a tokio runtime")?;
        let (pending, received, task) = Self::subscribe(&handle, &sync, 0);
        Ok(Self {
            sync,
            pending,
            received,
            task,
            generation: 0,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Drop the current subscription and start a fresh one. A snapshot still
    /// waiting from the old subscription is discarded.
    #[instrument(skip(self), fields(generation = self.generation))]
    pub fn resubscribe(&mut self) -> Result<()> {
        let handle = Handle::try_current().context("snapshot pump needs a tokio runtime")?;
        self.task.abort();
        self.generation += 1;
        let (pending, received, task) = Self::subscribe(&handle, &self.sync, self.generation);
        self.pending = pending;
        self.received = received;
        self.task = task;
        Ok(())
    }

    /// Apply the newest snapshot without waiting. `None` when nothing arrived
    /// since the last apply.
    pub fn apply_pending(&mut self) -> Option<PumpReport> {
        if !matches!(self.pending.has_changed(), Ok(true)) {
            return None;
        }
        self.apply_latest()
    }

    /// Wait for a snapshot newer than the last applied one and apply it. `None`
    /// once the subscription has ended.
    pub async fn apply_next(&mut self) -> Option<PumpReport> {
        self.pending.changed().await.ok()?;
        self.apply_latest()
    }

    fn apply_latest(&mut self) -> Option<PumpReport> {
        let snapshot = self.pending.borrow_and_update().clone()?;
        let received = self.received.swap(0, Ordering::SeqCst);
        let report = PumpReport::applied(received, &snapshot);
        self.sync.apply_snapshot(snapshot);
        debug!(?report, "snapshot applied");
        Some(report)
    }

    fn subscribe(
        handle: &Handle,
        sync: &ReminderSync,
        generation: u64,
    ) -> (
        watch::Receiver<Option<CollectionSnapshot>>,
        Arc<AtomicUsize>,
        JoinHandle<()>,
    ) {
        let (tx, rx) = watch::channel(None);
        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        let mut snapshots = sync.observe_all();
        let task = handle.spawn(async move {
            while let Some(snapshot) = snapshots.next().await {
                counter.fetch_add(1, Ordering::SeqCst);
                if tx.send(Some(snapshot)).is_err() {
                    break;
                }
            }
            debug!(generation, "subscription closed");
        });
        (rx, received, task)
    }
}

impl Drop for SnapshotPump {
    fn drop(&mut self) {
        self.task.abort();
    }
}
