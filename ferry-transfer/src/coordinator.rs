use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use ferry_pane::DirectoryCache;
use ferry_vfs::{DirectoryEntry, EntryKind, Filesystem, VfsError, VfsPath, VfsResult};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::{
    batch::{BatchStatus, TransferBatch},
    clipboard::Clipboard,
    event::TransferEvent,
    runner::BatchRunner,
    settings::Settings,
};

const EVENT_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RemoveOutcome {
    NeedsConfirmation,
    NotFound,
    Removed,
}

/// Read side of a running or finished batch.
#[derive(Clone, Debug)]
pub struct BatchHandle {
    pub id: u64,
    state: watch::Receiver<TransferBatch>,
}

impl BatchHandle {
    pub fn snapshot(&self) -> TransferBatch {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransferBatch> {
        self.state.clone()
    }

    /// Waits until the batch reached a terminal status.
    pub async fn finished(&self) -> TransferBatch {
        let mut state = self.state.clone();
        if let Ok(batch) = state.wait_for(|batch| batch.is_terminal()).await {
            return batch.clone();
        }

        // the batch task is gone, its last state is final
        let batch = state.borrow().clone();
        batch
    }
}

#[derive(Debug)]
struct BatchEntry {
    handle: BatchHandle,
    token: CancellationToken,
}

/// Owns every batch of the application, in insertion order.
#[derive(Debug)]
pub struct TransferCoordinator {
    settings: Settings,
    batches: RwLock<Vec<BatchEntry>>,
    clipboard: Mutex<Option<Clipboard>>,
    events: broadcast::Sender<TransferEvent>,
    next_id: AtomicU64,
    root: CancellationToken,
    semaphore: Arc<Semaphore>,
}

impl Default for TransferCoordinator {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl TransferCoordinator {
    pub fn new(settings: Settings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let permits = settings.max_concurrent_batches.max(1);

        Self {
            settings,
            batches: RwLock::new(Vec::new()),
            clipboard: Mutex::new(None),
            events,
            next_id: AtomicU64::new(1),
            root: CancellationToken::new(),
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.events.subscribe()
    }

    /// Validates the destination, appends a queued batch and spawns its execution.
    /// Must be called from within a tokio runtime.
    #[tracing::instrument(skip(self, entries, source, destination))]
    pub fn begin_transfer(
        &self,
        entries: Vec<DirectoryEntry>,
        source: &DirectoryCache,
        destination: &dyn Filesystem,
        destination_path: &VfsPath,
    ) -> VfsResult<BatchHandle> {
        self.start(
            entries,
            source.filesystem().duplicate(),
            source.path(),
            destination.duplicate(),
            destination_path,
        )
    }

    /// Stores the selected entries of a pane and returns how many were taken.
    pub fn set_clipboard(&self, source: &DirectoryCache) -> usize {
        let clipboard = Clipboard::from_selection(source);
        let count = clipboard.entries().len();
        tracing::debug!("{} entries copied from {}", count, clipboard.directory());

        *self.clipboard.lock() = Some(clipboard);
        count
    }

    pub fn clipboard_len(&self) -> usize {
        self.clipboard
            .lock()
            .as_ref()
            .map(|clipboard| clipboard.entries().len())
            .unwrap_or_default()
    }

    /// Transfers the clipboard into the current directory of `destination`.
    pub fn paste(&self, destination: &DirectoryCache) -> VfsResult<BatchHandle> {
        let (filesystem, directory, entries) = {
            let clipboard = self.clipboard.lock();
            match clipboard.as_ref() {
                Some(clipboard) if !clipboard.is_empty() => (
                    clipboard.filesystem.duplicate(),
                    clipboard.directory.clone(),
                    clipboard.entries.clone(),
                ),
                _ => return Err(VfsError::NotFound("clipboard is empty".to_owned())),
            }
        };

        self.start(
            entries,
            filesystem,
            &directory,
            destination.filesystem().duplicate(),
            destination.path(),
        )
    }

    pub fn batches(&self) -> Vec<TransferBatch> {
        self.batches
            .read()
            .iter()
            .map(|entry| entry.handle.snapshot())
            .collect()
    }

    pub fn batch(&self, id: u64) -> Option<TransferBatch> {
        self.handle(id).map(|handle| handle.snapshot())
    }

    pub fn handle(&self, id: u64) -> Option<BatchHandle> {
        self.batches
            .read()
            .iter()
            .find(|entry| entry.handle.id == id)
            .map(|entry| entry.handle.clone())
    }

    pub fn pending_transfers(&self) -> usize {
        self.batches()
            .iter()
            .filter(|batch| !batch.is_terminal())
            .count()
    }

    /// Overall share of transferred bytes over unfinished batches, `None` when nothing
    /// is pending.
    pub fn total_progress(&self) -> Option<f64> {
        let pending: Vec<_> = self
            .batches()
            .into_iter()
            .filter(|batch| !batch.is_terminal())
            .collect();

        if pending.is_empty() {
            return None;
        }

        let total: u64 = pending.iter().map(|batch| batch.total_size).sum();
        let transferred: u64 = pending.iter().map(|batch| batch.transferred).sum();
        if total == 0 {
            Some(0.0)
        } else {
            Some(transferred as f64 / total as f64)
        }
    }

    /// Signals cancellation and waits for the batch to settle. Terminal batches are left
    /// untouched, batches that never left the queue are removed once settled.
    pub async fn cancel_batch(&self, id: u64) -> Option<TransferBatch> {
        let (handle, token) = {
            let batches = self.batches.read();
            let entry = batches.iter().find(|entry| entry.handle.id == id)?;
            (entry.handle.clone(), entry.token.clone())
        };

        let before = handle.snapshot();
        if before.is_terminal() {
            return Some(before);
        }

        tracing::info!("cancelling batch {}", id);
        token.cancel();

        let settled = handle.finished().await;
        if before.status == BatchStatus::Queued {
            self.discard(id);
        }

        Some(settled)
    }

    /// Cancels every unfinished batch and waits for all of them.
    pub async fn cancel_all(&self) {
        let pending: Vec<_> = self
            .batches
            .read()
            .iter()
            .map(|entry| (entry.handle.clone(), entry.token.clone()))
            .filter(|(handle, _)| !handle.snapshot().is_terminal())
            .collect();

        tracing::info!("cancelling {} pending batches", pending.len());

        let queued: Vec<_> = pending
            .iter()
            .filter(|(handle, _)| handle.snapshot().status == BatchStatus::Queued)
            .map(|(handle, _)| handle.id)
            .collect();

        for (_, token) in &pending {
            token.cancel();
        }

        futures::future::join_all(pending.iter().map(|(handle, _)| handle.finished())).await;

        for id in queued {
            self.discard(id);
        }
    }

    pub async fn remove_batch(&self, id: u64, confirmed: bool) -> RemoveOutcome {
        let terminal = match self.batch(id) {
            Some(batch) => batch.is_terminal(),
            None => return RemoveOutcome::NotFound,
        };

        if !terminal {
            if !confirmed {
                return RemoveOutcome::NeedsConfirmation;
            }
            self.cancel_batch(id).await;
        }

        self.discard(id);
        RemoveOutcome::Removed
    }

    fn discard(&self, id: u64) {
        let removed = {
            let mut batches = self.batches.write();
            let count = batches.len();
            batches.retain(|entry| entry.handle.id != id);
            batches.len() != count
        };

        if removed {
            self.emit(TransferEvent::Removed { id });
        }
    }

    fn start(
        &self,
        entries: Vec<DirectoryEntry>,
        source: Box<dyn Filesystem>,
        source_directory: &VfsPath,
        destination: Box<dyn Filesystem>,
        destination_path: &VfsPath,
    ) -> VfsResult<BatchHandle> {
        validate_destination(&entries, source_directory, destination_path)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = watch::channel(TransferBatch::new(
            id,
            &source_directory.to_string(),
            &destination_path.to_string(),
        ));

        let handle = BatchHandle {
            id,
            state: receiver,
        };
        let token = self.root.child_token();

        self.batches.write().push(BatchEntry {
            handle: handle.clone(),
            token: token.clone(),
        });
        self.emit(TransferEvent::Added { id });

        tracing::info!(
            "batch {} queued: {} entries from {} to {}",
            id,
            entries.len(),
            source_directory,
            destination_path
        );

        let runner = BatchRunner {
            id,
            state: sender,
            events: self.events.clone(),
            source,
            destination,
            entries,
            destination_path: destination_path.clone(),
            settings: self.settings,
            token,
            semaphore: self.semaphore.clone(),
        };
        tokio::spawn(runner.run());

        Ok(handle)
    }

    fn emit(&self, event: TransferEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for TransferCoordinator {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Rejects copies of an entry onto itself, into its own subtree or into the directory it
/// already lives in.
fn validate_destination(
    entries: &[DirectoryEntry],
    source_directory: &VfsPath,
    destination: &VfsPath,
) -> VfsResult<()> {
    let invalid = || Err(VfsError::InvalidDestination(destination.to_string()));

    if destination == source_directory {
        return invalid();
    }

    for entry in entries {
        let path = entry.path();
        if destination == &path || destination == &entry.parent {
            return invalid();
        }

        if entry.kind == EntryKind::Directory && destination.starts_with(&path) {
            return invalid();
        }
    }

    Ok(())
}
