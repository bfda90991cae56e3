use std::{future::Future, sync::Arc, time::Duration};

use ferry_vfs::{
    entry, timeout, ByteSink, ByteSource, DirectoryEntry, EntryKind, FileType, Filesystem,
    VfsError, VfsPath, VfsResult,
};
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{broadcast, watch, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::{
    batch::{BatchStatus, TransferBatch},
    element::TransferElement,
    event::TransferEvent,
    settings::Settings,
};

const DISCARD_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a batch task needs. The task is the only writer of the batch state.
pub(crate) struct BatchRunner {
    pub id: u64,
    pub state: watch::Sender<TransferBatch>,
    pub events: broadcast::Sender<TransferEvent>,
    pub source: Box<dyn Filesystem>,
    pub destination: Box<dyn Filesystem>,
    pub entries: Vec<DirectoryEntry>,
    pub destination_path: VfsPath,
    pub settings: Settings,
    pub token: CancellationToken,
    pub semaphore: Arc<Semaphore>,
}

impl BatchRunner {
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn run(self) {
        let permit = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            permit = self.semaphore.clone().acquire_owned() => permit.ok(),
        };

        if permit.is_none() {
            tracing::debug!("batch cancelled while queued");
            self.finish(BatchStatus::Cancelled, None);
            return;
        }

        self.set_status(BatchStatus::Calculating);
        match self.expand().await {
            Ok(()) => {}
            Err(VfsError::Cancelled) => {
                self.finish(BatchStatus::Cancelled, None);
                return;
            }
            Err(err) => {
                tracing::warn!("expansion failed: {:?}", err);
                self.finish(BatchStatus::Error, Some(err));
                return;
            }
        }

        self.set_status(BatchStatus::Started);
        let status = self.execute().await;
        self.finish(status, None);

        drop(permit);
    }

    async fn expand(&self) -> VfsResult<()> {
        for entry in &self.entries {
            if self.token.is_cancelled() {
                return Err(VfsError::Cancelled);
            }

            if !self.destination.is_name_valid(&entry.name) {
                self.reject(entry, &self.destination_path, None);
                continue;
            }

            let source = entry.path();
            let destination = self.destination_path.join(&entry.name);
            match entry.kind {
                EntryKind::File | EntryKind::Symlink => {
                    self.push(TransferElement::file(source, destination, entry.size, None));
                }
                EntryKind::Directory => {
                    self.push(TransferElement::directory(
                        source.clone(),
                        destination.clone(),
                        None,
                    ));

                    let children = self.list(&source).await?;
                    self.expand_children(children, destination, entry.name.clone())
                        .await?;
                }
            }
        }

        Ok(())
    }

    /// Depth first, every directory element precedes its descendants.
    fn expand_children(
        &self,
        children: Vec<DirectoryEntry>,
        destination: VfsPath,
        prefix: String,
    ) -> BoxFuture<'_, VfsResult<()>> {
        async move {
            for child in children {
                if self.token.is_cancelled() {
                    return Err(VfsError::Cancelled);
                }

                if !self.destination.is_name_valid(&child.name) {
                    self.reject(&child, &destination, Some(prefix.clone()));
                    continue;
                }

                let source = child.path();
                let target = destination.join(&child.name);
                if child.kind != EntryKind::Directory {
                    self.push(TransferElement::file(
                        source,
                        target,
                        child.size,
                        Some(prefix.clone()),
                    ));
                    continue;
                }

                let index = self.push(TransferElement::directory(
                    source.clone(),
                    target.clone(),
                    Some(prefix.clone()),
                ));

                match self.list(&source).await {
                    Ok(grandchildren) => {
                        let nested = format!("{}/{}", prefix, child.name);
                        self.expand_children(grandchildren, target, nested).await?;
                    }
                    Err(VfsError::Cancelled) => return Err(VfsError::Cancelled),
                    Err(err) => {
                        tracing::warn!("unable to expand {}: {:?}", source, err);
                        self.update(index, |element| element.fail(err));
                    }
                }
            }

            Ok(())
        }
        .boxed()
    }

    /// Records an entry whose name cannot be placed below the destination as failed,
    /// without joining the name onto any path.
    fn reject(&self, entry: &DirectoryEntry, destination: &VfsPath, prefix: Option<String>) {
        tracing::warn!("refusing to transfer {:?} from {}", entry.name, entry.parent);

        let source = entry.parent.clone();
        let mut element = match entry.kind {
            EntryKind::Directory => TransferElement::directory(source, destination.clone(), prefix),
            EntryKind::File | EntryKind::Symlink => {
                let mut element = TransferElement::file(source, destination.clone(), 0, prefix);
                element.file_type = FileType::from_name(&entry.name);
                element
            }
        };

        element.name = entry.name.clone();
        element.fail(VfsError::InvalidName(entry.name.clone()));
        self.push(element);
    }

    async fn execute(&self) -> BatchStatus {
        let count = self.state.borrow().elements.len();
        for index in 0..count {
            if self.token.is_cancelled() {
                return BatchStatus::Cancelled;
            }

            let element = self.state.borrow().elements[index].clone();
            if element.status.is_terminal() {
                continue;
            }

            self.update(index, |element| element.start());

            let result = if element.is_directory() {
                self.create_directory(&element).await
            } else {
                self.copy_file(index, &element).await
            };

            match result {
                Ok(()) => self.update(index, |element| element.complete()),
                Err(VfsError::Cancelled) => return BatchStatus::Cancelled,
                Err(err) => {
                    tracing::warn!("transfer of {} failed: {:?}", element.source, err);
                    self.update(index, |element| element.fail(err));
                }
            }
        }

        BatchStatus::Done
    }

    async fn create_directory(&self, element: &TransferElement) -> VfsResult<()> {
        let (parent, name) = match (element.destination.parent(), element.destination.name()) {
            (Some(parent), Some(name)) => (parent, name.to_owned()),
            _ => return Err(VfsError::InvalidDestination(element.destination.to_string())),
        };

        let operation = self.settings.timeouts.operation;
        let created = self
            .guarded(timeout::bounded(
                operation,
                self.destination.create_directory(&parent, &name),
            ))
            .await;

        match created {
            Ok(_) | Err(VfsError::AlreadyExists(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn copy_file(&self, index: usize, element: &TransferElement) -> VfsResult<()> {
        let operation = self.settings.timeouts.operation;
        let mut reader = self
            .guarded(timeout::bounded(
                operation,
                self.source.open_read(&element.source),
            ))
            .await?;

        let mut writer = self
            .guarded(timeout::bounded(
                operation,
                self.destination.open_write(&element.destination),
            ))
            .await?;

        let result = match self.pump(index, reader.as_mut(), writer.as_mut()).await {
            Ok(()) => writer.finish().await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                if let Err(err) = reader.finish().await {
                    tracing::debug!("closing {} failed: {:?}", element.source, err);
                }
                Ok(())
            }
            Err(err) => {
                drop(writer);
                drop(reader);
                self.discard(&element.destination).await;
                Err(err)
            }
        }
    }

    async fn pump(
        &self,
        index: usize,
        reader: &mut dyn ByteSource,
        writer: &mut dyn ByteSink,
    ) -> VfsResult<()> {
        let chunk_timeout = self.settings.timeouts.chunk;
        loop {
            if self.token.is_cancelled() {
                return Err(VfsError::Cancelled);
            }

            let chunk = self
                .guarded(timeout::bounded(
                    chunk_timeout,
                    reader.read_chunk(self.settings.chunk_size),
                ))
                .await?;

            if chunk.is_empty() {
                return Ok(());
            }

            if self.token.is_cancelled() {
                return Err(VfsError::Cancelled);
            }

            self.guarded(timeout::bounded(chunk_timeout, writer.write_chunk(&chunk)))
                .await?;

            let bytes = chunk.len() as u64;
            self.update(index, |element| element.advance(bytes));

            let (transferred, total) = {
                let batch = self.state.borrow();
                (batch.transferred, batch.total_size)
            };
            self.emit(TransferEvent::Progress {
                id: self.id,
                transferred,
                total,
            });
        }
    }

    /// Removes a partially written file, failures are only logged. Bounded by the chunk
    /// timeout, never longer than `DISCARD_TIMEOUT`.
    async fn discard(&self, path: &VfsPath) {
        let limit = self.settings.timeouts.chunk.min(DISCARD_TIMEOUT);
        let deleted = self.destination.delete(std::slice::from_ref(path));
        match tokio::time::timeout(limit, deleted).await {
            Ok(report) if report.is_clean() => {
                tracing::debug!("removed partial file {}", path);
            }
            Ok(report) => {
                tracing::warn!("unable to remove partial file {}: {:?}", path, report.failures);
            }
            Err(_) => tracing::warn!("removing partial file {} timed out", path),
        }
    }

    async fn list(&self, path: &VfsPath) -> VfsResult<Vec<DirectoryEntry>> {
        let operation = self.settings.timeouts.operation;
        let mut children = self
            .guarded(timeout::bounded(operation, self.source.list(path)))
            .await?;

        entry::sort_entries(&mut children);
        Ok(children)
    }

    /// Races a backend call against cancellation.
    async fn guarded<T>(&self, future: impl Future<Output = VfsResult<T>>) -> VfsResult<T> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(VfsError::Cancelled),
            result = future => result,
        }
    }

    fn push(&self, element: TransferElement) -> usize {
        let mut index = 0;
        self.state.send_modify(|batch| {
            batch.elements.push(element);
            batch.recompute();
            index = batch.elements.len() - 1;
        });

        index
    }

    fn update(&self, index: usize, change: impl FnOnce(&mut TransferElement)) {
        self.state.send_modify(|batch| {
            if let Some(element) = batch.elements.get_mut(index) {
                change(element);
            }
            batch.recompute();
        });
    }

    fn set_status(&self, status: BatchStatus) {
        self.state.send_modify(|batch| batch.status = status);
        self.emit(TransferEvent::StatusChanged {
            id: self.id,
            status,
        });
    }

    fn finish(&self, status: BatchStatus, error: Option<VfsError>) {
        let mut errors = 0;
        self.state.send_modify(|batch| {
            batch.cancel_remaining();
            batch.recompute();
            batch.status = status;
            batch.error = error;
            errors = batch.error_count();
        });

        tracing::info!("batch {} finished as {:?} with {} errors", self.id, status, errors);

        self.emit(TransferEvent::Finished {
            id: self.id,
            status,
            errors,
        });
    }

    fn emit(&self, event: TransferEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }
}
