use std::time::Duration;

use async_trait::async_trait;
use ferry_pane::DirectoryCache;
use ferry_transfer::{
    BatchStatus, ElementKind, ElementStatus, RemoveOutcome, Settings, Severity,
    TransferCoordinator, TransferEvent,
};
use ferry_vfs::{
    BackendKind, ByteSink, ByteSource, DeleteReport, DirectoryEntry, EntryKind, Filesystem,
    MemoryFs, Timeouts, VfsError, VfsPath, VfsResult,
};

/// Memory volume with injectable faults.
#[derive(Clone, Debug, Default)]
struct Faults {
    reject_write: Option<String>,
    fail_list: Option<String>,
    gate: Option<(String, u64)>,
    /// File name and the number of chunk writes accepted before the next one fails.
    break_write: Option<(String, usize)>,
    /// Directory name and an extra name reported by its listing.
    inject: Option<(String, String)>,
    stall_delete: bool,
}

#[derive(Clone, Debug)]
struct ScriptedFs {
    inner: MemoryFs,
    faults: Faults,
}

impl ScriptedFs {
    fn new(inner: &MemoryFs, faults: Faults) -> Self {
        Self {
            inner: inner.clone(),
            faults,
        }
    }
}

#[async_trait]
impl Filesystem for ScriptedFs {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn root(&self) -> VfsPath {
        self.inner.root()
    }

    async fn list(&self, path: &VfsPath) -> VfsResult<Vec<DirectoryEntry>> {
        if self.faults.fail_list.as_deref() == path.name() && path.name().is_some() {
            return Err(VfsError::PermissionDenied(path.to_string()));
        }

        let mut entries = self.inner.list(path).await?;
        if let Some((directory, name)) = &self.faults.inject {
            if path.name() == Some(directory.as_str()) {
                entries.push(DirectoryEntry::new(path, name, EntryKind::File, 3));
            }
        }
        Ok(entries)
    }

    async fn stat(&self, path: &VfsPath) -> VfsResult<DirectoryEntry> {
        self.inner.stat(path).await
    }

    async fn create_directory(&self, parent: &VfsPath, name: &str) -> VfsResult<VfsPath> {
        self.inner.create_directory(parent, name).await
    }

    async fn delete(&self, paths: &[VfsPath]) -> DeleteReport {
        if self.faults.stall_delete {
            std::future::pending::<()>().await;
        }
        self.inner.delete(paths).await
    }

    async fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn ByteSource>> {
        let inner = self.inner.open_read(path).await?;
        match &self.faults.gate {
            Some((name, limit)) if path.name() == Some(name.as_str()) => Ok(Box::new(GatedSource {
                inner,
                remaining: *limit,
            })),
            _ => Ok(inner),
        }
    }

    async fn open_write(&self, path: &VfsPath) -> VfsResult<Box<dyn ByteSink>> {
        if self.faults.reject_write.as_deref() == path.name() && path.name().is_some() {
            return Err(VfsError::PermissionDenied(path.to_string()));
        }

        let inner = self.inner.open_write(path).await?;
        match &self.faults.break_write {
            Some((name, accepted)) if path.name() == Some(name.as_str()) => {
                Ok(Box::new(BrokenSink {
                    inner,
                    remaining: *accepted,
                    path: path.to_string(),
                }))
            }
            _ => Ok(inner),
        }
    }

    fn duplicate(&self) -> Box<dyn Filesystem> {
        Box::new(self.clone())
    }
}

/// Hands out `remaining` bytes, then stalls forever.
struct GatedSource {
    inner: Box<dyn ByteSource>,
    remaining: u64,
}

#[async_trait]
impl ByteSource for GatedSource {
    async fn read_chunk(&mut self, max: usize) -> VfsResult<Vec<u8>> {
        if self.remaining == 0 {
            std::future::pending::<()>().await;
        }

        let max = max.min(self.remaining as usize);
        let chunk = self.inner.read_chunk(max).await?;
        self.remaining -= chunk.len() as u64;
        Ok(chunk)
    }

    async fn finish(&mut self) -> VfsResult<()> {
        self.inner.finish().await
    }
}

/// Accepts `remaining` chunk writes, then fails every further one.
struct BrokenSink {
    inner: Box<dyn ByteSink>,
    remaining: usize,
    path: String,
}

#[async_trait]
impl ByteSink for BrokenSink {
    async fn write_chunk(&mut self, data: &[u8]) -> VfsResult<()> {
        if self.remaining == 0 {
            return Err(VfsError::PermissionDenied(self.path.clone()));
        }

        self.remaining -= 1;
        self.inner.write_chunk(data).await
    }

    async fn finish(&mut self) -> VfsResult<()> {
        self.inner.finish().await
    }
}

async fn pane(filesystem: Box<dyn Filesystem>, selected: &[&str]) -> DirectoryCache {
    let mut cache = DirectoryCache::new(filesystem, Timeouts::default());
    cache.change_directory("/").await.expect("cd");
    for name in selected {
        assert!(cache.select(name), "{} not listed", name);
    }
    cache
}

fn three_files() -> MemoryFs {
    let source = MemoryFs::new("src");
    source.write_file("a.txt", &[1; 10]).expect("write");
    source.write_file("b.txt", &[2; 20]).expect("write");
    source.write_file("c.txt", &[3; 30]).expect("write");
    source
}

async fn with_timeout<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), future)
        .await
        .expect("test timed out")
}

#[tokio::test]
async fn copies_three_files_completely() {
    let source = three_files();
    let destination = MemoryFs::new("dst");
    let coordinator = TransferCoordinator::default();

    let pane = pane(Box::new(source), &["a.txt", "b.txt", "c.txt"]).await;
    let handle = coordinator
        .begin_transfer(
            pane.selected_entries(),
            &pane,
            &destination,
            &destination.root(),
        )
        .expect("begin");

    let batch = with_timeout(handle.finished()).await;

    assert_eq!(BatchStatus::Done, batch.status);
    assert_eq!(60, batch.total_size);
    assert_eq!(60, batch.transferred);
    assert_eq!(0, batch.error_count());
    assert_eq!(Severity::Success, batch.severity());
    assert!(batch
        .elements
        .iter()
        .all(|element| element.status == ElementStatus::Done));
    assert_eq!(Some(vec![3; 30]), destination.read_file("c.txt"));
}

#[tokio::test]
async fn rejected_write_fails_only_its_element() {
    let source = three_files();
    let destination = MemoryFs::new("dst");
    let faulty = ScriptedFs::new(
        &destination,
        Faults {
            reject_write: Some("b.txt".to_owned()),
            ..Default::default()
        },
    );
    let coordinator = TransferCoordinator::default();

    let pane = pane(Box::new(source), &["a.txt", "b.txt", "c.txt"]).await;
    let handle = coordinator
        .begin_transfer(pane.selected_entries(), &pane, &faulty, &destination.root())
        .expect("begin");

    let batch = with_timeout(handle.finished()).await;

    assert_eq!(BatchStatus::Done, batch.status);
    assert_eq!(1, batch.error_count());
    assert_eq!(Severity::Warning, batch.severity());
    assert_eq!(ElementStatus::Done, batch.elements[0].status);
    assert_eq!(ElementStatus::Error, batch.elements[1].status);
    assert!(matches!(
        batch.elements[1].error,
        Some(VfsError::PermissionDenied(_))
    ));
    assert_eq!(ElementStatus::Done, batch.elements[2].status);
    assert!(batch.transferred <= batch.total_size);
    assert!(!destination.exists("b.txt"));
}

#[tokio::test]
async fn failing_chunk_write_discards_partial_file_and_continues() {
    let source = three_files();
    let destination = MemoryFs::new("dst");
    let faulty = ScriptedFs::new(
        &destination,
        Faults {
            break_write: Some(("b.txt".to_owned(), 1)),
            ..Default::default()
        },
    );
    let coordinator = TransferCoordinator::new(Settings {
        chunk_size: 8,
        ..Default::default()
    });

    let pane = pane(Box::new(source), &["a.txt", "b.txt", "c.txt"]).await;
    let handle = coordinator
        .begin_transfer(pane.selected_entries(), &pane, &faulty, &destination.root())
        .expect("begin");

    let batch = with_timeout(handle.finished()).await;

    assert_eq!(BatchStatus::Done, batch.status);
    assert_eq!(1, batch.error_count());

    let broken = &batch.elements[1];
    assert_eq!(ElementStatus::Error, broken.status);
    assert!(matches!(broken.error, Some(VfsError::PermissionDenied(_))));
    assert_eq!(8, broken.transferred);
    assert!(!destination.exists("b.txt"));

    assert_eq!(ElementStatus::Done, batch.elements[2].status);
    assert_eq!(Some(vec![3; 30]), destination.read_file("c.txt"));
    assert!(batch.transferred <= batch.total_size);
}

#[tokio::test]
async fn stalled_cleanup_does_not_hold_up_the_batch() {
    let source = three_files();
    let destination = MemoryFs::new("dst");
    let faulty = ScriptedFs::new(
        &destination,
        Faults {
            break_write: Some(("a.txt".to_owned(), 0)),
            stall_delete: true,
            ..Default::default()
        },
    );
    let coordinator = TransferCoordinator::new(Settings {
        timeouts: Timeouts {
            chunk: Duration::from_millis(100),
            ..Default::default()
        },
        ..Default::default()
    });

    let pane = pane(Box::new(source), &["a.txt"]).await;
    let started = std::time::Instant::now();
    let handle = coordinator
        .begin_transfer(pane.selected_entries(), &pane, &faulty, &destination.root())
        .expect("begin");

    let batch = with_timeout(handle.finished()).await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(BatchStatus::Done, batch.status);
    assert_eq!(ElementStatus::Error, batch.elements[0].status);
}

#[tokio::test]
async fn listed_names_cannot_escape_the_destination() {
    let source = MemoryFs::new("src");
    source.write_file("docs/a.txt", b"a").expect("write");
    source.write_file("outside.txt", b"out").expect("write");
    let hostile = ScriptedFs::new(
        &source,
        Faults {
            inject: Some(("docs".to_owned(), "../../outside.txt".to_owned())),
            ..Default::default()
        },
    );
    let destination = MemoryFs::new("dst");
    destination.create_dir_all("a/b/target").expect("mkdir");
    let coordinator = TransferCoordinator::default();

    let pane = pane(Box::new(hostile), &["docs"]).await;
    let target = destination.root().join("a/b/target");
    let handle = coordinator
        .begin_transfer(pane.selected_entries(), &pane, &destination, &target)
        .expect("begin");

    let batch = with_timeout(handle.finished()).await;

    assert_eq!(BatchStatus::Done, batch.status);
    assert_eq!(1, batch.error_count());

    let rejected = batch
        .elements
        .iter()
        .find(|element| element.name == "../../outside.txt")
        .expect("rejected element");
    assert_eq!(ElementStatus::Error, rejected.status);
    assert!(matches!(rejected.error, Some(VfsError::InvalidName(_))));

    assert!(destination.exists("a/b/target/docs/a.txt"));
    assert!(!destination.exists("outside.txt"));
    assert!(!destination.exists("a/outside.txt"));
    assert!(!destination.exists("a/b/outside.txt"));
    assert!(!destination.exists("a/b/target/outside.txt"));
}

#[tokio::test]
async fn cancel_mid_stream_freezes_progress() {
    let source = MemoryFs::new("src");
    source
        .write_file("big.bin", &vec![7; 1_000_000])
        .expect("write");
    source.write_file("tail.txt", b"tail").expect("write");
    let gated = ScriptedFs::new(
        &source,
        Faults {
            gate: Some(("big.bin".to_owned(), 300_000)),
            ..Default::default()
        },
    );

    let destination = MemoryFs::new("dst");
    let coordinator = TransferCoordinator::new(Settings {
        chunk_size: 100_000,
        ..Default::default()
    });

    let pane = pane(Box::new(gated), &["big.bin", "tail.txt"]).await;
    let handle = coordinator
        .begin_transfer(
            pane.selected_entries(),
            &pane,
            &destination,
            &destination.root(),
        )
        .expect("begin");

    let mut state = handle.subscribe();
    with_timeout(state.wait_for(|batch| batch.transferred >= 300_000))
        .await
        .expect("batch alive");

    let batch = with_timeout(coordinator.cancel_batch(handle.id))
        .await
        .expect("known batch");

    assert_eq!(BatchStatus::Cancelled, batch.status);
    assert_eq!(ElementStatus::Cancelled, batch.elements[0].status);
    assert_eq!(300_000, batch.elements[0].transferred);
    assert_eq!(ElementStatus::Cancelled, batch.elements[1].status);
    assert_eq!(0, batch.elements[1].transferred);
    assert!(!destination.exists("big.bin"));
    assert!(!destination.exists("tail.txt"));
    assert_eq!(0, coordinator.pending_transfers());
}

#[tokio::test]
async fn directories_expand_depth_first_and_tolerate_existing_targets() {
    let source = MemoryFs::new("src");
    source.write_file("docs/a.txt", b"a").expect("write");
    source.write_file("docs/sub/b.txt", b"bb").expect("write");
    let destination = MemoryFs::new("dst");
    destination.create_dir_all("docs").expect("mkdir");
    let coordinator = TransferCoordinator::default();

    let pane = pane(Box::new(source), &["docs"]).await;
    let handle = coordinator
        .begin_transfer(
            pane.selected_entries(),
            &pane,
            &destination,
            &destination.root(),
        )
        .expect("begin");

    let batch = with_timeout(handle.finished()).await;

    assert_eq!(BatchStatus::Done, batch.status);
    assert_eq!(0, batch.error_count());
    assert_eq!(3, batch.total_size);

    let layout: Vec<_> = batch
        .elements
        .iter()
        .map(|element| (element.name.as_str(), element.kind, element.prefix.as_deref()))
        .collect();
    assert_eq!(
        vec![
            ("docs", ElementKind::Directory, None),
            ("sub", ElementKind::Directory, Some("docs")),
            ("b.txt", ElementKind::File, Some("docs/sub")),
            ("a.txt", ElementKind::File, Some("docs")),
        ],
        layout
    );

    let visible: Vec<_> = batch
        .visible_elements()
        .iter()
        .map(|element| element.name.clone())
        .collect();
    assert_eq!(vec!["b.txt", "a.txt"], visible);
    assert_eq!(Some(b"bb".to_vec()), destination.read_file("docs/sub/b.txt"));
}

#[tokio::test]
async fn nested_listing_failure_marks_only_that_directory() {
    let source = MemoryFs::new("src");
    source.write_file("docs/a.txt", b"a").expect("write");
    source.write_file("docs/locked/secret.txt", b"s").expect("write");
    let scripted = ScriptedFs::new(
        &source,
        Faults {
            fail_list: Some("locked".to_owned()),
            ..Default::default()
        },
    );
    let destination = MemoryFs::new("dst");
    let coordinator = TransferCoordinator::default();

    let pane = pane(Box::new(scripted), &["docs"]).await;
    let handle = coordinator
        .begin_transfer(
            pane.selected_entries(),
            &pane,
            &destination,
            &destination.root(),
        )
        .expect("begin");

    let batch = with_timeout(handle.finished()).await;

    assert_eq!(BatchStatus::Done, batch.status);
    assert_eq!(1, batch.error_count());
    let locked = batch
        .elements
        .iter()
        .find(|element| element.name == "locked")
        .expect("locked element");
    assert_eq!(ElementStatus::Error, locked.status);
    assert_eq!(Some(b"a".to_vec()), destination.read_file("docs/a.txt"));
}

#[tokio::test]
async fn top_level_listing_failure_fails_the_batch() {
    let source = MemoryFs::new("src");
    source.write_file("docs/a.txt", b"a").expect("write");
    source.write_file("first.txt", b"1").expect("write");
    let scripted = ScriptedFs::new(
        &source,
        Faults {
            fail_list: Some("docs".to_owned()),
            ..Default::default()
        },
    );
    let destination = MemoryFs::new("dst");
    let coordinator = TransferCoordinator::default();

    let pane = pane(Box::new(scripted), &["docs", "first.txt"]).await;
    let handle = coordinator
        .begin_transfer(
            pane.selected_entries(),
            &pane,
            &destination,
            &destination.root(),
        )
        .expect("begin");

    let batch = with_timeout(handle.finished()).await;

    assert_eq!(BatchStatus::Error, batch.status);
    assert!(matches!(batch.error, Some(VfsError::PermissionDenied(_))));
    assert!(batch
        .elements
        .iter()
        .all(|element| element.status == ElementStatus::Cancelled));
    assert!(!destination.exists("first.txt"));
}

#[tokio::test]
async fn growing_source_extends_totals() {
    let source = MemoryFs::new("src");
    source.write_file("log.txt", &[1; 10]).expect("write");
    let destination = MemoryFs::new("dst");
    let coordinator = TransferCoordinator::default();

    let pane = pane(Box::new(source.clone()), &["log.txt"]).await;
    let entries = pane.selected_entries();
    source.write_file("log.txt", &[1; 25]).expect("grow");

    let handle = coordinator
        .begin_transfer(entries, &pane, &destination, &destination.root())
        .expect("begin");
    let batch = with_timeout(handle.finished()).await;

    assert_eq!(BatchStatus::Done, batch.status);
    assert_eq!(25, batch.elements[0].size);
    assert_eq!(25, batch.total_size);
    assert_eq!(25, batch.transferred);
}

#[tokio::test]
async fn cancelling_a_finished_batch_changes_nothing() {
    let source = three_files();
    let destination = MemoryFs::new("dst");
    let coordinator = TransferCoordinator::default();

    let pane = pane(Box::new(source), &["a.txt"]).await;
    let handle = coordinator
        .begin_transfer(
            pane.selected_entries(),
            &pane,
            &destination,
            &destination.root(),
        )
        .expect("begin");
    let finished = with_timeout(handle.finished()).await;

    let after = coordinator.cancel_batch(handle.id).await.expect("known batch");

    assert_eq!(finished, after);
    assert_eq!(BatchStatus::Done, after.status);
}

#[tokio::test]
async fn copying_into_own_subtree_is_rejected() {
    let source = MemoryFs::new("src");
    source.write_file("docs/a.txt", b"a").expect("write");
    let coordinator = TransferCoordinator::default();

    let pane = pane(Box::new(source.clone()), &["docs"]).await;
    let inside = source.root().join("docs");
    let result = coordinator.begin_transfer(pane.selected_entries(), &pane, &source, &inside);

    assert!(matches!(result, Err(VfsError::InvalidDestination(_))));

    let same_directory = source.root();
    let result =
        coordinator.begin_transfer(pane.selected_entries(), &pane, &source, &same_directory);

    assert!(matches!(result, Err(VfsError::InvalidDestination(_))));
    assert!(coordinator.batches().is_empty());
}

#[tokio::test]
async fn concurrency_limit_keeps_batches_queued() {
    let source = MemoryFs::new("src");
    source.write_file("stall.bin", &[0; 100]).expect("write");
    source.write_file("quick.txt", b"q").expect("write");
    let gated = ScriptedFs::new(
        &source,
        Faults {
            gate: Some(("stall.bin".to_owned(), 0)),
            ..Default::default()
        },
    );
    let destination = MemoryFs::new("dst");
    let coordinator = TransferCoordinator::new(Settings {
        max_concurrent_batches: 1,
        ..Default::default()
    });

    let mut pane = pane(Box::new(gated), &["stall.bin"]).await;
    let stalled = coordinator
        .begin_transfer(
            pane.selected_entries(),
            &pane,
            &destination,
            &destination.root(),
        )
        .expect("begin");

    let mut state = stalled.subscribe();
    with_timeout(state.wait_for(|batch| batch.status == BatchStatus::Started))
        .await
        .expect("batch alive");

    pane.clear_selection();
    assert!(pane.select("quick.txt"));
    let queued = coordinator
        .begin_transfer(
            pane.selected_entries(),
            &pane,
            &destination,
            &destination.root(),
        )
        .expect("begin");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(BatchStatus::Queued, queued.snapshot().status);
    assert_eq!(2, coordinator.pending_transfers());
    assert_eq!(Some(0.0), coordinator.total_progress());

    assert_eq!(
        RemoveOutcome::NeedsConfirmation,
        coordinator.remove_batch(stalled.id, false).await
    );
    assert_eq!(
        RemoveOutcome::Removed,
        with_timeout(coordinator.remove_batch(stalled.id, true)).await
    );

    let batch = with_timeout(queued.finished()).await;
    assert_eq!(BatchStatus::Done, batch.status);
    assert_eq!(1, coordinator.batches().len());
    assert_eq!(None, coordinator.total_progress());
    assert_eq!(
        RemoveOutcome::NotFound,
        coordinator.remove_batch(stalled.id, true).await
    );
}

#[tokio::test]
async fn cancelling_a_queued_batch_removes_it() {
    let source = MemoryFs::new("src");
    source.write_file("stall.bin", &[0; 100]).expect("write");
    source.write_file("quick.txt", b"q").expect("write");
    let gated = ScriptedFs::new(
        &source,
        Faults {
            gate: Some(("stall.bin".to_owned(), 0)),
            ..Default::default()
        },
    );
    let destination = MemoryFs::new("dst");
    let coordinator = TransferCoordinator::new(Settings {
        max_concurrent_batches: 1,
        ..Default::default()
    });
    let mut events = coordinator.subscribe();

    let mut pane = pane(Box::new(gated), &["stall.bin"]).await;
    let stalled = coordinator
        .begin_transfer(
            pane.selected_entries(),
            &pane,
            &destination,
            &destination.root(),
        )
        .expect("begin");

    let mut state = stalled.subscribe();
    with_timeout(state.wait_for(|batch| batch.status == BatchStatus::Started))
        .await
        .expect("batch alive");

    pane.clear_selection();
    assert!(pane.select("quick.txt"));
    let queued = coordinator
        .begin_transfer(
            pane.selected_entries(),
            &pane,
            &destination,
            &destination.root(),
        )
        .expect("begin");
    assert_eq!(BatchStatus::Queued, queued.snapshot().status);

    let cancelled = with_timeout(coordinator.cancel_batch(queued.id))
        .await
        .expect("known batch");

    assert_eq!(BatchStatus::Cancelled, cancelled.status);
    assert_eq!(None, coordinator.batch(queued.id));
    assert!(coordinator.batch(stalled.id).is_some());
    assert!(!destination.exists("quick.txt"));

    let mut removed = false;
    while let Ok(event) = events.try_recv() {
        removed |= event == TransferEvent::Removed { id: queued.id };
    }
    assert!(removed);

    let started = with_timeout(coordinator.cancel_batch(stalled.id))
        .await
        .expect("known batch");
    assert_eq!(BatchStatus::Cancelled, started.status);
    assert!(coordinator.batch(stalled.id).is_some());
}

#[tokio::test]
async fn cancel_all_stops_every_pending_batch() {
    let source = MemoryFs::new("src");
    source.write_file("stall.bin", &[0; 100]).expect("write");
    let gated = ScriptedFs::new(
        &source,
        Faults {
            gate: Some(("stall.bin".to_owned(), 0)),
            ..Default::default()
        },
    );
    let destination = MemoryFs::new("dst");
    let coordinator = TransferCoordinator::default();

    let pane = pane(Box::new(gated), &["stall.bin"]).await;
    for _ in 0..2 {
        coordinator
            .begin_transfer(
                pane.selected_entries(),
                &pane,
                &destination,
                &destination.root(),
            )
            .expect("begin");
    }

    with_timeout(coordinator.cancel_all()).await;

    assert_eq!(0, coordinator.pending_transfers());
    assert!(coordinator
        .batches()
        .iter()
        .all(|batch| batch.status == BatchStatus::Cancelled));
}

#[tokio::test]
async fn clipboard_pastes_into_the_destination_pane() {
    let source = three_files();
    let destination = MemoryFs::new("dst");
    destination.create_dir_all("inbox").expect("mkdir");
    let coordinator = TransferCoordinator::default();
    let mut events = coordinator.subscribe();

    let source_pane = pane(Box::new(source), &["a.txt", "c.txt"]).await;
    assert_eq!(2, coordinator.set_clipboard(&source_pane));

    let mut destination_pane = DirectoryCache::new(Box::new(destination.clone()), Timeouts::default());
    destination_pane
        .change_directory("/inbox")
        .await
        .expect("cd");

    let handle = coordinator.paste(&destination_pane).expect("paste");
    let batch = with_timeout(handle.finished()).await;

    assert_eq!(BatchStatus::Done, batch.status);
    assert_eq!(40, batch.transferred);
    assert!(destination.exists("inbox/a.txt"));
    assert!(destination.exists("inbox/c.txt"));

    let first = events.recv().await.expect("event");
    assert_eq!(TransferEvent::Added { id: handle.id }, first);

    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        if let TransferEvent::Finished { status, errors, .. } = event {
            finished = Some((status, errors));
        }
    }
    assert_eq!(Some((BatchStatus::Done, 0)), finished);
}

#[tokio::test]
async fn empty_clipboard_cannot_be_pasted() {
    let destination = MemoryFs::new("dst");
    let coordinator = TransferCoordinator::default();
    let destination_pane = DirectoryCache::new(Box::new(destination), Timeouts::default());

    assert!(matches!(
        coordinator.paste(&destination_pane),
        Err(VfsError::NotFound(_))
    ));
}
