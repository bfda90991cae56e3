use ferry_vfs::{
    entry, timeout, Credentials, DeleteReport, DirectoryEntry, Filesystem, Timeouts, VfsError,
    VfsPath, VfsResult,
};
use tokio::sync::watch;

use crate::{history::History, selection::Selection};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheStatus {
    Busy,
    Error,
    LoginRequired,
    Ok,
}

/// Navigation interrupted by a missing session, replayed after `login`.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingNavigation {
    Path(VfsPath),
    History(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaneSnapshot {
    pub path: VfsPath,
    pub entries: Vec<DirectoryEntry>,
    pub selection: Vec<String>,
    pub status: CacheStatus,
    pub error: Option<VfsError>,
    pub history: Vec<VfsPath>,
    pub history_cursor: usize,
    pub pending: Option<PendingNavigation>,
}

enum Visit {
    Push,
    Reload,
    History { index: usize, previous: usize },
}

/// Listing, history and selection of one pane on top of a single connector.
#[derive(Debug)]
pub struct DirectoryCache {
    filesystem: Box<dyn Filesystem>,
    timeouts: Timeouts,
    path: VfsPath,
    history: History,
    listed_cursor: Option<usize>,
    entries: Vec<DirectoryEntry>,
    selection: Selection,
    status: CacheStatus,
    error: Option<VfsError>,
    pending: Option<PendingNavigation>,
    sender: watch::Sender<PaneSnapshot>,
}

impl DirectoryCache {
    pub fn new(filesystem: Box<dyn Filesystem>, timeouts: Timeouts) -> Self {
        let path = filesystem.root();
        let (sender, _) = watch::channel(PaneSnapshot {
            path: path.clone(),
            entries: Vec::new(),
            selection: Vec::new(),
            status: CacheStatus::Ok,
            error: None,
            history: Vec::new(),
            history_cursor: 0,
            pending: None,
        });

        Self {
            filesystem,
            timeouts,
            path,
            history: History::default(),
            listed_cursor: None,
            entries: Vec::new(),
            selection: Selection::default(),
            status: CacheStatus::Ok,
            error: None,
            pending: None,
            sender,
        }
    }

    pub fn filesystem(&self) -> &dyn Filesystem {
        self.filesystem.as_ref()
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn status(&self) -> CacheStatus {
        self.status
    }

    pub fn error(&self) -> Option<&VfsError> {
        self.error.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingNavigation> {
        self.pending.as_ref()
    }

    pub fn can_go_backward(&self) -> bool {
        self.history.can_go_backward()
    }

    pub fn can_go_forward(&self) -> bool {
        self.history.can_go_forward()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaneSnapshot> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> PaneSnapshot {
        PaneSnapshot {
            path: self.path.clone(),
            entries: self.entries.clone(),
            selection: self.selection.names(&self.entries),
            status: self.status,
            error: self.error.clone(),
            history: self.history.entries().to_vec(),
            history_cursor: self.history.cursor(),
            pending: self.pending.clone(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_directory(&mut self, input: &str) -> VfsResult<()> {
        let target = match self.filesystem.resolve(&self.path, input) {
            Ok(target) => target,
            Err(err) => {
                tracing::warn!("unable to resolve {}: {:?}", input, err);
                self.status = CacheStatus::Error;
                self.error = Some(err.clone());
                self.publish();
                return Err(err);
            }
        };

        self.visit(target, Visit::Push).await
    }

    /// Moves through the history by `offset`, `0` reloads. Out of range offsets are
    /// ignored.
    #[tracing::instrument(skip(self))]
    pub async fn navigate_history(&mut self, offset: isize) -> VfsResult<()> {
        if offset == 0 {
            return self.reload().await;
        }

        let index = match self.history.index_at(offset) {
            Some(index) => index,
            None => return Ok(()),
        };

        self.visit_history(index).await
    }

    pub async fn reload(&mut self) -> VfsResult<()> {
        let target = self.path.clone();
        self.visit(target, Visit::Reload).await
    }

    /// Abandons a navigation that waits for a login and returns to the last listed path.
    pub fn revert_path(&mut self) {
        if let Some(listed) = self.listed_cursor {
            self.history.set_cursor(listed);
        }

        self.pending = None;
        self.status = CacheStatus::Ok;
        self.error = None;
        self.publish();
    }

    #[tracing::instrument(skip(self, credentials))]
    pub async fn login(&mut self, credentials: Credentials) -> VfsResult<()> {
        self.status = CacheStatus::Busy;
        self.publish();

        let operation = self.timeouts.operation;
        if let Err(err) = timeout::bounded(operation, self.filesystem.login(credentials)).await {
            tracing::warn!("login failed: {:?}", err);
            self.status = CacheStatus::LoginRequired;
            self.error = Some(err.clone());
            self.publish();
            return Err(err);
        }

        match self.pending.take() {
            Some(PendingNavigation::Path(target)) => self.visit(target, Visit::Push).await,
            Some(PendingNavigation::History(index)) => self.visit_history(index).await,
            None => {
                self.status = CacheStatus::Ok;
                self.error = None;
                self.publish();
                Ok(())
            }
        }
    }

    pub fn is_directory_name_valid(&self, name: &str) -> bool {
        self.filesystem.is_name_valid(name)
    }

    /// Creates a directory without refreshing the listing.
    pub async fn make_directory(&self, parent: &VfsPath, name: &str) -> VfsResult<VfsPath> {
        if !self.filesystem.is_name_valid(name) {
            return Err(VfsError::InvalidName(name.to_owned()));
        }

        let operation = self.timeouts.operation;
        timeout::bounded(operation, self.filesystem.create_directory(parent, name)).await
    }

    /// Deletes without refreshing the listing.
    pub async fn delete_paths(&self, paths: &[VfsPath]) -> DeleteReport {
        let report = self.filesystem.delete(paths).await;
        for (path, err) in &report.failures {
            tracing::warn!("unable to delete {}: {:?}", path, err);
        }

        report
    }

    pub fn select(&mut self, name: &str) -> bool {
        let selected = self.selection.select(name, &self.entries);
        if selected {
            self.publish();
        }
        selected
    }

    pub fn deselect(&mut self, name: &str) -> bool {
        let deselected = self.selection.deselect(name);
        if deselected {
            self.publish();
        }
        deselected
    }

    /// Flips the selection state of `name` and returns whether it is selected now.
    pub fn toggle(&mut self, name: &str) -> bool {
        if self.selection.contains(name) {
            self.deselect(name);
            false
        } else {
            self.select(name)
        }
    }

    pub fn select_all(&mut self) {
        self.selection.select_all(&self.entries);
        self.publish();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.publish();
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selection.contains(name)
    }

    pub fn selected_entries(&self) -> Vec<DirectoryEntry> {
        self.selection.entries(&self.entries)
    }

    async fn visit_history(&mut self, index: usize) -> VfsResult<()> {
        let target = match self.history.get(index) {
            Some(target) => target.clone(),
            None => return Ok(()),
        };

        let previous = self.listed_cursor.unwrap_or(self.history.cursor());
        self.history.set_cursor(index);
        self.visit(target, Visit::History { index, previous }).await
    }

    async fn visit(&mut self, target: VfsPath, visit: Visit) -> VfsResult<()> {
        self.status = CacheStatus::Busy;
        self.publish();

        let operation = self.timeouts.operation;
        let result = timeout::bounded(operation, self.filesystem.list(&target)).await;
        match result {
            Ok(mut entries) => {
                entry::sort_entries(&mut entries);

                let same_path = self.listed_cursor.is_some() && target == self.path;
                match visit {
                    Visit::Push if same_path => {
                        if let Some(listed) = self.listed_cursor {
                            self.history.set_cursor(listed);
                        }
                        self.history.truncate_forward();
                    }
                    Visit::Push => self.history.push(target.clone()),
                    Visit::Reload if self.listed_cursor.is_none() => {
                        self.history.push(target.clone())
                    }
                    Visit::Reload | Visit::History { .. } => {}
                }

                if same_path {
                    self.selection.prune(&entries);
                } else {
                    self.selection.clear();
                }

                tracing::debug!("listed {} entries in {}", entries.len(), target);

                self.path = target;
                self.entries = entries;
                self.listed_cursor = Some(self.history.cursor());
                self.status = CacheStatus::Ok;
                self.error = None;
                self.pending = None;
                self.publish();

                Ok(())
            }
            Err(err) if err.is_not_connected() => {
                tracing::info!("login required to list {}", target);

                self.pending = Some(match visit {
                    Visit::History { index, .. } => PendingNavigation::History(index),
                    Visit::Push | Visit::Reload => PendingNavigation::Path(target),
                });

                for entry in self.entries.iter_mut() {
                    entry.invalidate();
                }

                self.status = CacheStatus::LoginRequired;
                self.error = Some(err.clone());
                self.publish();

                Err(err)
            }
            Err(err) => {
                tracing::warn!("unable to list {}: {:?}", target, err);

                if let Visit::History { previous, .. } = visit {
                    self.history.set_cursor(previous);
                }

                self.status = CacheStatus::Error;
                self.error = Some(err.clone());
                self.publish();

                Err(err)
            }
        }
    }

    fn publish(&self) {
        self.sender.send_replace(self.snapshot());
    }
}
