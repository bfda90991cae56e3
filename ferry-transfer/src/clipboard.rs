use ferry_pane::DirectoryCache;
use ferry_vfs::{DirectoryEntry, Filesystem, VfsPath};

/// Entries copied from a pane, detached from it by a private connector.
#[derive(Debug)]
pub struct Clipboard {
    pub(crate) filesystem: Box<dyn Filesystem>,
    pub(crate) directory: VfsPath,
    pub(crate) entries: Vec<DirectoryEntry>,
}

impl Clipboard {
    pub fn from_selection(cache: &DirectoryCache) -> Self {
        Self {
            filesystem: cache.filesystem().duplicate(),
            directory: cache.path().clone(),
            entries: cache.selected_entries(),
        }
    }

    pub fn directory(&self) -> &VfsPath {
        &self.directory
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
