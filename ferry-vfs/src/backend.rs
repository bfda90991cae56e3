use std::fmt::Debug;

use async_trait::async_trait;

use crate::{
    entry::DirectoryEntry,
    error::{VfsError, VfsResult},
    path::{self, BackendKind, Credentials, VfsPath},
};

/// Reading end of a file transfer. Dropping the handle releases the underlying
/// descriptor or data connection.
#[async_trait]
pub trait ByteSource: Send {
    /// Returns at most `max` bytes. An empty buffer marks the end of the file.
    async fn read_chunk(&mut self, max: usize) -> VfsResult<Vec<u8>>;

    async fn finish(&mut self) -> VfsResult<()>;
}

/// Writing end of a file transfer. Data written without `finish` may be incomplete.
#[async_trait]
pub trait ByteSink: Send {
    async fn write_chunk(&mut self, data: &[u8]) -> VfsResult<()>;

    async fn finish(&mut self) -> VfsResult<()>;
}

#[derive(Debug, Default, PartialEq)]
pub struct DeleteReport {
    pub deleted: Vec<VfsPath>,
    pub failures: Vec<(VfsPath, VfsError)>,
}

impl DeleteReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Uniform operation set over a storage backend.
#[async_trait]
pub trait Filesystem: Send + Sync + Debug {
    fn kind(&self) -> BackendKind;

    fn root(&self) -> VfsPath;

    /// True while the backend has no usable session and no known credentials.
    fn requires_login(&self) -> bool {
        false
    }

    async fn login(&self, _credentials: Credentials) -> VfsResult<()> {
        Ok(())
    }

    fn serves(&self, path: &VfsPath) -> bool {
        path.same_location(&self.root())
    }

    fn resolve(&self, base: &VfsPath, input: &str) -> VfsResult<VfsPath> {
        let resolved = base.resolve(input)?;
        if self.serves(&resolved) {
            Ok(resolved)
        } else {
            Err(VfsError::InvalidPath(input.trim().to_owned()))
        }
    }

    async fn list(&self, path: &VfsPath) -> VfsResult<Vec<DirectoryEntry>>;

    async fn stat(&self, path: &VfsPath) -> VfsResult<DirectoryEntry>;

    async fn create_directory(&self, parent: &VfsPath, name: &str) -> VfsResult<VfsPath>;

    /// Deletes every path, directories recursively. One failing path does not stop the
    /// others.
    async fn delete(&self, paths: &[VfsPath]) -> DeleteReport;

    async fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn ByteSource>>;

    /// Creates or truncates the file at `path`.
    async fn open_write(&self, path: &VfsPath) -> VfsResult<Box<dyn ByteSink>>;

    fn reserved_characters(&self) -> &'static [char] {
        &[]
    }

    fn is_name_valid(&self, name: &str) -> bool {
        path::is_valid_name(name, self.reserved_characters())
    }

    /// Independent connector for the same endpoint. Remote sessions connect lazily
    /// with the credentials known at the time of duplication.
    fn duplicate(&self) -> Box<dyn Filesystem>;
}

pub(crate) fn ensure_served(filesystem: &dyn Filesystem, path: &VfsPath) -> VfsResult<()> {
    if filesystem.serves(path) {
        Ok(())
    } else {
        Err(VfsError::InvalidPath(path.to_string()))
    }
}

pub(crate) fn ensure_valid_name(filesystem: &dyn Filesystem, name: &str) -> VfsResult<()> {
    if filesystem.is_name_valid(name) {
        Ok(())
    } else {
        Err(VfsError::InvalidName(name.to_owned()))
    }
}
