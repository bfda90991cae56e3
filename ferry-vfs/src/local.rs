use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
};

use crate::{
    backend::{self, ByteSink, ByteSource, DeleteReport, Filesystem},
    entry::{DirectoryEntry, EntryKind},
    error::{VfsError, VfsResult},
    path::{BackendKind, VfsPath},
};

#[derive(Clone, Debug)]
pub struct LocalFs {
    root: VfsPath,
}

impl Default for LocalFs {
    fn default() -> Self {
        let root = dirs::home_dir()
            .and_then(|home| VfsPath::from_local(&home).ok())
            .map(|home| home.root())
            .unwrap_or_else(|| VfsPath::local_root(None));

        Self { root }
    }
}

impl LocalFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn native(&self, path: &VfsPath) -> VfsResult<PathBuf> {
        backend::ensure_served(self, path)?;
        match path.to_local_path() {
            Some(native) => Ok(native),
            None => Err(VfsError::InvalidPath(path.to_string())),
        }
    }
}

#[async_trait]
impl Filesystem for LocalFs {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn root(&self) -> VfsPath {
        self.root.clone()
    }

    fn serves(&self, path: &VfsPath) -> bool {
        path.kind() == BackendKind::Local
    }

    #[cfg(windows)]
    fn reserved_characters(&self) -> &'static [char] {
        &['<', '>', ':', '"', '|', '?', '*']
    }

    async fn list(&self, path: &VfsPath) -> VfsResult<Vec<DirectoryEntry>> {
        let native = self.native(path)?;
        let listed = path.to_string();

        let mut read_dir = fs::read_dir(&native)
            .await
            .map_err(|err| VfsError::from_io(err, &listed))?;

        let mut entries = Vec::new();
        while let Some(item) = read_dir
            .next_entry()
            .await
            .map_err(|err| VfsError::from_io(err, &listed))?
        {
            let name = item.file_name().to_string_lossy().to_string();
            match read_entry(path, &name, &item.path()).await {
                Ok(entry) => entries.push(entry),
                Err(err) => tracing::warn!("skipping {} in {}: {:?}", name, listed, err),
            }
        }

        Ok(entries)
    }

    async fn stat(&self, path: &VfsPath) -> VfsResult<DirectoryEntry> {
        let native = self.native(path)?;
        let parent = path.parent().unwrap_or_else(|| path.clone());
        let name = path.name().unwrap_or_default();

        read_entry(&parent, name, &native).await
    }

    async fn create_directory(&self, parent: &VfsPath, name: &str) -> VfsResult<VfsPath> {
        backend::ensure_valid_name(self, name)?;

        let path = parent.join(name);
        let native = self.native(&path)?;
        fs::create_dir(&native)
            .await
            .map_err(|err| VfsError::from_io(err, &path.to_string()))?;

        Ok(path)
    }

    async fn delete(&self, paths: &[VfsPath]) -> DeleteReport {
        let mut report = DeleteReport::default();
        for path in paths {
            match delete_native(self, path).await {
                Ok(()) => report.deleted.push(path.clone()),
                Err(err) => report.failures.push((path.clone(), err)),
            }
        }

        report
    }

    async fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn ByteSource>> {
        let native = self.native(path)?;
        let file = File::open(&native)
            .await
            .map_err(|err| VfsError::from_io(err, &path.to_string()))?;

        Ok(Box::new(LocalReader {
            file,
            display: path.to_string(),
        }))
    }

    async fn open_write(&self, path: &VfsPath) -> VfsResult<Box<dyn ByteSink>> {
        let native = self.native(path)?;
        let file = File::create(&native)
            .await
            .map_err(|err| VfsError::from_io(err, &path.to_string()))?;

        Ok(Box::new(LocalWriter {
            file,
            display: path.to_string(),
        }))
    }

    fn duplicate(&self) -> Box<dyn Filesystem> {
        Box::new(self.clone())
    }
}

async fn read_entry(parent: &VfsPath, name: &str, native: &Path) -> VfsResult<DirectoryEntry> {
    let display = parent.join(name).to_string();
    let metadata = fs::symlink_metadata(native)
        .await
        .map_err(|err| VfsError::from_io(err, &display))?;

    let (kind, size) = if metadata.is_symlink() {
        let size = match fs::metadata(native).await {
            Ok(target) if target.is_file() => target.len(),
            _ => 0,
        };
        (EntryKind::Symlink, size)
    } else if metadata.is_dir() {
        (EntryKind::Directory, 0)
    } else {
        (EntryKind::File, metadata.len())
    };

    Ok(DirectoryEntry::new(parent, name, kind, size).with_modified(metadata.modified().ok()))
}

async fn delete_native(filesystem: &LocalFs, path: &VfsPath) -> VfsResult<()> {
    if path.is_root() {
        return Err(VfsError::PermissionDenied(path.to_string()));
    }

    let native = filesystem.native(path)?;
    let display = path.to_string();
    let metadata = fs::symlink_metadata(&native)
        .await
        .map_err(|err| VfsError::from_io(err, &display))?;

    let result = if metadata.is_dir() {
        fs::remove_dir_all(&native).await
    } else {
        fs::remove_file(&native).await
    };

    result.map_err(|err| VfsError::from_io(err, &display))
}

struct LocalReader {
    file: File,
    display: String,
}

#[async_trait]
impl ByteSource for LocalReader {
    async fn read_chunk(&mut self, max: usize) -> VfsResult<Vec<u8>> {
        let mut buffer = vec![0; max];
        let read = self
            .file
            .read(&mut buffer)
            .await
            .map_err(|err| VfsError::from_io(err, &self.display))?;

        buffer.truncate(read);
        Ok(buffer)
    }

    async fn finish(&mut self) -> VfsResult<()> {
        Ok(())
    }
}

struct LocalWriter {
    file: File,
    display: String,
}

#[async_trait]
impl ByteSink for LocalWriter {
    async fn write_chunk(&mut self, data: &[u8]) -> VfsResult<()> {
        self.file
            .write_all(data)
            .await
            .map_err(|err| VfsError::from_io(err, &self.display))
    }

    async fn finish(&mut self) -> VfsResult<()> {
        self.file
            .flush()
            .await
            .map_err(|err| VfsError::from_io(err, &self.display))
    }
}
