use std::{collections::BTreeMap, sync::Arc, time::SystemTime};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    backend::{self, ByteSink, ByteSource, DeleteReport, Filesystem},
    entry::{DirectoryEntry, EntryKind},
    error::{VfsError, VfsResult},
    path::{BackendKind, VfsPath},
};

type Nodes = Arc<RwLock<BTreeMap<Vec<String>, Node>>>;

#[derive(Clone, Debug)]
enum Node {
    Directory { modified: SystemTime },
    File { data: Vec<u8>, modified: SystemTime },
}

/// Volatile volume shared by every clone. Used for scratch space and as a test double
/// for remote backends.
#[derive(Clone, Debug)]
pub struct MemoryFs {
    volume: String,
    nodes: Nodes,
}

impl MemoryFs {
    pub fn new(volume: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            Vec::new(),
            Node::Directory {
                modified: SystemTime::now(),
            },
        );

        Self {
            volume: volume.to_owned(),
            nodes: Arc::new(RwLock::new(nodes)),
        }
    }

    pub fn volume(&self) -> &str {
        &self.volume
    }

    /// Creates the directory and all missing parents below the volume root.
    pub fn create_dir_all(&self, relative: &str) -> VfsResult<VfsPath> {
        let path = self.root().join(relative);
        let mut nodes = self.nodes.write();
        for depth in 1..=path.segments().len() {
            let key = path.segments()[..depth].to_vec();
            match nodes.get(&key) {
                Some(Node::Directory { .. }) => {}
                Some(Node::File { .. }) => return Err(VfsError::AlreadyExists(path.to_string())),
                None => {
                    nodes.insert(
                        key,
                        Node::Directory {
                            modified: SystemTime::now(),
                        },
                    );
                }
            }
        }

        Ok(path)
    }

    /// Writes a file below the volume root, creating missing parents.
    pub fn write_file(&self, relative: &str, data: &[u8]) -> VfsResult<VfsPath> {
        let path = self.root().join(relative);
        let parent = match path.parent() {
            Some(parent) => parent,
            None => return Err(VfsError::InvalidPath(relative.to_owned())),
        };

        let relative_parent = parent.segments().join("/");
        self.create_dir_all(&relative_parent)?;

        let mut nodes = self.nodes.write();
        if let Some(Node::Directory { .. }) = nodes.get(path.segments()) {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }

        nodes.insert(
            path.segments().to_vec(),
            Node::File {
                data: data.to_vec(),
                modified: SystemTime::now(),
            },
        );

        Ok(path)
    }

    pub fn read_file(&self, relative: &str) -> Option<Vec<u8>> {
        let path = self.root().join(relative);
        match self.nodes.read().get(path.segments()) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, relative: &str) -> bool {
        let path = self.root().join(relative);
        self.nodes.read().contains_key(path.segments())
    }

    fn entry(&self, key: &[String], node: &Node) -> DirectoryEntry {
        let parent = self.root().join(&key[..key.len().saturating_sub(1)].join("/"));
        let name = key.last().map(|name| name.as_str()).unwrap_or_default();

        match node {
            Node::Directory { modified } => {
                DirectoryEntry::new(&parent, name, EntryKind::Directory, 0)
                    .with_modified(Some(*modified))
            }
            Node::File { data, modified } => {
                DirectoryEntry::new(&parent, name, EntryKind::File, data.len() as u64)
                    .with_modified(Some(*modified))
            }
        }
    }

    fn delete_one(&self, path: &VfsPath) -> VfsResult<()> {
        backend::ensure_served(self, path)?;
        if path.is_root() {
            return Err(VfsError::PermissionDenied(path.to_string()));
        }

        let mut nodes = self.nodes.write();
        if !nodes.contains_key(path.segments()) {
            return Err(VfsError::NotFound(path.to_string()));
        }

        nodes.retain(|key, _| !key.starts_with(path.segments()));
        Ok(())
    }
}

#[async_trait]
impl Filesystem for MemoryFs {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn root(&self) -> VfsPath {
        VfsPath::memory(&self.volume)
    }

    async fn list(&self, path: &VfsPath) -> VfsResult<Vec<DirectoryEntry>> {
        backend::ensure_served(self, path)?;

        let nodes = self.nodes.read();
        match nodes.get(path.segments()) {
            Some(Node::Directory { .. }) => {}
            Some(Node::File { .. }) => return Err(VfsError::InvalidPath(path.to_string())),
            None => return Err(VfsError::NotFound(path.to_string())),
        }

        let depth = path.segments().len() + 1;
        let entries = nodes
            .range(path.segments().to_vec()..)
            .take_while(|(key, _)| key.starts_with(path.segments()))
            .filter(|(key, _)| key.len() == depth)
            .map(|(key, node)| self.entry(key, node))
            .collect();

        Ok(entries)
    }

    async fn stat(&self, path: &VfsPath) -> VfsResult<DirectoryEntry> {
        backend::ensure_served(self, path)?;

        match self.nodes.read().get(path.segments()) {
            Some(node) => Ok(self.entry(path.segments(), node)),
            None => Err(VfsError::NotFound(path.to_string())),
        }
    }

    async fn create_directory(&self, parent: &VfsPath, name: &str) -> VfsResult<VfsPath> {
        backend::ensure_served(self, parent)?;
        backend::ensure_valid_name(self, name)?;

        let path = parent.join(name);
        let mut nodes = self.nodes.write();
        match nodes.get(parent.segments()) {
            Some(Node::Directory { .. }) => {}
            _ => return Err(VfsError::NotFound(parent.to_string())),
        }

        if nodes.contains_key(path.segments()) {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }

        nodes.insert(
            path.segments().to_vec(),
            Node::Directory {
                modified: SystemTime::now(),
            },
        );

        Ok(path)
    }

    async fn delete(&self, paths: &[VfsPath]) -> DeleteReport {
        let mut report = DeleteReport::default();
        for path in paths {
            match self.delete_one(path) {
                Ok(()) => report.deleted.push(path.clone()),
                Err(err) => report.failures.push((path.clone(), err)),
            }
        }

        report
    }

    async fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn ByteSource>> {
        backend::ensure_served(self, path)?;

        match self.nodes.read().get(path.segments()) {
            Some(Node::File { .. }) => {}
            Some(Node::Directory { .. }) => return Err(VfsError::InvalidPath(path.to_string())),
            None => return Err(VfsError::NotFound(path.to_string())),
        }

        Ok(Box::new(MemoryReader {
            nodes: self.nodes.clone(),
            key: path.segments().to_vec(),
            offset: 0,
        }))
    }

    async fn open_write(&self, path: &VfsPath) -> VfsResult<Box<dyn ByteSink>> {
        backend::ensure_served(self, path)?;

        let parent = match path.parent() {
            Some(parent) => parent,
            None => return Err(VfsError::InvalidPath(path.to_string())),
        };

        let mut nodes = self.nodes.write();
        match nodes.get(parent.segments()) {
            Some(Node::Directory { .. }) => {}
            _ => return Err(VfsError::NotFound(parent.to_string())),
        }

        if let Some(Node::Directory { .. }) = nodes.get(path.segments()) {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }

        nodes.insert(
            path.segments().to_vec(),
            Node::File {
                data: Vec::new(),
                modified: SystemTime::now(),
            },
        );

        Ok(Box::new(MemoryWriter {
            nodes: self.nodes.clone(),
            key: path.segments().to_vec(),
        }))
    }

    fn duplicate(&self) -> Box<dyn Filesystem> {
        Box::new(self.clone())
    }
}

struct MemoryReader {
    nodes: Nodes,
    key: Vec<String>,
    offset: usize,
}

#[async_trait]
impl ByteSource for MemoryReader {
    async fn read_chunk(&mut self, max: usize) -> VfsResult<Vec<u8>> {
        let nodes = self.nodes.read();
        let data = match nodes.get(&self.key) {
            Some(Node::File { data, .. }) => data,
            _ => return Err(VfsError::NotFound(self.key.join("/"))),
        };

        let start = self.offset.min(data.len());
        let end = start.saturating_add(max).min(data.len());
        self.offset = end;

        Ok(data[start..end].to_vec())
    }

    async fn finish(&mut self) -> VfsResult<()> {
        Ok(())
    }
}

struct MemoryWriter {
    nodes: Nodes,
    key: Vec<String>,
}

#[async_trait]
impl ByteSink for MemoryWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> VfsResult<()> {
        let mut nodes = self.nodes.write();
        match nodes.get_mut(&self.key) {
            Some(Node::File { data, modified }) => {
                data.extend_from_slice(chunk);
                *modified = SystemTime::now();
                Ok(())
            }
            _ => Err(VfsError::NotFound(self.key.join("/"))),
        }
    }

    async fn finish(&mut self) -> VfsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn list_returns_direct_children_only() {
        let fs = MemoryFs::new("scratch");
        fs.write_file("docs/a.txt", b"a").expect("write");
        fs.write_file("docs/deep/b.txt", b"bb").expect("write");
        fs.write_file("docsx/c.txt", b"c").expect("write");

        let entries = fs.list(&fs.root().join("docs")).await.expect("list");
        let mut names: Vec<_> = entries.iter().map(|entry| entry.name.clone()).collect();
        names.sort();

        assert_eq!(vec!["a.txt", "deep"], names);
        let file = entries.iter().find(|entry| entry.name == "a.txt").expect("a.txt");
        assert_eq!(1, file.size);
        assert_eq!(fs.root().join("docs"), file.parent);
    }

    #[tokio::test]
    async fn list_of_missing_directory_fails() {
        let fs = MemoryFs::new("scratch");
        let result = fs.list(&fs.root().join("missing")).await;

        assert!(matches!(result, Err(VfsError::NotFound(_))));
    }

    #[tokio::test]
    async fn foreign_paths_are_rejected() {
        let fs = MemoryFs::new("scratch");
        let other = VfsPath::memory("other");

        assert!(matches!(fs.list(&other).await, Err(VfsError::InvalidPath(_))));
        assert!(fs.resolve(&fs.root(), "mem://other/").is_err());
    }

    #[tokio::test]
    async fn create_directory_validates_and_detects_duplicates() {
        let fs = MemoryFs::new("scratch");
        let root = fs.root();

        let created = fs.create_directory(&root, "new").await.expect("create");
        assert_eq!(root.join("new"), created);

        let again = fs.create_directory(&root, "new").await;
        assert!(matches!(again, Err(VfsError::AlreadyExists(_))));

        let invalid = fs.create_directory(&root, "a/b").await;
        assert_eq!(Err(VfsError::InvalidName("a/b".to_owned())), invalid);
    }

    #[tokio::test]
    async fn delete_is_recursive_and_reports_per_path() {
        let fs = MemoryFs::new("scratch");
        fs.write_file("dir/a.txt", b"a").expect("write");
        fs.write_file("dir/sub/b.txt", b"b").expect("write");
        fs.write_file("keep.txt", b"k").expect("write");

        let report = fs
            .delete(&[fs.root().join("dir"), fs.root().join("ghost")])
            .await;

        assert_eq!(vec![fs.root().join("dir")], report.deleted);
        assert_eq!(1, report.failures.len());
        assert!(!fs.exists("dir/sub/b.txt"));
        assert!(fs.exists("keep.txt"));
    }

    #[tokio::test]
    async fn streams_read_and_write_in_chunks() {
        let fs = MemoryFs::new("scratch");
        let source = fs.write_file("source.bin", b"0123456789").expect("write");
        let target = fs.root().join("target.bin");

        let mut reader = fs.open_read(&source).await.expect("open read");
        let mut writer = fs.open_write(&target).await.expect("open write");
        loop {
            let chunk = reader.read_chunk(4).await.expect("read");
            if chunk.is_empty() {
                break;
            }
            writer.write_chunk(&chunk).await.expect("write");
        }
        writer.finish().await.expect("finish");

        assert_eq!(Some(b"0123456789".to_vec()), fs.read_file("target.bin"));
    }

    #[tokio::test]
    async fn clones_share_the_volume() {
        let fs = MemoryFs::new("scratch");
        let duplicate = fs.duplicate();
        fs.write_file("a.txt", b"a").expect("write");

        let entry = duplicate.stat(&fs.root().join("a.txt")).await.expect("stat");
        assert_eq!(EntryKind::File, entry.kind);
    }
}
