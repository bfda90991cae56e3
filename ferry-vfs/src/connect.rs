use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::{
    backend::Filesystem,
    error::{VfsError, VfsResult},
    ftp::FtpFs,
    local::LocalFs,
    memory::MemoryFs,
    path::{BackendKind, VfsPath},
    settings::Timeouts,
};

/// Picks the connector for a path by its backend kind. Memory volumes are created on
/// first use and shared by every connector handed out afterwards.
#[derive(Clone, Debug, Default)]
pub struct Connectors {
    volumes: Arc<RwLock<HashMap<String, MemoryFs>>>,
    timeouts: Timeouts,
}

impl Connectors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Socket deadlines handed to remote connectors.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn mount_memory(&self, volume: &str) -> MemoryFs {
        if let Some(mounted) = self.volumes.read().get(volume) {
            return mounted.clone();
        }

        self.volumes
            .write()
            .entry(volume.to_owned())
            .or_insert_with(|| MemoryFs::new(volume))
            .clone()
    }

    pub fn connect(&self, path: &VfsPath) -> VfsResult<Box<dyn Filesystem>> {
        tracing::debug!("connecting {:?} backend for {}", path.kind(), path);

        match path.kind() {
            BackendKind::Local => Ok(Box::new(LocalFs::new())),
            BackendKind::Ftp => match path.endpoint() {
                Some(endpoint) => Ok(Box::new(
                    FtpFs::new(endpoint.clone()).with_timeouts(self.timeouts),
                )),
                None => Err(VfsError::InvalidPath(path.to_string())),
            },
            BackendKind::Memory => match path.volume() {
                Some(volume) => Ok(Box::new(self.mount_memory(volume))),
                None => Err(VfsError::InvalidPath(path.to_string())),
            },
        }
    }

    /// Parses user input and connects the matching backend.
    pub fn open(&self, input: &str) -> VfsResult<(Box<dyn Filesystem>, VfsPath)> {
        let path = VfsPath::parse(input)?;
        let filesystem = self.connect(&path)?;

        Ok((filesystem, path))
    }
}
