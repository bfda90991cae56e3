use ferry_vfs::{FileType, VfsError, VfsPath};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ElementKind {
    Directory,
    File,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ElementStatus {
    Cancelled,
    Done,
    Error,
    Queued,
    Started,
}

impl ElementStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ElementStatus::Cancelled | ElementStatus::Done | ElementStatus::Error
        )
    }
}

/// One file copy or one directory creation inside a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferElement {
    pub source: VfsPath,
    pub destination: VfsPath,
    pub name: String,
    pub file_type: FileType,
    pub kind: ElementKind,
    pub size: u64,
    pub transferred: u64,
    pub status: ElementStatus,
    pub error: Option<VfsError>,
    /// Location relative to the selected directory the element was expanded from.
    pub prefix: Option<String>,
}

impl TransferElement {
    pub fn file(source: VfsPath, destination: VfsPath, size: u64, prefix: Option<String>) -> Self {
        Self::new(source, destination, ElementKind::File, size, prefix)
    }

    pub fn directory(source: VfsPath, destination: VfsPath, prefix: Option<String>) -> Self {
        Self::new(source, destination, ElementKind::Directory, 0, prefix)
    }

    fn new(
        source: VfsPath,
        destination: VfsPath,
        kind: ElementKind,
        size: u64,
        prefix: Option<String>,
    ) -> Self {
        let name = source.name().unwrap_or_default().to_owned();
        let file_type = match kind {
            ElementKind::Directory => FileType::Other,
            ElementKind::File => FileType::from_name(&name),
        };

        Self {
            source,
            destination,
            name,
            file_type,
            kind,
            size,
            transferred: 0,
            status: ElementStatus::Queued,
            error: None,
            prefix,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ElementKind::Directory
    }

    pub(crate) fn start(&mut self) {
        if self.status == ElementStatus::Queued {
            self.status = ElementStatus::Started;
        }
    }

    /// Counts transferred bytes. A source larger than announced grows the size along.
    pub(crate) fn advance(&mut self, bytes: u64) {
        if self.status != ElementStatus::Started {
            return;
        }

        self.transferred += bytes;
        if self.transferred > self.size {
            self.size = self.transferred;
        }
    }

    pub(crate) fn complete(&mut self) {
        if !self.status.is_terminal() {
            self.status = ElementStatus::Done;
        }
    }

    pub(crate) fn fail(&mut self, error: VfsError) {
        if !self.status.is_terminal() {
            self.status = ElementStatus::Error;
            self.error = Some(error);
        }
    }

    pub(crate) fn cancel(&mut self) {
        if !self.status.is_terminal() {
            self.status = ElementStatus::Cancelled;
        }
    }
}
