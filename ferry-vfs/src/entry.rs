use std::time::SystemTime;

use crate::path::VfsPath;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FileType {
    Archive,
    Audio,
    Code,
    Document,
    Executable,
    Image,
    Other,
    Video,
}

impl FileType {
    pub fn from_name(name: &str) -> Self {
        let extension = match name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => extension.to_ascii_lowercase(),
            _ => return FileType::Other,
        };

        match extension.as_str() {
            "bmp" | "gif" | "ico" | "jpeg" | "jpg" | "png" | "svg" | "tif" | "tiff" | "webp" => {
                FileType::Image
            }
            "avi" | "flv" | "m4v" | "mkv" | "mov" | "mp4" | "mpeg" | "mpg" | "webm" | "wmv" => {
                FileType::Video
            }
            "aac" | "flac" | "m4a" | "mp3" | "ogg" | "opus" | "wav" | "wma" => FileType::Audio,
            "app" | "bat" | "bin" | "cmd" | "com" | "deb" | "dmg" | "exe" | "msi" | "rpm"
            | "sh" => FileType::Executable,
            "7z" | "bz2" | "gz" | "iso" | "rar" | "tar" | "tgz" | "xz" | "zip" | "zst" => {
                FileType::Archive
            }
            "csv" | "doc" | "docx" | "md" | "odp" | "ods" | "odt" | "pdf" | "ppt" | "pptx"
            | "rtf" | "txt" | "xls" | "xlsx" => FileType::Document,
            "c" | "cpp" | "cs" | "css" | "go" | "h" | "hpp" | "html" | "java" | "js" | "json"
            | "kt" | "lua" | "py" | "rb" | "rs" | "toml" | "ts" | "tsx" | "xml" | "yaml"
            | "yml" => FileType::Code,
            _ => FileType::Other,
        }
    }

    /// Short code shown next to listings and transfer elements.
    pub fn code(&self) -> &'static str {
        match self {
            FileType::Archive => "arc",
            FileType::Audio => "snd",
            FileType::Code => "cod",
            FileType::Document => "doc",
            FileType::Executable => "exe",
            FileType::Image => "img",
            FileType::Other => "any",
            FileType::Video => "vid",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryEntry {
    pub name: String,
    pub parent: VfsPath,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub file_type: FileType,
    pub is_valid: bool,
}

impl DirectoryEntry {
    pub fn new(parent: &VfsPath, name: &str, kind: EntryKind, size: u64) -> Self {
        let (size, file_type) = match kind {
            EntryKind::Directory => (0, FileType::Other),
            EntryKind::File | EntryKind::Symlink => (size, FileType::from_name(name)),
        };

        Self {
            name: name.to_owned(),
            parent: parent.clone(),
            kind,
            size,
            modified: None,
            file_type,
            is_valid: true,
        }
    }

    pub fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }

    pub fn path(&self) -> VfsPath {
        self.parent.join(&self.name)
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn invalidate(&mut self) {
        self.is_valid = false;
    }
}

/// Directories first, then case insensitive by name.
pub fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|left, right| {
        right
            .is_directory()
            .cmp(&left.is_directory())
            .then_with(|| left.name.to_lowercase().cmp(&right.name.to_lowercase()))
            .then_with(|| left.name.cmp(&right.name))
    });
}
