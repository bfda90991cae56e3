pub mod backend;
pub mod connect;
pub mod entry;
pub mod error;
pub mod ftp;
pub mod local;
pub mod memory;
pub mod path;
pub mod settings;
pub mod timeout;

pub use backend::{ByteSink, ByteSource, DeleteReport, Filesystem};
pub use connect::Connectors;
pub use entry::{DirectoryEntry, EntryKind, FileType};
pub use error::{VfsError, VfsResult};
pub use ftp::FtpFs;
pub use local::LocalFs;
pub use memory::MemoryFs;
pub use path::{BackendKind, Credentials, Endpoint, VfsPath};
pub use settings::Timeouts;
