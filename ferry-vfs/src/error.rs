use std::io;

use thiserror::Error;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VfsError {
    #[error("Path already exists: {0}")]
    AlreadyExists(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Destination is invalid: {0}")]
    InvalidDestination(String),
    #[error("Name is invalid: {0}")]
    InvalidName(String),
    #[error("Path is invalid: {0}")]
    InvalidPath(String),
    #[error("Path not found: {0}")]
    NotFound(String),
    #[error("Backend is not connected")]
    NotConnected,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Operation timed out")]
    Timeout,
    #[error("Backend operation failed: {0}")]
    Unknown(String),
}

pub type VfsResult<T> = Result<T, VfsError>;

impl VfsError {
    pub fn is_not_connected(&self) -> bool {
        matches!(self, VfsError::NotConnected)
    }

    /// Annotates an io error with the path it happened on.
    pub fn from_io(error: io::Error, path: &str) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => VfsError::NotFound(path.to_owned()),
            io::ErrorKind::PermissionDenied => VfsError::PermissionDenied(path.to_owned()),
            io::ErrorKind::AlreadyExists => VfsError::AlreadyExists(path.to_owned()),
            io::ErrorKind::InvalidInput => VfsError::InvalidPath(path.to_owned()),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => VfsError::Timeout,
            io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => VfsError::NotConnected,
            _ => VfsError::Unknown(format!("{}: {}", path, error)),
        }
    }
}

impl From<io::Error> for VfsError {
    fn from(error: io::Error) -> Self {
        VfsError::from_io(error, "")
    }
}
