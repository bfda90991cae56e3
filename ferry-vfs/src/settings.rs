use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timeouts {
    /// Bounds list, stat, login and directory creation.
    pub operation: Duration,
    /// Bounds every single chunk read or write.
    pub chunk: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            operation: Duration::from_secs(30),
            chunk: Duration::from_secs(60),
        }
    }
}
