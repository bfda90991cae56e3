use ferry_vfs::Timeouts;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    pub chunk_size: usize,
    pub max_concurrent_batches: usize,
    pub timeouts: Timeouts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            max_concurrent_batches: 3,
            timeouts: Timeouts::default(),
        }
    }
}
