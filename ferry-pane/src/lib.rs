pub mod cache;
pub mod history;
pub mod selection;

pub use cache::{CacheStatus, DirectoryCache, PaneSnapshot, PendingNavigation};
pub use history::History;
pub use selection::Selection;
