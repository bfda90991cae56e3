pub mod batch;
pub mod clipboard;
pub mod coordinator;
pub mod element;
pub mod event;
mod runner;
pub mod settings;

pub use batch::{BatchStatus, Severity, TransferBatch};
pub use clipboard::Clipboard;
pub use coordinator::{BatchHandle, RemoveOutcome, TransferCoordinator};
pub use element::{ElementKind, ElementStatus, TransferElement};
pub use event::TransferEvent;
pub use settings::Settings;
