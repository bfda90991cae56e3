use ferry_vfs::VfsError;

use crate::element::{ElementStatus, TransferElement};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchStatus {
    Calculating,
    Cancelled,
    Done,
    Error,
    Queued,
    Started,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Cancelled | BatchStatus::Done | BatchStatus::Error
        )
    }
}

/// Display emphasis of a batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Danger,
    None,
    Primary,
    Success,
    Warning,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransferBatch {
    pub id: u64,
    pub source_name: String,
    pub destination_name: String,
    pub elements: Vec<TransferElement>,
    pub total_size: u64,
    pub transferred: u64,
    pub status: BatchStatus,
    /// Set when expansion of a selected directory failed and the batch stopped early.
    pub error: Option<VfsError>,
}

impl TransferBatch {
    pub fn new(id: u64, source_name: &str, destination_name: &str) -> Self {
        Self {
            id,
            source_name: source_name.to_owned(),
            destination_name: destination_name.to_owned(),
            elements: Vec::new(),
            total_size: 0,
            transferred: 0,
            status: BatchStatus::Queued,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elements that failed or were cancelled.
    pub fn error_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|element| {
                matches!(
                    element.status,
                    ElementStatus::Error | ElementStatus::Cancelled
                )
            })
            .count()
    }

    /// Share of transferred bytes between 0 and 1.
    pub fn progress(&self) -> f64 {
        if self.total_size == 0 {
            if self.is_terminal() {
                1.0
            } else {
                0.0
            }
        } else {
            self.transferred as f64 / self.total_size as f64
        }
    }

    pub fn severity(&self) -> Severity {
        let mut severity = match self.status {
            BatchStatus::Queued | BatchStatus::Calculating => return Severity::None,
            BatchStatus::Started => return Severity::Primary,
            BatchStatus::Error | BatchStatus::Cancelled => Severity::Danger,
            BatchStatus::Done => Severity::Success,
        };

        let errors = self.error_count();
        if errors > 0 {
            severity = if errors == self.elements.len() {
                Severity::Danger
            } else {
                Severity::Warning
            };
        }

        severity
    }

    /// Files plus the directories that failed, the rest only matters to execution.
    pub fn visible_elements(&self) -> Vec<&TransferElement> {
        self.elements
            .iter()
            .filter(|element| !element.is_directory() || element.status == ElementStatus::Error)
            .collect()
    }

    /// Sums sizes and transferred bytes over file elements.
    pub(crate) fn recompute(&mut self) {
        let files = self.elements.iter().filter(|element| !element.is_directory());

        let (total_size, transferred) = files.fold((0, 0), |(size, done), element| {
            (size + element.size, done + element.transferred)
        });

        self.total_size = total_size;
        self.transferred = transferred;
    }

    /// Cancels every element that has not reached a terminal state.
    pub(crate) fn cancel_remaining(&mut self) {
        for element in self.elements.iter_mut() {
            element.cancel();
        }
    }
}
