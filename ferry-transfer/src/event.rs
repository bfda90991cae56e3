use crate::batch::BatchStatus;

#[derive(Clone, Debug, PartialEq)]
pub enum TransferEvent {
    Added {
        id: u64,
    },
    StatusChanged {
        id: u64,
        status: BatchStatus,
    },
    Progress {
        id: u64,
        transferred: u64,
        total: u64,
    },
    Finished {
        id: u64,
        status: BatchStatus,
        errors: usize,
    },
    Removed {
        id: u64,
    },
}

impl TransferEvent {
    pub fn id(&self) -> u64 {
        match self {
            TransferEvent::Added { id }
            | TransferEvent::StatusChanged { id, .. }
            | TransferEvent::Progress { id, .. }
            | TransferEvent::Finished { id, .. }
            | TransferEvent::Removed { id } => *id,
        }
    }
}
