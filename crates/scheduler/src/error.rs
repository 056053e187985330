//! Scheduling errors.

use abci_proxy_types::BlockHeight;
use thiserror::Error;

/// Reasons a change was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The target height has already been finalized.
    #[error("Could not schedule for a block height back in time (wanted:{wanted}, current:{current})")]
    PastHeight {
        wanted: BlockHeight,
        current: BlockHeight,
    },

    /// The intake queue is at capacity.
    #[error("validator change queue is full (capacity {capacity}), try again later")]
    QueueFull { capacity: usize },

    /// The protocol path has gone away.
    #[error("validator scheduler is shut down")]
    Closed,
}

impl ScheduleError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ScheduleError::PastHeight { .. } => "past_height",
            ScheduleError::QueueFull { .. } => "queue_full",
            ScheduleError::Closed => "closed",
        }
    }
}
