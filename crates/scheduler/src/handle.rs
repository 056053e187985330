//! Control-plane side of the scheduler.

use crate::ScheduleError;
use abci_proxy_types::{BlockHeight, ValidatorSetChange};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Handle for submitting changes from any thread.
///
/// Clones share the same intake queue and height cursor.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    intake: mpsc::Sender<ValidatorSetChange>,
    last_height: Arc<AtomicU64>,
}

impl SchedulerHandle {
    pub(crate) fn new(
        intake: mpsc::Sender<ValidatorSetChange>,
        last_height: Arc<AtomicU64>,
    ) -> Self {
        Self {
            intake,
            last_height,
        }
    }

    /// Schedule `change` for its target height.
    ///
    /// Fails with [`ScheduleError::PastHeight`] if the height is already
    /// finalized. Never blocks: a full intake queue is reported as
    /// [`ScheduleError::QueueFull`].
    pub fn schedule(&self, change: ValidatorSetChange) -> Result<(), ScheduleError> {
        let current = self.current_height();
        if change.scheduled_height <= current {
            return Err(ScheduleError::PastHeight {
                wanted: change.scheduled_height,
                current,
            });
        }

        debug!(
            validators = ?change.validators,
            target_height = %change.scheduled_height,
            "received new validator set"
        );

        self.intake.try_send(change).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ScheduleError::QueueFull {
                capacity: self.capacity(),
            },
            mpsc::error::TrySendError::Closed(_) => ScheduleError::Closed,
        })
    }

    /// The most recently finalized height.
    pub fn current_height(&self) -> BlockHeight {
        BlockHeight(self.last_height.load(Ordering::Acquire))
    }

    /// Capacity of the intake queue.
    pub fn capacity(&self) -> usize {
        self.intake.max_capacity()
    }

    /// Number of changes waiting in the intake queue.
    pub fn queued(&self) -> usize {
        self.intake.max_capacity() - self.intake.capacity()
    }

    /// Whether the owning scheduler has been dropped.
    pub fn is_closed(&self) -> bool {
        self.intake.is_closed()
    }
}
