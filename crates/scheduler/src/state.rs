//! Scheduler state.

use crate::SchedulerHandle;
use abci_proxy_types::{BlockHeight, Validator, ValidatorSetChange};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, warn};

/// Default number of changes the intake queue holds between two blocks.
pub const DEFAULT_INTAKE_CAPACITY: usize = 1024;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Capacity of the intake queue. Scheduling fails fast once it is full.
    pub intake_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
        }
    }
}

impl SchedulerConfig {
    pub fn with_intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity;
        self
    }
}

/// What a block boundary released.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    /// The height that was finalized.
    pub height: BlockHeight,
    /// Updates due at `height`, in arrival order.
    pub validators: Vec<Validator>,
    /// Changes drained after their own height had been finalized.
    pub late_arrivals: usize,
    /// Updates discarded because their height has passed.
    pub expired_updates: usize,
}

impl AppliedChanges {
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

/// Pending validator changes, keyed by the height they take effect at.
///
/// Owned by the protocol-callback path; access is serialized, so the table is
/// a plain `BTreeMap`. Only the height cursor and the intake queue are shared
/// with [`SchedulerHandle`]s.
#[derive(Debug)]
pub struct ValidatorScheduler {
    /// Merged updates per height, all strictly above `last_height` between
    /// two calls to `on_end_block`.
    pending: BTreeMap<BlockHeight, Vec<Validator>>,

    /// Last finalized height. Written here only.
    last_height: Arc<AtomicU64>,

    /// Changes accepted by handles but not yet merged.
    intake: mpsc::Receiver<ValidatorSetChange>,
}

impl ValidatorScheduler {
    /// Create a scheduler starting at height 0, with its first handle.
    pub fn new(config: SchedulerConfig) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(config.intake_capacity.max(1));
        let last_height = Arc::new(AtomicU64::new(BlockHeight::GENESIS.0));

        let scheduler = Self {
            pending: BTreeMap::new(),
            last_height: Arc::clone(&last_height),
            intake: rx,
        };

        (scheduler, SchedulerHandle::new(tx, last_height))
    }

    /// The last finalized height.
    pub fn last_height(&self) -> BlockHeight {
        BlockHeight(self.last_height.load(Ordering::Acquire))
    }

    /// Number of heights with merged, unreleased updates.
    pub fn pending_heights(&self) -> usize {
        self.pending.len()
    }

    /// Merged updates waiting for `height`, if any.
    pub fn pending_at(&self, height: BlockHeight) -> Option<&[Validator]> {
        self.pending.get(&height).map(Vec::as_slice)
    }

    /// Handle a finalized block.
    ///
    /// Advances the height cursor, drains every queued change into the table
    /// without waiting, then removes and returns the entry for `height`.
    /// Entries below `height` can never be released again and are purged.
    #[instrument(skip_all, fields(height = %height))]
    pub fn on_end_block(&mut self, height: BlockHeight) -> AppliedChanges {
        let previous = self.last_height();
        if height < previous {
            warn!(previous = %previous, "end block height went backwards, keeping cursor");
        } else {
            self.last_height.store(height.0, Ordering::Release);
        }

        let mut late_arrivals = 0;
        while let Ok(change) = self.intake.try_recv() {
            if change.scheduled_height < height {
                late_arrivals += 1;
                error!(
                    scheduled_height = %change.scheduled_height,
                    validators = ?change.validators,
                    "validator change arrived too late, discarding"
                );
            }
            self.merge(change);
        }

        let validators = self.pending.remove(&height).unwrap_or_default();

        let retained = self.pending.split_off(&height);
        let expired = std::mem::replace(&mut self.pending, retained);
        let expired_updates: usize = expired.values().map(Vec::len).sum();
        if !expired.is_empty() {
            warn!(
                heights = ?expired.keys().collect::<Vec<_>>(),
                updates = expired_updates,
                "dropped validator changes for finalized heights"
            );
        }

        if !validators.is_empty() {
            debug!(validators = ?validators, "submitting new validators");
        }

        AppliedChanges {
            height,
            validators,
            late_arrivals,
            expired_updates,
        }
    }

    /// Append `change` to the entry for its height.
    fn merge(&mut self, change: ValidatorSetChange) {
        self.pending
            .entry(change.scheduled_height)
            .or_default()
            .extend(change.validators);
    }
}
