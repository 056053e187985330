//! Shared state for RPC handlers.

use abci_proxy_scheduler::SchedulerHandle;
use std::time::Instant;

/// Shared state for RPC handlers.
#[derive(Debug, Clone)]
pub struct RpcState {
    /// Submission side of the validator change scheduler.
    pub scheduler: SchedulerHandle,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl RpcState {
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self {
            scheduler,
            start_time: Instant::now(),
        }
    }
}
