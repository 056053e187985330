//! Validator set change scheduler.
//!
//! This crate implements the height-gated apply/merge/expire state machine
//! that lets operators schedule validator updates for a future block height.
//!
//! # Architecture
//!
//! The scheduler is split across two concurrency domains:
//!
//! - [`SchedulerHandle`] is cheap to clone and lives in the control plane.
//!   Any number of callers may [`schedule`](SchedulerHandle::schedule)
//!   concurrently. A change is checked against the last finalized height and
//!   pushed onto a bounded intake queue. Nothing else is shared.
//!
//! - [`ValidatorScheduler`] is owned by the protocol-callback path, which is
//!   strictly sequential. At every block boundary
//!   [`on_end_block`](ValidatorScheduler::on_end_block) advances the height,
//!   drains the intake queue into the pending table and releases the entry for
//!   the finalized height.
//!
//! ```text
//!  control plane (many)               protocol path (one)
//!  ┌──────────────────┐   intake   ┌──────────────────────────────┐
//!  │ SchedulerHandle  │──────────▶│ ValidatorScheduler            │
//!  │  schedule()      │  (bounded) │  pending: height -> [updates] │
//!  │  current_height()│◀──────────│  on_end_block(h) -> updates   │
//!  └──────────────────┘ last_height└──────────────────────────────┘
//! ```
//!
//! # Change lifecycle
//!
//! `Submitted` → `Rejected` (height already finalized) or `Queued` →
//! `Merged` → `Applied` (returned at its height) or `Expired` (arrived after
//! its height was finalized; logged and discarded).

mod error;
mod handle;
mod state;

pub use error::ScheduleError;
pub use handle::SchedulerHandle;
pub use state::{AppliedChanges, SchedulerConfig, ValidatorScheduler, DEFAULT_INTAKE_CAPACITY};
