//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Height of a finalized block.
///
/// Heights start at 1 for the first block; 0 means "no block finalized yet".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    /// The height before any block has been finalized.
    pub const GENESIS: BlockHeight = BlockHeight(0);

    /// The next height.
    pub fn next(self) -> Self {
        BlockHeight(self.0.saturating_add(1))
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlockHeight {
    fn from(height: u64) -> Self {
        BlockHeight(height)
    }
}
