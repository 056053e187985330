//! Validator update types.

use crate::{BlockHeight, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single validator power update.
///
/// The key is opaque to the proxy; a power of 0 turns the validator into an
/// observer.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Validator {
    /// Type-prefixed public key bytes.
    #[serde(with = "crate::serde_hex")]
    pub pub_key: Vec<u8>,

    /// New voting power.
    pub power: u64,
}

impl Validator {
    /// Create an update for the given key.
    pub fn new(pub_key: &PublicKey, power: u64) -> Self {
        Self {
            pub_key: pub_key.to_bytes(),
            power,
        }
    }

    /// Whether this update removes the validator from consensus.
    pub fn is_observer(&self) -> bool {
        self.power == 0
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("pub_key", &hex::encode(&self.pub_key))
            .field("power", &self.power)
            .finish()
    }
}

/// An ordered list of validator updates that must be reported at exactly
/// `scheduled_height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSetChange {
    /// Updates, applied in order by the application.
    pub validators: Vec<Validator>,

    /// Height whose end-block response must carry the updates.
    pub scheduled_height: BlockHeight,
}

impl ValidatorSetChange {
    pub fn new(validators: Vec<Validator>, scheduled_height: BlockHeight) -> Self {
        Self {
            validators,
            scheduled_height,
        }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
