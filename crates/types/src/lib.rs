//! Core types for the ABCI validator proxy.
//!
//! This crate provides the foundational types shared by the scheduler and the
//! production proxy:
//!
//! - **Identifiers**: `BlockHeight`
//! - **Keys**: `PublicKey` with its JSON and type-prefixed byte encodings
//! - **Validator updates**: `Validator`, `ValidatorSetChange`
//! - **Protocol messages**: the ABCI request/response set in [`abci`]
//!
//! It does not depend on any other workspace crate.

pub mod abci;
mod crypto;
mod identifiers;
pub mod serde_hex;
mod validator;

pub use crypto::{KeyError, PublicKey, ED25519_TYPE_BYTE, SECP256K1_TYPE_BYTE};
pub use identifiers::BlockHeight;
pub use validator::{Validator, ValidatorSetChange};
