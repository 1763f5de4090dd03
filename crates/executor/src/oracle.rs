//! The pre-image oracle interface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error returned by a [`PreimageOracle`] backend.
///
/// Oracle failures surface as the same fatal revert as a bad memory proof:
/// the step is not attributable to the guest, so no state hash is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("pre-image oracle: {0}")]
pub struct OracleError(pub String);

/// A content-addressed pre-image store, queried 32 bytes at a time.
///
/// The oracle is an external, read-only collaborator. The fraud-proof
/// protocol treats it as a pure function of `(key, offset)`, which is what
/// keeps the step deterministic.
pub trait PreimageOracle {
    /// Read up to 32 bytes of the pre-image of `key`, starting at `offset`.
    ///
    /// Returns the chunk left-aligned in a 32-byte array together with the
    /// number of bytes actually available. A length of zero signals EOF at
    /// that offset; `chunk[length..]` is irrelevant.
    ///
    /// # Errors
    ///
    /// Implementations return [`OracleError`] when the pre-image for `key`
    /// cannot be resolved.
    fn read(&self, key: &[u8; 32], offset: u64) -> Result<([u8; 32], u8), OracleError>;
}
