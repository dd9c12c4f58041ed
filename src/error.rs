//! Error taxonomy for ledger operations.

use thiserror::Error;

/// Failures raised by [`Chain`](crate::chain::Chain) and
/// [`Block`](crate::block::Block) operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The signed challenge is older than the freshness window.
    #[error("ownership challenge expired: issued at {issued_at}, now {now}")]
    ChallengeExpired { issued_at: i64, now: i64 },

    /// The challenge message does not carry a parsable timestamp.
    #[error("malformed ownership challenge: {0}")]
    MalformedChallenge(String),

    /// The signature was not produced by the address over the challenge.
    #[error("signature does not match address and message")]
    SignatureInvalid,

    /// Pre-append validation found defects; the append was refused.
    #[error("can not add blocks to an invalid chain ({} defect(s))", .0.len())]
    ChainCorrupted(Vec<ValidationError>),

    /// The genesis payload is a sentinel, not user data.
    #[error("unable to get data for the genesis block")]
    GenesisData,

    /// A payload could not be encoded into, or decoded out of, a block body.
    #[error("payload encoding error: {0}")]
    Payload(String),
}

/// One defect found by a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The stored hash does not match the block's content.
    #[error("invalid block hash detected at height {height}: {hash}")]
    HashMismatch { height: u64, hash: String },

    /// `previousBlockHash` does not point at the preceding block.
    #[error("invalid previousBlockHash at height {height}: expected {expected}, found {found:?}")]
    BrokenLink {
        height: u64,
        expected: String,
        found: Option<String>,
    },

    /// The genesis block claims a predecessor.
    #[error("genesis previousBlockHash should be empty, found {0}")]
    GenesisHasPredecessor(String),

    /// A block's recorded height disagrees with its position.
    #[error("block at index {index} records height {height}")]
    HeightMismatch { index: u64, height: u64 },
}

impl ValidationError {
    pub fn is_hash_mismatch(&self) -> bool {
        matches!(self, ValidationError::HashMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
