//! Ledger blocks: payload encoding, sealing and tamper detection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ChainError, Result};

pub const GENESIS_DATA: &str = "Genesis Block";

/// Payload stored in every block appended through an ownership-verified
/// submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub data: serde_json::Value,
    pub owner: String,
}

/// A block whose payload is fixed but whose linkage is not yet known.
///
/// The only way to obtain a [`Block`] is to [`seal`](UnsealedBlock::seal)
/// one of these, so a block is hashed exactly once.
#[derive(Debug, Clone)]
pub struct UnsealedBlock {
    body: String,
}

impl UnsealedBlock {
    /// Encode `payload` into a fresh, unsealed block body.
    pub fn new<T: Serialize + ?Sized>(payload: &T) -> Result<Self> {
        Ok(Self {
            body: encode_payload(payload)?,
        })
    }

    /// The sentinel payload every chain starts from.
    pub fn genesis() -> Self {
        let payload = serde_json::json!({ "data": GENESIS_DATA });
        Self {
            body: hex::encode(payload.to_string()),
        }
    }

    /// Fix the linkage fields and stamp the digest over them.
    pub fn seal(self, height: u64, previous_block_hash: Option<String>, time: i64) -> Block {
        let hash = compute_block_hash(
            height,
            &self.body,
            time,
            previous_block_hash.as_deref(),
        );
        Block {
            hash,
            height,
            body: self.body,
            time,
            previous_block_hash,
        }
    }
}

/// A sealed ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// SHA-256 hex over every other field.
    pub(crate) hash: String,
    /// Position in the chain; 0 is genesis.
    pub(crate) height: u64,
    /// Hex of the JSON-serialized payload.
    pub(crate) body: String,
    /// UNIX seconds at insertion.
    pub(crate) time: i64,
    /// Hash of the preceding block; `None` only for genesis.
    pub(crate) previous_block_hash: Option<String>,
}

impl Block {
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn previous_block_hash(&self) -> Option<&str> {
        self.previous_block_hash.as_deref()
    }

    /// Genesis is the only block without a predecessor.
    pub fn is_genesis(&self) -> bool {
        self.previous_block_hash.is_none()
    }

    /// Recompute the digest over the current fields and compare it with the
    /// stored hash. Any mutation after sealing makes this return `false`.
    pub fn verify(&self) -> bool {
        let recomputed = compute_block_hash(
            self.height,
            &self.body,
            self.time,
            self.previous_block_hash.as_deref(),
        );
        recomputed == self.hash
    }

    /// Decode the stored payload.
    ///
    /// Fails with [`ChainError::GenesisData`] on the genesis block, whose
    /// payload is a sentinel rather than user data.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T> {
        if self.is_genesis() {
            return Err(ChainError::GenesisData);
        }
        decode_body(&self.body)
    }
}

/// Hex-encode the JSON serialization of `payload`.
pub fn encode_payload<T: Serialize + ?Sized>(payload: &T) -> Result<String> {
    let json = serde_json::to_vec(payload).map_err(|e| ChainError::Payload(e.to_string()))?;
    Ok(hex::encode(json))
}

fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    let json = hex::decode(body).map_err(|e| ChainError::Payload(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| ChainError::Payload(e.to_string()))
}

/// SHA-256 hex over height, body, time and predecessor.
///
/// The body is length-prefixed and the predecessor carries a presence tag,
/// so distinct field sets never produce the same byte stream.
pub fn compute_block_hash(
    height: u64,
    body: &str,
    time: i64,
    previous_block_hash: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(height.to_le_bytes());
    hasher.update((body.len() as u64).to_le_bytes());
    hasher.update(body.as_bytes());
    hasher.update(time.to_le_bytes());
    match previous_block_hash {
        Some(prev) => {
            hasher.update([1u8]);
            hasher.update(prev.as_bytes());
        }
        None => hasher.update([0u8]),
    }
    hex::encode(hasher.finalize())
}
