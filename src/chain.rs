//! The append-only chain and its ownership-verified append protocol.

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::block::{Block, Entry, UnsealedBlock};
use crate::crypto;
use crate::error::{ChainError, Result, ValidationError};
use crate::ownership;

/// Blocks plus the index of the tail; guarded as one unit by [`Chain`].
#[derive(Debug)]
struct Ledger {
    blocks: Vec<Block>,
    /// `-1` until genesis exists.
    height: i64,
}

impl Ledger {
    fn empty() -> Self {
        Self {
            blocks: Vec::new(),
            height: -1,
        }
    }

    /// Seal `unsealed` on top of the current tail and push it.
    fn link(&mut self, unsealed: UnsealedBlock, time: i64) -> Block {
        let height = (self.height + 1) as u64;
        let previous_block_hash = self.blocks.last().map(|b| b.hash.clone());
        let block = unsealed.seal(height, previous_block_hash, time);
        self.blocks.push(block.clone());
        self.height += 1;
        block
    }

    /// Full scan from genesis to tail. Every defect is collected.
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = vec![];

        for (i, block) in self.blocks.iter().enumerate() {
            let index = i as u64;

            if !block.verify() {
                errors.push(ValidationError::HashMismatch {
                    height: index,
                    hash: block.hash.clone(),
                });
            }

            if block.height != index {
                errors.push(ValidationError::HeightMismatch {
                    index,
                    height: block.height,
                });
            }

            match i.checked_sub(1).map(|p| &self.blocks[p]) {
                Some(prev) => {
                    if block.previous_block_hash.as_deref() != Some(prev.hash.as_str()) {
                        errors.push(ValidationError::BrokenLink {
                            height: index,
                            expected: prev.hash.clone(),
                            found: block.previous_block_hash.clone(),
                        });
                    }
                }
                None => {
                    if let Some(prev) = &block.previous_block_hash {
                        errors.push(ValidationError::GenesisHasPredecessor(prev.clone()));
                    }
                }
            }
        }

        errors
    }
}

/// Shared handle to the ledger.
///
/// Appends hold the write lock across validate, link, seal and push, so two
/// writers can never observe the same tail. Lookups and validation share the
/// read lock.
#[derive(Debug)]
pub struct Chain {
    inner: RwLock<Ledger>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// Create a chain holding only the genesis block.
    pub fn new() -> Self {
        let mut ledger = Ledger::empty();
        // Nothing to validate against yet.
        let genesis = ledger.link(UnsealedBlock::genesis(), ownership::unix_now());
        info!(hash = %genesis.hash(), "genesis block created");
        Self {
            inner: RwLock::new(ledger),
        }
    }

    /// Index of the tail block.
    pub fn height(&self) -> i64 {
        self.inner.read().height
    }

    /// Message `address` must sign before submitting an entry.
    pub fn request_ownership_challenge(&self, address: &str) -> String {
        let message = ownership::challenge_message(address, ownership::unix_now());
        debug!(%address, "ownership challenge issued");
        message
    }

    /// Verify the signed challenge and append `payload` owned by `address`.
    pub fn submit_entry(
        &self,
        address: &str,
        message: &str,
        signature: &str,
        payload: Value,
    ) -> Result<Block> {
        if let Err(e) = ownership::ensure_fresh(message, ownership::unix_now()) {
            warn!(%address, error = %e, "submission rejected");
            return Err(e);
        }

        if !crypto::verify_message(address, message, signature) {
            warn!(%address, "submission rejected: bad signature");
            return Err(ChainError::SignatureInvalid);
        }

        let entry = Entry {
            data: payload,
            owner: address.to_string(),
        };
        self.append_block(UnsealedBlock::new(&entry)?)
    }

    fn append_block(&self, unsealed: UnsealedBlock) -> Result<Block> {
        let mut ledger = self.inner.write();

        let errors = ledger.validate();
        if !errors.is_empty() {
            error!(defects = errors.len(), "refusing to append to a corrupted chain");
            return Err(ChainError::ChainCorrupted(errors));
        }

        let block = ledger.link(unsealed, ownership::unix_now());
        info!(height = block.height(), hash = %block.hash(), "block appended");
        Ok(block)
    }

    pub fn block_by_height(&self, height: u64) -> Option<Block> {
        let ledger = self.inner.read();
        let index = usize::try_from(height).ok()?;
        ledger.blocks.get(index).cloned()
    }

    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.inner
            .read()
            .blocks
            .iter()
            .find(|b| b.hash == hash)
            .cloned()
    }

    /// `data` of every non-genesis entry owned by `address`, in chain order.
    pub fn stars_by_owner(&self, address: &str) -> Vec<Value> {
        let ledger = self.inner.read();
        let mut stars = vec![];

        for block in ledger.blocks.iter().filter(|b| !b.is_genesis()) {
            match block.decode_payload::<Entry>() {
                Ok(entry) if entry.owner == address => stars.push(entry.data),
                Ok(_) => {}
                Err(e) => {
                    warn!(height = block.height(), error = %e, "skipping undecodable block");
                }
            }
        }

        stars
    }

    /// Audit every block's self-hash and predecessor link. Empty means valid.
    pub fn validate_chain(&self) -> Vec<ValidationError> {
        self.inner.read().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::encode_payload;
    use crate::crypto::testing::{BitcoinWallet, Ed25519Wallet};
    use serde_json::json;
    use std::sync::Arc;

    fn submit(chain: &Chain, wallet: &BitcoinWallet, payload: Value) -> Result<Block> {
        let address = wallet.address();
        let message = chain.request_ownership_challenge(&address);
        let signature = wallet.sign(&message);
        chain.submit_entry(&address, &message, &signature, payload)
    }

    #[test]
    fn fresh_chain_holds_only_genesis() {
        let chain = Chain::new();
        assert_eq!(chain.height(), 0);

        let genesis = chain.block_by_height(0).unwrap();
        assert_eq!(genesis.height(), 0);
        assert_eq!(genesis.previous_block_hash(), None);
        assert!(chain.block_by_height(1).is_none());
        assert!(chain.validate_chain().is_empty());
    }

    #[test]
    fn challenge_starts_with_address() {
        let chain = Chain::new();
        let message = chain.request_ownership_challenge("addrA");
        assert!(message.starts_with("addrA:"));
        assert!(message.ends_with(":starRegistry"));
    }

    #[test]
    fn signed_submission_links_to_genesis() {
        let chain = Chain::new();
        let wallet = BitcoinWallet::generate();
        let genesis_hash = chain.block_by_height(0).unwrap().hash().to_string();

        let block = submit(&chain, &wallet, json!({ "dec": 1, "ra": 2 })).unwrap();

        assert_eq!(block.height(), 1);
        assert_eq!(block.previous_block_hash(), Some(genesis_hash.as_str()));
        assert!(block.verify());
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.block_by_hash(block.hash()), Some(block.clone()));

        let entry: Entry = block.decode_payload().unwrap();
        assert_eq!(entry.data, json!({ "dec": 1, "ra": 2 }));
        assert_eq!(entry.owner, wallet.address());
        assert!(chain.validate_chain().is_empty());
    }

    #[test]
    fn expired_challenge_is_rejected_without_growth() {
        let chain = Chain::new();
        let wallet = BitcoinWallet::generate();
        submit(&chain, &wallet, json!({ "dec": 1, "ra": 2 })).unwrap();

        let address = wallet.address();
        let stale = ownership::challenge_message(&address, ownership::unix_now() - 8 * 60);
        let signature = wallet.sign(&stale);
        let err = chain
            .submit_entry(&address, &stale, &signature, json!({ "dec": 1, "ra": 2 }))
            .unwrap_err();

        assert!(matches!(err, ChainError::ChallengeExpired { .. }));
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn minimum_timestamp_challenge_is_expired() {
        let chain = Chain::new();
        let wallet = BitcoinWallet::generate();
        let address = wallet.address();
        let message = ownership::challenge_message(&address, i64::MIN);

        let err = chain
            .submit_entry(&address, &message, &wallet.sign(&message), json!(1))
            .unwrap_err();

        assert!(matches!(err, ChainError::ChallengeExpired { .. }));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let chain = Chain::new();
        let owner = BitcoinWallet::generate();
        let intruder = BitcoinWallet::generate();
        let address = owner.address();
        let message = chain.request_ownership_challenge(&address);

        let err = chain
            .submit_entry(&address, &message, &intruder.sign(&message), json!("star"))
            .unwrap_err();

        assert!(matches!(err, ChainError::SignatureInvalid));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn malformed_challenge_is_rejected() {
        let chain = Chain::new();
        let wallet = BitcoinWallet::generate();
        let err = chain
            .submit_entry(&wallet.address(), "garbage", &wallet.sign("garbage"), json!(1))
            .unwrap_err();
        assert!(matches!(err, ChainError::MalformedChallenge(_)));
    }

    #[test]
    fn stars_are_filtered_by_owner_in_order() {
        let chain = Chain::new();
        let a = BitcoinWallet::generate();
        let b = BitcoinWallet::generate();

        submit(&chain, &a, json!({ "star": "first" })).unwrap();
        submit(&chain, &b, json!({ "star": "other" })).unwrap();
        submit(&chain, &a, json!({ "star": "second" })).unwrap();

        assert_eq!(
            chain.stars_by_owner(&a.address()),
            vec![json!({ "star": "first" }), json!({ "star": "second" })]
        );
        assert_eq!(chain.stars_by_owner(&b.address()), vec![json!({ "star": "other" })]);
        assert!(chain.stars_by_owner("nobody").is_empty());
        assert!(chain.stars_by_owner("Genesis Block").is_empty());
    }

    #[test]
    fn tampered_body_yields_one_hash_mismatch() {
        let chain = Chain::new();
        let wallet = BitcoinWallet::generate();
        for i in 0..3 {
            submit(&chain, &wallet, json!({ "n": i })).unwrap();
        }

        chain.inner.write().blocks[2].body =
            encode_payload(&json!({ "data": { "n": 99 }, "owner": wallet.address() })).unwrap();

        let errors = chain.validate_chain();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::HashMismatch { height: 2, .. }
        ));
    }

    #[test]
    fn tampered_hash_breaks_the_next_link() {
        let chain = Chain::new();
        let wallet = BitcoinWallet::generate();
        submit(&chain, &wallet, json!(1)).unwrap();
        submit(&chain, &wallet, json!(2)).unwrap();

        chain.inner.write().blocks[1].hash = "00".repeat(32);

        let errors = chain.validate_chain();
        assert_eq!(errors.iter().filter(|e| e.is_hash_mismatch()).count(), 1);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::BrokenLink { height: 2, .. })));
    }

    #[test]
    fn validation_covers_the_tail_block() {
        let chain = Chain::new();
        let wallet = BitcoinWallet::generate();
        submit(&chain, &wallet, json!(1)).unwrap();

        chain.inner.write().blocks[1].time += 1;

        let errors = chain.validate_chain();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::HashMismatch { height: 1, .. }
        ));
    }

    #[test]
    fn corrupted_chain_refuses_appends() {
        let chain = Chain::new();
        let wallet = BitcoinWallet::generate();
        submit(&chain, &wallet, json!(1)).unwrap();

        chain.inner.write().blocks[1].height = 7;

        let err = submit(&chain, &wallet, json!(2)).unwrap_err();
        match err {
            ChainError::ChainCorrupted(defects) => {
                assert!(defects.iter().any(|d| d.is_hash_mismatch()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.inner.read().blocks.len(), 2);
    }

    #[test]
    fn ed25519_owner_can_submit() {
        let chain = Chain::new();
        let wallet = Ed25519Wallet::generate();
        let address = wallet.address();
        let message = chain.request_ownership_challenge(&address);

        let block = chain
            .submit_entry(&address, &message, &wallet.sign(&message), json!({ "ra": 3 }))
            .unwrap();

        assert_eq!(block.height(), 1);
        assert_eq!(chain.stars_by_owner(&address), vec![json!({ "ra": 3 })]);
    }

    #[test]
    fn concurrent_submissions_keep_linkage() {
        let chain = Arc::new(Chain::new());

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let chain = Arc::clone(&chain);
                scope.spawn(move || {
                    let wallet = Ed25519Wallet::generate();
                    let address = wallet.address();
                    for n in 0..5 {
                        let message = chain.request_ownership_challenge(&address);
                        chain
                            .submit_entry(&address, &message, &wallet.sign(&message), json!(n))
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(chain.height(), 20);
        assert!(chain.validate_chain().is_empty());
        for h in 0..=20u64 {
            assert_eq!(chain.block_by_height(h).unwrap().height(), h);
        }
    }
}
