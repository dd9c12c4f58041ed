//! In-memory, hash-linked ledger of wallet-owned star entries.
//!
//! A [`Chain`] starts from a genesis block and grows only through
//! [`Chain::submit_entry`], which requires a fresh ownership challenge
//! signed by the submitting wallet. Every append first re-validates the
//! whole chain and refuses to build on a corrupted one.

pub mod block;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod ownership;
pub mod routes;

pub use block::{Block, Entry, UnsealedBlock};
pub use chain::Chain;
pub use error::{ChainError, ValidationError};
