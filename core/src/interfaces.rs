//! External interfaces consumed by the core (§6 "Consumed").
//!
//! These are narrow async traits the core depends on but never implements
//! itself — a chain RPC client, a set of relay adapters, and an optional
//! price oracle. Concrete drivers live outside this crate; tests use the
//! in-memory fakes below.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::CoreResult;
use crate::types::Transaction;

#[async_trait]
pub trait ChainNode: Send + Sync {
    async fn fetch_pending_txs(&self) -> CoreResult<Vec<Transaction>>;
    async fn submit_raw(&self, tx_bytes: &[u8]) -> CoreResult<String>;
}

#[async_trait]
pub trait Relay: Send + Sync {
    /// Submits an atomic bundle, returning the relay-assigned bundle id.
    async fn submit_bundle(&self, bundle_bytes: &[u8]) -> CoreResult<String>;
    /// Submits a single raw transaction to a private mempool.
    async fn submit_private(&self, tx_bytes: &[u8]) -> CoreResult<String>;
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn spot(&self, token: &str) -> CoreResult<Option<Decimal>>;
}
