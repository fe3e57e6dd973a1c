//! Bundle construction for protected transaction submission.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleTransaction {
    pub to: String,
    pub data_hex: String,
    pub value: Decimal,
    pub gas_limit: u64,
    pub max_fee_per_gas: u64,
    pub max_priority_fee_per_gas: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub transactions: Vec<BundleTransaction>,
    pub target_block: u64,
    pub max_timestamp: Option<u64>,
    pub min_timestamp: Option<u64>,
    pub reverting_hashes: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl Bundle {
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn estimate_gas(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.gas_limit).sum()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

pub struct BundleBuilder {
    bundle: Bundle,
}

impl BundleBuilder {
    pub fn new(target_block: u64) -> Self {
        Self {
            bundle: Bundle {
                transactions: Vec::new(),
                target_block,
                max_timestamp: None,
                min_timestamp: None,
                reverting_hashes: Vec::new(),
                metadata: HashMap::new(),
            },
        }
    }

    pub fn add_transaction(mut self, tx: BundleTransaction) -> Self {
        self.bundle.transactions.push(tx);
        self
    }

    /// Appends a no-op decoy transaction, used by stealth-mode submission to
    /// obscure the real transaction's position within the bundle.
    pub fn add_decoy(mut self, decoy: BundleTransaction) -> Self {
        self.bundle.transactions.push(decoy);
        self
    }

    pub fn set_timestamp_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.bundle.min_timestamp = min;
        self.bundle.max_timestamp = max;
        self
    }

    pub fn allow_reverting(mut self, tx_hash: String) -> Self {
        self.bundle.reverting_hashes.push(tx_hash);
        self
    }

    pub fn add_metadata(mut self, key: String, value: String) -> Self {
        self.bundle.metadata.insert(key, value);
        self
    }

    pub fn build(self) -> Bundle {
        self.bundle
    }
}
