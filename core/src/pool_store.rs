//! Pool & Price Store (C3).
//!
//! Process-wide singleton maps, keyed by pool address / token symbol.
//! `dashmap` gives per-shard locking so readers never block on writes to an
//! unrelated key; a lookup always returns either the pre-update or the
//! post-update record, never a torn one, because each slot is replaced
//! wholesale rather than mutated field by field.

use dashmap::DashMap;

use crate::types::{Pool, Price};

#[derive(Default)]
pub struct PoolStore {
    pools: DashMap<String, Pool>,
    /// Secondary index: token -> pool addresses quoting it, for
    /// `pools_for_token`.
    by_token: DashMap<String, Vec<String>>,
}

impl PoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_pool(&self, pool: Pool) {
        let address = pool.address.clone();
        for token in [pool.token_a.clone(), pool.token_b.clone()] {
            let mut entry = self.by_token.entry(token).or_default();
            if !entry.contains(&address) {
                entry.push(address.clone());
            }
        }
        self.pools.insert(address, pool);
    }

    pub fn pool(&self, address: &str) -> Option<Pool> {
        self.pools.get(address).map(|p| p.clone())
    }

    pub fn pools_for_token(&self, token: &str) -> Vec<Pool> {
        let Some(addresses) = self.by_token.get(token) else {
            return Vec::new();
        };
        addresses
            .iter()
            .filter_map(|addr| self.pools.get(addr).map(|p| p.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[derive(Default)]
pub struct PriceStore {
    prices: DashMap<String, Price>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_price(&self, price: Price) {
        self.prices.insert(price.token.clone(), price);
    }

    pub fn price_of(&self, token: &str) -> Option<Price> {
        self.prices.get(token).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }
}
