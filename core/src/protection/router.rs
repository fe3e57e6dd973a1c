//! Protection Router (C8): strategy selection, relay submission, cost gating.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::bundle::{Bundle, BundleBuilder, BundleTransaction};
use super::relay::RelayRegistry;
use super::strategy::{fallback_order, select_strategy, Chain, ProtectionLevel, Strategy};
use crate::config::{ProtectionConfig, StealthConfig};
use crate::interfaces::Relay;
use crate::types::{OpportunityType, Transaction};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionResult {
    pub successful: bool,
    pub protection_applied: bool,
    pub strategy_used: Option<String>,
    pub bundle_id: Option<String>,
    pub protection_cost_usd: Decimal,
    pub gas_overhead_usd: Decimal,
    pub relay_fee_usd: Decimal,
    pub timing_delay_cost_usd: Decimal,
    pub error_message: Option<String>,
}

impl ProtectionResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            successful: false,
            protection_applied: false,
            strategy_used: None,
            bundle_id: None,
            protection_cost_usd: Decimal::ZERO,
            gas_overhead_usd: Decimal::ZERO,
            relay_fee_usd: Decimal::ZERO,
            timing_delay_cost_usd: Decimal::ZERO,
            error_message: Some(message.into()),
        }
    }
}

/// Per-strategy fixed cost assumptions. A production router would source
/// these from live gas estimation; the core only needs a monotonic model
/// so the cost ceiling check in §4.8 behaves sensibly.
fn cost_model(strategy: Strategy, eth_price_usd: Decimal) -> (Decimal, Decimal, Decimal) {
    let gas_overhead_eth = match strategy {
        Strategy::BundleSubmission | Strategy::StealthMode => dec!(0.0015),
        Strategy::FlashbotsProtect | Strategy::JitoBundle => dec!(0.0010),
        Strategy::PrivateMempool => dec!(0.0002),
        Strategy::TimingRandomization => dec!(0.0001),
    };
    let relay_fee_usd = match strategy {
        Strategy::BundleSubmission | Strategy::FlashbotsProtect | Strategy::JitoBundle | Strategy::StealthMode => dec!(1.5),
        Strategy::PrivateMempool | Strategy::TimingRandomization => Decimal::ZERO,
    };
    (gas_overhead_eth * eth_price_usd, relay_fee_usd, Decimal::ZERO)
}

pub struct ProtectionRouter {
    config: ProtectionConfig,
    stealth: StealthConfig,
    relays: RelayRegistry,
    chain_relay_ids: HashMap<Strategy, Vec<String>>,
}

/// Relay excluded after this many consecutive failures.
const MAX_CONSECUTIVE_FAILURES: u32 = 2;
/// Backoff before a failing relay is reconsidered.
const RELAY_BACKOFF_NS: u64 = 60_000_000_000;

impl ProtectionRouter {
    pub fn new(config: ProtectionConfig, stealth: StealthConfig) -> Self {
        let mut chain_relay_ids = HashMap::new();
        chain_relay_ids.insert(Strategy::FlashbotsProtect, config.relays.flashbots.clone());
        chain_relay_ids.insert(Strategy::JitoBundle, config.relays.jito.clone());
        chain_relay_ids.insert(Strategy::PrivateMempool, config.private_mempool_urls.clone());
        Self {
            config,
            stealth,
            relays: RelayRegistry::new(MAX_CONSECUTIVE_FAILURES, RELAY_BACKOFF_NS),
            chain_relay_ids,
        }
    }

    pub fn relay_health(&self) -> &RelayRegistry {
        &self.relays
    }

    fn relay_ids_for(&self, strategy: Strategy) -> Vec<String> {
        self.chain_relay_ids.get(&strategy).cloned().unwrap_or_default()
    }

    /// Attempts `strategy` against each of its configured, currently
    /// reachable relays in order. Returns the successful relay id and
    /// submission id, or `None` if every candidate failed or none were
    /// reachable.
    async fn try_strategy(
        &self,
        strategy: Strategy,
        tx: &Transaction,
        relays_by_id: &HashMap<String, Arc<dyn Relay>>,
        now_ns: u64,
    ) -> Option<(String, String)> {
        let candidates = self.relay_ids_for(strategy);
        let reachable = self.relays.reachable(&candidates, now_ns);

        for relay_id in reachable {
            let Some(relay) = relays_by_id.get(relay_id) else {
                continue;
            };
            let payload = build_payload(strategy, tx);
            let result = match strategy {
                Strategy::PrivateMempool => relay.submit_private(&payload).await,
                _ => relay.submit_bundle(&payload).await,
            };
            match result {
                Ok(submission_id) => {
                    self.relays.record_success(relay_id, now_ns);
                    return Some((relay_id.to_string(), submission_id));
                }
                Err(err) => {
                    warn!(relay = relay_id, error = %err, "relay submission failed");
                    self.relays.record_failure(relay_id, now_ns);
                }
            }
        }
        None
    }

    /// Selects and executes a protection strategy for `tx`, falling back
    /// through `preferred_strategies` (ending at `BundleSubmission`) if the
    /// primary strategy's relays are all unreachable or fail, and refusing
    /// to execute any strategy whose modeled cost exceeds
    /// `max_protection_cost_usd`.
    pub async fn protect(
        &self,
        tx: &Transaction,
        opportunity_type: OpportunityType,
        chain: Chain,
        level: ProtectionLevel,
        relays_by_id: &HashMap<String, Arc<dyn Relay>>,
        eth_price_usd: Decimal,
        now_ns: u64,
    ) -> ProtectionResult {
        if !self.config.enable_protection {
            return ProtectionResult::failure("protection disabled");
        }

        let primary = select_strategy(
            opportunity_type,
            chain,
            level,
            &self.config.preferred_strategies,
            self.stealth.stealth_enabled,
        );

        let mut candidates = vec![primary];
        candidates.extend(fallback_order(primary, &self.config.preferred_strategies));

        for strategy in candidates {
            let (gas_overhead_usd, relay_fee_usd, timing_delay_cost_usd) = match strategy {
                Strategy::TimingRandomization => {
                    let max_delay_ms = self.stealth.max_timing_delay.as_millis().max(100) as u64;
                    let delay_ms = rand::thread_rng().gen_range(100..=max_delay_ms);
                    let (gas, fee, _) = cost_model(strategy, eth_price_usd);
                    (gas, fee, opportunity_cost_for_delay(Duration::from_millis(delay_ms)))
                }
                _ => cost_model(strategy, eth_price_usd),
            };
            let total_cost = gas_overhead_usd + relay_fee_usd + timing_delay_cost_usd;

            if total_cost > self.config.max_protection_cost_usd {
                continue;
            }

            if strategy == Strategy::TimingRandomization {
                return ProtectionResult {
                    successful: true,
                    protection_applied: true,
                    strategy_used: Some(strategy.as_str().to_string()),
                    bundle_id: None,
                    protection_cost_usd: total_cost,
                    gas_overhead_usd,
                    relay_fee_usd,
                    timing_delay_cost_usd,
                    error_message: None,
                };
            }

            if let Some((_, submission_id)) = self.try_strategy(strategy, tx, relays_by_id, now_ns).await {
                return ProtectionResult {
                    successful: true,
                    protection_applied: true,
                    strategy_used: Some(strategy.as_str().to_string()),
                    bundle_id: Some(submission_id),
                    protection_cost_usd: total_cost,
                    gas_overhead_usd,
                    relay_fee_usd,
                    timing_delay_cost_usd,
                    error_message: None,
                };
            }
        }

        error!(tx = %tx.hash, "all protection strategies exhausted");
        ProtectionResult::failure("no relay reachable for any candidate strategy")
    }

    /// Builds the bundle that would be submitted for `BundleSubmission` /
    /// `StealthMode`, including a decoy transaction when stealth is active.
    pub fn build_bundle(&self, tx: &Transaction, target_block: u64, stealth: bool) -> Bundle {
        let mut builder = BundleBuilder::new(target_block).add_transaction(tx_to_bundle_tx(tx));
        if stealth {
            builder = builder.add_decoy(decoy_tx(tx));
        }
        builder.build()
    }
}

fn build_payload(strategy: Strategy, tx: &Transaction) -> Vec<u8> {
    match strategy {
        Strategy::PrivateMempool => tx.hash.as_bytes().to_vec(),
        _ => serde_json::to_vec(tx).unwrap_or_default(),
    }
}

fn tx_to_bundle_tx(tx: &Transaction) -> BundleTransaction {
    BundleTransaction {
        to: tx.to.clone(),
        data_hex: hex_encode(&tx.data_blob),
        value: tx.value,
        gas_limit: tx.gas_limit,
        max_fee_per_gas: tx.gas_price_wei,
        max_priority_fee_per_gas: tx.gas_price_wei / 10,
    }
}

fn decoy_tx(tx: &Transaction) -> BundleTransaction {
    BundleTransaction {
        to: tx.to.clone(),
        data_hex: String::new(),
        value: Decimal::ZERO,
        gas_limit: 21_000,
        max_fee_per_gas: tx.gas_price_wei,
        max_priority_fee_per_gas: tx.gas_price_wei / 10,
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Opportunity cost of delaying submission: a nominal $0.01 per 100ms,
/// scaling the timing-randomization strategy's cost with how long it waits.
fn opportunity_cost_for_delay(delay: Duration) -> Decimal {
    let tenths_of_second = Decimal::from(delay.as_millis() as u64) / dec!(100);
    tenths_of_second * dec!(0.01)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::fakes::FlakyRelay;
    use crate::types::Transaction;

    fn sample_tx() -> Transaction {
        Transaction {
            hash: "victim".to_string(),
            from: "f".to_string(),
            to: "router".to_string(),
            value: dec!(0),
            gas_limit: 150_000,
            gas_price_wei: 40_000_000_000,
            data_blob: vec![1, 2, 3, 4],
            block_number: None,
            observed_at_ns: 1,
            mempool_position: None,
            decoded: None,
        }
    }

    fn config() -> ProtectionConfig {
        let mut config = ProtectionConfig::default();
        config.relays.flashbots = vec!["flashbots".to_string()];
        config.relays.jito = vec!["jito".to_string()];
        config.private_mempool_urls = vec!["eden".to_string()];
        config.preferred_strategies = vec!["PrivateMempool".to_string(), "BundleSubmission".to_string()];
        config.max_protection_cost_usd = dec!(50);
        config
    }

    #[tokio::test]
    async fn scenario_six_flashbots_failure_falls_back_to_private_mempool() {
        let router = ProtectionRouter::new(config(), crate::config::StealthConfig::default());
        let mut relays: HashMap<String, Arc<dyn Relay>> = HashMap::new();
        relays.insert("flashbots".to_string(), Arc::new(FlakyRelay::new("flashbots", 2)));
        relays.insert("eden".to_string(), Arc::new(FlakyRelay::new("eden", 0)));

        let result = router
            .protect(
                &sample_tx(),
                OpportunityType::Sandwich,
                Chain::Ethereum,
                ProtectionLevel::Standard,
                &relays,
                dec!(2000),
                0,
            )
            .await;

        assert!(result.successful);
        assert_eq!(result.strategy_used.as_deref(), Some("PrivateMempool"));
        assert!(result.protection_cost_usd <= dec!(50));
    }

    #[tokio::test]
    async fn all_relays_unreachable_reports_failure() {
        let router = ProtectionRouter::new(config(), crate::config::StealthConfig::default());
        let mut relays: HashMap<String, Arc<dyn Relay>> = HashMap::new();
        relays.insert("flashbots".to_string(), Arc::new(FlakyRelay::new("flashbots", 99)));
        relays.insert("eden".to_string(), Arc::new(FlakyRelay::new("eden", 99)));

        let result = router
            .protect(
                &sample_tx(),
                OpportunityType::Sandwich,
                Chain::Ethereum,
                ProtectionLevel::Standard,
                &relays,
                dec!(2000),
                0,
            )
            .await;

        assert!(!result.successful);
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn maximum_level_forces_bundle_submission() {
        let router = ProtectionRouter::new(config(), crate::config::StealthConfig::default());
        let mut relays: HashMap<String, Arc<dyn Relay>> = HashMap::new();
        relays.insert("eden".to_string(), Arc::new(FlakyRelay::new("eden", 0)));

        let result = router
            .protect(
                &sample_tx(),
                OpportunityType::Frontrun,
                Chain::Ethereum,
                ProtectionLevel::Maximum,
                &relays,
                dec!(2000),
                0,
            )
            .await;

        // No relay registered for BundleSubmission in this config, so it
        // should fail over to the configured PrivateMempool fallback.
        assert_eq!(result.strategy_used.as_deref(), Some("PrivateMempool"));
    }

    #[test]
    fn build_bundle_with_stealth_includes_decoy() {
        let router = ProtectionRouter::new(config(), crate::config::StealthConfig::default());
        let bundle = router.build_bundle(&sample_tx(), 100, true);
        assert_eq!(bundle.transaction_count(), 2);
    }
}
