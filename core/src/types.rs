//! Shared domain types (§3 Data Model).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A pending or observed blockchain transaction. Immutable once constructed;
/// derived fields are computed eagerly at decode time rather than lazily,
/// since the source data is already in hand by the time a `Transaction` is
/// built from wire bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: Decimal,
    pub gas_limit: u64,
    pub gas_price_wei: u64,
    pub data_blob: Vec<u8>,
    pub block_number: Option<u64>,
    pub observed_at_ns: u64,
    pub mempool_position: Option<u64>,

    /// Decoded DEX swap intent, when `data_blob` is recognized.
    pub decoded: Option<DecodedSwap>,
}

impl Transaction {
    /// First 4 bytes of `data_blob`, the ABI function selector.
    pub fn function_selector(&self) -> Option<[u8; 4]> {
        if self.data_blob.len() < 4 {
            return None;
        }
        let mut sel = [0u8; 4];
        sel.copy_from_slice(&self.data_blob[0..4]);
        Some(sel)
    }

    pub fn is_dex(&self) -> bool {
        self.decoded.is_some()
    }

    pub fn value_usd(&self, token_price_usd: Decimal) -> Decimal {
        self.value * token_price_usd
    }
}

/// Decoded swap intent for a DEX-routed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedSwap {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub amount_out_min: Decimal,
    pub pool_address: String,
    pub slippage_bps: u32,
}

/// Pool reserve/fee snapshot, keyed by `address` in the Pool Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub address: String,
    pub dex_name: String,
    pub token_a: String,
    pub token_b: String,
    pub reserve_a: Decimal,
    pub reserve_b: Decimal,
    pub mid_price: Decimal,
    pub liquidity: Decimal,
    pub fee_bps: u32,
    pub last_updated_ns: u64,
}

/// USD price for a token, with a per-DEX breakdown and realized volatility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub token: String,
    pub usd_price: Decimal,
    pub per_dex_prices: HashMap<String, Decimal>,
    pub volatility: f64,
    pub last_updated_ns: u64,
}

/// MEV opportunity/threat category. Tagged variant rather than trait-object
/// dispatch over detectors, per the "virtual dispatch" design note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpportunityType {
    Arbitrage,
    Sandwich,
    Frontrun,
    Backrun,
    Liquidation,
    JitLiquidity,
    Unknown,
}

/// Confidence tier, a monotonic bucketing of `confidence_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceTier {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
    Certain,
}

impl ConfidenceTier {
    /// Band boundaries follow the original engine's `MEVConfidence` scale:
    /// 0-20 / 20-40 / 40-60 / 60-80 / 80-90 / 90-100.
    pub fn from_score(score: f64) -> Self {
        let pct = (score * 100.0).clamp(0.0, 100.0);
        if pct < 20.0 {
            ConfidenceTier::VeryLow
        } else if pct < 40.0 {
            ConfidenceTier::Low
        } else if pct < 60.0 {
            ConfidenceTier::Medium
        } else if pct < 80.0 {
            ConfidenceTier::High
        } else if pct < 90.0 {
            ConfidenceTier::VeryHigh
        } else {
            ConfidenceTier::Certain
        }
    }
}

/// Risk breakdown attached to an opportunity (§4.4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub execution: f64,
    pub market: f64,
    pub competition: f64,
    pub gas: f64,
    pub overall: f64,
}

/// Sandwich-specific opportunity detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandwichDetails {
    pub frontrun_tx: Option<String>,
    pub backrun_tx: Option<String>,
    pub victim_tx: String,
    pub estimated_loss_usd: Decimal,
    pub suspicious_transactions: Vec<String>,
}

/// Arbitrage-specific opportunity detail: an ordered hop sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitragePath {
    pub hops: Vec<ArbitrageHop>,
    pub notional: Decimal,
    pub path_profit_usd: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageHop {
    pub pool_address: String,
    pub token_in: String,
    pub token_out: String,
}

/// A detected MEV opportunity or threat (§3 `Opportunity`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub opportunity_type: OpportunityType,
    pub confidence_tier: ConfidenceTier,
    pub confidence_score: f64,
    pub estimated_profit_usd: Decimal,
    pub required_gas: u64,
    pub optimal_gas_price: u64,
    pub execution_deadline_blocks: u32,
    pub detected_at: u64,
    pub expires_at: u64,
    pub involved_tx_hashes: Vec<String>,
    pub victim_tx: Option<String>,
    pub sandwich_details: Option<SandwichDetails>,
    pub arbitrage_path: Option<ArbitragePath>,
    pub risk_breakdown: RiskBreakdown,
}

impl Opportunity {
    pub fn is_well_formed(&self, now_ns: u64) -> bool {
        self.detected_at <= now_ns
            && now_ns <= self.expires_at
            && (0.0..=1.0).contains(&self.confidence_score)
            && (0.0..=1.0).contains(&self.risk_breakdown.overall)
            && ConfidenceTier::from_score(self.confidence_score) == self.confidence_tier
    }
}

/// RiskAlert severity, escalating from informational to emergency-stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertLevel {
    Low,
    Moderate,
    High,
    Critical,
    Emergency,
}

/// A risk event raised alongside any trade denial or breaker trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAlert {
    pub alert_type: String,
    pub level: AlertLevel,
    pub description: String,
    pub symbol: Option<String>,
    pub raised_at: u64,
}
