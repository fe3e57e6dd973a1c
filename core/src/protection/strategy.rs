//! Strategy selection table (§4.8).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::OpportunityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chain {
    Ethereum,
    Solana,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionLevel {
    Standard,
    Maximum,
}

impl FromStr for ProtectionLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Maximum" => Ok(ProtectionLevel::Maximum),
            _ => Ok(ProtectionLevel::Standard),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    BundleSubmission,
    PrivateMempool,
    TimingRandomization,
    FlashbotsProtect,
    JitoBundle,
    StealthMode,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::BundleSubmission => "BundleSubmission",
            Strategy::PrivateMempool => "PrivateMempool",
            Strategy::TimingRandomization => "TimingRandomization",
            Strategy::FlashbotsProtect => "FlashbotsProtect",
            Strategy::JitoBundle => "JitoBundle",
            Strategy::StealthMode => "StealthMode",
        }
    }
}

impl FromStr for Strategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BundleSubmission" => Ok(Strategy::BundleSubmission),
            "PrivateMempool" => Ok(Strategy::PrivateMempool),
            "TimingRandomization" => Ok(Strategy::TimingRandomization),
            "FlashbotsProtect" => Ok(Strategy::FlashbotsProtect),
            "JitoBundle" => Ok(Strategy::JitoBundle),
            "StealthMode" => Ok(Strategy::StealthMode),
            _ => Err(()),
        }
    }
}

/// Picks the primary strategy per the selection table; `level = Maximum`
/// overrides everything else with `BundleSubmission`.
pub fn select_strategy(
    opportunity_type: OpportunityType,
    chain: Chain,
    level: ProtectionLevel,
    preferred_strategies: &[String],
    stealth_enabled: bool,
) -> Strategy {
    if level == ProtectionLevel::Maximum {
        return Strategy::BundleSubmission;
    }
    if stealth_enabled {
        return Strategy::StealthMode;
    }

    match (opportunity_type, chain) {
        (OpportunityType::Sandwich, Chain::Ethereum) => Strategy::FlashbotsProtect,
        (OpportunityType::Sandwich, Chain::Solana) => Strategy::JitoBundle,
        (OpportunityType::Frontrun, _) => Strategy::PrivateMempool,
        (OpportunityType::Arbitrage, _) => Strategy::TimingRandomization,
        _ => preferred_strategies
            .iter()
            .find_map(|s| Strategy::from_str(s).ok())
            .unwrap_or(Strategy::BundleSubmission),
    }
}

/// The fallback order tried after the primary strategy's relays are all
/// unreachable: the remaining `preferred_strategies`, in configured order,
/// ending with `BundleSubmission` as the strategy of last resort.
pub fn fallback_order(primary: Strategy, preferred_strategies: &[String]) -> Vec<Strategy> {
    let mut order: Vec<Strategy> = preferred_strategies
        .iter()
        .filter_map(|s| Strategy::from_str(s).ok())
        .filter(|s| *s != primary)
        .collect();
    if !order.contains(&Strategy::BundleSubmission) && primary != Strategy::BundleSubmission {
        order.push(Strategy::BundleSubmission);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandwich_on_ethereum_selects_flashbots() {
        let strategy = select_strategy(
            OpportunityType::Sandwich,
            Chain::Ethereum,
            ProtectionLevel::Standard,
            &[],
            false,
        );
        assert_eq!(strategy, Strategy::FlashbotsProtect);
    }

    #[test]
    fn sandwich_on_solana_selects_jito() {
        let strategy = select_strategy(
            OpportunityType::Sandwich,
            Chain::Solana,
            ProtectionLevel::Standard,
            &[],
            false,
        );
        assert_eq!(strategy, Strategy::JitoBundle);
    }

    #[test]
    fn maximum_level_always_forces_bundle_submission() {
        let strategy = select_strategy(
            OpportunityType::Frontrun,
            Chain::Ethereum,
            ProtectionLevel::Maximum,
            &[],
            false,
        );
        assert_eq!(strategy, Strategy::BundleSubmission);
    }

    #[test]
    fn fallback_order_excludes_primary_and_ends_with_bundle_submission() {
        let preferred = vec!["PrivateMempool".to_string(), "BundleSubmission".to_string()];
        let order = fallback_order(Strategy::FlashbotsProtect, &preferred);
        assert_eq!(order, vec![Strategy::PrivateMempool, Strategy::BundleSubmission]);
    }
}
