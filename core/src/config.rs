//! Configuration surface (§6), grouped by subsystem.
//!
//! Loading is ambient convenience (env/file), not a product feature: the
//! structs and `validate()` are what the core actually depends on.

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub enable_detection: bool,
    pub detection_threshold: f64,
    pub mempool_analysis_depth: usize,
    pub min_profit_usd: Decimal,
    pub min_confidence: f64,
    pub max_gas_cost_ratio: f64,
    pub sandwich_window_blocks: u32,
    pub arbitrage_window_blocks: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enable_detection: true,
            detection_threshold: 0.6,
            mempool_analysis_depth: 100,
            min_profit_usd: dec!(10.0),
            min_confidence: 0.5,
            max_gas_cost_ratio: 0.3,
            sandwich_window_blocks: 2,
            arbitrage_window_blocks: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEndpoints {
    pub flashbots: Vec<String>,
    pub jito: Vec<String>,
}

impl Default for RelayEndpoints {
    fn default() -> Self {
        Self {
            flashbots: vec!["https://relay.flashbots.net".to_string()],
            jito: vec!["https://mainnet.block-engine.jito.wtf".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionConfig {
    pub enable_protection: bool,
    pub default_protection_level: String,
    pub preferred_strategies: Vec<String>,
    pub max_protection_cost_usd: Decimal,
    pub private_mempool_urls: Vec<String>,
    pub relays: RelayEndpoints,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            enable_protection: true,
            default_protection_level: "Standard".to_string(),
            preferred_strategies: vec!["PrivateMempool".to_string(), "BundleSubmission".to_string()],
            max_protection_cost_usd: dec!(50.0),
            private_mempool_urls: vec!["https://rpc.eden.network".to_string()],
            relays: RelayEndpoints::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimitsConfig {
    pub max_portfolio_value: Decimal,
    pub max_daily_loss: Decimal,
    pub max_drawdown_pct: f64,
    pub max_position_size_usd: Decimal,
    pub max_position_size_pct: f64,
    pub max_portfolio_var: Decimal,
    pub max_leverage_ratio: f64,
    pub max_concentration_pct: f64,
    pub max_single_trade_usd: Decimal,
    pub blacklisted_symbols: Vec<String>,
}

impl Default for RiskLimitsConfig {
    fn default() -> Self {
        Self {
            max_portfolio_value: dec!(10_000_000),
            max_daily_loss: dec!(100_000),
            max_drawdown_pct: 20.0,
            max_position_size_usd: dec!(500_000),
            max_position_size_pct: 10.0,
            max_portfolio_var: dec!(250_000),
            max_leverage_ratio: 3.0,
            max_concentration_pct: 25.0,
            max_single_trade_usd: dec!(100_000),
            blacklisted_symbols: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub worker_thread_count: usize,
    pub max_concurrent_analysis: usize,
    #[serde(with = "duration_millis")]
    pub max_protection_latency: Duration,
    #[serde(with = "duration_millis")]
    pub monitoring_frequency: Duration,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            worker_thread_count: 4,
            max_concurrent_analysis: 64,
            max_protection_latency: Duration::from_millis(500),
            monitoring_frequency: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StealthConfig {
    pub stealth_enabled: bool,
    pub timing_randomization_enabled: bool,
    #[serde(with = "duration_millis")]
    pub max_timing_delay: Duration,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            stealth_enabled: false,
            timing_randomization_enabled: true,
            max_timing_delay: Duration::from_millis(2_000),
        }
    }
}

/// Breaker hysteresis configuration, validated alongside risk limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub trigger_threshold: f64,
    pub reset_threshold: f64,
    #[serde(with = "duration_millis")]
    pub timeout_duration: Duration,
    pub auto_reset: bool,
    pub max_triggers_per_day: u32,
    pub emergency_liquidation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub detection: DetectionConfig,
    pub protection: ProtectionConfig,
    pub risk_limits: RiskLimitsConfig,
    pub concurrency: ConcurrencyConfig,
    pub stealth: StealthConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            protection: ProtectionConfig::default(),
            risk_limits: RiskLimitsConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            stealth: StealthConfig::default(),
        }
    }
}

impl CoreConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Env overrides follow a `MEV_VAR_NAME` convention, one level deep per
    /// config group.
    pub fn from_env(mut self) -> Self {
        if let Ok(v) = std::env::var("MEV_MIN_PROFIT_USD") {
            if let Ok(parsed) = v.parse() {
                self.detection.min_profit_usd = parsed;
            }
        }
        if let Ok(v) = std::env::var("MEV_WORKER_THREAD_COUNT") {
            if let Ok(parsed) = v.parse() {
                self.concurrency.worker_thread_count = parsed;
            }
        }
        if let Ok(v) = std::env::var("MEV_MAX_PORTFOLIO_VALUE") {
            if let Ok(parsed) = v.parse() {
                self.risk_limits.max_portfolio_value = parsed;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.detection.min_confidence < 0.0 || self.detection.min_confidence > 1.0 {
            bail!("detection.min_confidence must be within [0, 1]");
        }
        if self.detection.mempool_analysis_depth == 0 {
            bail!("detection.mempool_analysis_depth must be positive");
        }
        if self.concurrency.worker_thread_count == 0 {
            bail!("concurrency.worker_thread_count must be positive");
        }
        if self.risk_limits.max_single_trade_usd <= dec!(0) {
            bail!("risk_limits.max_single_trade_usd must be positive");
        }
        if self.risk_limits.max_portfolio_value <= dec!(0) {
            bail!("risk_limits.max_portfolio_value must be positive");
        }
        if self.protection.max_protection_cost_usd < dec!(0) {
            bail!("protection.max_protection_cost_usd must be non-negative");
        }
        Ok(())
    }
}

/// Default breaker set installed at startup (C11). Each entry's hysteresis
/// is validated by `CircuitBreakerArray::new`, which rejects the whole
/// configuration rather than silently dropping one breaker.
///
/// `Correlation` and `Liquidity` are deliberately absent: `RiskManager::tick`
/// has no cross-asset correlation feed or pool-liquidity feed to observe them
/// with, and a breaker that never receives a sample is a breaker that can
/// never trip. Both variants stay in `BreakerType` for callers that build a
/// `CircuitBreakerArray` from a config wired to those feeds directly.
pub fn default_breaker_configs() -> Vec<(crate::risk::breaker::BreakerType, BreakerConfig)> {
    use crate::risk::breaker::BreakerType::*;
    vec![
        (
            PortfolioDrawdown,
            BreakerConfig {
                trigger_threshold: 0.15,
                reset_threshold: 0.08,
                timeout_duration: Duration::from_secs(300),
                auto_reset: true,
                max_triggers_per_day: 3,
                emergency_liquidation: true,
            },
        ),
        (
            DailyLoss,
            BreakerConfig {
                trigger_threshold: 0.10,
                reset_threshold: 0.05,
                timeout_duration: Duration::from_secs(600),
                auto_reset: true,
                max_triggers_per_day: 2,
                emergency_liquidation: false,
            },
        ),
        (
            PositionSize,
            BreakerConfig {
                trigger_threshold: 0.12,
                reset_threshold: 0.06,
                timeout_duration: Duration::from_secs(120),
                auto_reset: true,
                max_triggers_per_day: 5,
                emergency_liquidation: false,
            },
        ),
        (
            Volatility,
            BreakerConfig {
                trigger_threshold: 0.08,
                reset_threshold: 0.04,
                timeout_duration: Duration::from_secs(180),
                auto_reset: true,
                max_triggers_per_day: 5,
                emergency_liquidation: false,
            },
        ),
        (
            Concentration,
            BreakerConfig {
                trigger_threshold: 0.3,
                reset_threshold: 0.2,
                timeout_duration: Duration::from_secs(180),
                auto_reset: true,
                max_triggers_per_day: 3,
                emergency_liquidation: false,
            },
        ),
        (
            Leverage,
            BreakerConfig {
                trigger_threshold: 3.5,
                reset_threshold: 2.5,
                timeout_duration: Duration::from_secs(300),
                auto_reset: true,
                max_triggers_per_day: 3,
                emergency_liquidation: false,
            },
        ),
        (
            MarginCall,
            BreakerConfig {
                trigger_threshold: 0.9,
                reset_threshold: 0.6,
                timeout_duration: Duration::from_secs(60),
                auto_reset: false,
                max_triggers_per_day: 10,
                emergency_liquidation: true,
            },
        ),
    ]
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
