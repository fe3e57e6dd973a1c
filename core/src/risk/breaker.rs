//! Circuit Breaker Array (C11, §4.6).
//!
//! Each breaker independently tracks Armed → Tripped → Cooling → Armed.
//! A breaker trips when its monitored value crosses `trigger_threshold` and
//! resets only once the value has stayed strictly below `reset_threshold`
//! for a full, uninterrupted `timeout_duration` — any sample at or above
//! `reset_threshold` while Cooling restarts that clock, which is why
//! `reset_threshold` must sit strictly on the safe side of
//! `trigger_threshold` (hysteresis keeps a value oscillating exactly at the
//! edge from flapping the breaker).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::BreakerConfig;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreakerType {
    PortfolioDrawdown,
    DailyLoss,
    PositionSize,
    Volatility,
    Correlation,
    Liquidity,
    Concentration,
    Leverage,
    MarginCall,
}

impl BreakerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerType::PortfolioDrawdown => "portfolio_drawdown",
            BreakerType::DailyLoss => "daily_loss",
            BreakerType::PositionSize => "position_size",
            BreakerType::Volatility => "volatility",
            BreakerType::Correlation => "correlation",
            BreakerType::Liquidity => "liquidity",
            BreakerType::Concentration => "concentration",
            BreakerType::Leverage => "leverage",
            BreakerType::MarginCall => "margin_call",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    Armed,
    Tripped,
    Cooling,
}

/// Edge fired by [`CircuitBreaker::observe`], matching §4.6's
/// `CircuitBreakerCallback(type, true|false)`: `Tripped` on a fresh
/// Armed -> Tripped edge, `Reset` on the Cooling -> Armed edge, `None`
/// for every call that does not cross a state boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    None,
    Tripped,
    Reset,
}

impl BreakerTransition {
    pub fn is_trip(&self) -> bool {
        matches!(self, BreakerTransition::Tripped)
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, BreakerTransition::Reset)
    }
}

pub struct CircuitBreaker {
    breaker_type: BreakerType,
    config: BreakerConfig,
    state: BreakerState,
    triggered_today: u32,
    tripped_at_ns: Option<u64>,
    day_bucket: u64,
    /// Timestamp the value last dropped strictly below `reset_threshold`
    /// while Cooling, with no excursion since. Cleared (and restarted) by
    /// any sample at or above `reset_threshold` — the reset timer must run
    /// uninterrupted for the full cooldown, not just accumulate scattered
    /// below-threshold samples.
    cooling_clear_since_ns: Option<u64>,
}

/// One UTC day, expressed in nanoseconds, for resetting `triggered_today`.
const NANOS_PER_DAY: u64 = 86_400_000_000_000;

impl CircuitBreaker {
    /// Rejects the configuration outright if `reset_threshold` is not
    /// strictly below `trigger_threshold` (§4.6 hysteresis invariant, §7
    /// "breaker hysteresis misconfiguration detected at start" is the one
    /// genuinely fatal case this core recognizes).
    pub fn new(breaker_type: BreakerType, config: BreakerConfig) -> CoreResult<Self> {
        if !(config.reset_threshold < config.trigger_threshold) {
            return Err(CoreError::InputInvalid(format!(
                "breaker {:?}: reset_threshold ({}) must be strictly less than trigger_threshold ({})",
                breaker_type, config.reset_threshold, config.trigger_threshold
            )));
        }
        Ok(Self {
            breaker_type,
            config,
            state: BreakerState::Armed,
            triggered_today: 0,
            tripped_at_ns: None,
            day_bucket: 0,
            cooling_clear_since_ns: None,
        })
    }

    pub fn breaker_type(&self) -> BreakerType {
        self.breaker_type
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn is_tripped(&self) -> bool {
        !matches!(self.state, BreakerState::Armed)
    }

    pub fn triggered_today(&self) -> u32 {
        self.triggered_today
    }

    fn roll_day_bucket(&mut self, now_ns: u64) {
        let bucket = now_ns / NANOS_PER_DAY;
        if bucket != self.day_bucket {
            self.day_bucket = bucket;
            self.triggered_today = 0;
        }
    }

    /// Feeds the latest monitored value through the state machine. Returns
    /// [`BreakerTransition::Tripped`] on a fresh trip (Armed -> Tripped) or
    /// [`BreakerTransition::Reset`] on the Cooling -> Armed edge, which is
    /// the signal callers use to raise the matching `CircuitBreakerCallback`
    /// and, for `emergency_liquidation` breakers, invoke liquidation.
    pub fn observe(&mut self, value: f64, now_ns: u64) -> BreakerTransition {
        self.roll_day_bucket(now_ns);

        match self.state {
            BreakerState::Armed => {
                if value >= self.config.trigger_threshold
                    && self.triggered_today < self.config.max_triggers_per_day
                {
                    self.state = BreakerState::Tripped;
                    self.tripped_at_ns = Some(now_ns);
                    self.triggered_today += 1;
                    return BreakerTransition::Tripped;
                }
                BreakerTransition::None
            }
            BreakerState::Tripped => {
                let elapsed = self.tripped_at_ns.map(|t| now_ns.saturating_sub(t)).unwrap_or(0);
                if elapsed >= self.config.timeout_duration.as_nanos() as u64 {
                    self.state = BreakerState::Cooling;
                    self.cooling_clear_since_ns = None;
                }
                BreakerTransition::None
            }
            BreakerState::Cooling => {
                if value >= self.config.trigger_threshold {
                    self.state = BreakerState::Tripped;
                    self.tripped_at_ns = Some(now_ns);
                    self.cooling_clear_since_ns = None;
                    return BreakerTransition::None;
                }

                if value < self.config.reset_threshold {
                    let clear_since = *self.cooling_clear_since_ns.get_or_insert(now_ns);
                    let elapsed = now_ns.saturating_sub(clear_since);
                    if self.config.auto_reset && elapsed >= self.config.timeout_duration.as_nanos() as u64 {
                        self.state = BreakerState::Armed;
                        self.tripped_at_ns = None;
                        self.cooling_clear_since_ns = None;
                        return BreakerTransition::Reset;
                    }
                } else {
                    // Between reset_threshold and trigger_threshold: any
                    // excursion above reset_threshold restarts the timer.
                    self.cooling_clear_since_ns = None;
                }
                BreakerTransition::None
            }
        }
    }

    /// Forces the breaker back to Armed regardless of cooldown, for manual
    /// operator reset.
    pub fn force_reset(&mut self) {
        self.state = BreakerState::Armed;
        self.tripped_at_ns = None;
    }

    pub fn requires_emergency_liquidation(&self) -> bool {
        self.config.emergency_liquidation && self.is_tripped()
    }
}

pub struct CircuitBreakerArray {
    breakers: Vec<CircuitBreaker>,
}

impl CircuitBreakerArray {
    /// Fails the whole array, not just the offending entry, if any
    /// configured breaker violates the hysteresis invariant.
    pub fn new(configs: Vec<(BreakerType, BreakerConfig)>) -> CoreResult<Self> {
        let breakers = configs
            .into_iter()
            .map(|(t, c)| CircuitBreaker::new(t, c))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self { breakers })
    }

    pub fn breaker_mut(&mut self, breaker_type: BreakerType) -> Option<&mut CircuitBreaker> {
        self.breakers.iter_mut().find(|b| b.breaker_type() == breaker_type)
    }

    pub fn any_tripped(&self) -> bool {
        self.breakers.iter().any(|b| b.is_tripped())
    }

    pub fn tripped_types(&self) -> Vec<BreakerType> {
        self.breakers
            .iter()
            .filter(|b| b.is_tripped())
            .map(|b| b.breaker_type())
            .collect()
    }

    pub fn any_requires_emergency_liquidation(&self) -> bool {
        self.breakers.iter().any(|b| b.requires_emergency_liquidation())
    }

    /// Feeds `value` to the named breaker and returns the transition (if
    /// any) that call caused.
    pub fn observe(&mut self, breaker_type: BreakerType, value: f64, now_ns: u64) -> BreakerTransition {
        self.breaker_mut(breaker_type)
            .map(|b| b.observe(value, now_ns))
            .unwrap_or(BreakerTransition::None)
    }
}
