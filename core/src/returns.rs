//! Historical Returns (C4): per-symbol bounded return series with
//! volatility, VaR, and CVaR over a configurable trailing window.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

/// Default cap on the return history per symbol, matching the original
/// engine's `max_history_size`.
pub const DEFAULT_HISTORY_CAP: usize = 252;

#[derive(Debug, Clone, Default)]
struct SeriesState {
    arithmetic_returns: VecDeque<f64>,
    log_returns: VecDeque<f64>,
    last_value: Option<f64>,
}

/// Bounded per-symbol return series, protected by a single lock for the
/// whole map (symbols are updated far less often than, say, metrics
/// counters, so per-symbol sharding is not warranted here).
pub struct HistoricalReturns {
    cap: usize,
    series: RwLock<HashMap<String, SeriesState>>,
}

impl Default for HistoricalReturns {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl HistoricalReturns {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Record a new observed value for `symbol`, deriving arithmetic and log
    /// returns against the previous observation.
    pub fn record_value(&self, symbol: &str, value: f64) {
        let mut map = self.series.write();
        let state = map.entry(symbol.to_string()).or_default();

        if let Some(prev) = state.last_value {
            if prev != 0.0 {
                let arith = (value - prev) / prev;
                if state.arithmetic_returns.len() == self.cap {
                    state.arithmetic_returns.pop_front();
                }
                state.arithmetic_returns.push_back(arith);

                if prev > 0.0 && value > 0.0 {
                    let log_ret = (value / prev).ln();
                    if state.log_returns.len() == self.cap {
                        state.log_returns.pop_front();
                    }
                    state.log_returns.push_back(log_ret);
                }
            }
        }
        state.last_value = Some(value);
    }

    fn windowed(returns: &VecDeque<f64>, window: usize) -> Vec<f64> {
        let len = returns.len();
        let start = len.saturating_sub(window);
        returns.iter().skip(start).copied().collect()
    }

    pub fn volatility(&self, symbol: &str, window: usize) -> f64 {
        let map = self.series.read();
        let Some(state) = map.get(symbol) else {
            return 0.0;
        };
        let samples = Self::windowed(&state.arithmetic_returns, window);
        stdev(&samples)
    }

    /// Historical VaR: the loss at the given confidence level, read off the
    /// empirical return distribution. Returns a positive number representing
    /// the magnitude of loss (e.g. 0.05 == 5% loss at this confidence).
    pub fn var(&self, symbol: &str, confidence: f64, window: usize) -> f64 {
        let map = self.series.read();
        let Some(state) = map.get(symbol) else {
            return 0.0;
        };
        let mut samples = Self::windowed(&state.arithmetic_returns, window);
        historical_var(&mut samples, confidence)
    }

    /// Historical CVaR (expected shortfall): mean loss beyond the VaR
    /// threshold.
    pub fn cvar(&self, symbol: &str, confidence: f64, window: usize) -> f64 {
        let map = self.series.read();
        let Some(state) = map.get(symbol) else {
            return 0.0;
        };
        let mut samples = Self::windowed(&state.arithmetic_returns, window);
        historical_cvar(&mut samples, confidence)
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.series
            .read()
            .get(symbol)
            .map(|s| s.arithmetic_returns.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, symbol: &str) -> bool {
        self.len(symbol) == 0
    }
}

pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

pub fn stdev(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let m = mean(samples);
    let variance = samples.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    variance.sqrt()
}

/// Computes historical VaR by sorting ascending returns and taking the
/// percentile at `1 - confidence` from the loss tail.
pub fn historical_var(samples: &mut [f64], confidence: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let alpha = (1.0 - confidence).clamp(0.0, 1.0);
    let idx = ((samples.len() as f64 - 1.0) * alpha).round() as usize;
    let tail_return = samples[idx.min(samples.len() - 1)];
    (-tail_return).max(0.0)
}

/// Computes historical CVaR as the mean of all returns at or below the VaR
/// loss threshold.
pub fn historical_cvar(samples: &mut [f64], confidence: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let alpha = (1.0 - confidence).clamp(0.0, 1.0);
    let idx = (((samples.len() as f64 - 1.0) * alpha).round() as usize).min(samples.len() - 1);
    let tail = &samples[0..=idx];
    let tail_mean = mean(tail);
    (-tail_mean).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_is_bounded_by_cap() {
        let returns = HistoricalReturns::new(5);
        for i in 1..=20 {
            returns.record_value("ETH", i as f64);
        }
        assert_eq!(returns.len("ETH"), 5);
    }

    #[test]
    fn var_with_fewer_than_ten_samples_is_zero_per_floor() {
        // VaR/CVaR over the portfolio P&L series only apply once it has at
        // least 10 observations. The raw per-symbol helper still computes a
        // value from what it has; the risk manager is responsible for
        // enforcing the >=10 gate before calling into this series. Here we
        // just verify the primitive behaves sensibly with a small sample.
        let returns = HistoricalReturns::new(252);
        returns.record_value("ETH", 100.0);
        returns.record_value("ETH", 95.0);
        let var = returns.var("ETH", 0.95, 252);
        assert!(var >= 0.0);
    }

    #[test]
    fn volatility_is_nonnegative() {
        let returns = HistoricalReturns::new(252);
        for v in [100.0, 102.0, 98.0, 101.0, 99.0] {
            returns.record_value("ETH", v);
        }
        assert!(returns.volatility("ETH", 252) >= 0.0);
    }

    #[test]
    fn cvar_is_at_least_var_in_magnitude() {
        let mut samples = vec![-0.05, -0.03, -0.02, 0.0, 0.01, 0.02, 0.03, 0.04, 0.05, 0.1];
        let var = historical_var(&mut samples.clone(), 0.95);
        let cvar = historical_cvar(&mut samples, 0.95);
        assert!(cvar >= var - 1e-9);
    }
}
