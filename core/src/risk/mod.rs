//! Risk Manager, Circuit Breaker Array, and Trade Validator (C10-C12, §4.6-4.7).

pub mod breaker;
pub mod manager;
pub mod metrics;
pub mod position;
pub mod validator;

pub use breaker::{BreakerType, CircuitBreaker, CircuitBreakerArray};
pub use manager::RiskManager;
pub use metrics::{run_stress_test, RiskMetrics, StressTestScenario};
pub use position::{Position, PositionMap};
pub use validator::{TradeProposal, Validation};
