//! Event Bus (C13, §4.9).
//!
//! One registration point per callback kind. Dispatch is synchronous on the
//! producer's task, in registration order; a handler that panics is caught
//! so the remaining handlers still run, matching "if a handler fails, the
//! error is logged and subsequent handlers still run." Handlers receive an
//! owned copy of the event and must not call back into the bus — there is
//! no API surface here that would let them.

use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::RwLock;
use tracing::error;

use crate::protection::ProtectionResult;
use crate::risk::{Position, RiskMetrics};
use crate::types::{Opportunity, RiskAlert};

type ThreatHandler = Box<dyn Fn(&Opportunity) + Send + Sync>;
type ProtectionHandler = Box<dyn Fn(&ProtectionResult) + Send + Sync>;
type PositionHandler = Box<dyn Fn(&Position) + Send + Sync>;
type MetricsHandler = Box<dyn Fn(&RiskMetrics) + Send + Sync>;
type AlertHandler = Box<dyn Fn(&RiskAlert) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    threat: RwLock<Vec<ThreatHandler>>,
    protection: RwLock<Vec<ProtectionHandler>>,
    position: RwLock<Vec<PositionHandler>>,
    metrics: RwLock<Vec<MetricsHandler>>,
    alert: RwLock<Vec<AlertHandler>>,
}

macro_rules! dispatch {
    ($handlers:expr, $event:expr, $label:literal) => {
        let handlers = $handlers.read();
        for handler in handlers.iter() {
            if catch_unwind(AssertUnwindSafe(|| handler($event))).is_err() {
                error!(concat!("event bus handler panicked dispatching ", $label));
            }
        }
    };
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_threats<F: Fn(&Opportunity) + Send + Sync + 'static>(&self, f: F) {
        self.threat.write().push(Box::new(f));
    }

    pub fn subscribe_protections<F: Fn(&ProtectionResult) + Send + Sync + 'static>(&self, f: F) {
        self.protection.write().push(Box::new(f));
    }

    pub fn subscribe_positions<F: Fn(&Position) + Send + Sync + 'static>(&self, f: F) {
        self.position.write().push(Box::new(f));
    }

    pub fn subscribe_metrics<F: Fn(&RiskMetrics) + Send + Sync + 'static>(&self, f: F) {
        self.metrics.write().push(Box::new(f));
    }

    pub fn subscribe_alerts<F: Fn(&RiskAlert) + Send + Sync + 'static>(&self, f: F) {
        self.alert.write().push(Box::new(f));
    }

    pub fn publish_threat(&self, opportunity: &Opportunity) {
        dispatch!(self.threat, opportunity, "threat-detected");
    }

    pub fn publish_protection(&self, result: &ProtectionResult) {
        dispatch!(self.protection, result, "protection-applied");
    }

    pub fn publish_position(&self, position: &Position) {
        dispatch!(self.position, position, "position-updated");
    }

    pub fn publish_metrics(&self, metrics: &RiskMetrics) {
        dispatch!(self.metrics, metrics, "metrics-updated");
    }

    pub fn publish_alert(&self, alert: &RiskAlert) {
        dispatch!(self.alert, alert, "risk-alert");
    }
}
