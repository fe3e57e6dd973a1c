//! MEV detection, protection, and risk engine (C1-C13).
//!
//! The crate exposes its process-wide state as a single [`CoreContext`]
//! handle rather than ambient statics, so a binary (or a test) can construct
//! as many independent instances as it needs and tear each one down
//! explicitly. See `src/bin/mev_node.rs` for the intended `init -> start ->
//! stop` lifecycle.

pub mod clock;
pub mod config;
pub mod detection;
pub mod error;
pub mod events;
pub mod interfaces;
pub mod mempool;
pub mod metrics;
pub mod pool_store;
pub mod protection;
pub mod registry;
pub mod returns;
pub mod risk;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use clock::Clock;
use config::CoreConfig;
use detection::{DetectionContext, DetectionKernel};
use error::{CoreError, CoreResult};
use events::EventBus;
use interfaces::Relay;
use mempool::MempoolSnapshot;
use metrics::MetricsRing;
use pool_store::{PoolStore, PriceStore};
use protection::router::ProtectionRouter;
use protection::strategy::{Chain, ProtectionLevel};
use protection::ProtectionResult;
use registry::OpportunityRegistry;
use returns::HistoricalReturns;
use risk::{Position, RiskManager, RiskMetrics, TradeProposal, Validation};
use types::{AlertLevel, Opportunity, OpportunityType, Pool, Price, RiskAlert, Transaction};

/// Bound on concurrently in-flight `analyze` calls admitted to the worker
/// pool's channel (§5 "worker pool").
const ANALYSIS_CHANNEL_CAPACITY: usize = 1_024;

/// Cap on opportunities the registry retains at once, so the set stays a
/// bounded ring rather than growing unbounded.
const OPPORTUNITY_REGISTRY_CAPACITY: usize = 50_000;

/// Process-wide handle over every store, detector, router, and manager the
/// core owns. Nothing in this crate reaches for a global; every operation
/// that needs shared state takes `&CoreContext` (or is a method on it).
pub struct CoreContext {
    config: CoreConfig,
    clock: Clock,
    metrics: MetricsRing,
    pools: PoolStore,
    prices: PriceStore,
    detection_returns: HistoricalReturns,
    mempool: MempoolSnapshot,
    registry: OpportunityRegistry,
    detection: DetectionKernel,
    protection: ProtectionRouter,
    risk: RiskManager,
    events: EventBus,
    relays: parking_lot::RwLock<HashMap<String, Arc<dyn Relay>>>,
    background_tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

/// Caller-supplied read of the market the last time it touched the chain.
/// `analyze`/`analyze_batch` need this alongside the transaction itself
/// because gas-cost-in-USD and opportunity sizing both depend on the spot
/// ETH price, which the core does not fetch on its own (§6 "Consumed").
#[derive(Debug, Clone, Copy)]
pub struct MarketContext {
    pub eth_price_usd: Decimal,
    pub competing_bots_estimate: u32,
}

impl CoreContext {
    /// Builds every store and component from `config`, spawning the
    /// background clock-refresh task. Nothing else starts running until
    /// [`CoreContext::start`] is called. `pattern_detectors` are registered
    /// with the detection kernel up front since the kernel itself is not
    /// mutable once wrapped in the `Arc` this returns (§4.4.6 pluggable
    /// pattern hook).
    pub fn init(config: CoreConfig, pattern_detectors: Vec<Arc<detection::PatternDetector>>) -> CoreResult<Arc<Self>> {
        config
            .validate()
            .map_err(|e| CoreError::InputInvalid(e.to_string()))?;

        let (clock, clock_handle) = Clock::start();
        let depth = config.detection.mempool_analysis_depth;

        let mut detection = DetectionKernel::new();
        for detector in pattern_detectors {
            detection.register_pattern_detector(detector);
        }

        let ctx = Self {
            protection: ProtectionRouter::new(config.protection.clone(), config.stealth.clone()),
            risk: RiskManager::new(config.risk_limits.clone(), config.risk_limits.max_portfolio_value)?,
            mempool: MempoolSnapshot::new(depth),
            registry: OpportunityRegistry::new(OPPORTUNITY_REGISTRY_CAPACITY),
            detection,
            pools: PoolStore::new(),
            prices: PriceStore::new(),
            detection_returns: HistoricalReturns::default(),
            metrics: MetricsRing::new(),
            events: EventBus::new(),
            relays: parking_lot::RwLock::new(HashMap::new()),
            background_tasks: parking_lot::Mutex::new(vec![clock_handle]),
            config,
            clock,
        };

        info!("mev core context initialized");
        Ok(Arc::new(ctx))
    }

    /// Registers a relay adapter under `id`, consulted by `protect` whenever
    /// the selected strategy's candidate list names it (§6 "Consumed").
    pub fn register_relay(&self, id: impl Into<String>, relay: Arc<dyn Relay>) {
        self.relays.write().insert(id.into(), relay);
    }

    /// Spawns the worker pool's admission channel consumer, the mempool
    /// sweep/poll ticker, and the periodic risk-tick ticker (§5). Returns
    /// immediately; tasks run until `stop` aborts them or the runtime shuts
    /// down.
    pub fn start(self: &Arc<Self>) -> mpsc::Sender<(Transaction, MarketContext)> {
        let (tx_sender, mut tx_receiver) = mpsc::channel::<(Transaction, MarketContext)>(ANALYSIS_CHANNEL_CAPACITY);

        let worker_ctx = self.clone();
        let worker_handle = tokio::spawn(async move {
            while let Some((tx, market)) = tx_receiver.recv().await {
                let opportunities = worker_ctx.analyze(&tx, market);
                for opp in opportunities {
                    worker_ctx.registry.publish(opp.clone());
                    worker_ctx.events.publish_threat(&opp);
                }
            }
        });

        let ticker_ctx = self.clone();
        let monitoring_frequency = self.config.concurrency.monitoring_frequency;
        let ticker_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitoring_frequency);
            loop {
                ticker.tick().await;
                let now_ns = ticker_ctx.clock.now_ns();
                ticker_ctx.registry.sweep_expired(now_ns);
                let (risk_metrics, alerts) = ticker_ctx.risk.tick(now_ns);
                ticker_ctx.events.publish_metrics(&risk_metrics);
                for alert in alerts {
                    ticker_ctx.metrics.incr_breaker_trips();
                    ticker_ctx.events.publish_alert(&alert);
                }
            }
        });

        let mut tasks = self.background_tasks.lock();
        tasks.push(worker_handle);
        tasks.push(ticker_handle);

        tx_sender
    }

    /// Aborts every background task spawned by `start` (and the clock
    /// refresh task from `init`). Idempotent.
    pub fn stop(&self) {
        let mut tasks = self.background_tasks.lock();
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("mev core context stopped");
    }

    // -- Market data ingestion (§6 "Exposed") --------------------------------

    pub fn update_pool(&self, pool: Pool) {
        self.pools.upsert_pool(pool);
    }

    pub fn update_price(&self, price: Price) {
        self.prices.upsert_price(price);
    }

    pub fn admit_transaction(&self, tx: Transaction) {
        self.mempool.admit(tx);
    }

    // -- Detection (§6 "Exposed": analyze / analyze_batch) -------------------

    /// Runs the detection kernel once against `tx`, admitting it into the
    /// mempool snapshot first so subsequent detectors in the same batch can
    /// see it. Does not publish to the registry or event bus — that is the
    /// worker pool's job via the channel from `start`, or the caller's job
    /// when calling `analyze` directly outside the pool.
    pub fn analyze(&self, tx: &Transaction, market: MarketContext) -> Vec<Opportunity> {
        self.metrics.incr_transactions_analyzed();
        self.mempool.admit(tx.clone());

        let ctx = DetectionContext {
            clock: &self.clock,
            pools: &self.pools,
            prices: &self.prices,
            returns: &self.detection_returns,
            mempool: &self.mempool,
            config: &self.config.detection,
            eth_price_usd: market.eth_price_usd,
            competing_bots_estimate: market.competing_bots_estimate,
        };

        let started_at = std::time::Instant::now();
        let found = self.detection.analyze(tx, &ctx);
        self.metrics.record_latency_us(started_at.elapsed().as_micros() as u64);
        if !found.is_empty() {
            self.metrics.incr_threats_detected();
        }
        found
    }

    /// Runs `analyze` over each transaction in `txs`, in order. Each
    /// transaction sees the mempool state built up by the ones before it in
    /// the same batch, matching the single-threaded semantics of one
    /// detection worker draining its channel.
    pub fn analyze_batch(&self, txs: &[Transaction], market: MarketContext) -> Vec<Opportunity> {
        txs.iter().flat_map(|tx| self.analyze(tx, market)).collect()
    }

    pub fn publish_opportunity(&self, opportunity: Opportunity) {
        self.metrics.incr_opportunities_published();
        self.registry.publish(opportunity.clone());
        self.events.publish_threat(&opportunity);
    }

    pub fn get_opportunities(&self, opportunity_type: OpportunityType) -> Vec<Opportunity> {
        self.registry.by_type(opportunity_type)
    }

    // -- Protection (§6 "Exposed": protect) ----------------------------------

    /// Routes `tx` through the protection strategy selected for
    /// `opportunity_type`/`chain`/`level`, consulting the relays registered
    /// via `register_relay`.
    pub async fn protect(
        &self,
        tx: &Transaction,
        opportunity_type: OpportunityType,
        chain: Chain,
        level: ProtectionLevel,
        eth_price_usd: Decimal,
    ) -> ProtectionResult {
        self.metrics.incr_protection_attempts();
        let now_ns = self.clock.now_ns();
        let relays = self.relays.read().clone();
        let result = self
            .protection
            .protect(tx, opportunity_type, chain, level, &relays, eth_price_usd, now_ns)
            .await;

        if result.successful {
            self.metrics.incr_protection_successes();
        } else {
            self.metrics.incr_relay_failures();
        }
        self.events.publish_protection(&result);
        result
    }

    // -- Risk (§6 "Exposed") --------------------------------------------------

    pub fn validate_trade(&self, proposal: &TradeProposal) -> CoreResult<Validation> {
        let now_ns = self.clock.now_ns();
        let result = self.risk.validate_trade(proposal, now_ns)?;
        self.metrics.incr_trades_validated();
        if let Validation::Denied(alert) = &result {
            self.metrics.incr_trades_denied();
            debug!(alert_type = %alert.alert_type, symbol = %proposal.symbol, "trade denied");
            self.events.publish_alert(alert);
        }
        Ok(result)
    }

    pub fn record_position_open(&self, symbol: &str, delta_qty: Decimal, price: Decimal) {
        let now_ns = self.clock.now_ns();
        self.risk.positions().add_position(symbol, delta_qty, price, now_ns);
        if let Some(position) = self.risk.positions().get(symbol) {
            self.events.publish_position(&position);
        }
    }

    pub fn record_position_mark(&self, symbol: &str, last_price: Decimal) {
        let now_ns = self.clock.now_ns();
        self.risk.positions().update_position(symbol, last_price, now_ns);
        if let Some(position) = self.risk.positions().get(symbol) {
            self.events.publish_position(&position);
        }
    }

    pub fn close_position(&self, symbol: &str) -> Option<Decimal> {
        let position = self.risk.positions().get(symbol)?;
        let now_ns = self.clock.now_ns();
        self.risk.positions().close_position(symbol, position.last_price, now_ns)
    }

    pub fn get_risk_metrics(&self) -> RiskMetrics {
        let now_ns = self.clock.now_ns();
        let (metrics, _) = self.risk.tick(now_ns);
        metrics
    }

    pub fn get_top_positions(&self, n: usize) -> Vec<Position> {
        self.risk.get_top_positions(n)
    }

    pub fn get_risk_contributions(&self) -> Vec<(String, Decimal)> {
        self.risk.get_risk_contributions()
    }

    pub fn run_stress_test(&self, scenario: &risk::StressTestScenario) -> RiskMetrics {
        self.risk.run_stress_test(scenario)
    }

    /// §6 `emergency_stop(reason)`.
    pub fn emergency_stop(&self, reason: &str) {
        warn!(reason, "emergency stop engaged");
        self.risk.set_emergency_stop(true);
        let alert = RiskAlert {
            alert_type: "EMERGENCY_STOP".to_string(),
            level: AlertLevel::Emergency,
            description: format!("emergency stop engaged: {reason}"),
            symbol: None,
            raised_at: self.clock.now_ns(),
        };
        self.events.publish_alert(&alert);
    }

    pub fn resume_from_emergency_stop(&self) {
        self.risk.set_emergency_stop(false);
        info!("emergency stop cleared, trade admission resumed");
    }

    /// §6 `liquidate_all(reason)`.
    pub fn liquidate_all(&self, reason: &str) {
        let now_ns = self.clock.now_ns();
        let alert = self.risk.liquidate_all(reason, now_ns);
        self.events.publish_alert(&alert);
    }

    pub fn pause_symbol(&self, symbol: &str) {
        self.risk.pause_symbol(symbol);
    }

    pub fn resume_symbol(&self, symbol: &str) {
        self.risk.resume_symbol(symbol);
    }

    // -- Metrics & subscriptions (§6 "Exposed") ------------------------------

    pub fn get_metrics_snapshot(&self) -> metrics::PerformanceSnapshot {
        self.metrics.snapshot(self.clock.now_ns())
    }

    pub fn subscribe_threats<F: Fn(&Opportunity) + Send + Sync + 'static>(&self, f: F) {
        self.events.subscribe_threats(f);
    }

    pub fn subscribe_protections<F: Fn(&ProtectionResult) + Send + Sync + 'static>(&self, f: F) {
        self.events.subscribe_protections(f);
    }

    pub fn subscribe_positions<F: Fn(&Position) + Send + Sync + 'static>(&self, f: F) {
        self.events.subscribe_positions(f);
    }

    pub fn subscribe_metrics<F: Fn(&RiskMetrics) + Send + Sync + 'static>(&self, f: F) {
        self.events.subscribe_metrics(f);
    }

    pub fn subscribe_alerts<F: Fn(&RiskAlert) + Send + Sync + 'static>(&self, f: F) {
        self.events.subscribe_alerts(f);
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}
