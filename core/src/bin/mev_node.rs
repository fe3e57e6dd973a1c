//! Demonstration binary wiring a `CoreContext` end to end: construct the
//! configuration, initialize the context, register a couple of relay
//! adapters, start the background workers, feed a handful of synthetic
//! transactions through the admission channel, and shut down cleanly.
//!
//! A real deployment replaces the synthetic feed with a chain node adapter
//! and the fake relays with real Flashbots/Jito clients implementing
//! `mev_core::interfaces::Relay`; everything else in this file is the
//! production wiring shape.

use std::sync::Arc;

use anyhow::{Context, Result};
use rust_decimal_macros::dec;
use tracing::{info, warn};

use mev_core::config::CoreConfig;
use mev_core::protection::strategy::{Chain, ProtectionLevel};
use mev_core::types::{OpportunityType, Transaction};
use mev_core::{CoreContext, MarketContext};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("starting mev node");

    let config = CoreConfig::default().from_env();
    config.validate().context("invalid core configuration")?;

    let ctx = CoreContext::init(config, Vec::new()).context("failed to initialize core context")?;

    ctx.register_relay("flashbots", Arc::new(DemoRelay::new("flashbots")));
    ctx.register_relay("eden", Arc::new(DemoRelay::new("eden")));
    info!("relay adapters registered");

    ctx.subscribe_threats(|opportunity| {
        info!(
            id = %opportunity.id,
            opportunity_type = ?opportunity.opportunity_type,
            profit_usd = %opportunity.estimated_profit_usd,
            "opportunity published"
        );
    });
    ctx.subscribe_alerts(|alert| {
        warn!(alert_type = %alert.alert_type, description = %alert.description, "risk alert raised");
    });

    let sender = ctx.start();
    info!("worker pool, mempool sweep, and risk ticker started");

    let market = MarketContext {
        eth_price_usd: dec!(2000),
        competing_bots_estimate: 3,
    };

    for i in 0..5u64 {
        let tx = Transaction {
            hash: format!("0xdemo{i}"),
            from: "0xfrom".to_string(),
            to: "0xrouter".to_string(),
            value: dec!(0),
            gas_limit: 180_000,
            gas_price_wei: 35_000_000_000,
            data_blob: Vec::new(),
            block_number: None,
            observed_at_ns: ctx.clock().now_ns(),
            mempool_position: None,
            decoded: None,
        };

        if sender.send((tx, market)).await.is_err() {
            warn!("analysis channel closed, stopping feed");
            break;
        }
    }

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let snapshot = ctx.get_metrics_snapshot();
    info!(
        transactions_analyzed = snapshot.total_transactions_analyzed,
        threats_detected = snapshot.threats_detected,
        "demo run complete"
    );

    let _ = ctx
        .protect(
            &Transaction {
                hash: "0xdemo_protect".to_string(),
                from: "0xfrom".to_string(),
                to: "0xrouter".to_string(),
                value: dec!(0),
                gas_limit: 180_000,
                gas_price_wei: 35_000_000_000,
                data_blob: Vec::new(),
                block_number: None,
                observed_at_ns: ctx.clock().now_ns(),
                mempool_position: None,
                decoded: None,
            },
            OpportunityType::Sandwich,
            Chain::Ethereum,
            ProtectionLevel::Standard,
            dec!(2000),
        )
        .await;

    ctx.stop();
    info!("mev node stopped");
    Ok(())
}

/// In-process relay stand-in for the demo binary; always succeeds.
/// Production deployments implement `Relay` against real Flashbots/Jito/Eden
/// endpoints.
struct DemoRelay {
    id: String,
}

impl DemoRelay {
    fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

#[async_trait::async_trait]
impl mev_core::interfaces::Relay for DemoRelay {
    async fn submit_bundle(&self, _bundle_bytes: &[u8]) -> mev_core::error::CoreResult<String> {
        Ok(format!("{}_bundle_demo", self.id))
    }

    async fn submit_private(&self, _tx_bytes: &[u8]) -> mev_core::error::CoreResult<String> {
        Ok(format!("{}_tx_demo", self.id))
    }
}
