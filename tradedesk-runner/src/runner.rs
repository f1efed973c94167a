//! Simulation runner: replays a price tape through a blotter.
//!
//! Two entry points:
//! - `run_simulation()`: config + pre-loaded ticks, no I/O. Used by sweeps.
//! - `run_from_files()`: loads the TOML config and CSV tape first.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use tradedesk_core::domain::{OrderId, Portfolio};
use tradedesk_core::{Blotter, BlotterError, BlotterSnapshot, PriceTick, Rejection};

use crate::config::{ConfigError, RunId, ScheduledOrder, SimulationConfig};
use crate::tape::{load_tape, TapeError};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("blotter error: {0}")]
    Blotter(#[from] BlotterError),
    #[error("tape error: {0}")]
    Tape(#[from] TapeError),
}

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: SimulationConfig,
    pub tick_count: usize,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub final_equity: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_commission: f64,
    /// Every refused fill, in the order it happened. An order refused on
    /// several ticks appears once per tick.
    pub rejections: Vec<Rejection>,
    pub expired: Vec<OrderId>,
    /// End-of-run blotter state: open orders, trade history, portfolio.
    pub snapshot: BlotterSnapshot,
}

impl SimulationResult {
    pub fn trade_count(&self) -> usize {
        self.snapshot.trades.len()
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.snapshot.portfolio
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Build the blotter a config describes, with an empty portfolio.
pub fn build_blotter(config: &SimulationConfig) -> Result<Blotter, RunError> {
    config.validate()?;
    let portfolio = Portfolio::new(config.initial_cash)
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let blotter = Blotter::new(config.build_finder()?, portfolio, config.commission.build())?;
    Ok(match config.max_participation {
        Some(fraction) => blotter.with_participation_limit(fraction)?,
        None => blotter,
    })
}

/// Run a simulation over pre-loaded ticks: no I/O.
///
/// Scheduled orders are submitted just before the first tick at or after
/// their `placed_at`; orders scheduled after the last tick are still
/// submitted so they show up in the final snapshot.
pub fn run_simulation(
    config: &SimulationConfig,
    ticks: &[PriceTick],
) -> Result<SimulationResult, RunError> {
    let run_id = config.run_id()?;
    let mut blotter = build_blotter(config)?;

    let mut schedule: Vec<&ScheduledOrder> = config.orders.iter().collect();
    schedule.sort_by_key(|o| o.placed_at);
    let mut pending = schedule.into_iter().peekable();

    info!(
        run_id = %run_id,
        ticks = ticks.len(),
        orders = config.orders.len(),
        initial_cash = config.initial_cash,
        "simulation started"
    );

    let mut rejections = Vec::new();
    let mut expired = Vec::new();

    for tick in ticks {
        while let Some(order) = pending.next_if(|o| o.placed_at <= tick.timestamp) {
            submit(&mut blotter, order)?;
        }
        let report = blotter.on_tick(tick)?;
        rejections.extend(report.rejections);
        expired.extend(report.expired);
    }
    for order in pending {
        submit(&mut blotter, order)?;
    }

    let snapshot = blotter.snapshot();
    let portfolio = blotter.portfolio();
    let result = SimulationResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        tick_count: ticks.len(),
        initial_cash: portfolio.initial_cash(),
        final_cash: portfolio.cash(),
        final_equity: portfolio.equity(),
        realized_pnl: portfolio.realized_pnl(),
        unrealized_pnl: portfolio.unrealized_pnl(),
        total_commission: portfolio.total_commission(),
        rejections,
        expired,
        snapshot,
    };

    if !result.rejections.is_empty() {
        warn!(run_id = %result.run_id, count = result.rejections.len(), "fills were refused");
    }
    info!(
        run_id = %result.run_id,
        trades = result.trade_count(),
        final_equity = result.final_equity,
        "simulation finished"
    );
    Ok(result)
}

fn submit(blotter: &mut Blotter, order: &ScheduledOrder) -> Result<OrderId, RunError> {
    Ok(blotter.place_order(
        &order.ticker,
        order.action,
        order.order_type,
        order.stop_price,
        order.limit_price,
        order.qty,
        Some(order.placed_at),
        order.subtype,
    )?)
}

/// Load the config and tape from disk, then run.
pub fn run_from_files(config_path: &Path, tape_path: &Path) -> Result<SimulationResult, RunError> {
    let config = SimulationConfig::from_file(config_path)?;
    let ticks = load_tape(tape_path)?;
    run_simulation(&config, &ticks)
}
