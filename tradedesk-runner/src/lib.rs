//! Tradedesk Runner: drives `tradedesk-core` blotters over recorded prices.
//!
//! This crate builds on `tradedesk-core` to provide:
//! - TOML simulation configs with content-addressed run ids
//! - CSV price tape loading
//! - Single-run simulation with scheduled order submission
//! - Parallel parameter sweeps
//! - JSON/CSV artifact export
//! - Tracing subscriber setup

pub mod config;
pub mod export;
pub mod logging;
pub mod runner;
pub mod sweep;
pub mod tape;

pub use config::{CommissionConfig, ConfigError, RunId, ScheduledOrder, SimulationConfig};
pub use export::{
    export_json, export_portfolio_json, export_trades_csv, export_trades_json, import_json,
    load_artifacts, save_artifacts,
};
pub use logging::{init_tracing, LogFormat, DEFAULT_FILTER};
pub use runner::{
    build_blotter, run_from_files, run_simulation, RunError, SimulationResult, SCHEMA_VERSION,
};
pub use sweep::{ParamGrid, ParamSweep, SweepResults};
pub use tape::{load_tape, read_tape, TapeError};
