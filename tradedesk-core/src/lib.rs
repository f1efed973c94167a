//! Tradedesk Core: order management and trade execution for backtests.
//!
//! - Domain types (tickers, orders, trades, holdings, portfolio)
//! - Pluggable commission models
//! - Asset lookup
//! - The blotter: order intake, trigger evaluation, fills, purging

pub mod blotter;
pub mod commission;
pub mod domain;
pub mod finder;

pub use blotter::{
    Blotter, BlotterError, BlotterSnapshot, ConfigError, FillOutcome, PriceTick, RejectReason,
    Rejection, TickReport,
};
pub use commission::{CommissionModel, CommissionTier, NoCommission, PerOrder, PerShare, Tiered};
pub use finder::{AssetFinder, AssetUniverse, OpenUniverse};
