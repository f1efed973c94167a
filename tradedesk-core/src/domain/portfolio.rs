//! Portfolio: aggregate state of cash + all open holdings.

use super::instrument::Ticker;
use super::position::{OwnedAsset, PositionUpdate};
use super::trade::Trade;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
    #[error("cash must be finite and non-negative, got {0}")]
    InvalidCash(f64),

    #[error("no position held in {0}")]
    PositionNotFound(String),

    #[error("holding keyed as {key} belongs to {ticker}")]
    MismatchedHolding { key: Ticker, ticker: Ticker },

    #[error("holding in {0} has zero shares")]
    EmptyHolding(Ticker),
}

/// How a fill changes the holdings. Computed before anything is mutated so a
/// trade can be annotated and validated first, then committed in one step.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionChange {
    /// No prior holding; this is the new one.
    Opened(OwnedAsset),
    /// A holding existed; this is what the fill did to it.
    Existing(PositionUpdate),
}

/// Cash plus open holdings.
///
/// Cash only moves through [`Portfolio::commit`], together with the matching
/// holding change, so the two cannot drift apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    cash: f64,
    initial_cash: f64,
    holdings: HashMap<Ticker, OwnedAsset>,
    total_commission: f64,
    /// PnL realized by holdings that have since been closed and removed.
    closed_realized_pnl: f64,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Result<Self, PortfolioError> {
        if !initial_cash.is_finite() || initial_cash < 0.0 {
            return Err(PortfolioError::InvalidCash(initial_cash));
        }
        Ok(Self {
            cash: initial_cash,
            initial_cash,
            holdings: HashMap::new(),
            total_commission: 0.0,
            closed_realized_pnl: 0.0,
        })
    }

    /// Seed a pre-existing holding (e.g. restoring a saved state).
    pub fn with_holding(mut self, asset: OwnedAsset) -> Self {
        self.holdings.insert(asset.ticker().clone(), asset);
        self
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    pub fn holdings(&self) -> impl Iterator<Item = &OwnedAsset> {
        self.holdings.values()
    }

    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    /// Holding for `ticker`, normalised the same way [`Ticker::parse`] does.
    /// Input that is not a valid ticker is a miss.
    pub fn get(&self, ticker: &str) -> Option<&OwnedAsset> {
        match self.holdings.get(ticker) {
            Some(pos) => Some(pos),
            None => Ticker::parse(ticker).ok().and_then(|t| self.holdings.get(&t)),
        }
    }

    /// Like [`get`](Self::get) but a miss is an error.
    pub fn position(&self, ticker: &str) -> Result<&OwnedAsset, PortfolioError> {
        self.get(ticker).ok_or_else(|| {
            let name = Ticker::parse(ticker).map_or_else(|_| ticker.to_string(), |t| t.to_string());
            PortfolioError::PositionNotFound(name)
        })
    }

    pub fn has_position(&self, ticker: &str) -> bool {
        self.get(ticker).is_some()
    }

    /// Can cash cover `commission + price_per_share * qty`?
    ///
    /// The buy-side gate. Sells go through [`can_cover`](Self::can_cover).
    pub fn check_liquidity(&self, commission: f64, price_per_share: f64, qty: i64) -> bool {
        self.can_cover(commission + price_per_share * qty as f64)
    }

    /// Can cash pay a net outflow of `required`? Inflows (negative) always pass.
    pub fn can_cover(&self, required: f64) -> bool {
        required <= 0.0 || self.cash >= required
    }

    /// Value a holding at `price`. No-op if nothing is held.
    pub fn mark(&mut self, ticker: &str, price: f64) {
        let Ok(ticker) = Ticker::parse(ticker) else {
            return;
        };
        if let Some(pos) = self.holdings.get_mut(&ticker) {
            pos.mark(price);
        }
    }

    /// Cash plus the marked value of every holding (shorts count negative).
    pub fn equity(&self) -> f64 {
        self.cash + self.holdings.values().map(OwnedAsset::total_position_value).sum::<f64>()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.holdings.values().map(OwnedAsset::unrealized_pnl).sum()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.closed_realized_pnl + self.holdings.values().map(OwnedAsset::realized_pnl).sum::<f64>()
    }

    /// Apply a trade's cash and its holding change together.
    pub(crate) fn commit(&mut self, trade: &Trade, change: PositionChange) {
        self.cash += trade.trade_value();
        self.total_commission += trade.commission();

        match change {
            PositionChange::Opened(asset)
            | PositionChange::Existing(PositionUpdate::Updated(asset)) => {
                self.holdings.insert(trade.ticker().clone(), asset);
            }
            PositionChange::Existing(PositionUpdate::Closed { realized_pnl, .. }) => {
                self.holdings.remove(trade.ticker());
                self.closed_realized_pnl += realized_pnl;
            }
        }
    }

    /// Structural checks for a portfolio handed in from outside (e.g. deserialized).
    pub fn validate(&self) -> Result<(), PortfolioError> {
        if !self.cash.is_finite() || self.cash < 0.0 {
            return Err(PortfolioError::InvalidCash(self.cash));
        }
        for (key, asset) in &self.holdings {
            if key != asset.ticker() {
                return Err(PortfolioError::MismatchedHolding {
                    key: key.clone(),
                    ticker: asset.ticker().clone(),
                });
            }
            if asset.shares_owned() == 0 {
                return Err(PortfolioError::EmptyHolding(key.clone()));
            }
        }
        Ok(())
    }
}
