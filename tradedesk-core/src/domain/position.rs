//! OwnedAsset: an open holding in one instrument.

use super::instrument::Ticker;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("position in {0} must hold a non-zero number of shares")]
    ZeroShares(Ticker),

    #[error("share price must be positive and finite, got {0}")]
    InvalidPrice(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => f.write_str("LONG"),
            PositionSide::Short => f.write_str("SHORT"),
        }
    }
}

/// Result of applying a fill to an existing holding.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionUpdate {
    /// Shares remain; this is the holding's new state.
    Updated(OwnedAsset),
    /// Shares went to zero. `liquidation_value` is the signed gross cash the
    /// closing fill releases (positive when selling out a long, negative when
    /// buying back a short).
    Closed {
        liquidation_value: f64,
        realized_pnl: f64,
    },
}

/// A holding in one instrument.
///
/// `shares_owned` is signed (positive long, negative short) and never zero:
/// a holding that reaches zero is returned as [`PositionUpdate::Closed`] and
/// must be removed from the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedAsset {
    ticker: Ticker,
    shares_owned: i64,
    average_share_price: f64,
    /// Last price the holding was valued at.
    mark_price: f64,
    realized_pnl: f64,
}

impl OwnedAsset {
    /// Open a new holding of `shares` (positive) on `side` at `price`.
    pub fn open(
        ticker: Ticker,
        side: PositionSide,
        shares: i64,
        price: f64,
    ) -> Result<Self, PositionError> {
        if shares == 0 {
            return Err(PositionError::ZeroShares(ticker));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(PositionError::InvalidPrice(price));
        }
        let signed = match side {
            PositionSide::Long => shares.abs(),
            PositionSide::Short => -shares.abs(),
        };
        Ok(Self {
            ticker,
            shares_owned: signed,
            average_share_price: price,
            mark_price: price,
            realized_pnl: 0.0,
        })
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Signed share count.
    pub fn shares_owned(&self) -> i64 {
        self.shares_owned
    }

    pub fn average_share_price(&self) -> f64 {
        self.average_share_price
    }

    pub fn mark_price(&self) -> f64 {
        self.mark_price
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn side(&self) -> PositionSide {
        if self.shares_owned > 0 {
            PositionSide::Long
        } else {
            PositionSide::Short
        }
    }

    /// `shares * average price`; negative for shorts.
    pub fn total_position_cost(&self) -> f64 {
        self.shares_owned as f64 * self.average_share_price
    }

    /// `shares * mark price`; negative for shorts.
    pub fn total_position_value(&self) -> f64 {
        self.shares_owned as f64 * self.mark_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.total_position_value() - self.total_position_cost()
    }

    pub fn mark(&mut self, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.mark_price = price;
        }
    }

    /// Apply a fill of `signed_qty` shares at `price` without mutating `self`.
    ///
    /// - Same direction: shares grow, average price is re-weighted.
    /// - Opposite direction: realizes PnL on the closed shares, average is kept.
    /// - Crossing zero: the remainder opens on the other side at `price`.
    pub fn apply_fill(&self, signed_qty: i64, price: f64) -> PositionUpdate {
        let old = self.shares_owned;
        let new = old + signed_qty;
        let mut next = self.clone();
        next.mark_price = price;

        if signed_qty == 0 {
            return PositionUpdate::Updated(next);
        }

        if old.signum() == signed_qty.signum() {
            let total_cost = old.abs() as f64 * self.average_share_price
                + signed_qty.abs() as f64 * price;
            next.average_share_price = total_cost / new.abs() as f64;
            next.shares_owned = new;
            return PositionUpdate::Updated(next);
        }

        let closed = signed_qty.abs().min(old.abs());
        next.realized_pnl += (price - self.average_share_price) * closed as f64 * old.signum() as f64;

        if new == 0 {
            return PositionUpdate::Closed {
                liquidation_value: closed as f64 * price * old.signum() as f64,
                realized_pnl: next.realized_pnl,
            };
        }

        if new.signum() != old.signum() {
            next.average_share_price = price;
        }
        next.shares_owned = new;
        PositionUpdate::Updated(next)
    }
}
