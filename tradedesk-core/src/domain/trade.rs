//! Trade: the immutable record of one executed fill.

use super::ids::{OrderId, TradeId};
use super::instrument::Ticker;
use super::order::{Order, TradeAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeError {
    #[error("invalid fill quantity {qty} for order {order_id} ({open} open)")]
    InvalidQuantity {
        order_id: OrderId,
        qty: i64,
        open: i64,
    },

    #[error("execution price must be positive and finite, got {0}")]
    InvalidPrice(f64),
}

/// A single execution against an order.
///
/// Built once by [`Trade::from_order`] and never mutated; the blotter keeps
/// every trade in an append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    id: TradeId,
    ticker: Ticker,
    action: TradeAction,
    qty: i64,
    price: f64,
    commission: f64,
    trade_date: DateTime<Utc>,
    order_id: OrderId,
    strategy: String,
}

impl Trade {
    /// Snapshot a fill of `qty` shares of `order` at `execution_price`.
    ///
    /// `qty` must be positive and no larger than the order's open amount.
    pub fn from_order(
        id: TradeId,
        order: &Order,
        qty: i64,
        trade_date: DateTime<Utc>,
        execution_price: f64,
        commission: f64,
        strategy: impl Into<String>,
    ) -> Result<Self, TradeError> {
        let open = order.open_amount();
        if qty <= 0 || qty > open {
            return Err(TradeError::InvalidQuantity {
                order_id: order.id(),
                qty,
                open,
            });
        }
        if !execution_price.is_finite() || execution_price <= 0.0 {
            return Err(TradeError::InvalidPrice(execution_price));
        }

        Ok(Self {
            id,
            ticker: order.ticker().clone(),
            action: order.action(),
            qty,
            price: execution_price,
            commission,
            trade_date,
            order_id: order.id(),
            strategy: strategy.into(),
        })
    }

    pub fn id(&self) -> TradeId {
        self.id
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn action(&self) -> TradeAction {
        self.action
    }

    /// Shares traded, always positive.
    pub fn qty(&self) -> i64 {
        self.qty
    }

    /// Shares traded with the sign of the holding change (+buy, -sell).
    pub fn signed_qty(&self) -> i64 {
        self.qty * self.action.sign()
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn commission(&self) -> f64 {
        self.commission
    }

    pub fn trade_date(&self) -> DateTime<Utc> {
        self.trade_date
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// `qty * price` before commission.
    pub fn gross_value(&self) -> f64 {
        self.qty as f64 * self.price
    }

    /// Signed cash impact net of commission: negative for buys, positive for sells.
    pub fn trade_value(&self) -> f64 {
        match self.action {
            TradeAction::Buy => -self.gross_value() - self.commission,
            TradeAction::Sell => self.gross_value() - self.commission,
        }
    }
}
