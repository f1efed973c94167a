use serde::{Deserialize, Serialize};
use std::fmt;

/// Order ID, unique within a single blotter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0)
    }
}

/// Trade ID, unique within a single blotter's trade history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Monotonic id source for orders and trades.
///
/// Ids start at 1 and are never reused, so a purged order's id can still be
/// matched against the trades it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdGen {
    next_order: u64,
    next_trade: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self {
            next_order: 1,
            next_trade: 1,
        }
    }

    pub fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order);
        self.next_order += 1;
        id
    }

    pub fn next_trade_id(&mut self) -> TradeId {
        let id = TradeId(self.next_trade);
        self.next_trade += 1;
        id
    }

    pub fn peek_order_id(&self) -> OrderId {
        OrderId(self.next_order)
    }

    /// The id the next trade will receive, without consuming it.
    pub fn peek_trade_id(&self) -> TradeId {
        TradeId(self.next_trade)
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}
