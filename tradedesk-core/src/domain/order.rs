//! Orders: trading instructions with trigger logic and fill state.

use super::ids::OrderId;
use super::instrument::Ticker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("order {id} cannot fill {qty} shares with {open} open")]
    Overfill { id: OrderId, qty: i64, open: i64 },

    #[error("order {0} is already closed ({1})")]
    AlreadyClosed(OrderId, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    /// +1 for buys, -1 for sells. Multiplying a share count by this gives the
    /// signed change to a holding.
    pub fn sign(self) -> i64 {
        match self {
            TradeAction::Buy => 1,
            TradeAction::Sell => -1,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => f.write_str("BUY"),
            TradeAction::Sell => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Fires on any price.
    Market,
    /// Becomes a market order once the stop price is crossed.
    Stop,
    /// Fires when the price is at least as favorable as the limit.
    Limit,
    /// Becomes a limit order once the stop price is crossed.
    StopLimit,
}

impl OrderType {
    pub fn needs_stop(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }

    pub fn needs_limit(self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }
}

/// How long an order stays live and whether it accepts partial fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSubType {
    /// Expires once the simulation clock reaches a later calendar day (UTC).
    #[default]
    Day,
    /// Never expires on its own.
    GoodTillCanceled,
    /// Never expires on its own, and only fills for its whole open amount.
    AllOrNone,
}

/// Order lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled { reason: String },
    Rejected { reason: String },
    Expired,
}

impl OrderStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => f.write_str("open"),
            OrderStatus::PartiallyFilled => f.write_str("partially filled"),
            OrderStatus::Filled => f.write_str("filled"),
            OrderStatus::Cancelled { reason } => write!(f, "cancelled: {reason}"),
            OrderStatus::Rejected { reason } => write!(f, "rejected: {reason}"),
            OrderStatus::Expired => f.write_str("expired"),
        }
    }
}

/// A single trading instruction.
///
/// Fields are read through accessors so the fill invariant
/// `0 <= filled <= qty` can only change through [`Order::record_fill`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    ticker: Ticker,
    action: TradeAction,
    order_type: OrderType,
    subtype: OrderSubType,
    qty: i64,
    filled: i64,
    stop_price: Option<f64>,
    limit_price: Option<f64>,
    created: DateTime<Utc>,
    commission: f64,
    status: OrderStatus,
    /// Set the first time the stop condition is seen; stays set.
    stop_reached: bool,
}

impl Order {
    /// Validate and construct a new open order.
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        id: OrderId,
        ticker: Ticker,
        action: TradeAction,
        order_type: OrderType,
        stop_price: Option<f64>,
        limit_price: Option<f64>,
        qty: i64,
        created: DateTime<Utc>,
        subtype: Option<OrderSubType>,
    ) -> Result<Self, OrderError> {
        if qty <= 0 {
            return Err(OrderError::InvalidOrder(format!(
                "quantity must be positive, got {qty}"
            )));
        }
        check_price("stop", order_type, order_type.needs_stop(), stop_price)?;
        check_price("limit", order_type, order_type.needs_limit(), limit_price)?;

        Ok(Self {
            id,
            ticker,
            action,
            order_type,
            subtype: subtype.unwrap_or_default(),
            qty,
            filled: 0,
            stop_price,
            limit_price,
            created,
            commission: 0.0,
            status: OrderStatus::Open,
            stop_reached: false,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn action(&self) -> TradeAction {
        self.action
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn subtype(&self) -> OrderSubType {
        self.subtype
    }

    /// Requested quantity.
    pub fn qty(&self) -> i64 {
        self.qty
    }

    pub fn filled(&self) -> i64 {
        self.filled
    }

    pub fn open_amount(&self) -> i64 {
        self.qty - self.filled
    }

    pub fn stop_price(&self) -> Option<f64> {
        self.stop_price
    }

    pub fn limit_price(&self) -> Option<f64> {
        self.limit_price
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Commission accumulated across all fills of this order.
    pub fn commission(&self) -> f64 {
        self.commission
    }

    pub fn status(&self) -> &OrderStatus {
        &self.status
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn stop_reached(&self) -> bool {
        self.stop_reached
    }

    /// Whether the subtype's lifetime has run out at `at_time`.
    pub fn is_expired_at(&self, at_time: DateTime<Utc>) -> bool {
        match self.subtype {
            OrderSubType::Day => at_time.date_naive() > self.created.date_naive(),
            OrderSubType::GoodTillCanceled | OrderSubType::AllOrNone => false,
        }
    }

    /// Does the order fire at `current_price`?
    ///
    /// The only state this touches is the stop flag: once a stop or stop-limit
    /// order has seen its stop price it stays armed, so later checks only look
    /// at the limit (or fire unconditionally for a plain stop).
    pub fn check_triggers(&mut self, current_time: DateTime<Utc>, current_price: f64) -> bool {
        if !self.is_open()
            || !current_price.is_finite()
            || current_time < self.created
            || self.is_expired_at(current_time)
        {
            return false;
        }

        match self.order_type {
            OrderType::Market => true,
            OrderType::Stop => self.arm_stop(current_price),
            OrderType::Limit => self.limit_reached(current_price),
            OrderType::StopLimit => {
                self.arm_stop(current_price) && self.limit_reached(current_price)
            }
        }
    }

    fn arm_stop(&mut self, price: f64) -> bool {
        if self.stop_reached {
            return true;
        }
        let Some(stop) = self.stop_price else {
            return false;
        };
        let crossed = match self.action {
            TradeAction::Buy => price >= stop,
            TradeAction::Sell => price <= stop,
        };
        if crossed {
            debug!(order = %self.id, ticker = %self.ticker, stop, price, "stop armed");
            self.stop_reached = true;
        }
        crossed
    }

    fn limit_reached(&self, price: f64) -> bool {
        let Some(limit) = self.limit_price else {
            return false;
        };
        match self.action {
            TradeAction::Buy => price <= limit,
            TradeAction::Sell => price >= limit,
        }
    }

    /// Quantity that could still be filled at `at_time`. Nothing is available
    /// before the order was created.
    pub fn get_available_volume(&self, at_time: DateTime<Utc>) -> i64 {
        if !self.is_open() || at_time < self.created || self.is_expired_at(at_time) {
            0
        } else {
            self.open_amount()
        }
    }

    /// Apply an execution: `filled += qty`, `commission += cost`.
    pub fn record_fill(&mut self, qty: i64, commission: f64) -> Result<(), OrderError> {
        if !self.is_open() {
            return Err(OrderError::AlreadyClosed(self.id, self.status.to_string()));
        }
        let open = self.open_amount();
        if qty <= 0 || qty > open {
            return Err(OrderError::Overfill {
                id: self.id,
                qty,
                open,
            });
        }

        self.filled += qty;
        self.commission += commission;
        self.status = if self.filled == self.qty {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        Ok(())
    }

    /// Re-check the invariants [`Order::place`] and [`Order::record_fill`]
    /// maintain, for orders read back from storage.
    pub fn validate(&self) -> Result<(), OrderError> {
        let invalid = |msg: String| -> Result<(), OrderError> {
            Err(OrderError::InvalidOrder(format!("order {}: {msg}", self.id)))
        };

        if self.qty <= 0 {
            return invalid(format!("quantity must be positive, got {}", self.qty));
        }
        if self.filled < 0 || self.filled > self.qty {
            return invalid(format!("filled {} outside 0..={}", self.filled, self.qty));
        }
        if !self.commission.is_finite() || self.commission < 0.0 {
            return invalid(format!("commission must be non-negative, got {}", self.commission));
        }
        check_price("stop", self.order_type, self.order_type.needs_stop(), self.stop_price)?;
        check_price("limit", self.order_type, self.order_type.needs_limit(), self.limit_price)?;

        let consistent = match self.status {
            OrderStatus::Open => self.filled == 0,
            OrderStatus::PartiallyFilled => self.filled > 0 && self.filled < self.qty,
            OrderStatus::Filled => self.filled == self.qty,
            OrderStatus::Cancelled { .. } | OrderStatus::Rejected { .. } | OrderStatus::Expired => {
                true
            }
        };
        if !consistent {
            return invalid(format!("status {} with {} of {} filled", self.status, self.filled, self.qty));
        }
        Ok(())
    }

    pub fn cancel(&mut self, reason: &str) -> Result<(), OrderError> {
        self.close_with(OrderStatus::Cancelled {
            reason: reason.to_string(),
        })
    }

    pub fn reject(&mut self, reason: &str) -> Result<(), OrderError> {
        self.close_with(OrderStatus::Rejected {
            reason: reason.to_string(),
        })
    }

    /// Move to Expired if the subtype's lifetime has passed. Returns whether it did.
    pub fn expire_if_due(&mut self, at_time: DateTime<Utc>) -> bool {
        if self.is_open() && self.is_expired_at(at_time) {
            self.status = OrderStatus::Expired;
            true
        } else {
            false
        }
    }

    fn close_with(&mut self, status: OrderStatus) -> Result<(), OrderError> {
        if !self.is_open() {
            return Err(OrderError::AlreadyClosed(self.id, self.status.to_string()));
        }
        self.status = status;
        Ok(())
    }
}

fn check_price(
    label: &str,
    order_type: OrderType,
    required: bool,
    price: Option<f64>,
) -> Result<(), OrderError> {
    match (required, price) {
        (true, None) => Err(OrderError::InvalidOrder(format!(
            "{order_type:?} order requires a {label} price"
        ))),
        (false, Some(p)) => Err(OrderError::InvalidOrder(format!(
            "{order_type:?} order does not take a {label} price (got {p})"
        ))),
        (true, Some(p)) if !p.is_finite() || p <= 0.0 => Err(OrderError::InvalidOrder(format!(
            "{label} price must be positive and finite, got {p}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap()
    }

    fn spy() -> Ticker {
        Ticker::parse("SPY").unwrap()
    }

    fn order(
        action: TradeAction,
        order_type: OrderType,
        stop: Option<f64>,
        limit: Option<f64>,
    ) -> Order {
        Order::place(OrderId(1), spy(), action, order_type, stop, limit, 100, t0(), None).unwrap()
    }

    #[test]
    fn rejects_non_positive_quantity() {
        for qty in [0, -5] {
            let err = Order::place(
                OrderId(1),
                spy(),
                TradeAction::Buy,
                OrderType::Market,
                None,
                None,
                qty,
                t0(),
                None,
            )
            .unwrap_err();
            assert!(matches!(err, OrderError::InvalidOrder(_)));
        }
    }

    #[test]
    fn rejects_missing_prices() {
        let missing_stop = Order::place(
            OrderId(1),
            spy(),
            TradeAction::Sell,
            OrderType::Stop,
            None,
            None,
            10,
            t0(),
            None,
        );
        assert!(missing_stop.is_err());

        let missing_limit = Order::place(
            OrderId(1),
            spy(),
            TradeAction::Buy,
            OrderType::StopLimit,
            Some(50.0),
            None,
            10,
            t0(),
            None,
        );
        assert!(missing_limit.is_err());
    }

    #[test]
    fn rejects_unused_or_bad_prices() {
        let extra = Order::place(
            OrderId(1),
            spy(),
            TradeAction::Buy,
            OrderType::Market,
            None,
            Some(10.0),
            10,
            t0(),
            None,
        );
        assert!(extra.is_err());

        let nan = Order::place(
            OrderId(1),
            spy(),
            TradeAction::Buy,
            OrderType::Limit,
            None,
            Some(f64::NAN),
            10,
            t0(),
            None,
        );
        assert!(nan.is_err());
    }

    #[test]
    fn default_subtype_is_day() {
        let o = order(TradeAction::Buy, OrderType::Market, None, None);
        assert_eq!(o.subtype(), OrderSubType::Day);
        assert_eq!(o.open_amount(), 100);
        assert!(o.is_open());
    }

    #[test]
    fn market_always_fires() {
        let mut o = order(TradeAction::Sell, OrderType::Market, None, None);
        assert!(o.check_triggers(t0(), 1.0));
        assert!(o.check_triggers(t0(), 1_000.0));
    }

    #[test]
    fn buy_stop_fires_at_or_above_stop() {
        let mut o = order(TradeAction::Buy, OrderType::Stop, Some(50.0), None);
        assert!(!o.check_triggers(t0(), 49.99));
        assert!(o.check_triggers(t0(), 50.0));

        let mut o = order(TradeAction::Buy, OrderType::Stop, Some(50.0), None);
        assert!(o.check_triggers(t0(), 55.0));
    }

    #[test]
    fn sell_stop_fires_at_or_below_stop() {
        let mut o = order(TradeAction::Sell, OrderType::Stop, Some(95.0), None);
        assert!(!o.check_triggers(t0(), 96.0));
        assert!(o.check_triggers(t0(), 94.0));
    }

    #[test]
    fn armed_stop_stays_armed() {
        let mut o = order(TradeAction::Sell, OrderType::Stop, Some(95.0), None);
        assert!(o.check_triggers(t0(), 94.0));
        assert!(o.stop_reached());
        // Price recovers above the stop: the order is now a market order.
        assert!(o.check_triggers(t0(), 99.0));
        assert!(o.check_triggers(t0(), 99.0));
    }

    #[test]
    fn limit_fires_on_favorable_price() {
        let mut buy = order(TradeAction::Buy, OrderType::Limit, None, Some(100.0));
        assert!(!buy.check_triggers(t0(), 100.5));
        assert!(buy.check_triggers(t0(), 100.0));
        assert!(buy.check_triggers(t0(), 90.0));

        let mut sell = order(TradeAction::Sell, OrderType::Limit, None, Some(100.0));
        assert!(!sell.check_triggers(t0(), 99.0));
        assert!(sell.check_triggers(t0(), 105.0));
    }

    #[test]
    fn stop_limit_needs_both_conditions() {
        // Buy stop-limit: stop 50, limit 52.
        let mut o = order(TradeAction::Buy, OrderType::StopLimit, Some(50.0), Some(52.0));
        assert!(!o.check_triggers(t0(), 49.0)); // stop not reached
        assert!(!o.check_triggers(t0(), 53.0)); // stop reached, limit not
        assert!(o.stop_reached());
        assert!(o.check_triggers(t0(), 51.0)); // armed, within limit
        // Armed: dropping back below the stop still fills within the limit.
        assert!(o.check_triggers(t0(), 45.0));
    }

    #[test]
    fn no_trigger_before_creation_or_after_close() {
        let mut o = order(TradeAction::Buy, OrderType::Market, None, None);
        let before = t0() - chrono::Duration::minutes(1);
        assert!(!o.check_triggers(before, 10.0));

        o.cancel("user").unwrap();
        assert!(!o.check_triggers(t0(), 10.0));
    }

    #[test]
    fn non_finite_price_never_fires() {
        let mut o = order(TradeAction::Buy, OrderType::Market, None, None);
        assert!(!o.check_triggers(t0(), f64::NAN));
    }

    #[test]
    fn day_order_expires_next_calendar_day() {
        let mut o = order(TradeAction::Buy, OrderType::Market, None, None);
        let same_day = t0() + chrono::Duration::hours(5);
        let next_day = t0() + chrono::Duration::days(1);

        assert_eq!(o.get_available_volume(same_day), 100);
        assert_eq!(o.get_available_volume(next_day), 0);
        assert!(!o.check_triggers(next_day, 10.0));

        assert!(!o.expire_if_due(same_day));
        assert!(o.expire_if_due(next_day));
        assert_eq!(o.status(), &OrderStatus::Expired);
    }

    #[test]
    fn nothing_available_before_creation() {
        let o = order(TradeAction::Buy, OrderType::Market, None, None);
        assert_eq!(o.get_available_volume(t0() - chrono::Duration::seconds(1)), 0);
        assert_eq!(o.get_available_volume(t0()), 100);
    }

    #[test]
    fn validate_catches_corrupt_fill_state() {
        let mut o = order(TradeAction::Buy, OrderType::Market, None, None);
        o.validate().unwrap();
        o.record_fill(40, 1.0).unwrap();
        o.validate().unwrap();

        let mut value = serde_json::to_value(&o).unwrap();
        value["filled"] = serde_json::json!(150);
        let overfilled: Order = serde_json::from_value(value.clone()).unwrap();
        assert!(matches!(overfilled.validate(), Err(OrderError::InvalidOrder(_))));

        value["filled"] = serde_json::json!(0);
        let stale_status: Order = serde_json::from_value(value.clone()).unwrap();
        assert!(matches!(stale_status.validate(), Err(OrderError::InvalidOrder(_))));

        value["filled"] = serde_json::json!(40);
        value["limit_price"] = serde_json::json!(10.0);
        let stray_limit: Order = serde_json::from_value(value).unwrap();
        assert!(matches!(stray_limit.validate(), Err(OrderError::InvalidOrder(_))));
    }

    #[test]
    fn gtc_order_does_not_expire() {
        let mut o = Order::place(
            OrderId(2),
            spy(),
            TradeAction::Buy,
            OrderType::Market,
            None,
            None,
            10,
            t0(),
            Some(OrderSubType::GoodTillCanceled),
        )
        .unwrap();
        let much_later = t0() + chrono::Duration::days(30);
        assert_eq!(o.get_available_volume(much_later), 10);
        assert!(!o.expire_if_due(much_later));
    }

    #[test]
    fn partial_then_full_fill() {
        let mut o = order(TradeAction::Buy, OrderType::Market, None, None);
        o.record_fill(30, 1.0).unwrap();
        assert_eq!(o.status(), &OrderStatus::PartiallyFilled);
        assert_eq!(o.open_amount(), 70);
        assert!(o.is_open());

        o.record_fill(70, 1.0).unwrap();
        assert_eq!(o.status(), &OrderStatus::Filled);
        assert_eq!(o.commission(), 2.0);
        assert!(!o.is_open());
        assert_eq!(o.get_available_volume(t0()), 0);
    }

    #[test]
    fn overfill_and_zero_fill_are_errors() {
        let mut o = order(TradeAction::Buy, OrderType::Market, None, None);
        assert!(matches!(
            o.record_fill(101, 0.0),
            Err(OrderError::Overfill { qty: 101, open: 100, .. })
        ));
        assert!(o.record_fill(0, 0.0).is_err());
        assert_eq!(o.filled(), 0);
    }

    #[test]
    fn closed_orders_reject_transitions() {
        let mut o = order(TradeAction::Buy, OrderType::Market, None, None);
        o.reject("halted").unwrap();
        assert!(matches!(o.cancel("again"), Err(OrderError::AlreadyClosed(..))));
        assert!(matches!(o.record_fill(1, 0.0), Err(OrderError::AlreadyClosed(..))));
    }

    #[test]
    fn order_serialization_roundtrip() {
        let o = order(TradeAction::Sell, OrderType::StopLimit, Some(95.0), Some(94.0));
        let json = serde_json::to_string(&o).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), o.id());
        assert_eq!(back.stop_price(), Some(95.0));
        assert_eq!(back.limit_price(), Some(94.0));
    }
}
