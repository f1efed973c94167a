//! Blotter: order intake, trigger evaluation and trade execution.
//!
//! The blotter owns every open order (grouped by ticker, insertion order
//! kept), the append-only trade history and the one portfolio trades settle
//! against. On each price it:
//!
//! 1. advances the clock and marks the holding,
//! 2. expires orders whose lifetime ran out,
//! 3. asks each open order for that ticker whether it fires,
//! 4. executes the ones that do (volume, commission, liquidity, position, trade),
//! 5. purges closed orders.
//!
//! A fill either commits everything (order fill, cash, holding, trade record)
//! or nothing. Liquidity shortfalls are reported, not raised.

use crate::commission::{CommissionModel, PerOrder};
use crate::domain::{
    IdGen, Order, OrderError, OrderId, OrderSubType, OrderType, OwnedAsset, Portfolio,
    PortfolioError, PositionChange, PositionError, PositionSide, PositionUpdate, Ticker,
    TickerError, Trade, TradeAction, TradeError, TradeId,
};
use crate::finder::{AssetFinder, OpenUniverse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Collaborators handed to [`Blotter::new`] that fail validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("portfolio: {0}")]
    Portfolio(#[from] PortfolioError),

    #[error("commission model: {0}")]
    Commission(String),

    #[error("participation limit must be in (0, 1], got {0}")]
    Participation(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlotterError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ticker(#[from] TickerError),

    #[error("unknown asset: {0}")]
    UnknownAsset(Ticker),

    #[error("no placement date given and no price has been seen yet")]
    NoTimestamp,

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Trade(#[from] TradeError),

    #[error(transparent)]
    Position(#[from] PositionError),
}

/// Why a fired order did not fill. The order stays as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// The fill's net cash outflow exceeds the cash on hand.
    InsufficientLiquidity { required: f64, available: f64 },
    /// Nothing left to fill: the order is closed, expired, or the tick's
    /// participation budget is spent.
    NoVolume,
    /// ALL_OR_NONE order offered less than its full open amount.
    PartialFillRefused { available: i64, open: i64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InsufficientLiquidity {
                required,
                available,
            } => write!(f, "insufficient liquidity: need {required:.2}, have {available:.2}"),
            RejectReason::NoVolume => f.write_str("no volume available"),
            RejectReason::PartialFillRefused { available, open } => {
                write!(f, "all-or-none: only {available} of {open} available")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    Filled(Trade),
    Rejected(RejectReason),
}

impl FillOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, FillOutcome::Filled(_))
    }
}

/// One market observation for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub timestamp: DateTime<Utc>,
    pub ticker: Ticker,
    pub price: f64,
    /// Shares traded in the market during this tick, if known. Only used by
    /// the participation limit.
    #[serde(default)]
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub order_id: OrderId,
    pub reason: RejectReason,
}

/// What happened while processing one price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub timestamp: DateTime<Utc>,
    pub ticker: Ticker,
    pub fills: Vec<TradeId>,
    pub rejections: Vec<Rejection>,
    pub expired: Vec<OrderId>,
    pub purged: usize,
}

impl TickReport {
    fn new(timestamp: DateTime<Utc>, ticker: Ticker) -> Self {
        Self {
            timestamp,
            ticker,
            fills: Vec::new(),
            rejections: Vec::new(),
            expired: Vec::new(),
            purged: 0,
        }
    }
}

/// Serializable view of the blotter for a storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlotterSnapshot {
    pub current_dt: Option<DateTime<Utc>>,
    /// Orders still in the book, by id.
    pub orders: Vec<Order>,
    pub trades: Vec<Trade>,
    pub portfolio: Portfolio,
    pub equity: f64,
}

impl BlotterSnapshot {
    /// Structural checks for a snapshot read back from storage.
    pub fn validate(&self) -> Result<(), BlotterError> {
        for order in &self.orders {
            order.validate()?;
        }
        self.portfolio.validate().map_err(ConfigError::from)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Blotter {
    finder: Box<dyn AssetFinder + Send + Sync>,
    portfolio: Portfolio,
    commission: Box<dyn CommissionModel + Send + Sync>,
    orders: HashMap<Ticker, Vec<Order>>,
    trades: Vec<Trade>,
    ids: IdGen,
    current_dt: Option<DateTime<Utc>>,
    /// Max fraction of a tick's market volume the blotter may take.
    max_participation: Option<f64>,
}

impl Blotter {
    /// Build a blotter, validating every collaborator up front.
    pub fn new(
        finder: Box<dyn AssetFinder + Send + Sync>,
        portfolio: Portfolio,
        commission: Box<dyn CommissionModel + Send + Sync>,
    ) -> Result<Self, BlotterError> {
        portfolio.validate().map_err(ConfigError::from)?;
        commission.validate().map_err(ConfigError::Commission)?;

        Ok(Self {
            finder,
            portfolio,
            commission,
            orders: HashMap::new(),
            trades: Vec::new(),
            ids: IdGen::new(),
            current_dt: None,
            max_participation: None,
        })
    }

    /// Open universe, $1 per-order commission, empty portfolio.
    pub fn with_defaults(initial_cash: f64) -> Result<Self, BlotterError> {
        let portfolio = Portfolio::new(initial_cash).map_err(ConfigError::from)?;
        Self::new(
            Box::new(OpenUniverse),
            portfolio,
            Box::new(PerOrder::default()),
        )
    }

    /// Cap each tick's fills at `fraction` of that tick's market volume.
    pub fn with_participation_limit(mut self, fraction: f64) -> Result<Self, BlotterError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::Participation(fraction).into());
        }
        self.max_participation = Some(fraction);
        Ok(self)
    }

    // ── Order intake ──────────────────────────────────────────────────

    /// Queue a new order. Existing orders for the ticker are left alone.
    ///
    /// Without `date_placed` the order is stamped with the blotter clock.
    #[allow(clippy::too_many_arguments)]
    pub fn place_order(
        &mut self,
        ticker: &str,
        action: TradeAction,
        order_type: OrderType,
        stop_price: Option<f64>,
        limit_price: Option<f64>,
        qty: i64,
        date_placed: Option<DateTime<Utc>>,
        subtype: Option<OrderSubType>,
    ) -> Result<OrderId, BlotterError> {
        let ticker = Ticker::parse(ticker)?;
        if self.finder.find(&ticker).is_none() {
            return Err(BlotterError::UnknownAsset(ticker));
        }
        let created = date_placed
            .or(self.current_dt)
            .ok_or(BlotterError::NoTimestamp)?;

        let order = Order::place(
            self.ids.peek_order_id(),
            ticker.clone(),
            action,
            order_type,
            stop_price,
            limit_price,
            qty,
            created,
            subtype,
        )?;
        let id = self.ids.next_order_id();

        debug!(order = %id, ticker = %ticker, %action, ?order_type, qty, "order placed");
        self.orders.entry(ticker).or_default().push(order);
        Ok(id)
    }

    pub fn cancel_order(&mut self, order_id: OrderId, reason: &str) -> Result<(), BlotterError> {
        self.find_order_mut(order_id)?.cancel(reason)?;
        info!(order = %order_id, reason, "order cancelled");
        Ok(())
    }

    /// Cancel every open order for `ticker`. Returns how many were cancelled.
    pub fn cancel_all_orders_for_asset(
        &mut self,
        ticker: &str,
        reason: &str,
    ) -> Result<usize, BlotterError> {
        let ticker = Ticker::parse(ticker)?;
        let Some(book) = self.orders.get_mut(&ticker) else {
            return Ok(0);
        };
        let mut cancelled = 0;
        for order in book.iter_mut().filter(|o| o.is_open()) {
            order.cancel(reason)?;
            cancelled += 1;
        }
        info!(ticker = %ticker, cancelled, reason, "orders cancelled");
        Ok(cancelled)
    }

    pub fn reject_order(&mut self, order_id: OrderId, reason: &str) -> Result<(), BlotterError> {
        self.find_order_mut(order_id)?.reject(reason)?;
        warn!(order = %order_id, reason, "order rejected");
        Ok(())
    }

    // ── Price handling ────────────────────────────────────────────────

    /// Process one price for `ticker`: fire and fill its open orders.
    pub fn check_order_triggers(
        &mut self,
        dt: DateTime<Utc>,
        ticker: &str,
        current_price: f64,
    ) -> Result<TickReport, BlotterError> {
        let ticker = Ticker::parse(ticker)?;
        self.process_tick(dt, ticker, current_price, None)
    }

    /// Like [`check_order_triggers`](Self::check_order_triggers), with the
    /// tick's market volume available to the participation limit.
    pub fn on_tick(&mut self, tick: &PriceTick) -> Result<TickReport, BlotterError> {
        self.process_tick(tick.timestamp, tick.ticker.clone(), tick.price, tick.volume)
    }

    fn process_tick(
        &mut self,
        dt: DateTime<Utc>,
        ticker: Ticker,
        price: f64,
        market_volume: Option<u64>,
    ) -> Result<TickReport, BlotterError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(BlotterError::InvalidPrice(price));
        }
        // The clock never runs backwards; a stale price is still evaluated at its own time.
        self.current_dt = match self.current_dt {
            Some(prev) if dt < prev => {
                warn!(%dt, %prev, ticker = %ticker, "price is older than the blotter clock");
                Some(prev)
            }
            _ => Some(dt),
        };
        self.portfolio.mark(ticker.as_str(), price);

        let mut report = TickReport::new(dt, ticker.clone());
        let mut fired = Vec::new();
        if let Some(book) = self.orders.get_mut(&ticker) {
            for order in book.iter_mut() {
                if order.expire_if_due(dt) {
                    warn!(order = %order.id(), ticker = %ticker, filled = order.filled(), "order expired");
                    report.expired.push(order.id());
                } else if order.check_triggers(dt, price) {
                    fired.push(order.id());
                }
            }
        }

        let mut budget = self.participation_budget(market_volume);
        for order_id in fired {
            match self.execute(&ticker, order_id, price, dt, budget)? {
                FillOutcome::Filled(trade) => {
                    if let Some(remaining) = budget.as_mut() {
                        *remaining -= trade.qty();
                    }
                    report.fills.push(trade.id());
                }
                FillOutcome::Rejected(reason) => {
                    report.rejections.push(Rejection { order_id, reason });
                }
            }
        }

        report.purged = self.purge_closed_orders();
        Ok(report)
    }

    fn participation_budget(&self, market_volume: Option<u64>) -> Option<i64> {
        match (self.max_participation, market_volume) {
            (Some(fraction), Some(volume)) => Some((volume as f64 * fraction).floor() as i64),
            _ => None,
        }
    }

    /// Execute `order_id` at `current_price`, whether or not its trigger fired.
    pub fn make_trade(
        &mut self,
        ticker: &str,
        order_id: OrderId,
        current_price: f64,
        trade_date: DateTime<Utc>,
    ) -> Result<FillOutcome, BlotterError> {
        let ticker = Ticker::parse(ticker)?;
        self.execute(&ticker, order_id, current_price, trade_date, None)
    }

    fn execute(
        &mut self,
        ticker: &Ticker,
        order_id: OrderId,
        price: f64,
        trade_date: DateTime<Utc>,
        budget: Option<i64>,
    ) -> Result<FillOutcome, BlotterError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(BlotterError::InvalidPrice(price));
        }

        let Self {
            orders,
            portfolio,
            commission,
            trades,
            ids,
            ..
        } = self;

        let order = orders
            .get_mut(ticker)
            .and_then(|book| book.iter_mut().find(|o| o.id() == order_id))
            .ok_or(BlotterError::OrderNotFound(order_id))?;

        let qty = match resolve_fill_qty(order, trade_date, budget) {
            Ok(qty) => qty,
            Err(reason) => {
                debug!(order = %order_id, ticker = %ticker, %reason, "order not filled");
                return Ok(FillOutcome::Rejected(reason));
            }
        };

        let cost = commission.calculate(order, qty, price);

        let gross = price * qty as f64;
        let (affordable, required) = match order.action() {
            TradeAction::Buy => (portfolio.check_liquidity(cost, price, qty), cost + gross),
            // A sell only needs cash when its commission exceeds the proceeds.
            TradeAction::Sell => (portfolio.can_cover(cost - gross), cost - gross),
        };
        if !affordable {
            let reason = RejectReason::InsufficientLiquidity {
                required,
                available: portfolio.cash(),
            };
            warn!(
                order = %order_id,
                ticker = %ticker,
                qty,
                price,
                commission = cost,
                cash = portfolio.cash(),
                "insufficient liquidity, order not filled"
            );
            return Ok(FillOutcome::Rejected(reason));
        }

        let (change, strategy) = match portfolio.get(ticker.as_str()) {
            Some(existing) => {
                let prior = existing.side();
                let update = Self::update_existing_position(existing, order.action(), qty, price);
                let note = match &update {
                    PositionUpdate::Updated(next) => {
                        format!("Update an existing {} position", next.side())
                    }
                    PositionUpdate::Closed { .. } => format!("Close an existing {prior} position"),
                };
                (PositionChange::Existing(update), note)
            }
            None => {
                let opened = Self::open_new_position(ticker, order.action(), qty, price)?;
                let note = format!("Open new {} position", opened.side());
                (PositionChange::Opened(opened), note)
            }
        };

        let trade = Trade::from_order(
            ids.peek_trade_id(),
            order,
            qty,
            trade_date,
            price,
            cost,
            strategy,
        )?;
        order.record_fill(qty, cost)?;
        ids.next_trade_id();

        match &change {
            PositionChange::Opened(pos) => {
                info!(ticker = %ticker, side = %pos.side(), shares = pos.shares_owned(), price, "position opened");
            }
            PositionChange::Existing(PositionUpdate::Closed {
                liquidation_value,
                realized_pnl,
            }) => {
                info!(ticker = %ticker, liquidation_value, realized_pnl, "position closed");
            }
            PositionChange::Existing(PositionUpdate::Updated(pos)) => {
                debug!(ticker = %ticker, shares = pos.shares_owned(), avg = pos.average_share_price(), "position updated");
            }
        }
        debug!(
            trade = %trade.id(),
            order = %order_id,
            %ticker,
            action = %trade.action(),
            qty,
            price,
            commission = cost,
            "trade executed"
        );

        portfolio.commit(&trade, change);
        trades.push(trade.clone());
        Ok(FillOutcome::Filled(trade))
    }

    /// New holding for a fill with nothing held: buys open long, sells open short.
    pub fn open_new_position(
        ticker: &Ticker,
        action: TradeAction,
        qty: i64,
        price: f64,
    ) -> Result<OwnedAsset, PositionError> {
        let side = match action {
            TradeAction::Buy => PositionSide::Long,
            TradeAction::Sell => PositionSide::Short,
        };
        OwnedAsset::open(ticker.clone(), side, qty, price)
    }

    pub fn update_existing_position(
        existing: &OwnedAsset,
        action: TradeAction,
        qty: i64,
        price: f64,
    ) -> PositionUpdate {
        existing.apply_fill(qty * action.sign(), price)
    }

    /// Drop every closed or fully filled order. Returns how many were removed.
    pub fn purge_closed_orders(&mut self) -> usize {
        let mut purged = 0;
        self.orders.retain(|_, book| {
            let before = book.len();
            book.retain(|o| o.is_open() && o.open_amount() > 0);
            purged += before - book.len();
            !book.is_empty()
        });
        purged
    }

    // ── Accessors ─────────────────────────────────────────────────────

    pub fn get_order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders
            .values()
            .flat_map(|book| book.iter())
            .find(|o| o.id() == order_id)
    }

    fn find_order_mut(&mut self, order_id: OrderId) -> Result<&mut Order, BlotterError> {
        self.orders
            .values_mut()
            .flat_map(|book| book.iter_mut())
            .find(|o| o.id() == order_id)
            .ok_or(BlotterError::OrderNotFound(order_id))
    }

    /// Open orders for `ticker`, oldest first.
    pub fn open_orders(&self, ticker: &str) -> Vec<&Order> {
        let Ok(ticker) = Ticker::parse(ticker) else {
            return Vec::new();
        };
        self.orders
            .get(&ticker)
            .map(|book| book.iter().filter(|o| o.is_open()).collect())
            .unwrap_or_default()
    }

    pub fn open_order_count(&self) -> usize {
        self.orders
            .values()
            .flat_map(|book| book.iter())
            .filter(|o| o.is_open())
            .count()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn current_dt(&self) -> Option<DateTime<Utc>> {
        self.current_dt
    }

    pub fn snapshot(&self) -> BlotterSnapshot {
        let mut orders: Vec<Order> = self.orders.values().flatten().cloned().collect();
        orders.sort_by_key(|o| o.id());
        BlotterSnapshot {
            current_dt: self.current_dt,
            orders,
            trades: self.trades.clone(),
            portfolio: self.portfolio.clone(),
            equity: self.portfolio.equity(),
        }
    }
}

/// Shares this fill may take: the order's available volume, capped by the
/// tick budget. ALL_OR_NONE orders refuse anything short of their open amount.
fn resolve_fill_qty(
    order: &Order,
    at: DateTime<Utc>,
    budget: Option<i64>,
) -> Result<i64, RejectReason> {
    let available = order.get_available_volume(at);
    if available <= 0 {
        return Err(RejectReason::NoVolume);
    }
    let qty = budget.map_or(available, |b| available.min(b.max(0)));
    if qty == 0 {
        return Err(RejectReason::NoVolume);
    }
    if order.subtype() == OrderSubType::AllOrNone && qty < available {
        return Err(RejectReason::PartialFillRefused {
            available: qty,
            open: available,
        });
    }
    Ok(qty)
}
