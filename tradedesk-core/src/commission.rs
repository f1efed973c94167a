//! Commission models: what a fill costs in fees.
//!
//! The blotter holds a `Box<dyn CommissionModel>` and never inspects which
//! policy it got. All policies are pure: the same order, quantity and price
//! always cost the same.

use crate::domain::order::Order;
use serde::{Deserialize, Serialize};

/// Fee charged per fill.
pub trait CommissionModel: std::fmt::Debug {
    /// Commission for filling `fill_qty` shares of `order` at `execution_price`.
    /// Never negative.
    fn calculate(&self, order: &Order, fill_qty: i64, execution_price: f64) -> f64;

    /// Parameter sanity check, run once when the blotter is built.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

fn check_fee(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be finite and non-negative, got {value}"))
    }
}

/// Flat fee per fill, whatever the size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerOrder {
    pub fee: f64,
}

impl PerOrder {
    pub const DEFAULT_FEE: f64 = 1.0;

    pub fn new(fee: f64) -> Self {
        Self { fee }
    }
}

impl Default for PerOrder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FEE)
    }
}

impl CommissionModel for PerOrder {
    fn calculate(&self, _order: &Order, _fill_qty: i64, _execution_price: f64) -> f64 {
        self.fee
    }

    fn validate(&self) -> Result<(), String> {
        check_fee("per-order fee", self.fee)
    }
}

/// `max(qty * rate, minimum)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerShare {
    pub rate: f64,
    #[serde(default)]
    pub minimum: f64,
}

impl PerShare {
    pub fn new(rate: f64, minimum: f64) -> Self {
        Self { rate, minimum }
    }
}

impl CommissionModel for PerShare {
    fn calculate(&self, _order: &Order, fill_qty: i64, _execution_price: f64) -> f64 {
        (fill_qty.abs() as f64 * self.rate).max(self.minimum)
    }

    fn validate(&self) -> Result<(), String> {
        check_fee("per-share rate", self.rate)?;
        check_fee("per-share minimum", self.minimum)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionTier {
    /// Smallest fill size this tier applies to.
    pub min_qty: i64,
    /// Per-share rate within the tier.
    pub rate: f64,
}

/// Per-share rate chosen by fill size: the highest tier whose `min_qty` the
/// fill reaches. Fills below the first tier use the first tier's rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tiered {
    pub tiers: Vec<CommissionTier>,
}

impl Tiered {
    /// Tiers are sorted by `min_qty`, so callers may pass them in any order.
    pub fn new(mut tiers: Vec<CommissionTier>) -> Self {
        tiers.sort_by_key(|t| t.min_qty);
        Self { tiers }
    }

    fn rate_for(&self, qty: i64) -> f64 {
        self.tiers
            .iter()
            .rev()
            .find(|t| qty >= t.min_qty)
            .or_else(|| self.tiers.first())
            .map_or(0.0, |t| t.rate)
    }
}

impl CommissionModel for Tiered {
    fn calculate(&self, _order: &Order, fill_qty: i64, _execution_price: f64) -> f64 {
        let qty = fill_qty.abs();
        qty as f64 * self.rate_for(qty)
    }

    fn validate(&self) -> Result<(), String> {
        if self.tiers.is_empty() {
            return Err("tiered commission needs at least one tier".into());
        }
        for pair in self.tiers.windows(2) {
            if pair[0].min_qty == pair[1].min_qty {
                return Err(format!("duplicate tier threshold {}", pair[0].min_qty));
            }
        }
        for tier in &self.tiers {
            if tier.min_qty < 0 {
                return Err(format!("tier threshold must be non-negative, got {}", tier.min_qty));
            }
            check_fee("tier rate", tier.rate)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NoCommission;

impl CommissionModel for NoCommission {
    fn calculate(&self, _order: &Order, _fill_qty: i64, _execution_price: f64) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::OrderId;
    use crate::domain::instrument::Ticker;
    use crate::domain::order::{OrderType, TradeAction};
    use chrono::{TimeZone, Utc};

    fn order(qty: i64) -> Order {
        Order::place(
            OrderId(1),
            Ticker::parse("IBM").unwrap(),
            TradeAction::Buy,
            OrderType::Market,
            None,
            None,
            qty,
            Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn per_order_is_flat() {
        let m = PerOrder::default();
        assert_eq!(m.calculate(&order(1), 1, 10.0), 1.0);
        assert_eq!(m.calculate(&order(5_000), 5_000, 10.0), 1.0);
    }

    #[test]
    fn per_share_applies_minimum() {
        let m = PerShare::new(0.005, 1.0);
        assert_eq!(m.calculate(&order(100), 100, 50.0), 1.0);
        assert!((m.calculate(&order(1_000), 1_000, 50.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn tiered_picks_highest_reached_tier() {
        let m = Tiered::new(vec![
            CommissionTier { min_qty: 500, rate: 0.005 },
            CommissionTier { min_qty: 0, rate: 0.01 },
        ]);
        assert!(m.validate().is_ok());
        assert!((m.calculate(&order(100), 100, 1.0) - 1.0).abs() < 1e-12);
        assert!((m.calculate(&order(1_000), 1_000, 1.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn tiered_below_first_threshold_uses_first_rate() {
        let m = Tiered::new(vec![CommissionTier { min_qty: 100, rate: 0.02 }]);
        assert!((m.calculate(&order(10), 10, 1.0) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        assert!(PerOrder::new(-1.0).validate().is_err());
        assert!(PerOrder::new(f64::INFINITY).validate().is_err());
        assert!(PerShare::new(0.01, f64::NAN).validate().is_err());
        assert!(Tiered::new(vec![]).validate().is_err());
        assert!(Tiered::new(vec![
            CommissionTier { min_qty: 10, rate: 0.01 },
            CommissionTier { min_qty: 10, rate: 0.02 },
        ])
        .validate()
        .is_err());
    }

    #[test]
    fn no_commission_is_free() {
        assert_eq!(NoCommission.calculate(&order(10), 10, 99.0), 0.0);
        assert!(NoCommission.validate().is_ok());
    }
}
