//! Asset lookup: which tickers the blotter will accept orders for.

use crate::domain::instrument::{Asset, Ticker};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resolves a ticker to asset metadata. `None` means the ticker is unknown.
pub trait AssetFinder: std::fmt::Debug {
    fn find(&self, ticker: &Ticker) -> Option<Asset>;
}

/// Accepts every well-formed ticker as an equity.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenUniverse;

impl AssetFinder for OpenUniverse {
    fn find(&self, ticker: &Ticker) -> Option<Asset> {
        Some(Asset::equity(ticker.clone()))
    }
}

/// A fixed registry of assets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetUniverse {
    assets: HashMap<Ticker, Asset>,
}

impl AssetUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: Asset) {
        self.assets.insert(asset.ticker.clone(), asset);
    }

    pub fn with(mut self, asset: Asset) -> Self {
        self.insert(asset);
        self
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl FromIterator<Asset> for AssetUniverse {
    fn from_iter<I: IntoIterator<Item = Asset>>(iter: I) -> Self {
        let mut universe = Self::new();
        for asset in iter {
            universe.insert(asset);
        }
        universe
    }
}

impl AssetFinder for AssetUniverse {
    fn find(&self, ticker: &Ticker) -> Option<Asset> {
        self.assets.get(ticker).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::AssetClass;

    fn t(s: &str) -> Ticker {
        Ticker::parse(s).unwrap()
    }

    #[test]
    fn open_universe_resolves_anything() {
        let a = OpenUniverse.find(&t("zzz")).unwrap();
        assert_eq!(a.ticker.as_str(), "ZZZ");
        assert_eq!(a.asset_class, AssetClass::Equity);
    }

    #[test]
    fn registry_misses_unknown() {
        let u: AssetUniverse = ["AAPL", "MSFT"].iter().map(|s| Asset::equity(t(s))).collect();
        assert_eq!(u.len(), 2);
        assert!(u.find(&t("aapl")).is_some());
        assert!(u.find(&t("GOOG")).is_none());
    }

    #[test]
    fn registry_keeps_metadata() {
        let u = AssetUniverse::new().with(Asset::new(t("ES"), "E-mini S&P", AssetClass::Future));
        let es = u.find(&t("ES")).unwrap();
        assert_eq!(es.name, "E-mini S&P");
        assert_eq!(es.asset_class, AssetClass::Future);
    }
}
