//! Instrument identity: the canonical ticker key and resolved asset metadata.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickerError {
    #[error("ticker is empty")]
    Empty,

    #[error("ticker '{0}' contains whitespace")]
    Whitespace(String),
}

/// Canonical instrument key.
///
/// Always trimmed and upper-case, so `" aapl"` and `"AAPL"` address the same
/// orders and holdings. The only way to build one is [`Ticker::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self, TickerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TickerError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(TickerError::Whitespace(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Ticker {
    type Err = TickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = TickerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.0
    }
}

impl Borrow<str> for Ticker {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    Equity,
    Future,
    Forex,
    Crypto,
}

/// A tradable asset as resolved by an [`AssetFinder`](crate::finder::AssetFinder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub ticker: Ticker,
    pub name: String,
    pub asset_class: AssetClass,
}

impl Asset {
    pub fn new(ticker: Ticker, name: impl Into<String>, asset_class: AssetClass) -> Self {
        Self {
            ticker,
            name: name.into(),
            asset_class,
        }
    }

    /// Plain equity whose name is its ticker.
    pub fn equity(ticker: Ticker) -> Self {
        let name = ticker.to_string();
        Self::new(ticker, name, AssetClass::Equity)
    }
}
