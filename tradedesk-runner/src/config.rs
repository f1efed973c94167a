//! Serializable simulation configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use tradedesk_core::domain::{Asset, OrderSubType, OrderType, Ticker, TradeAction};
use tradedesk_core::{
    AssetFinder, AssetUniverse, CommissionModel, CommissionTier, NoCommission, OpenUniverse,
    PerOrder, PerShare, Tiered,
};

/// Unique identifier for a simulation run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything needed to reproduce one simulation over a price tape.
///
/// ```toml
/// initial_cash = 100000.0
/// max_participation = 0.1
/// universe = ["AAPL", "MSFT"]
///
/// [commission]
/// type = "PER_SHARE"
/// rate = 0.005
/// minimum = 1.0
///
/// [[orders]]
/// ticker = "AAPL"
/// action = "BUY"
/// order_type = "STOP"
/// stop_price = 190.0
/// qty = 100
/// placed_at = "2024-01-02T14:30:00Z"
/// subtype = "GOOD_TILL_CANCELED"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    pub initial_cash: f64,

    #[serde(default)]
    pub commission: CommissionConfig,

    /// Max fraction of each tick's market volume a run may trade.
    #[serde(default)]
    pub max_participation: Option<f64>,

    /// Tradable tickers. Absent means any ticker is accepted.
    #[serde(default)]
    pub universe: Option<Vec<String>>,

    /// Orders placed once the simulation clock reaches their `placed_at`.
    #[serde(default)]
    pub orders: Vec<ScheduledOrder>,
}

impl SimulationConfig {
    /// Parse and validate a TOML config.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Checks the blotter cannot catch on its own (ticker syntax, duplicates).
    /// Cash and commission parameters are checked again when the blotter is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_cash.is_finite() || self.initial_cash < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "initial_cash must be finite and non-negative, got {}",
                self.initial_cash
            )));
        }
        if let Some(p) = self.max_participation {
            if !(p > 0.0 && p <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "max_participation must be in (0, 1], got {p}"
                )));
            }
        }
        if let Some(universe) = &self.universe {
            for raw in universe {
                Ticker::parse(raw)
                    .map_err(|e| ConfigError::Invalid(format!("universe entry '{raw}': {e}")))?;
            }
        }
        for (i, order) in self.orders.iter().enumerate() {
            Ticker::parse(&order.ticker)
                .map_err(|e| ConfigError::Invalid(format!("orders[{i}]: {e}")))?;
            if order.qty <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "orders[{i}]: qty must be positive, got {}",
                    order.qty
                )));
            }
        }
        self.commission
            .build()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("commission: {e}")))
    }

    /// Deterministic hash of the config.
    ///
    /// Two runs with identical configs get the same id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn build_finder(&self) -> Result<Box<dyn AssetFinder + Send + Sync>, ConfigError> {
        let Some(universe) = &self.universe else {
            return Ok(Box::new(OpenUniverse));
        };
        let assets = universe
            .iter()
            .map(|raw| {
                Ticker::parse(raw)
                    .map(Asset::equity)
                    .map_err(|e| ConfigError::Invalid(format!("universe entry '{raw}': {e}")))
            })
            .collect::<Result<AssetUniverse, _>>()?;
        Ok(Box::new(assets))
    }
}

/// Commission policy (serializable enum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionConfig {
    /// Flat fee per fill.
    PerOrder {
        #[serde(default = "default_per_order_fee")]
        fee: f64,
    },

    /// `max(qty * rate, minimum)` per fill.
    PerShare {
        rate: f64,
        #[serde(default)]
        minimum: f64,
    },

    /// Per-share rate chosen by fill size.
    Tiered { tiers: Vec<CommissionTier> },

    /// No commission
    None,
}

fn default_per_order_fee() -> f64 {
    PerOrder::DEFAULT_FEE
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self::PerOrder {
            fee: PerOrder::DEFAULT_FEE,
        }
    }
}

impl CommissionConfig {
    pub fn build(&self) -> Box<dyn CommissionModel + Send + Sync> {
        match self {
            CommissionConfig::PerOrder { fee } => Box::new(PerOrder::new(*fee)),
            CommissionConfig::PerShare { rate, minimum } => {
                Box::new(PerShare::new(*rate, *minimum))
            }
            CommissionConfig::Tiered { tiers } => Box::new(Tiered::new(tiers.clone())),
            CommissionConfig::None => Box::new(NoCommission),
        }
    }
}

/// An order to submit once the simulation clock reaches `placed_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledOrder {
    pub ticker: String,
    pub action: TradeAction,
    pub order_type: OrderType,
    #[serde(default)]
    pub stop_price: Option<f64>,
    #[serde(default)]
    pub limit_price: Option<f64>,
    pub qty: i64,
    /// RFC 3339 string, e.g. `"2024-01-02T14:30:00Z"`.
    pub placed_at: DateTime<Utc>,
    #[serde(default)]
    pub subtype: Option<OrderSubType>,
}
