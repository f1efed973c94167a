//! Domain types for Tradedesk

pub mod ids;
pub mod instrument;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod trade;

pub use ids::{IdGen, OrderId, TradeId};
pub use instrument::{Asset, AssetClass, Ticker, TickerError};
pub use order::{Order, OrderError, OrderStatus, OrderSubType, OrderType, TradeAction};
pub use portfolio::{Portfolio, PortfolioError, PositionChange};
pub use position::{OwnedAsset, PositionError, PositionSide, PositionUpdate};
pub use trade::{Trade, TradeError};
