//! Price tapes: CSV files of `timestamp,ticker,price,volume` rows.
//!
//! Timestamps are RFC 3339, volume may be left empty, and rows must be in
//! non-decreasing time order.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use tradedesk_core::domain::{Ticker, TickerError};
use tradedesk_core::PriceTick;

#[derive(Debug, Error)]
pub enum TapeError {
    #[error("failed to open tape {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("row {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("row {row}: bad timestamp '{value}': {source}")]
    Timestamp {
        row: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("row {row}: {source}")]
    Ticker {
        row: usize,
        #[source]
        source: TickerError,
    },

    #[error("row {row}: price must be positive and finite, got {price}")]
    Price { row: usize, price: f64 },

    #[error("row {row}: {timestamp} is earlier than the row before it")]
    OutOfOrder { row: usize, timestamp: DateTime<Utc> },
}

#[derive(Debug, Deserialize)]
struct TapeRow {
    timestamp: String,
    ticker: String,
    price: f64,
    volume: Option<u64>,
}

/// Parse a tape from any reader. `row` in errors counts data rows from 1.
pub fn read_tape<R: Read>(reader: R) -> Result<Vec<PriceTick>, TapeError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut ticks: Vec<PriceTick> = Vec::new();

    for (i, record) in rdr.deserialize::<TapeRow>().enumerate() {
        let row = i + 1;
        let raw = record.map_err(|source| TapeError::Csv { row, source })?;

        let timestamp = DateTime::parse_from_rfc3339(&raw.timestamp)
            .map_err(|source| TapeError::Timestamp {
                row,
                value: raw.timestamp.clone(),
                source,
            })?
            .with_timezone(&Utc);
        let ticker = Ticker::parse(&raw.ticker).map_err(|source| TapeError::Ticker { row, source })?;
        if !raw.price.is_finite() || raw.price <= 0.0 {
            return Err(TapeError::Price {
                row,
                price: raw.price,
            });
        }
        if let Some(prev) = ticks.last() {
            if timestamp < prev.timestamp {
                return Err(TapeError::OutOfOrder { row, timestamp });
            }
        }

        ticks.push(PriceTick {
            timestamp,
            ticker,
            price: raw.price,
            volume: raw.volume,
        });
    }

    debug!(rows = ticks.len(), "tape loaded");
    Ok(ticks)
}

pub fn load_tape(path: &Path) -> Result<Vec<PriceTick>, TapeError> {
    let file = std::fs::File::open(path).map_err(|source| TapeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_tape(file)
}
