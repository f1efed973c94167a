//! Export: JSON and CSV artifacts for a storage layer.
//!
//! Provides:
//! - **JSON**: full simulation result with schema versioning, trades, portfolio
//! - **CSV**: trade tape for external analysis tools
//!
//! Persisted results carry a `schema_version` field. Unknown versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradedesk_core::domain::{Portfolio, Trade};

use crate::runner::{SimulationResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `SimulationResult` to pretty JSON.
pub fn export_json(result: &SimulationResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize SimulationResult to JSON")
}

/// Deserialize a `SimulationResult` from JSON, rejecting unknown schema
/// versions and snapshots whose orders or portfolio break their invariants.
pub fn import_json(json: &str) -> Result<SimulationResult> {
    let result: SimulationResult =
        serde_json::from_str(json).context("failed to deserialize SimulationResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    result
        .snapshot
        .validate()
        .context("stored blotter snapshot is inconsistent")?;
    Ok(result)
}

pub fn export_trades_json(trades: &[Trade]) -> Result<String> {
    serde_json::to_string_pretty(trades).context("failed to serialize trades to JSON")
}

pub fn export_portfolio_json(portfolio: &Portfolio) -> Result<String> {
    serde_json::to_string_pretty(portfolio).context("failed to serialize portfolio to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: trade_id, order_id, trade_date, ticker, action, qty, price,
/// commission, trade_value, strategy
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "trade_id",
        "order_id",
        "trade_date",
        "ticker",
        "action",
        "qty",
        "price",
        "commission",
        "trade_value",
        "strategy",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.id().to_string(),
            &t.order_id().to_string(),
            &t.trade_date().to_rfc3339(),
            t.ticker().as_str(),
            &t.action().to_string(),
            &t.qty().to_string(),
            &format!("{:.6}", t.price()),
            &format!("{:.2}", t.commission()),
            &format!("{:.2}", t.trade_value()),
            t.strategy(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single run.
///
/// Creates a directory named after the run id under `output_dir` containing:
/// - `manifest.json`: the full `SimulationResult`
/// - `trades.csv` / `trades.json`: trade history
/// - `portfolio.json`: final portfolio
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &SimulationResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(&result.run_id);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write(&run_dir.join("manifest.json"), &export_json(result)?)?;
    write(
        &run_dir.join("trades.csv"),
        &export_trades_csv(&result.snapshot.trades)?,
    )?;
    write(
        &run_dir.join("trades.json"),
        &export_trades_json(&result.snapshot.trades)?,
    )?;
    write(
        &run_dir.join("portfolio.json"),
        &export_portfolio_json(result.portfolio())?,
    )?;

    Ok(run_dir)
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Load a `SimulationResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<SimulationResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}
