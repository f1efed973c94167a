use std::path::Path;

use tradedesk_core::RejectReason;
use tradedesk_runner::{
    export_trades_csv, load_artifacts, run_from_files, save_artifacts, CommissionConfig, ParamGrid,
    ParamSweep, SimulationConfig,
};

const CONFIG: &str = r#"
initial_cash = 100000.0
max_participation = 0.5
universe = ["AAPL", "MSFT"]

[commission]
type = "PER_SHARE"
rate = 0.01
minimum = 1.0

[[orders]]
ticker = "AAPL"
action = "BUY"
order_type = "LIMIT"
limit_price = 100.0
qty = 300
placed_at = "2024-01-02T14:30:00Z"

[[orders]]
ticker = "AAPL"
action = "SELL"
order_type = "STOP"
stop_price = 95.0
qty = 100
placed_at = "2024-01-02T14:30:00Z"
subtype = "GOOD_TILL_CANCELED"

[[orders]]
ticker = "MSFT"
action = "BUY"
order_type = "MARKET"
qty = 10
placed_at = "2024-01-02T16:00:00Z"
"#;

const TAPE: &str = "\
timestamp,ticker,price,volume
2024-01-02T14:30:00Z,AAPL,101.0,1000
2024-01-02T14:31:00Z,AAPL,99.5,400
2024-01-02T14:32:00Z,AAPL,99.0,
2024-01-02T14:33:00Z,AAPL,94.0,1000
";

fn write_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let config_path = dir.join("sim.toml");
    let tape_path = dir.join("tape.csv");
    std::fs::write(&config_path, CONFIG).unwrap();
    std::fs::write(&tape_path, TAPE).unwrap();
    (config_path, tape_path)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn test_run_from_files_end_to_end() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (config_path, tape_path) = write_inputs(temp_dir.path());

    let result = run_from_files(&config_path, &tape_path).unwrap();

    // 200 shares on the volume-capped tick, 100 on the uncapped one, then the stop.
    assert_eq!(result.tick_count, 4);
    assert_eq!(result.trade_count(), 3);
    let qtys: Vec<i64> = result.snapshot.trades.iter().map(|t| t.qty()).collect();
    assert_eq!(qtys, vec![200, 100, 100]);

    assert!(approx(result.total_commission, 4.0));
    assert!(approx(result.final_cash, 79_596.0));
    assert!(approx(result.final_equity, 98_396.0));
    assert!(approx(result.realized_pnl, -1_600.0 / 3.0));

    let aapl = result.portfolio().get("AAPL").unwrap();
    assert_eq!(aapl.shares_owned(), 200);

    // The MSFT order arrives after the last tick and is still in the book.
    assert_eq!(result.snapshot.orders.len(), 1);
    assert_eq!(result.snapshot.orders[0].ticker().as_str(), "MSFT");
    assert!(result.rejections.is_empty());
    assert!(result.expired.is_empty());
}

#[test]
fn test_artifacts_round_trip_through_disk() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (config_path, tape_path) = write_inputs(temp_dir.path());
    let result = run_from_files(&config_path, &tape_path).unwrap();

    let out = temp_dir.path().join("artifacts");
    let run_dir = save_artifacts(&result, &out).unwrap();
    assert!(run_dir.ends_with(&result.run_id));
    for name in ["manifest.json", "trades.csv", "trades.json", "portfolio.json"] {
        assert!(run_dir.join(name).exists(), "missing {name}");
    }

    let csv = std::fs::read_to_string(run_dir.join("trades.csv")).unwrap();
    assert_eq!(csv, export_trades_csv(&result.snapshot.trades).unwrap());
    assert_eq!(csv.lines().count(), 4);

    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.run_id, result.run_id);
    assert_eq!(loaded.config, result.config);
    assert_eq!(loaded.snapshot.trades, result.snapshot.trades);
}

#[test]
fn test_cash_starved_config_records_rejections() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (config_path, tape_path) = write_inputs(temp_dir.path());
    let content = CONFIG.replace("initial_cash = 100000.0", "initial_cash = 1000.0");
    std::fs::write(&config_path, content).unwrap();

    let result = run_from_files(&config_path, &tape_path).unwrap();

    // The limit buy fires on three ticks and never fits; the stop sell opens a short.
    assert!(result
        .rejections
        .iter()
        .all(|r| matches!(r.reason, RejectReason::InsufficientLiquidity { .. })));
    assert_eq!(result.rejections.len(), 3);
    assert_eq!(result.trade_count(), 1);
    assert_eq!(result.portfolio().get("AAPL").unwrap().shares_owned(), -100);
}

#[test]
fn test_parallel_sweep_matches_sequential() {
    let base = SimulationConfig::from_toml(CONFIG).unwrap();
    let ticks = tradedesk_runner::read_tape(TAPE.as_bytes()).unwrap();
    let grid = ParamGrid {
        initial_cash: vec![50_000.0, 100_000.0],
        commissions: vec![CommissionConfig::None, CommissionConfig::default()],
        max_participation: vec![None, Some(0.25)],
    };

    let parallel = ParamSweep::new().sweep(&grid, &base, &ticks).unwrap();
    let sequential = ParamSweep::new()
        .with_parallelism(false)
        .sweep(&grid, &base, &ticks)
        .unwrap();

    assert_eq!(parallel.len(), 8);
    for (p, s) in parallel.all().iter().zip(sequential.all()) {
        assert_eq!(p.run_id, s.run_id);
        assert_eq!(p.snapshot.trades, s.snapshot.trades);
        assert_eq!(p.final_equity, s.final_equity);
    }

    let best = parallel.sorted_by_equity()[0];
    assert_eq!(best.config.initial_cash, 100_000.0);
    assert_eq!(best.config.commission, CommissionConfig::None);
}
