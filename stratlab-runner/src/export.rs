//! Result export — JSON manifests and CSV trade tapes.
//!
//! All persisted artifacts include a `schema_version` field; unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use stratlab_core::TradeEvent;

use crate::runner::{BacktestRecord, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestRecord` to pretty JSON.
pub fn export_record_json(record: &BacktestRecord) -> Result<String> {
    serde_json::to_string_pretty(record).context("failed to serialize BacktestRecord to JSON")
}

/// Deserialize a `BacktestRecord`, rejecting unknown schema versions.
pub fn import_record_json(json: &str) -> Result<BacktestRecord> {
    let record: BacktestRecord =
        serde_json::from_str(json).context("failed to deserialize BacktestRecord from JSON")?;
    if record.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            record.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(record)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: side, entry_bar, entry_time, entry_price, exit_bar, exit_time,
/// exit_price, lot_size, pnl, pnl_percent, exit_reason
pub fn export_trades_csv(trades: &[TradeEvent]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "side",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "lot_size",
        "pnl",
        "pnl_percent",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            &format!("{:?}", t.side),
            &t.entry_bar.to_string(),
            &t.entry_time.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_bar.to_string(),
            &t.exit_time.to_string(),
            &format!("{:.6}", t.exit_price),
            &format!("{:.2}", t.lot_size),
            &format!("{:.2}", t.pnl),
            &format!("{:.4}", t.pnl_percent),
            &format!("{:?}", t.exit_reason),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one run under `output_dir`.
///
/// Creates `{strategy_id}_{run_id_prefix}/` containing:
/// - `manifest.json` — the full `BacktestRecord`
/// - `trades.csv` — the trade tape
///
/// Returns the created directory path.
pub fn save_artifacts(record: &BacktestRecord, output_dir: &Path) -> Result<PathBuf> {
    let id_prefix: String = record.id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", record.strategy_id, id_prefix));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_record_json(record)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&record.trades)?)?;

    Ok(run_dir)
}

/// Load a `BacktestRecord` back from an artifact directory's manifest.
pub fn load_artifacts(dir: &Path) -> Result<BacktestRecord> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_record_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{RunStatus, Stage};
    use chrono::NaiveDate;
    use stratlab_core::{
        ExitReason, IndicatorSnapshot, ResultSummary, StoppedReason, Timeframe, TradeSide,
    };

    fn sample_trade() -> TradeEvent {
        let t = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        TradeEvent {
            entry_time: t,
            entry_price: 101.25,
            entry_bar: 55,
            exit_time: t + chrono::Duration::minutes(45),
            exit_price: 102.2625,
            exit_bar: 100,
            side: TradeSide::Long,
            lot_size: 10_000.0,
            pnl: 10_125.0,
            pnl_percent: 100.0,
            exit_reason: ExitReason::TakeProfit,
            indicator_snapshot: IndicatorSnapshot::new(),
        }
    }

    fn sample_record() -> BacktestRecord {
        let trades = vec![sample_trade()];
        BacktestRecord {
            schema_version: SCHEMA_VERSION,
            id: "a3f1c9".repeat(8),
            strategy_id: "rsi-dip".into(),
            version_number: 3,
            timeframe: Timeframe::M1,
            stage: Stage::Fine,
            status: RunStatus::Completed,
            summary: stratlab_core::summarize(&trades, 1_000_000.0),
            trades,
            stopped_reason: Some(StoppedReason::EndOfData),
            coverage_ratio: 0.98,
            dataset_hash: "deadbeef".into(),
            error_message: None,
        }
    }

    #[test]
    fn json_roundtrip() {
        let original = sample_record();
        let json = export_record_json(&original).unwrap();
        let restored = import_record_json(&json).unwrap();
        assert_eq!(restored.id, original.id);
        assert_eq!(restored.trades.len(), 1);
        assert_eq!(restored.summary, original.summary);
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut record = sample_record();
        record.schema_version = 99;
        let json = export_record_json(&record).unwrap();
        let err = import_record_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version 99"));
    }

    #[test]
    fn csv_has_all_columns() {
        let csv = export_trades_csv(&[sample_trade()]).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert_eq!(
            header,
            "side,entry_bar,entry_time,entry_price,exit_bar,exit_time,exit_price,lot_size,pnl,pnl_percent,exit_reason"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("Long"));
        assert!(row.contains("10125.00"));
        assert!(row.contains("TakeProfit"));
    }

    #[test]
    fn csv_empty_trades_header_only() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn save_load_artifacts_roundtrip() {
        let record = sample_record();
        let dir = tempfile::tempdir().unwrap();
        let run_dir = save_artifacts(&record, dir.path()).unwrap();

        assert!(run_dir.join("manifest.json").exists());
        assert!(run_dir.join("trades.csv").exists());

        let loaded = load_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.trades.len(), record.trades.len());
    }
}
