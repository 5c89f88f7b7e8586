//! Persisted per-asset day history.
//!
//! Append-safe CSV, one file per asset, one row per UTC day. Each line is
//! independent, so an interrupted write corrupts at most one row. This file
//! set is the contract the meta-supervisor (and the offline backtesters)
//! read.

use crate::error::{TelemetryError, TelemetryResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const HEADER: &str = "day_bucket_start,gross_pnl,fees,net_pnl,fills_buy,fills_sell,\
max_drawdown,inventory_avg,inventory_max,quoted_spread_bps,captured_spread_bps,toxicity_ema";

/// One finalized UTC day of per-asset metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    /// Start of the day bucket, unix milliseconds.
    pub day_bucket_start: u64,
    pub gross_pnl: f64,
    pub fees: f64,
    pub net_pnl: f64,
    pub fills_buy: u64,
    pub fills_sell: u64,
    pub max_drawdown: f64,
    /// Mean inventory utilisation over the day, 0-1.
    pub inventory_avg: f64,
    /// Peak inventory utilisation over the day, 0-1.
    pub inventory_max: f64,
    pub quoted_spread_bps: f64,
    pub captured_spread_bps: f64,
    pub toxicity_ema: f64,
}

impl DayRecord {
    fn to_csv(&self) -> String {
        format!(
            "{},{:.6},{:.6},{:.6},{},{},{:.6},{:.6},{:.6},{:.4},{:.4},{:.4}",
            self.day_bucket_start,
            self.gross_pnl,
            self.fees,
            self.net_pnl,
            self.fills_buy,
            self.fills_sell,
            self.max_drawdown,
            self.inventory_avg,
            self.inventory_max,
            self.quoted_spread_bps,
            self.captured_spread_bps,
            self.toxicity_ema,
        )
    }

    fn from_csv(line: &str) -> TelemetryResult<Self> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 12 {
            return Err(TelemetryError::Malformed(format!(
                "expected 12 fields, got {}: {line}",
                fields.len()
            )));
        }
        let parse_f = |s: &str| -> TelemetryResult<f64> {
            s.trim()
                .parse()
                .map_err(|_| TelemetryError::Malformed(format!("bad float {s:?}")))
        };
        let parse_u = |s: &str| -> TelemetryResult<u64> {
            s.trim()
                .parse()
                .map_err(|_| TelemetryError::Malformed(format!("bad integer {s:?}")))
        };
        Ok(Self {
            day_bucket_start: parse_u(fields[0])?,
            gross_pnl: parse_f(fields[1])?,
            fees: parse_f(fields[2])?,
            net_pnl: parse_f(fields[3])?,
            fills_buy: parse_u(fields[4])?,
            fills_sell: parse_u(fields[5])?,
            max_drawdown: parse_f(fields[6])?,
            inventory_avg: parse_f(fields[7])?,
            inventory_max: parse_f(fields[8])?,
            quoted_spread_bps: parse_f(fields[9])?,
            captured_spread_bps: parse_f(fields[10])?,
            toxicity_ema: parse_f(fields[11])?,
        })
    }
}

/// Reader/writer for the per-asset CSV day history.
pub struct MetricsHistory {
    base_dir: PathBuf,
}

impl MetricsHistory {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.base_dir.join(format!("{}.csv", symbol.to_lowercase()))
    }

    /// Append one day record, creating the file (with header) if needed.
    pub fn append(&self, symbol: &str, record: &DayRecord) -> TelemetryResult<()> {
        fs::create_dir_all(&self.base_dir)?;
        let path = self.path_for(symbol);
        let is_new = !path.exists();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        if is_new {
            writeln!(writer, "{HEADER}")?;
        }
        writeln!(writer, "{}", record.to_csv())?;
        writer.flush()?;
        debug!(symbol, path = %path.display(), "day record appended");
        Ok(())
    }

    /// Read all day records for an asset, oldest first. Missing file reads
    /// as empty; malformed rows are skipped rather than poisoning the rest.
    pub fn read(&self, symbol: &str) -> TelemetryResult<Vec<DayRecord>> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Self::read_path(&path)
    }

    fn read_path(path: &Path) -> TelemetryResult<Vec<DayRecord>> {
        let content = fs::read_to_string(path)?;
        let mut records = Vec::new();
        for line in content.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            match DayRecord::from_csv(line) {
                Ok(r) => records.push(r),
                Err(e) => debug!(error = %e, "skipping malformed history row"),
            }
        }
        records.sort_by_key(|r| r.day_bucket_start);
        Ok(records)
    }

    /// Trailing `days` records for an asset.
    pub fn tail(&self, symbol: &str, days: usize) -> TelemetryResult<Vec<DayRecord>> {
        let mut records = self.read(symbol)?;
        if records.len() > days {
            records.drain(..records.len() - days);
        }
        Ok(records)
    }
}
