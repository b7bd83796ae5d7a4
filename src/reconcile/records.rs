use crate::error::{AppError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MES_COLUMNS: [&str; 5] = [
    "order_id",
    "start_time",
    "end_time",
    "produced_qty",
    "defect_qty",
];

pub const ERP_COLUMNS: [&str; 4] = ["order_id", "planned_start", "planned_end", "planned_qty"];

/// Accepted timestamp layouts, tried in order; RFC 3339 handled separately
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// One execution row from the manufacturing execution system
#[derive(Debug, Clone, PartialEq)]
pub struct MesRecord {
    pub order_id: Option<i64>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub produced_qty: Option<f64>,
    pub defect_qty: Option<f64>,
}

/// One planning row from the enterprise resource planning system
#[derive(Debug, Clone, PartialEq)]
pub struct ErpRecord {
    pub order_id: Option<i64>,
    pub planned_start: Option<NaiveDateTime>,
    pub planned_end: Option<NaiveDateTime>,
    pub planned_qty: Option<f64>,
}

/// One reconciled order: planned fields, actual fields, derived ratios
///
/// Built by the inner join and read-only afterwards. A `None` in a derived
/// column means the ratio was undefined (zero denominator or missing input),
/// and it serializes as an empty CSV cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedRecord {
    pub order_id: i64,
    pub planned_start: Option<NaiveDateTime>,
    pub planned_end: Option<NaiveDateTime>,
    pub planned_qty: Option<f64>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub produced_qty: Option<f64>,
    pub defect_qty: Option<f64>,
    pub plan_fulfillment: Option<f64>,
    pub delay_hours: Option<f64>,
    pub scrap_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawMesRow {
    order_id: Option<i64>,
    start_time: Option<String>,
    end_time: Option<String>,
    produced_qty: Option<f64>,
    defect_qty: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawErpRow {
    order_id: Option<i64>,
    planned_start: Option<String>,
    planned_end: Option<String>,
    planned_qty: Option<f64>,
}

/// Parse one timestamp cell; empty cells are missing, malformed ones are a
/// schema error naming the column
pub fn parse_timestamp(raw: Option<&str>, column: &str) -> Result<Option<NaiveDateTime>> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Some(parsed));
        }
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.naive_utc()));
    }

    Err(AppError::Schema(format!(
        "malformed timestamp `{}` in column `{}`",
        raw, column
    )))
}

fn check_headers(reader: &mut csv::Reader<std::fs::File>, required: &[&str], path: &Path) -> Result<()> {
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    for column in required {
        if !headers.iter().any(|h| h == column) {
            return Err(AppError::Schema(format!(
                "missing required column `{}` in {}",
                column,
                path.display()
            )));
        }
    }
    Ok(())
}

/// Load MES execution rows from a CSV file
pub fn load_mes_csv(path: &Path) -> Result<Vec<MesRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::Schema(format!("cannot read {}: {}", path.display(), e)))?;
    check_headers(&mut reader, &MES_COLUMNS, path)?;

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let raw: RawMesRow = row?;
        records.push(MesRecord {
            order_id: raw.order_id,
            start_time: parse_timestamp(raw.start_time.as_deref(), "start_time")?,
            end_time: parse_timestamp(raw.end_time.as_deref(), "end_time")?,
            produced_qty: raw.produced_qty,
            defect_qty: raw.defect_qty,
        });
    }
    Ok(records)
}

/// Load ERP planning rows from a CSV file
pub fn load_erp_csv(path: &Path) -> Result<Vec<ErpRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::Schema(format!("cannot read {}: {}", path.display(), e)))?;
    check_headers(&mut reader, &ERP_COLUMNS, path)?;

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let raw: RawErpRow = row?;
        records.push(ErpRecord {
            order_id: raw.order_id,
            planned_start: parse_timestamp(raw.planned_start.as_deref(), "planned_start")?,
            planned_end: parse_timestamp(raw.planned_end.as_deref(), "planned_end")?,
            planned_qty: raw.planned_qty,
        });
    }
    Ok(records)
}
