use crate::error::Result;
use crate::reconcile::records::{ErpRecord, MesRecord};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Data-quality checks for MES execution rows
///
/// Returns human-readable findings; an empty vector means the table passed.
/// Findings never abort the downstream join.
pub fn validate_mes(records: &[MesRecord]) -> Vec<String> {
    let mut findings = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let row = i + 2; // 1-based, after the header
        if record.order_id.is_none() {
            findings.push(format!("MES row {}: missing order_id", row));
        }
        if let Some(qty) = record.produced_qty {
            if qty < 0.0 {
                findings.push(format!("MES row {}: negative produced_qty ({})", row, qty));
            }
        }
        if let Some(qty) = record.defect_qty {
            if qty < 0.0 {
                findings.push(format!("MES row {}: negative defect_qty ({})", row, qty));
            }
        }
        if let (Some(defect), Some(produced)) = (record.defect_qty, record.produced_qty) {
            if defect > produced {
                findings.push(format!(
                    "MES row {}: defect_qty ({}) exceeds produced_qty ({})",
                    row, defect, produced
                ));
            }
        }
        if let (Some(start), Some(end)) = (record.start_time, record.end_time) {
            if end < start {
                findings.push(format!("MES row {}: end_time before start_time", row));
            }
        }
    }
    findings
}

/// Data-quality checks for ERP planning rows
pub fn validate_erp(records: &[ErpRecord]) -> Vec<String> {
    let mut findings = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let row = i + 2;
        if record.order_id.is_none() {
            findings.push(format!("ERP row {}: missing order_id", row));
        }
        if let Some(qty) = record.planned_qty {
            if qty < 0.0 {
                findings.push(format!("ERP row {}: negative planned_qty ({})", row, qty));
            }
        }
        if let (Some(start), Some(end)) = (record.planned_start, record.planned_end) {
            if end < start {
                findings.push(format!("ERP row {}: planned_end before planned_start", row));
            }
        }
    }
    findings
}

/// File-backed sink for validation findings
///
/// Owned by the joiner and passed explicitly; findings are appended to the
/// log file and echoed as warnings. Writing happens lazily so constructing
/// the sink does no I/O.
#[derive(Debug, Clone)]
pub struct ValidationLog {
    path: PathBuf,
}

impl ValidationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one table's findings under a source label
    pub fn record(&self, source: &str, findings: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if findings.is_empty() {
            writeln!(file, "[{}] validation passed with no findings", source)?;
            return Ok(());
        }

        for finding in findings {
            warn!(source, finding = %finding, "validation finding");
            writeln!(file, "[{}] {}", source, finding)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_validate_mes_findings() {
        let records = vec![
            MesRecord {
                order_id: Some(1),
                start_time: Some(ts(8)),
                end_time: Some(ts(10)),
                produced_qty: Some(90.0),
                defect_qty: Some(9.0),
            },
            MesRecord {
                order_id: None,
                start_time: Some(ts(10)),
                end_time: Some(ts(8)),
                produced_qty: Some(-5.0),
                defect_qty: Some(2.0),
            },
        ];

        let findings = validate_mes(&records);
        assert_eq!(findings.len(), 4);
        assert!(findings.iter().all(|f| f.contains("row 3")));
        assert!(findings.iter().any(|f| f.contains("missing order_id")));
        assert!(findings.iter().any(|f| f.contains("negative produced_qty")));
        assert!(findings.iter().any(|f| f.contains("exceeds produced_qty")));
        assert!(findings.iter().any(|f| f.contains("end_time before start_time")));
    }

    #[test]
    fn test_validate_erp_clean() {
        let records = vec![ErpRecord {
            order_id: Some(1),
            planned_start: Some(ts(8)),
            planned_end: Some(ts(9)),
            planned_qty: Some(100.0),
        }];
        assert!(validate_erp(&records).is_empty());
    }

    #[test]
    fn test_log_records_findings_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = ValidationLog::new(dir.path().join("validation.log"));

        log.record("mes", &["MES row 2: missing order_id".to_string()])
            .unwrap();
        log.record("erp", &[]).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert!(contents.contains("[mes] MES row 2: missing order_id"));
        assert!(contents.contains("[erp] validation passed with no findings"));
    }
}
