use crate::error::Result;
use crate::reconcile::records::{ErpRecord, MesRecord, UnifiedRecord};
use crate::reconcile::validate::{validate_erp, validate_mes, ValidationLog};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Joins planned and actual production records into one KPI table
///
/// Validation findings go to the owned sink and never abort the join; a
/// table with known invalid rows is still joined on a best-effort basis.
pub struct ReconciliationJoiner {
    log: ValidationLog,
}

/// Mean KPI values over the unified table
///
/// Means skip undefined ratios; a `None` mean says the ratio was undefined
/// on every joined order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiSummary {
    pub order_count: usize,
    pub mean_plan_fulfillment: Option<f64>,
    pub mean_delay_hours: Option<f64>,
    pub mean_scrap_rate: Option<f64>,
    pub total_produced_qty: f64,
    pub total_defect_qty: f64,
}

impl ReconciliationJoiner {
    pub fn new(log: ValidationLog) -> Self {
        Self { log }
    }

    /// Validate both inputs, inner-join on `order_id`, derive the ratios
    ///
    /// Rows whose key appears in only one source are dropped; rows with a
    /// missing key never join. On duplicate keys within one source the last
    /// row wins.
    pub fn build_unified_table(
        &self,
        mes: &[MesRecord],
        erp: &[ErpRecord],
    ) -> Result<Vec<UnifiedRecord>> {
        self.log.record("mes", &validate_mes(mes))?;
        self.log.record("erp", &validate_erp(erp))?;

        let mes_by_order: HashMap<i64, &MesRecord> = mes
            .iter()
            .filter_map(|r| r.order_id.map(|id| (id, r)))
            .collect();

        let mut unified = Vec::new();
        for erp_record in erp {
            let order_id = match erp_record.order_id {
                Some(id) => id,
                None => continue,
            };
            let mes_record = match mes_by_order.get(&order_id) {
                Some(record) => record,
                None => continue,
            };

            let plan_fulfillment = ratio(mes_record.produced_qty, erp_record.planned_qty);
            let scrap_rate = ratio(mes_record.defect_qty, mes_record.produced_qty);
            let delay_hours = match (mes_record.end_time, erp_record.planned_end) {
                (Some(end), Some(planned_end)) => {
                    Some((end - planned_end).num_milliseconds() as f64 / 3_600_000.0)
                }
                _ => None,
            };

            unified.push(UnifiedRecord {
                order_id,
                planned_start: erp_record.planned_start,
                planned_end: erp_record.planned_end,
                planned_qty: erp_record.planned_qty,
                start_time: mes_record.start_time,
                end_time: mes_record.end_time,
                produced_qty: mes_record.produced_qty,
                defect_qty: mes_record.defect_qty,
                plan_fulfillment,
                delay_hours,
                scrap_rate,
            });
        }

        unified.sort_by_key(|r| r.order_id);
        info!(
            mes_rows = mes.len(),
            erp_rows = erp.len(),
            joined = unified.len(),
            "built unified reconciliation table"
        );
        Ok(unified)
    }

    /// Write the unified table as CSV; undefined ratios become empty cells
    pub fn write_unified_csv(&self, table: &[UnifiedRecord], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for record in table {
            writer.serialize(record)?;
        }
        writer.flush()?;
        info!(path = %path.display(), rows = table.len(), "wrote unified table");
        Ok(())
    }
}

/// Aggregate mean KPIs over a unified table, skipping undefined ratios
pub fn compute_kpis(table: &[UnifiedRecord]) -> KpiSummary {
    KpiSummary {
        order_count: table.len(),
        mean_plan_fulfillment: mean(table.iter().filter_map(|r| r.plan_fulfillment)),
        mean_delay_hours: mean(table.iter().filter_map(|r| r.delay_hours)),
        mean_scrap_rate: mean(table.iter().filter_map(|r| r.scrap_rate)),
        total_produced_qty: table.iter().filter_map(|r| r.produced_qty).sum(),
        total_defect_qty: table.iter().filter_map(|r| r.defect_qty).sum(),
    }
}

// Zero denominators and missing operands map to a missing ratio.
fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        return None;
    }
    Some(collected.iter().sum::<f64>() / collected.len() as f64)
}
