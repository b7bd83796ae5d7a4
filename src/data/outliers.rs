use crate::data::dataset::ProductionDataset;
use crate::error::Result;
use tracing::debug;

/// Quantile of a sorted slice using linear interpolation between order
/// statistics
///
/// Matches the conventional definition so that quartile-derived bounds are
/// reproducible across runs.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = pos - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Remove rows whose numeric values fall outside an IQR-derived band
///
/// Bounds are recomputed per column over the progressively filtered set, so
/// filters compose sequentially rather than as an intersection on the
/// original rows. A row with a missing value in the current column fails the
/// band check and is dropped.
pub fn filter_outliers(
    dataset: &ProductionDataset,
    numeric_columns: &[&str],
    whisker_width: f64,
) -> Result<ProductionDataset> {
    let mut current = dataset.clone();

    for &column in numeric_columns {
        let values = current.numeric_column(column)?;
        let mut observed: Vec<f64> = values.iter().filter_map(|v| *v).collect();
        if observed.is_empty() {
            debug!(column, "no observed values, dropping all rows");
            return Ok(current.retain(|_| false));
        }
        observed.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile_sorted(&observed, 0.25);
        let q3 = quantile_sorted(&observed, 0.75);
        let iqr = q3 - q1;
        let lower = q1 - whisker_width * iqr;
        let upper = q3 + whisker_width * iqr;

        let before = current.len();
        current = current.retain(|record| match record.numeric(column) {
            Ok(Some(v)) => v >= lower && v <= upper,
            _ => false,
        });
        debug!(
            column,
            lower,
            upper,
            removed = before - current.len(),
            "outlier filter pass"
        );
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ProductionRecord;

    fn record(temp: f64, speed: f64) -> ProductionRecord {
        ProductionRecord {
            temperature: Some(temp),
            line_speed: Some(speed),
            operator_experience: Some(5.0),
            machine_age: Some(20.0),
            shift: Some("Day".to_string()),
            defect: Some(0),
        }
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile_sorted(&values, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile_sorted(&values, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile_sorted(&values, 0.75) - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_single_value() {
        assert_eq!(quantile_sorted(&[7.0], 0.25), 7.0);
        assert_eq!(quantile_sorted(&[7.0], 0.75), 7.0);
    }

    #[test]
    fn test_extreme_row_removed() {
        let mut records: Vec<ProductionRecord> =
            (0..20).map(|i| record(70.0 + i as f64 * 0.5, 85.0)).collect();
        records.push(record(500.0, 85.0));
        let dataset = ProductionDataset::new(records);

        let filtered = filter_outliers(&dataset, &["temperature"], 1.5).unwrap();
        assert_eq!(filtered.len(), 20);
        assert!(filtered
            .records()
            .iter()
            .all(|r| r.temperature.unwrap() < 100.0));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let mut records: Vec<ProductionRecord> =
            (0..30).map(|i| record(70.0 + i as f64, 80.0 + i as f64)).collect();
        records.push(record(1000.0, 85.0));
        records.push(record(75.0, -500.0));
        let dataset = ProductionDataset::new(records);

        let columns = ["temperature", "line_speed"];
        let once = filter_outliers(&dataset, &columns, 1.5).unwrap();
        let twice = filter_outliers(&once, &columns, 1.5).unwrap();
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn test_missing_value_dropped() {
        let mut records: Vec<ProductionRecord> =
            (0..10).map(|i| record(70.0 + i as f64, 85.0)).collect();
        let mut incomplete = record(75.0, 85.0);
        incomplete.temperature = None;
        records.push(incomplete);
        let dataset = ProductionDataset::new(records);

        let filtered = filter_outliers(&dataset, &["temperature"], 1.5).unwrap();
        assert_eq!(filtered.len(), 10);
    }

    #[test]
    fn test_unknown_column_is_schema_error() {
        let dataset = ProductionDataset::new(vec![record(70.0, 85.0)]);
        assert!(filter_outliers(&dataset, &["pressure"], 1.5).is_err());
    }

    #[test]
    fn test_second_column_filters_reduced_set() {
        let mut records: Vec<ProductionRecord> =
            (0..12).map(|i| record(70.0 + i as f64, 85.0)).collect();
        records.push(record(76.0, 300.0));
        let dataset = ProductionDataset::new(records);

        let filtered = filter_outliers(&dataset, &["temperature", "line_speed"], 1.5).unwrap();
        assert_eq!(filtered.len(), 12);
        assert!(filtered.records().iter().all(|r| r.line_speed == Some(85.0)));
    }
}
