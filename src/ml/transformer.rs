use crate::data::{quantile_sorted, ProductionDataset, ProductionRecord, NUMERIC_COLUMNS};
use crate::error::{AppError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fitted feature transformer for production records
///
/// Holds the statistics learned from a training dataset: per-numeric-column
/// median (imputation), mean and standard deviation (standardization), plus
/// the observed shift vocabulary for one-hot encoding. Immutable once fit;
/// apply-time rows always reuse the fit-time statistics, including single-row
/// inference requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedTransformer {
    /// Numeric columns in model input order
    numeric_columns: Vec<String>,

    /// Fit-time medians used for imputation
    medians: Vec<f64>,

    /// Fit-time means used for centering
    means: Vec<f64>,

    /// Fit-time standard deviations used for scaling
    stds: Vec<f64>,

    /// Most frequent fit-time shift category, used for imputation
    shift_default: String,

    /// Observed shift categories, sorted for a deterministic column order
    shift_vocabulary: Vec<String>,
}

impl FittedTransformer {
    /// Learn imputation, scaling and encoding statistics from training data
    pub fn fit(dataset: &ProductionDataset) -> Result<Self> {
        if dataset.is_empty() {
            return Err(AppError::DataSufficiency(
                "cannot fit transformer on an empty dataset".to_string(),
            ));
        }

        let mut medians = Vec::with_capacity(NUMERIC_COLUMNS.len());
        let mut means = Vec::with_capacity(NUMERIC_COLUMNS.len());
        let mut stds = Vec::with_capacity(NUMERIC_COLUMNS.len());

        for &column in NUMERIC_COLUMNS.iter() {
            let values = dataset.numeric_column(column)?;
            let mut observed: Vec<f64> = values.iter().filter_map(|v| *v).collect();
            if observed.is_empty() {
                return Err(AppError::Schema(format!(
                    "column `{}` has no observed values",
                    column
                )));
            }
            observed.sort_by(|a, b| a.total_cmp(b));
            let median = quantile_sorted(&observed, 0.5);

            // Statistics are computed over the imputed column, matching an
            // impute-then-scale pipeline.
            let imputed: Vec<f64> = values.iter().map(|v| v.unwrap_or(median)).collect();
            let n = imputed.len() as f64;
            let mean = imputed.iter().sum::<f64>() / n;
            let variance = imputed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();

            medians.push(median);
            means.push(mean);
            stds.push(if std > 0.0 { std } else { 1.0 });
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in dataset.records() {
            if let Some(shift) = record.shift.as_deref() {
                *counts.entry(shift).or_insert(0) += 1;
            }
        }
        if counts.is_empty() {
            return Err(AppError::Schema(
                "column `shift` has no observed values".to_string(),
            ));
        }

        // Ties break lexicographically so imputation is order-independent.
        let shift_default = counts
            .iter()
            .map(|(shift, count)| (*count, *shift))
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, shift)| shift.to_string())
            .unwrap_or_default();

        let mut shift_vocabulary: Vec<String> = counts.keys().map(|s| s.to_string()).collect();
        shift_vocabulary.sort();

        Ok(Self {
            numeric_columns: NUMERIC_COLUMNS.iter().map(|s| s.to_string()).collect(),
            medians,
            means,
            stds,
            shift_default,
            shift_vocabulary,
        })
    }

    /// Transform a single record into the fixed-order feature vector
    ///
    /// A shift category unseen at fit time encodes as an all-zero indicator
    /// block; it never errors.
    pub fn transform_record(&self, record: &ProductionRecord) -> Result<Vec<f64>> {
        let mut features = Vec::with_capacity(self.n_features());

        for (i, column) in self.numeric_columns.iter().enumerate() {
            let raw = record.numeric(column)?.unwrap_or(self.medians[i]);
            features.push((raw - self.means[i]) / self.stds[i]);
        }

        let shift = record.shift.as_deref().unwrap_or(&self.shift_default);
        for category in &self.shift_vocabulary {
            features.push(if category == shift { 1.0 } else { 0.0 });
        }

        Ok(features)
    }

    /// Transform a dataset into a feature matrix (n_rows × n_features)
    pub fn transform(&self, dataset: &ProductionDataset) -> Result<Array2<f64>> {
        let mut matrix = Array2::zeros((dataset.len(), self.n_features()));
        for (i, record) in dataset.records().iter().enumerate() {
            let row = self.transform_record(record)?;
            for (j, value) in row.into_iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }
        Ok(matrix)
    }

    /// Output feature names: numeric columns then one indicator per category
    ///
    /// Reproducible from the fitted transformer alone; this order is the
    /// contract consumed by feature-importance reporting.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.numeric_columns.clone();
        for category in &self.shift_vocabulary {
            names.push(format!("shift_{}", category));
        }
        names
    }

    pub fn n_features(&self) -> usize {
        self.numeric_columns.len() + self.shift_vocabulary.len()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.shift_vocabulary
    }
}
