use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Numeric feature columns, in model input order
pub const NUMERIC_COLUMNS: [&str; 4] = [
    "temperature",
    "line_speed",
    "operator_experience",
    "machine_age",
];

/// Categorical shift column
pub const SHIFT_COLUMN: &str = "shift";

/// Defect label column (training data only)
pub const LABEL_COLUMN: &str = "defect";

/// One production observation
///
/// All fields are optional at the row level; missing numeric values are
/// imputed at fit time and missing shifts fall back to the most frequent
/// fit-time category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub temperature: Option<f64>,
    pub line_speed: Option<f64>,
    pub operator_experience: Option<f64>,
    pub machine_age: Option<f64>,
    pub shift: Option<String>,
    #[serde(default)]
    pub defect: Option<u8>,
}

impl ProductionRecord {
    /// Look up a numeric field by column name
    pub fn numeric(&self, column: &str) -> Result<Option<f64>> {
        match column {
            "temperature" => Ok(self.temperature),
            "line_speed" => Ok(self.line_speed),
            "operator_experience" => Ok(self.operator_experience),
            "machine_age" => Ok(self.machine_age),
            other => Err(AppError::Schema(format!(
                "unknown numeric column `{}`",
                other
            ))),
        }
    }
}

/// An ordered collection of production records sharing one schema
///
/// Transforms never mutate in place: filtering returns a new dataset with
/// contiguous row order.
#[derive(Debug, Clone, Default)]
pub struct ProductionDataset {
    records: Vec<ProductionRecord>,
}

impl ProductionDataset {
    pub fn new(records: Vec<ProductionRecord>) -> Self {
        Self { records }
    }

    /// Load a labeled training dataset from a CSV file
    ///
    /// The header must contain every numeric column, the shift column and
    /// the defect label; a missing column is a schema error naming it.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| {
            AppError::Schema(format!("cannot read {}: {}", path.display(), e))
        })?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut required: Vec<&str> = NUMERIC_COLUMNS.to_vec();
        required.push(SHIFT_COLUMN);
        required.push(LABEL_COLUMN);
        for column in required {
            if !headers.iter().any(|h| h == column) {
                return Err(AppError::Schema(format!(
                    "missing required column `{}` in {}",
                    column,
                    path.display()
                )));
            }
        }

        let mut records = Vec::new();
        for row in reader.deserialize() {
            let record: ProductionRecord = row?;
            records.push(record);
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ProductionRecord] {
        &self.records
    }

    /// Values of one numeric column, in row order
    pub fn numeric_column(&self, column: &str) -> Result<Vec<Option<f64>>> {
        self.records.iter().map(|r| r.numeric(column)).collect()
    }

    /// Defect labels as 0/1 class indices
    pub fn labels(&self) -> Result<Vec<usize>> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| match r.defect {
                Some(d) => Ok((d != 0) as usize),
                None => Err(AppError::Schema(format!(
                    "missing `{}` label in row {}",
                    LABEL_COLUMN, i
                ))),
            })
            .collect()
    }

    /// New dataset keeping only the rows at the given positions, re-indexed
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }

    /// New dataset keeping rows matching the predicate, re-indexed
    pub fn retain<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&ProductionRecord) -> bool,
    {
        Self {
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}
