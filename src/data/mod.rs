//! Production dataset handling
//!
//! The tabular layer shared by the training pipelines: CSV loading with
//! header schema checks, typed records with optional (imputable) fields,
//! and IQR-based outlier filtering with reproducible quartiles.

pub mod dataset;
pub mod outliers;

pub use dataset::{ProductionDataset, ProductionRecord, LABEL_COLUMN, NUMERIC_COLUMNS, SHIFT_COLUMN};
pub use outliers::{filter_outliers, quantile_sorted};
