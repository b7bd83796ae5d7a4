//! Production Quality Manager
//!
//! Defect-prediction training and serving for a manufacturing line, plus
//! MES/ERP reconciliation into a unified KPI table.

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod ml;
pub mod reconcile;

pub use error::{AppError, Result};
