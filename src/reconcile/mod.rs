//! MES/ERP reconciliation: load and validate both sources, inner-join on
//! `order_id`, derive plan-fulfillment, delay and scrap-rate KPIs

pub mod joiner;
pub mod records;
pub mod validate;

pub use joiner::{compute_kpis, KpiSummary, ReconciliationJoiner};
pub use records::{
    load_erp_csv, load_mes_csv, ErpRecord, MesRecord, UnifiedRecord, ERP_COLUMNS, MES_COLUMNS,
};
pub use validate::{validate_erp, validate_mes, ValidationLog};
