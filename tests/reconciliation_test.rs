use production_quality_manager::reconcile::{
    compute_kpis, load_erp_csv, load_mes_csv, ReconciliationJoiner, ValidationLog,
};
use std::io::Write;
use tempfile::TempDir;

fn write_csv(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "{}", contents).unwrap();
    path
}

fn joiner(dir: &TempDir) -> ReconciliationJoiner {
    ReconciliationJoiner::new(ValidationLog::new(dir.path().join("validation.log")))
}

#[test]
fn end_to_end_reconciliation_scenario() {
    let dir = TempDir::new().unwrap();
    let mes_path = write_csv(
        &dir,
        "mes.csv",
        "order_id,start_time,end_time,produced_qty,defect_qty\n\
         1,2026-03-01T08:00:00,2026-03-01T10:00:00,90,9\n",
    );
    let erp_path = write_csv(
        &dir,
        "erp.csv",
        "order_id,planned_start,planned_end,planned_qty\n\
         1,2026-03-01T08:00:00,2026-03-01T09:00:00,100\n",
    );

    let mes = load_mes_csv(&mes_path).unwrap();
    let erp = load_erp_csv(&erp_path).unwrap();
    let table = joiner(&dir).build_unified_table(&mes, &erp).unwrap();

    assert_eq!(table.len(), 1);
    let record = &table[0];
    assert_eq!(record.order_id, 1);
    assert!((record.plan_fulfillment.unwrap() - 0.9).abs() < 1e-12);
    assert!((record.delay_hours.unwrap() - 1.0).abs() < 1e-12);
    assert!((record.scrap_rate.unwrap() - 0.1).abs() < 1e-12);
}

#[test]
fn join_keeps_only_shared_orders() {
    let dir = TempDir::new().unwrap();
    let mes_path = write_csv(
        &dir,
        "mes.csv",
        "order_id,start_time,end_time,produced_qty,defect_qty\n\
         1,2026-03-01T08:00:00,2026-03-01T10:00:00,90,9\n\
         2,2026-03-01T08:00:00,2026-03-01T10:00:00,50,0\n",
    );
    let erp_path = write_csv(
        &dir,
        "erp.csv",
        "order_id,planned_start,planned_end,planned_qty\n\
         2,2026-03-01T08:00:00,2026-03-01T09:00:00,60\n\
         3,2026-03-01T08:00:00,2026-03-01T09:00:00,70\n",
    );

    let mes = load_mes_csv(&mes_path).unwrap();
    let erp = load_erp_csv(&erp_path).unwrap();
    let table = joiner(&dir).build_unified_table(&mes, &erp).unwrap();

    let orders: Vec<i64> = table.iter().map(|r| r.order_id).collect();
    assert_eq!(orders, vec![2]);
}

#[test]
fn zero_produced_qty_yields_missing_scrap_rate() {
    let dir = TempDir::new().unwrap();
    let mes_path = write_csv(
        &dir,
        "mes.csv",
        "order_id,start_time,end_time,produced_qty,defect_qty\n\
         1,2026-03-01T08:00:00,2026-03-01T10:00:00,0,0\n",
    );
    let erp_path = write_csv(
        &dir,
        "erp.csv",
        "order_id,planned_start,planned_end,planned_qty\n\
         1,2026-03-01T08:00:00,2026-03-01T09:00:00,100\n",
    );

    let mes = load_mes_csv(&mes_path).unwrap();
    let erp = load_erp_csv(&erp_path).unwrap();
    let table = joiner(&dir).build_unified_table(&mes, &erp).unwrap();

    let record = &table[0];
    assert_eq!(record.scrap_rate, None);
    assert!(record
        .plan_fulfillment
        .map(|v| v.is_finite())
        .unwrap_or(true));
}

#[test]
fn invalid_rows_are_logged_but_join_proceeds() {
    let dir = TempDir::new().unwrap();
    let mes_path = write_csv(
        &dir,
        "mes.csv",
        "order_id,start_time,end_time,produced_qty,defect_qty\n\
         1,2026-03-01T10:00:00,2026-03-01T08:00:00,-5,2\n\
         ,2026-03-01T08:00:00,2026-03-01T10:00:00,40,1\n",
    );
    let erp_path = write_csv(
        &dir,
        "erp.csv",
        "order_id,planned_start,planned_end,planned_qty\n\
         1,2026-03-01T08:00:00,2026-03-01T09:00:00,100\n",
    );

    let mes = load_mes_csv(&mes_path).unwrap();
    let erp = load_erp_csv(&erp_path).unwrap();
    let table = joiner(&dir).build_unified_table(&mes, &erp).unwrap();

    // The invalid row still joins; the keyless row is dropped.
    assert_eq!(table.len(), 1);

    let log = std::fs::read_to_string(dir.path().join("validation.log")).unwrap();
    assert!(log.contains("negative produced_qty"));
    assert!(log.contains("missing order_id"));
    assert!(log.contains("end_time before start_time"));
}

#[test]
fn unified_table_written_with_kpis() {
    let dir = TempDir::new().unwrap();
    let mes_path = write_csv(
        &dir,
        "mes.csv",
        "order_id,start_time,end_time,produced_qty,defect_qty\n\
         1,2026-03-01T08:00:00,2026-03-01T10:00:00,90,9\n\
         2,2026-03-01T08:00:00,2026-03-01T09:00:00,100,0\n",
    );
    let erp_path = write_csv(
        &dir,
        "erp.csv",
        "order_id,planned_start,planned_end,planned_qty\n\
         1,2026-03-01T08:00:00,2026-03-01T09:00:00,100\n\
         2,2026-03-01T08:00:00,2026-03-01T09:00:00,100\n",
    );

    let mes = load_mes_csv(&mes_path).unwrap();
    let erp = load_erp_csv(&erp_path).unwrap();
    let joiner = joiner(&dir);
    let table = joiner.build_unified_table(&mes, &erp).unwrap();

    let out = dir.path().join("unified.csv");
    joiner.write_unified_csv(&table, &out).unwrap();
    let contents = std::fs::read_to_string(&out).unwrap();
    assert_eq!(contents.lines().count(), 3);

    let kpis = compute_kpis(&table);
    assert_eq!(kpis.order_count, 2);
    assert!((kpis.mean_plan_fulfillment.unwrap() - 0.95).abs() < 1e-12);
    assert!((kpis.mean_scrap_rate.unwrap() - 0.05).abs() < 1e-12);
    assert!((kpis.total_produced_qty - 190.0).abs() < 1e-12);
}
