use anyhow::Context;
use clap::{Parser, Subcommand};
use production_quality_manager::{
    config::Config,
    data::ProductionDataset,
    ml::{ModelRegistry, Trainer},
    reconcile::{compute_kpis, load_erp_csv, load_mes_csv, ReconciliationJoiner, ValidationLog},
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pqm-cli")]
#[command(about = "Production Quality Manager offline pipelines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train and evaluate both model families, persist the ensemble
    Train {
        /// Production dataset CSV
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Reconcile MES and ERP exports into a unified KPI table
    Reconcile {
        /// MES execution CSV
        #[arg(short, long)]
        mes: Option<PathBuf>,

        /// ERP planning CSV
        #[arg(short, long)]
        erp: Option<PathBuf>,

        /// Output directory for the table and validation log
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Print aggregate KPIs for a reconciled pair of exports
    Kpi {
        /// MES execution CSV
        #[arg(short, long)]
        mes: Option<PathBuf>,

        /// ERP planning CSV
        #[arg(short, long)]
        erp: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.observability.env_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Train { data } => {
            let data_path = data.unwrap_or_else(|| config.model.default_data_path.clone());
            let dataset = ProductionDataset::from_csv_path(&data_path)
                .with_context(|| format!("loading {}", data_path.display()))?;

            let trainer = Trainer::new(config.model.trainer.clone());
            let outcome = trainer.train_and_evaluate(&dataset)?;

            for warning in &outcome.warnings {
                println!("warning: {}", warning);
            }

            if let Some(linear) = &outcome.linear {
                println!("=== {} ===", linear.name);
                println!("ROC-AUC: {:.4}", linear.auc);
                println!("{}", linear.report);
            }

            println!("=== {} ===", outcome.ensemble.name);
            println!("ROC-AUC: {:.4}", outcome.ensemble.auc);
            println!("{}", outcome.ensemble.report);

            // The evaluated ensemble is the artifact; no second fit.
            let registry = ModelRegistry::new(config.model.clone());
            let trained = registry.install(outcome.ensemble).await?;
            println!("Persisted model bundle: {}", trained.model_path);

            let mut importances = registry.feature_importance().await;
            importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
            println!("Top features:");
            for entry in importances.iter().take(5) {
                println!("  {:<24} {:.4}", entry.feature, entry.importance);
            }
        }

        Commands::Reconcile { mes, erp, out_dir } => {
            let mes_path = mes.unwrap_or_else(|| config.reconciliation.mes_path.clone());
            let erp_path = erp.unwrap_or_else(|| config.reconciliation.erp_path.clone());
            let out_dir = out_dir.unwrap_or_else(|| config.reconciliation.results_dir.clone());

            let mes_records = load_mes_csv(&mes_path)
                .with_context(|| format!("loading {}", mes_path.display()))?;
            let erp_records = load_erp_csv(&erp_path)
                .with_context(|| format!("loading {}", erp_path.display()))?;

            let joiner = ReconciliationJoiner::new(ValidationLog::new(
                out_dir.join("validation.log"),
            ));
            let table = joiner.build_unified_table(&mes_records, &erp_records)?;
            let unified_path = out_dir.join("unified_production.csv");
            joiner.write_unified_csv(&table, &unified_path)?;

            println!("Joined {} orders", table.len());
            println!("Unified table: {}", unified_path.display());
            println!("Validation log: {}", out_dir.join("validation.log").display());
        }

        Commands::Kpi { mes, erp } => {
            let mes_path = mes.unwrap_or_else(|| config.reconciliation.mes_path.clone());
            let erp_path = erp.unwrap_or_else(|| config.reconciliation.erp_path.clone());

            let mes_records = load_mes_csv(&mes_path)
                .with_context(|| format!("loading {}", mes_path.display()))?;
            let erp_records = load_erp_csv(&erp_path)
                .with_context(|| format!("loading {}", erp_path.display()))?;

            let temp_dir = std::env::temp_dir();
            let joiner =
                ReconciliationJoiner::new(ValidationLog::new(temp_dir.join("validation.log")));
            let table = joiner.build_unified_table(&mes_records, &erp_records)?;
            let kpis = compute_kpis(&table);

            println!("Orders reconciled:      {}", kpis.order_count);
            println!("Total produced:         {:.1}", kpis.total_produced_qty);
            println!("Total defects:          {:.1}", kpis.total_defect_qty);
            print_ratio("Mean plan fulfillment:", kpis.mean_plan_fulfillment);
            print_ratio("Mean delay (hours):   ", kpis.mean_delay_hours);
            print_ratio("Mean scrap rate:      ", kpis.mean_scrap_rate);
        }
    }

    Ok(())
}

fn print_ratio(label: &str, value: Option<f64>) {
    match value {
        Some(v) => println!("{} {:.4}", label, v),
        None => println!("{} n/a", label),
    }
}
