use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Model training and registry configuration
    pub model: ModelConfig,

    /// MES/ERP reconciliation configuration
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: PQM_)
            .add_source(
                config::Environment::with_prefix("PQM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            model: ModelConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Directory holding persisted model bundles (one file per family)
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Dataset used to bootstrap a model when no persisted bundle exists
    #[serde(default = "default_data_path")]
    pub default_data_path: PathBuf,

    /// Training hyperparameters
    #[serde(default)]
    pub trainer: TrainerConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            default_data_path: default_data_path(),
            trainer: TrainerConfig::default(),
        }
    }
}

/// Hyperparameters for both model families
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Held-out fraction for evaluation
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the stratified split and the bootstrap sampler
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Iteration budget for the linear solver
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,

    /// L2 regularization strength for the linear family
    #[serde(default = "default_l2_penalty")]
    pub l2_penalty: f64,

    /// Forest size for the ensemble family
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Maximum tree depth
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Minimum samples required to split a node
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,

    /// Whisker width for IQR outlier removal
    #[serde(default = "default_whisker_width")]
    pub whisker_width: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            seed: default_seed(),
            max_iterations: default_max_iterations(),
            l2_penalty: default_l2_penalty(),
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            whisker_width: default_whisker_width(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// MES execution CSV path
    #[serde(default = "default_mes_path")]
    pub mes_path: PathBuf,

    /// ERP planning CSV path
    #[serde(default = "default_erp_path")]
    pub erp_path: PathBuf,

    /// Output directory for the unified table and validation log
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            mes_path: default_mes_path(),
            erp_path: default_erp_path(),
            results_dir: default_results_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ObservabilityConfig {
    /// Fallback filter directive used when `RUST_LOG` is unset
    pub fn env_filter(&self) -> String {
        format!(
            "production_quality_manager={level},tower_http={level}",
            level = self.log_level
        )
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    5001
}

fn default_model_dir() -> PathBuf {
    "./models".into()
}

fn default_data_path() -> PathBuf {
    "./data/production_data.csv".into()
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_max_iterations() -> u64 {
    600
}

fn default_l2_penalty() -> f64 {
    1.0
}

fn default_n_trees() -> usize {
    300
}

fn default_max_depth() -> usize {
    12
}

fn default_min_samples_split() -> usize {
    4
}

fn default_whisker_width() -> f64 {
    1.5
}

fn default_mes_path() -> PathBuf {
    "./data/mes.csv".into()
}

fn default_erp_path() -> PathBuf {
    "./data/erp.csv".into()
}

fn default_results_dir() -> PathBuf {
    "./results".into()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trainer_defaults() {
        let trainer = TrainerConfig::default();
        assert_eq!(trainer.seed, 42);
        assert_eq!(trainer.n_trees, 300);
        assert_eq!(trainer.max_depth, 12);
        assert_eq!(trainer.min_samples_split, 4);
        assert!((trainer.test_size - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.server.http_port, 5001);
        assert_eq!(config.model.model_dir, PathBuf::from("./models"));
    }

    #[test]
    fn test_env_filter_follows_configured_level() {
        let observability = ObservabilityConfig {
            log_level: "debug".to_string(),
        };
        assert_eq!(
            observability.env_filter(),
            "production_quality_manager=debug,tower_http=debug"
        );
        assert_eq!(
            ObservabilityConfig::default().env_filter(),
            "production_quality_manager=info,tower_http=info"
        );
    }
}
