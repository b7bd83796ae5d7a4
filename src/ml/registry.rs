use crate::config::ModelConfig;
use crate::data::ProductionDataset;
use crate::error::{AppError, Result};
use crate::ml::models::{
    FeatureImportance, ModelBundle, ModelFamily, PredictionInput, PredictionOutput,
    TemperatureCurvePoint, TrainOutcome,
};
use crate::ml::trainer::Trainer;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Fixed sweep defaults for the temperature diagnostic curve
const CURVE_LINE_SPEED: f64 = 85.0;
const CURVE_SHIFT: &str = "Day";
const CURVE_OPERATOR_EXPERIENCE: f64 = 5.0;
const CURVE_MACHINE_AGE: f64 = 25.0;

/// Model registry and prediction service
///
/// Two-phase lifecycle: construction does no I/O; `load_or_train` performs
/// the disk load (or bootstrap training) as an explicit step. The served
/// bundle is swapped atomically behind an `RwLock`, and each request takes a
/// snapshot reference for its whole duration.
///
/// When no bundle is loaded, predictions degrade to a documented
/// temperature-only heuristic instead of failing; `is_loaded` lets callers
/// distinguish the two regimes.
pub struct ModelRegistry {
    model_dir: PathBuf,
    default_data_path: PathBuf,
    trainer: Trainer,
    bundle: RwLock<Option<Arc<ModelBundle>>>,
}

impl ModelRegistry {
    /// Create an unloaded registry; no disk access happens here
    pub fn new(config: ModelConfig) -> Self {
        Self {
            model_dir: config.model_dir,
            default_data_path: config.default_data_path,
            trainer: Trainer::new(config.trainer),
            bundle: RwLock::new(None),
        }
    }

    /// Load the persisted ensemble bundle, or bootstrap one from the default
    /// dataset when present
    ///
    /// Remains Unloaded (heuristic fallback) when neither is available; the
    /// service keeps answering either way.
    pub async fn load_or_train(&self) -> Result<()> {
        let artifact = self.artifact_path(ModelFamily::RandomForest);
        if artifact.is_file() {
            match Self::read_bundle(&artifact) {
                Ok(bundle) => {
                    info!(path = %artifact.display(), auc = bundle.auc, "loaded persisted model bundle");
                    *self.bundle.write().await = Some(Arc::new(bundle));
                    return Ok(());
                }
                Err(e) => {
                    warn!(path = %artifact.display(), error = %e, "persisted bundle unreadable");
                }
            }
        }

        if self.default_data_path.is_file() {
            let data_path = self.default_data_path.clone();
            info!(path = %data_path.display(), "no persisted bundle, training from default dataset");
            match self.train(&data_path).await {
                Ok(outcome) => {
                    info!(auc = outcome.auc_score, "bootstrap training complete");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "bootstrap training failed, serving heuristic fallback");
                    return Ok(());
                }
            }
        }

        info!("no persisted bundle and no default dataset, serving heuristic fallback");
        Ok(())
    }

    /// Whether a trained bundle is currently served
    pub async fn is_loaded(&self) -> bool {
        self.bundle.read().await.is_some()
    }

    async fn snapshot(&self) -> Option<Arc<ModelBundle>> {
        self.bundle.read().await.clone()
    }

    /// Predict defect probability for one record
    pub async fn predict(&self, input: &PredictionInput) -> Result<PredictionOutput> {
        match self.snapshot().await {
            Some(bundle) => Self::predict_with_bundle(&bundle, input),
            None => Ok(PredictionOutput::from_probability(heuristic_probability(
                input.temperature,
            ))),
        }
    }

    /// Predict for every record; the first failure fails the whole batch
    pub async fn predict_batch(&self, inputs: &[PredictionInput]) -> Result<Vec<PredictionOutput>> {
        let snapshot = self.snapshot().await;
        inputs
            .iter()
            .map(|input| match &snapshot {
                Some(bundle) => Self::predict_with_bundle(bundle, input),
                None => Ok(PredictionOutput::from_probability(heuristic_probability(
                    input.temperature,
                ))),
            })
            .collect()
    }

    fn predict_with_bundle(bundle: &ModelBundle, input: &PredictionInput) -> Result<PredictionOutput> {
        let row = bundle.transformer.transform_record(&input.to_record())?;
        let n_features = row.len();
        let matrix = Array2::from_shape_vec((1, n_features), row)
            .map_err(|e| AppError::Internal(format!("feature row shape: {}", e)))?;
        let probability = bundle.classifier.predict_proba(&matrix)[0];
        Ok(PredictionOutput::from_probability(probability))
    }

    /// Feature importances of the served bundle, or the documented
    /// placeholder mapping when Unloaded or unavailable
    pub async fn feature_importance(&self) -> Vec<FeatureImportance> {
        if let Some(bundle) = self.snapshot().await {
            if bundle.classifier.has_importances() {
                match bundle.classifier.importances() {
                    Some(importances) => {
                        return bundle
                            .transformer
                            .feature_names()
                            .into_iter()
                            .zip(importances)
                            .map(|(feature, importance)| FeatureImportance {
                                feature,
                                importance,
                            })
                            .collect();
                    }
                    None => {
                        warn!("model reports no usable importances, returning placeholder");
                    }
                }
            }
        }
        placeholder_importance()
    }

    /// Synthetic temperature sweep holding the other inputs at fixed
    /// representative defaults; a diagnostic, not a statistical estimate
    pub async fn temperature_curve(
        &self,
        n_points: usize,
        range: (f64, f64),
    ) -> Result<Vec<TemperatureCurvePoint>> {
        let (low, high) = range;
        let mut points = Vec::with_capacity(n_points);
        for i in 0..n_points {
            let fraction = if n_points > 1 {
                i as f64 / (n_points - 1) as f64
            } else {
                0.0
            };
            let temperature = low + fraction * (high - low);
            let input = PredictionInput {
                temperature,
                line_speed: CURVE_LINE_SPEED,
                shift: CURVE_SHIFT.to_string(),
                operator_experience: CURVE_OPERATOR_EXPERIENCE,
                machine_age: CURVE_MACHINE_AGE,
            };
            let output = self.predict(&input).await?;
            points.push(TemperatureCurvePoint {
                temperature,
                defect_probability: output.defect_probability,
            });
        }
        Ok(points)
    }

    /// Train the ensemble family from a CSV, persist it, and swap it in
    ///
    /// The on-disk artifact and the in-memory bundle are only replaced after
    /// a successful fit; the artifact is written to a temporary path and
    /// renamed so readers never observe a half-written file.
    pub async fn train(&self, data_path: &Path) -> Result<TrainOutcome> {
        let dataset = ProductionDataset::from_csv_path(data_path)?;
        let trainer = self.trainer.clone();

        let bundle = tokio::task::spawn_blocking(move || {
            trainer.train_family(&dataset, ModelFamily::RandomForest)
        })
        .await
        .map_err(|e| AppError::Internal(format!("training task failed: {}", e)))??;

        self.install(bundle).await
    }

    /// Persist an already fitted bundle and swap it in, without refitting
    pub async fn install(&self, bundle: ModelBundle) -> Result<TrainOutcome> {
        let artifact = self.artifact_path(bundle.family);
        self.write_bundle(&bundle, &artifact)?;

        let outcome = TrainOutcome {
            model_path: artifact.display().to_string(),
            auc_score: bundle.auc,
            classification_report: bundle.report.clone(),
        };

        *self.bundle.write().await = Some(Arc::new(bundle));
        info!(path = %outcome.model_path, auc = outcome.auc_score, "model bundle replaced");
        Ok(outcome)
    }

    fn artifact_path(&self, family: ModelFamily) -> PathBuf {
        self.model_dir.join(format!("{}.bin", family.artifact_stem()))
    }

    fn write_bundle(&self, bundle: &ModelBundle, artifact: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.model_dir)?;
        let encoded = bincode::serialize(bundle)?;
        let tmp_path = artifact.with_extension("bin.tmp");
        std::fs::write(&tmp_path, encoded)?;
        std::fs::rename(&tmp_path, artifact)?;
        Ok(())
    }

    fn read_bundle(artifact: &Path) -> Result<ModelBundle> {
        let bytes = std::fs::read(artifact)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

/// Documented fallback: a linear function of temperature only, clamped away
/// from certainty
pub fn heuristic_probability(temperature: f64) -> f64 {
    ((temperature - 70.0) / 50.0).clamp(0.05, 0.95)
}

/// Fixed placeholder importances served while no model is loaded
fn placeholder_importance() -> Vec<FeatureImportance> {
    [
        ("temperature", 0.35),
        ("line_speed", 0.25),
        ("operator_experience", 0.15),
        ("machine_age", 0.12),
        ("shift_Day", 0.07),
        ("shift_Night", 0.06),
    ]
    .into_iter()
    .map(|(feature, importance)| FeatureImportance {
        feature: feature.to_string(),
        importance,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainerConfig;

    fn unloaded_registry() -> ModelRegistry {
        let mut config = ModelConfig::default();
        config.model_dir = PathBuf::from("/nonexistent/models");
        config.default_data_path = PathBuf::from("/nonexistent/data.csv");
        config.trainer = TrainerConfig::default();
        ModelRegistry::new(config)
    }

    #[test]
    fn test_heuristic_probability_clamped() {
        assert_eq!(heuristic_probability(0.0), 0.05);
        assert_eq!(heuristic_probability(200.0), 0.95);
        assert!((heuristic_probability(95.0) - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_construction_does_no_io() {
        let registry = unloaded_registry();
        assert!(!registry.is_loaded().await);
    }

    #[tokio::test]
    async fn test_unloaded_predict_uses_fallback() {
        let registry = unloaded_registry();
        registry.load_or_train().await.unwrap();
        assert!(!registry.is_loaded().await);

        let input = PredictionInput {
            temperature: 95.0,
            line_speed: 85.0,
            shift: "Day".to_string(),
            operator_experience: 5.0,
            machine_age: 25.0,
        };
        let output = registry.predict(&input).await.unwrap();
        assert!((output.defect_probability - 0.5).abs() < 1e-12);
        assert_eq!(output.predicted_defect, output.defect_probability >= 0.5);
        assert!(
            (output.confidence
                - output.defect_probability.max(1.0 - output.defect_probability))
            .abs()
                < 1e-12
        );
    }

    #[tokio::test]
    async fn test_unloaded_importance_placeholder() {
        let registry = unloaded_registry();
        let importances = registry.feature_importance().await;
        assert_eq!(importances.len(), 6);
        assert_eq!(importances[0].feature, "temperature");
        assert!((importances[0].importance - 0.35).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_temperature_curve_grid() {
        let registry = unloaded_registry();
        let curve = registry.temperature_curve(20, (60.0, 110.0)).await.unwrap();
        assert_eq!(curve.len(), 20);
        assert!((curve[0].temperature - 60.0).abs() < 1e-12);
        assert!((curve[19].temperature - 110.0).abs() < 1e-12);
        let step = curve[1].temperature - curve[0].temperature;
        for window in curve.windows(2) {
            assert!((window[1].temperature - window[0].temperature - step).abs() < 1e-9);
        }
    }
}
