use crate::data::ProductionRecord;
use crate::ml::classifier::DefectClassifier;
use crate::ml::transformer::FittedTransformer;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Model family enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// L2-regularized logistic regression with class rebalancing
    LogisticRegression,

    /// Bootstrap-aggregated decision trees
    RandomForest,
}

impl ModelFamily {
    /// File stem for the persisted bundle of this family
    pub fn artifact_stem(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "logistic_regression",
            ModelFamily::RandomForest => "random_forest",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFamily::LogisticRegression => write!(f, "Logistic Regression"),
            ModelFamily::RandomForest => write!(f, "Random Forest"),
        }
    }
}

/// A trained model with everything needed to serve it
///
/// Pairs the fitted transformer with the fitted classifier and the held-out
/// evaluation results. Created once per training run and superseded, never
/// mutated, by the next run.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelBundle {
    /// Human-readable family name
    pub name: String,

    /// Model family
    pub family: ModelFamily,

    /// Transformer fit on this bundle's training split
    pub transformer: FittedTransformer,

    /// Fitted classifier
    pub classifier: DefectClassifier,

    /// ROC-AUC on the held-out split
    pub auc: f64,

    /// Precision/recall/F1 report on the held-out split
    pub report: String,
}

/// Single prediction request body
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PredictionInput {
    pub temperature: f64,
    pub line_speed: f64,
    #[validate(length(min = 1))]
    pub shift: String,
    pub operator_experience: f64,
    pub machine_age: f64,
}

impl PredictionInput {
    /// View the request as an unlabeled production record
    pub fn to_record(&self) -> ProductionRecord {
        ProductionRecord {
            temperature: Some(self.temperature),
            line_speed: Some(self.line_speed),
            operator_experience: Some(self.operator_experience),
            machine_age: Some(self.machine_age),
            shift: Some(self.shift.clone()),
            defect: None,
        }
    }
}

/// Single prediction response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionOutput {
    pub defect_probability: f64,
    pub predicted_defect: bool,
    pub confidence: f64,
}

impl PredictionOutput {
    /// Derive the decision and confidence from a positive-class probability
    pub fn from_probability(probability: f64) -> Self {
        Self {
            defect_probability: probability,
            predicted_defect: probability >= 0.5,
            confidence: probability.max(1.0 - probability),
        }
    }
}

/// One feature-importance entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// One point of the synthetic temperature sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureCurvePoint {
    pub temperature: f64,
    pub defect_probability: f64,
}

/// Result of a service-triggered training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub model_path: String,
    pub auc_score: f64,
    pub classification_report: String,
}
