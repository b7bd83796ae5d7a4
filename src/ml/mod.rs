//! Defect-prediction pipeline: feature engineering, model training,
//! evaluation, and the serving registry

pub mod classifier;
pub mod models;
pub mod registry;
pub mod trainer;
pub mod transformer;

pub use classifier::{DefectClassifier, EnsembleClassifier, LinearClassifier};
pub use models::{
    FeatureImportance, ModelBundle, ModelFamily, PredictionInput, PredictionOutput,
    TemperatureCurvePoint, TrainOutcome,
};
pub use registry::ModelRegistry;
pub use trainer::{Trainer, TrainingOutcome};
pub use transformer::FittedTransformer;
