use crate::ml::models::ModelFamily;
use linfa::traits::Predict;
use linfa_logistic::FittedLogisticRegression;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Fitted defect classifier, tagged by family
///
/// The variant decides how probabilities and feature importances are
/// extracted; callers select on the tag instead of probing attributes.
#[derive(Debug, Serialize, Deserialize)]
pub enum DefectClassifier {
    Linear(LinearClassifier),
    Ensemble(EnsembleClassifier),
}

impl DefectClassifier {
    pub fn family(&self) -> ModelFamily {
        match self {
            DefectClassifier::Linear(_) => ModelFamily::LogisticRegression,
            DefectClassifier::Ensemble(_) => ModelFamily::RandomForest,
        }
    }

    /// Positive-class probability for each row of the feature matrix
    pub fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        match self {
            DefectClassifier::Linear(model) => model.predict_proba(features),
            DefectClassifier::Ensemble(model) => model.predict_proba(features),
        }
    }

    /// Whether this family exposes per-feature importances
    pub fn has_importances(&self) -> bool {
        match self {
            DefectClassifier::Linear(_) => true,
            DefectClassifier::Ensemble(_) => true,
        }
    }

    /// Per-input-feature importance scores, in transformer column order
    ///
    /// Linear: absolute coefficient magnitudes. Ensemble: impurity-reduction
    /// contributions averaged over the forest and normalized to sum to one.
    /// `None` means importances are unavailable for this model; callers must
    /// handle that case explicitly.
    pub fn importances(&self) -> Option<Vec<f64>> {
        match self {
            DefectClassifier::Linear(model) => Some(model.coefficient_magnitudes()),
            DefectClassifier::Ensemble(model) => model.mean_impurity_importances(),
        }
    }
}

/// L2-regularized logistic regression (linear family)
#[derive(Debug, Serialize, Deserialize)]
pub struct LinearClassifier {
    model: FittedLogisticRegression<f64, usize>,
}

impl LinearClassifier {
    pub fn new(model: FittedLogisticRegression<f64, usize>) -> Self {
        Self { model }
    }

    pub fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        self.model.predict_probabilities(features)
    }

    fn coefficient_magnitudes(&self) -> Vec<f64> {
        self.model.params().iter().map(|w| w.abs()).collect()
    }
}

/// Bootstrap-aggregated decision trees (ensemble family)
#[derive(Debug, Serialize, Deserialize)]
pub struct EnsembleClassifier {
    trees: Vec<DecisionTree<f64, usize>>,
    n_features: usize,
}

impl EnsembleClassifier {
    pub fn new(trees: Vec<DecisionTree<f64, usize>>, n_features: usize) -> Self {
        Self { trees, n_features }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fraction of trees voting for the positive class, per row
    pub fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        let mut votes = Array1::<f64>::zeros(features.nrows());
        for tree in &self.trees {
            let predictions = tree.predict(features);
            for (vote, label) in votes.iter_mut().zip(predictions.iter()) {
                *vote += *label as f64;
            }
        }
        votes.mapv_into(|v| v / self.trees.len() as f64)
    }

    /// Impurity-reduction importance averaged over the forest
    ///
    /// Normalized to sum to one; `None` when the forest is degenerate (no
    /// split contributed any impurity reduction).
    fn mean_impurity_importances(&self) -> Option<Vec<f64>> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (total, importance) in totals.iter_mut().zip(tree.feature_importance()) {
                *total += importance;
            }
        }

        let sum: f64 = totals.iter().sum();
        if sum <= 0.0 {
            return None;
        }
        Some(totals.into_iter().map(|t| t / sum).collect())
    }
}
