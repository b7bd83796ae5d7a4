use crate::config::TrainerConfig;
use crate::data::{filter_outliers, ProductionDataset, NUMERIC_COLUMNS};
use crate::error::{AppError, Result};
use crate::ml::classifier::{DefectClassifier, EnsembleClassifier, LinearClassifier};
use crate::ml::models::{ModelBundle, ModelFamily};
use crate::ml::transformer::FittedTransformer;
use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::LogisticRegression;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

/// Result of a full training run over both model families
///
/// A linear-family convergence failure is recoverable: the bundle is absent
/// and a warning describes the failure, while the ensemble result is still
/// returned.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub linear: Option<ModelBundle>,
    pub ensemble: ModelBundle,
    pub warnings: Vec<String>,
}

/// Trains and evaluates defect classifiers over a raw production dataset
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline for both families
    pub fn train_and_evaluate(&self, dataset: &ProductionDataset) -> Result<TrainingOutcome> {
        let mut warnings = Vec::new();

        let linear = match self.train_family(dataset, ModelFamily::LogisticRegression) {
            Ok(bundle) => Some(bundle),
            Err(AppError::Training(message)) => {
                warn!(%message, "linear family training failed, continuing with ensemble");
                warnings.push(format!("Logistic Regression: {}", message));
                None
            }
            Err(other) => return Err(other),
        };

        let ensemble = self.train_family(dataset, ModelFamily::RandomForest)?;

        Ok(TrainingOutcome {
            linear,
            ensemble,
            warnings,
        })
    }

    /// Run the pipeline for a single family: filter, split, fit, evaluate
    pub fn train_family(
        &self,
        dataset: &ProductionDataset,
        family: ModelFamily,
    ) -> Result<ModelBundle> {
        let cleaned = filter_outliers(dataset, &NUMERIC_COLUMNS, self.config.whisker_width)?;
        info!(
            family = %family,
            raw_rows = dataset.len(),
            cleaned_rows = cleaned.len(),
            "prepared training dataset"
        );

        let labels = cleaned.labels()?;
        let (train_idx, test_idx) =
            stratified_split(&labels, self.config.test_size, self.config.seed)?;

        let train = cleaned.subset(&train_idx);
        let test = cleaned.subset(&test_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| labels[i]).collect();
        let y_test: Vec<usize> = test_idx.iter().map(|&i| labels[i]).collect();

        // Each family fits its own transformer on the training split only.
        let transformer = FittedTransformer::fit(&train)?;
        let x_train = transformer.transform(&train)?;
        let x_test = transformer.transform(&test)?;

        let classifier = match family {
            ModelFamily::LogisticRegression => self.fit_linear(&x_train, &y_train)?,
            ModelFamily::RandomForest => self.fit_ensemble(&x_train, &y_train)?,
        };

        let proba = classifier.predict_proba(&x_test);
        let scores: Vec<f64> = proba.to_vec();
        let predictions: Vec<usize> = scores.iter().map(|p| (*p >= 0.5) as usize).collect();

        let auc = roc_auc(&y_test, &scores)?;
        let report = classification_report(&y_test, &predictions);
        info!(family = %family, auc, "evaluated model on held-out split");

        Ok(ModelBundle {
            name: family.to_string(),
            family,
            transformer,
            classifier,
            auc,
            report,
        })
    }

    fn fit_linear(&self, x: &Array2<f64>, y: &[usize]) -> Result<DefectClassifier> {
        // Deterministic minority oversampling stands in for class-weight
        // rebalancing: every class contributes as many rows as the largest.
        let balanced = balanced_indices(y);
        let x_balanced = x.select(Axis(0), &balanced);
        let y_balanced = Array1::from_iter(balanced.iter().map(|&i| y[i]));

        let dataset = Dataset::new(x_balanced, y_balanced);
        let model = LogisticRegression::default()
            .alpha(self.config.l2_penalty)
            .max_iterations(self.config.max_iterations)
            .fit(&dataset)
            .map_err(|e| {
                AppError::Training(format!(
                    "solver did not converge within {} iterations: {}",
                    self.config.max_iterations, e
                ))
            })?;

        Ok(DefectClassifier::Linear(LinearClassifier::new(model)))
    }

    fn fit_ensemble(&self, x: &Array2<f64>, y: &[usize]) -> Result<DefectClassifier> {
        let n_rows = x.nrows();
        if n_rows == 0 {
            return Err(AppError::DataSufficiency(
                "no training rows left after outlier filtering".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut trees = Vec::with_capacity(self.config.n_trees);

        for _ in 0..self.config.n_trees {
            let sample: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
            let x_boot = x.select(Axis(0), &sample);
            let y_boot = Array1::from_iter(sample.iter().map(|&i| y[i]));

            let tree = DecisionTree::params()
                .split_quality(SplitQuality::Gini)
                .max_depth(Some(self.config.max_depth))
                .min_weight_split(self.config.min_samples_split as f32)
                .fit(&Dataset::new(x_boot, y_boot))
                .map_err(|e| AppError::Training(format!("tree fit failed: {}", e)))?;
            trees.push(tree);
        }

        Ok(DefectClassifier::Ensemble(EnsembleClassifier::new(
            trees,
            x.ncols(),
        )))
    }
}

/// Stratified train/test index split with a fixed seed
///
/// Preserves per-class proportions; a single-class dataset cannot be
/// stratified and is rejected.
pub fn stratified_split(
    labels: &[usize],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut classes: Vec<usize> = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();

    if classes.len() < 2 {
        return Err(AppError::DataSufficiency(
            "insufficient class diversity: stratified split needs both defect classes".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();

    for class in classes {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(&mut rng);

        let n_test = ((indices.len() as f64 * test_size).round() as usize)
            .max(1)
            .min(indices.len().saturating_sub(1));
        test_idx.extend_from_slice(&indices[..n_test]);
        train_idx.extend_from_slice(&indices[n_test..]);
    }

    train_idx.sort_unstable();
    test_idx.sort_unstable();
    Ok((train_idx, test_idx))
}

/// Indices of a class-balanced view over the labels
///
/// Minority classes are repeated cyclically until every class matches the
/// largest class count; expansion order is deterministic.
pub fn balanced_indices(labels: &[usize]) -> Vec<usize> {
    let mut by_class: Vec<(usize, Vec<usize>)> = Vec::new();
    for (i, &label) in labels.iter().enumerate() {
        match by_class.iter_mut().find(|(c, _)| *c == label) {
            Some((_, indices)) => indices.push(i),
            None => by_class.push((label, vec![i])),
        }
    }

    let target = by_class.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    let mut result: Vec<usize> = (0..labels.len()).collect();
    for (_, indices) in &by_class {
        let mut cursor = 0usize;
        for _ in indices.len()..target {
            result.push(indices[cursor % indices.len()]);
            cursor += 1;
        }
    }
    result
}

/// ROC-AUC via the rank statistic, with average ranks for tied scores
pub fn roc_auc(y_true: &[usize], scores: &[f64]) -> Result<f64> {
    let n_pos = y_true.iter().filter(|&&y| y == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(AppError::DataSufficiency(
            "ROC-AUC needs both classes in the held-out split".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let average_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = average_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(&y, _)| y == 1)
        .map(|(_, &r)| r)
        .sum();

    let auc = (positive_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0)
        / (n_pos as f64 * n_neg as f64);
    Ok(auc)
}

/// Text classification report: per-class precision/recall/F1/support plus
/// accuracy and macro averages
pub fn classification_report(y_true: &[usize], y_pred: &[usize]) -> String {
    let n_samples = y_true.len();
    let mut report = String::new();
    report.push_str(&format!(
        "{:>12} {:>10} {:>10} {:>10} {:>10}\n\n",
        "", "precision", "recall", "f1-score", "support"
    ));

    let mut macro_precision = 0.0;
    let mut macro_recall = 0.0;
    let mut macro_f1 = 0.0;

    for class in [0usize, 1] {
        let tp = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(&t, &p)| t == class && p == class)
            .count();
        let fp = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(&t, &p)| t != class && p == class)
            .count();
        let fn_count = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(&t, &p)| t == class && p != class)
            .count();

        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_count > 0 {
            tp as f64 / (tp + fn_count) as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let support = y_true.iter().filter(|&&t| t == class).count();

        macro_precision += precision / 2.0;
        macro_recall += recall / 2.0;
        macro_f1 += f1 / 2.0;

        report.push_str(&format!(
            "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
            class, precision, recall, f1, support
        ));
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    let accuracy = if n_samples > 0 {
        correct as f64 / n_samples as f64
    } else {
        0.0
    };

    report.push_str(&format!(
        "\n{:>12} {:>10} {:>10} {:>10.2} {:>10}\n",
        "accuracy", "", "", accuracy, n_samples
    ));
    report.push_str(&format!(
        "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
        "macro avg", macro_precision, macro_recall, macro_f1, n_samples
    ));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ProductionRecord;

    fn synthetic_dataset(n: usize) -> ProductionDataset {
        // Temperature drives the label; the rest is mild deterministic noise.
        let records = (0..n)
            .map(|i| {
                let temperature = 60.0 + (i as f64 / n as f64) * 40.0;
                ProductionRecord {
                    temperature: Some(temperature),
                    line_speed: Some(80.0 + (i % 10) as f64),
                    operator_experience: Some(2.0 + (i % 7) as f64),
                    machine_age: Some(10.0 + (i % 13) as f64),
                    shift: Some(if i % 2 == 0 { "Day" } else { "Night" }.to_string()),
                    defect: Some((temperature > 82.0) as u8),
                }
            })
            .collect();
        ProductionDataset::new(records)
    }

    fn small_trainer() -> Trainer {
        let mut config = TrainerConfig::default();
        config.n_trees = 25;
        Trainer::new(config)
    }

    #[test]
    fn test_stratified_split_preserves_classes() {
        let labels: Vec<usize> = (0..100).map(|i| (i % 4 == 0) as usize).collect();
        let (train, test) = stratified_split(&labels, 0.2, 42).unwrap();

        assert_eq!(train.len() + test.len(), 100);
        let test_pos = test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(test_pos, 5); // 25 positives, 20% held out
        let train_pos = train.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(train_pos, 20);
    }

    #[test]
    fn test_stratified_split_is_deterministic() {
        let labels: Vec<usize> = (0..50).map(|i| (i % 3 == 0) as usize).collect();
        let a = stratified_split(&labels, 0.2, 42).unwrap();
        let b = stratified_split(&labels, 0.2, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_class_rejected() {
        let labels = vec![0usize; 40];
        assert!(matches!(
            stratified_split(&labels, 0.2, 42),
            Err(AppError::DataSufficiency(_))
        ));
    }

    #[test]
    fn test_balanced_indices_equalize_counts() {
        let labels = vec![0, 0, 0, 0, 0, 0, 1, 1];
        let balanced = balanced_indices(&labels);
        let positives = balanced.iter().filter(|&&i| labels[i] == 1).count();
        let negatives = balanced.iter().filter(|&&i| labels[i] == 0).count();
        assert_eq!(positives, negatives);
    }

    #[test]
    fn test_roc_auc_perfect_separation() {
        let y = vec![0, 0, 1, 1];
        let scores = vec![0.1, 0.2, 0.8, 0.9];
        assert!((roc_auc(&y, &scores).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_random_scores() {
        let y = vec![0, 1, 0, 1];
        let scores = vec![0.5, 0.5, 0.5, 0.5];
        assert!((roc_auc(&y, &scores).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class_rejected() {
        let y = vec![1, 1, 1];
        let scores = vec![0.5, 0.6, 0.7];
        assert!(roc_auc(&y, &scores).is_err());
    }

    #[test]
    fn test_classification_report_contains_classes() {
        let y_true = vec![0, 0, 1, 1];
        let y_pred = vec![0, 1, 1, 1];
        let report = classification_report(&y_true, &y_pred);
        assert!(report.contains("precision"));
        assert!(report.contains("accuracy"));
        assert!(report.contains("macro avg"));
    }

    #[test]
    fn test_train_both_families() {
        let dataset = synthetic_dataset(120);
        let outcome = small_trainer().train_and_evaluate(&dataset).unwrap();

        let ensemble = &outcome.ensemble;
        assert_eq!(ensemble.family, ModelFamily::RandomForest);
        assert!(ensemble.auc > 0.8, "ensemble AUC too low: {}", ensemble.auc);
        assert!(!ensemble.report.is_empty());

        if let Some(linear) = &outcome.linear {
            assert_eq!(linear.family, ModelFamily::LogisticRegression);
            assert!(linear.auc > 0.8, "linear AUC too low: {}", linear.auc);
        } else {
            assert!(!outcome.warnings.is_empty());
        }
    }

    #[test]
    fn test_training_is_deterministic() {
        let dataset = synthetic_dataset(100);
        let trainer = small_trainer();
        let first = trainer
            .train_family(&dataset, ModelFamily::RandomForest)
            .unwrap();
        let second = trainer
            .train_family(&dataset, ModelFamily::RandomForest)
            .unwrap();
        assert!((first.auc - second.auc).abs() < 1e-12);
        assert_eq!(first.report, second.report);
    }

    #[test]
    fn test_single_class_dataset_fails_training() {
        let records = (0..30)
            .map(|i| ProductionRecord {
                temperature: Some(70.0 + i as f64 * 0.3),
                line_speed: Some(85.0),
                operator_experience: Some(5.0),
                machine_age: Some(20.0),
                shift: Some("Day".to_string()),
                defect: Some(0),
            })
            .collect();
        let dataset = ProductionDataset::new(records);
        let result = small_trainer().train_family(&dataset, ModelFamily::RandomForest);
        assert!(matches!(result, Err(AppError::DataSufficiency(_))));
    }
}
