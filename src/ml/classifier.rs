use crate::error::{AppError, Result};
use crate::ml::models::{ModelType, TrainingDataset};
use linfa::prelude::*;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Trait for classifiers
pub trait Classifier: Send + Sync {
    /// Train the classifier
    fn fit(&mut self, dataset: &TrainingDataset) -> Result<()>;

    /// Predict class labels
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>>;

    /// Predict class probabilities; `None` when the model cannot
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Option<Array2<f64>>>;

    /// Number of classes seen at fit time
    fn n_classes(&self) -> usize;

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// Class count of a label set, never fewer than two
fn class_count(labels: &Array1<usize>) -> usize {
    labels.iter().copied().max().map_or(2, |max| (max + 1).max(2))
}

fn fit_tree(
    features: Array2<f64>,
    labels: Array1<usize>,
    max_depth: Option<usize>,
) -> Result<DecisionTree<f64, usize>> {
    let dataset = Dataset::new(features, labels);

    DecisionTree::params()
        .split_quality(SplitQuality::Gini)
        .max_depth(max_depth)
        .fit(&dataset)
        .map_err(|e| AppError::Training(format!("Failed to fit decision tree: {}", e)))
}

fn ensure_fittable(dataset: &TrainingDataset) -> Result<()> {
    if dataset.n_samples() == 0 {
        return Err(AppError::Training(
            "Cannot fit a classifier on an empty dataset".to_string(),
        ));
    }
    Ok(())
}

/// Bagged ensemble of Gini decision trees.
///
/// Tree `i` is fit on a bootstrap sample drawn from a generator seeded with
/// `seed + i`, so a forest is reproducible from its hyperparameters and data.
/// Probabilities are the fraction of trees voting for each class.
#[derive(Serialize, Deserialize)]
pub struct RandomForest {
    n_trees: usize,
    max_depth: Option<usize>,
    seed: u64,
    n_classes: usize,
    trees: Vec<DecisionTree<f64, usize>>,
}

impl RandomForest {
    pub fn new(n_trees: usize, max_depth: Option<usize>, seed: u64) -> Self {
        Self {
            n_trees: n_trees.max(1),
            max_depth,
            seed,
            n_classes: 2,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    fn votes(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(AppError::Prediction("Model not trained".to_string()));
        }

        let mut votes = Array2::<f64>::zeros((features.nrows(), self.n_classes));
        for tree in &self.trees {
            let predictions: Array1<usize> = tree.predict(features);
            for (row, &class) in predictions.iter().enumerate() {
                if class >= self.n_classes {
                    return Err(AppError::Prediction(format!(
                        "Tree voted for unknown class {}",
                        class
                    )));
                }
                votes[[row, class]] += 1.0;
            }
        }

        Ok(votes / self.trees.len() as f64)
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, dataset: &TrainingDataset) -> Result<()> {
        ensure_fittable(dataset)?;

        let n = dataset.n_samples();
        self.n_classes = class_count(&dataset.labels);

        let mut trees = Vec::with_capacity(self.n_trees);
        for i in 0..self.n_trees {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(i as u64));
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let bootstrap = dataset.select(&sample);

            trees.push(fit_tree(
                bootstrap.features,
                bootstrap.labels,
                self.max_depth,
            )?);
        }

        self.trees = trees;
        tracing::debug!(
            n_trees = self.trees.len(),
            n_classes = self.n_classes,
            n_samples = n,
            "Random forest fitted"
        );

        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.votes(features)?;

        // arg-max, ties resolved to the lowest class index
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (class, &p)| {
                        if p > best.1 {
                            (class, p)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        self.votes(features).map(Some)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }

    fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }
}

/// One decision tree over the full sample. Exposes no probabilities.
#[derive(Serialize, Deserialize)]
pub struct SingleTree {
    max_depth: Option<usize>,
    n_classes: usize,
    tree: Option<DecisionTree<f64, usize>>,
}

impl SingleTree {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self {
            max_depth,
            n_classes: 2,
            tree: None,
        }
    }
}

impl Classifier for SingleTree {
    fn fit(&mut self, dataset: &TrainingDataset) -> Result<()> {
        ensure_fittable(dataset)?;

        self.n_classes = class_count(&dataset.labels);
        self.tree = Some(fit_tree(
            dataset.features.clone(),
            dataset.labels.clone(),
            self.max_depth,
        )?);
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| AppError::Prediction("Model not trained".to_string()))?;

        let predictions: Array1<usize> = tree.predict(features);
        Ok(predictions.to_vec())
    }

    fn predict_proba(&self, _features: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        Ok(None)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn model_type(&self) -> ModelType {
        ModelType::DecisionTree
    }

    fn is_trained(&self) -> bool {
        self.tree.is_some()
    }
}

/// Serializable choice of classifier family
#[derive(Serialize, Deserialize)]
pub enum ClassifierModel {
    RandomForest(RandomForest),
    DecisionTree(SingleTree),
}

impl ClassifierModel {
    /// Create an untrained classifier of the given family
    pub fn new(model_type: ModelType, n_trees: usize, max_depth: Option<usize>, seed: u64) -> Self {
        match model_type {
            ModelType::RandomForest => {
                ClassifierModel::RandomForest(RandomForest::new(n_trees, max_depth, seed))
            }
            ModelType::DecisionTree => ClassifierModel::DecisionTree(SingleTree::new(max_depth)),
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ClassifierModel::RandomForest(model) => model,
            ClassifierModel::DecisionTree(model) => model,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            ClassifierModel::RandomForest(model) => model,
            ClassifierModel::DecisionTree(model) => model,
        }
    }
}

impl Classifier for ClassifierModel {
    fn fit(&mut self, dataset: &TrainingDataset) -> Result<()> {
        self.inner_mut().fit(dataset)
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        self.inner().predict(features)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        self.inner().predict_proba(features)
    }

    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn model_type(&self) -> ModelType {
        self.inner().model_type()
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }
}
