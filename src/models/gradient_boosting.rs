//! Градиентный бустинг над регрессионными деревьями

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{merge_params, validate_training_data, FittedModel, ModelKind, ModelStrategy, ParamOverrides};
use crate::error::{ConfigError, ValidationError};
use crate::preprocessing::DataNormalizer;

/// Параметры бустинга
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Доля строк для каждого дерева
    pub subsample: f64,
    /// L2-регуляризация значений в листьях
    pub reg_lambda: f64,
    pub random_state: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.1,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            reg_lambda: 1.0,
            random_state: 42,
        }
    }
}

impl BoostingParams {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::InvalidParams(reason.to_string()));
        if self.n_estimators == 0 {
            return invalid("n_estimators must be positive");
        }
        if self.max_depth == 0 {
            return invalid("max_depth must be positive");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return invalid("learning_rate must be in (0, 1]");
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return invalid("subsample must be in (0, 1]");
        }
        if self.min_samples_leaf == 0 {
            return invalid("min_samples_leaf must be positive");
        }
        if !(self.reg_lambda >= 0.0) {
            return invalid("reg_lambda must be non-negative");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Регрессионное дерево на остатках
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
}

struct TreeBuilder<'a> {
    X: &'a Array2<f64>,
    residuals: &'a Array1<f64>,
    params: &'a BoostingParams,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeBuilder<'_> {
    fn leaf_value(&self, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        let sum: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        sum / (indices.len() as f64 + self.params.reg_lambda)
    }

    fn score(&self, sum: f64, count: usize) -> f64 {
        sum * sum / (count as f64 + self.params.reg_lambda)
    }

    fn build(&self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let min_leaf = self.params.min_samples_leaf;
        if depth >= self.params.max_depth
            || indices.len() < self.params.min_samples_split
            || indices.len() < 2 * min_leaf
        {
            return TreeNode::Leaf {
                value: self.leaf_value(&indices),
            };
        }

        let Some(best) = self.find_split(&indices) else {
            return TreeNode::Leaf {
                value: self.leaf_value(&indices),
            };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.X[[i, best.feature]] < best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    /// Перебор всех порогов между соседними различными значениями
    fn find_split(&self, indices: &[usize]) -> Option<BestSplit> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;
        let total: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        let parent_score = self.score(total, n);

        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..self.X.ncols() {
            sorted.sort_by(|&a, &b| self.X[[a, feature]].total_cmp(&self.X[[b, feature]]));

            let mut left_sum = 0.0;
            for k in 1..n {
                left_sum += self.residuals[sorted[k - 1]];
                if k < min_leaf || n - k < min_leaf {
                    continue;
                }

                let lo = self.X[[sorted[k - 1], feature]];
                let hi = self.X[[sorted[k], feature]];
                if hi <= lo {
                    continue;
                }

                let gain = self.score(left_sum, k) + self.score(total - left_sum, n - k) - parent_score;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

impl RegressionTree {
    fn fit(X: &Array2<f64>, residuals: &Array1<f64>, indices: Vec<usize>, params: &BoostingParams) -> Self {
        let builder = TreeBuilder { X, residuals, params };
        Self {
            root: builder.build(indices, 0),
        }
    }

    fn predict_row(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] < *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

/// Обученный ансамбль вместе со своим шагом масштабирования
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedBoostedTrees {
    params: BoostingParams,
    scaler: DataNormalizer,
    n_features: usize,
    initial_prediction: f64,
    trees: Vec<RegressionTree>,
}

impl FittedBoostedTrees {
    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(RegressionTree::depth).max().unwrap_or(0)
    }

    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>, ValidationError> {
        let X_scaled = self.scaler.transform(X)?;
        let predictions = X_scaled
            .rows()
            .into_iter()
            .map(|row| {
                self.initial_prediction
                    + self
                        .trees
                        .iter()
                        .map(|tree| self.params.learning_rate * tree.predict_row(row))
                        .sum::<f64>()
            })
            .collect();
        Ok(predictions)
    }
}

/// Стратегия: стандартизация + градиентный бустинг
#[derive(Debug, Clone)]
pub struct GradientBoostedTreeStrategy {
    params: BoostingParams,
}

impl GradientBoostedTreeStrategy {
    pub fn new(overrides: Option<&ParamOverrides>) -> Result<Self, ConfigError> {
        let params: BoostingParams = merge_params(BoostingParams::default(), overrides)?;
        params.validate()?;
        tracing::info!(?params, "Initialized GradientBoostedTreeStrategy");
        Ok(Self { params })
    }

    fn boost(&self, X: &Array2<f64>, y: &Array1<f64>) -> (f64, Vec<RegressionTree>) {
        let n = X.nrows();
        let initial = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n, initial);
        let mut rng = StdRng::seed_from_u64(self.params.random_state);
        let sample_size = ((n as f64) * self.params.subsample).ceil().max(1.0) as usize;

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        for _ in 0..self.params.n_estimators {
            let residuals = y - &predictions;

            let mut rows: Vec<usize> = (0..n).collect();
            if sample_size < n {
                rows.shuffle(&mut rng);
                rows.truncate(sample_size);
                rows.sort_unstable();
            }

            let tree = RegressionTree::fit(X, &residuals, rows, &self.params);
            for (i, row) in X.rows().into_iter().enumerate() {
                predictions[i] += self.params.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        (initial, trees)
    }
}

impl ModelStrategy for GradientBoostedTreeStrategy {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoostedTree
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_default()
    }

    fn build_and_train(&self, X: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel, ValidationError> {
        validate_training_data(X, y)?;

        tracing::info!("Training gradient boosted trees");
        let mut scaler = DataNormalizer::new();
        let X_scaled = scaler.fit_transform(X)?;
        let (initial_prediction, trees) = self.boost(&X_scaled, y);

        let fitted = FittedBoostedTrees {
            params: self.params.clone(),
            scaler,
            n_features: X.ncols(),
            initial_prediction,
            trees,
        };
        tracing::info!(
            trees = fitted.n_trees(),
            max_depth = fitted.max_tree_depth(),
            "Model training completed"
        );
        Ok(FittedModel::GradientBoostedTree(fitted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn overrides(value: serde_json::Value) -> ParamOverrides {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_params_merge_over_defaults() {
        let strategy = GradientBoostedTreeStrategy::new(Some(&overrides(
            serde_json::json!({ "n_estimators": 10, "max_depth": 3 }),
        )))
        .unwrap();
        assert_eq!(strategy.params.n_estimators, 10);
        assert_eq!(strategy.params.max_depth, 3);
        assert_eq!(strategy.params.learning_rate, 0.1);
        assert_eq!(strategy.params.random_state, 42);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let unknown = GradientBoostedTreeStrategy::new(Some(&overrides(serde_json::json!({ "eta": 0.3 }))));
        assert!(matches!(unknown, Err(ConfigError::InvalidParams(_))));

        let out_of_range =
            GradientBoostedTreeStrategy::new(Some(&overrides(serde_json::json!({ "learning_rate": 0.0 }))));
        assert!(matches!(out_of_range, Err(ConfigError::InvalidParams(_))));
    }

    #[test]
    fn test_fits_step_function() {
        let X = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![10.0, 10.0, 10.0, 20.0, 20.0, 20.0];
        let strategy = GradientBoostedTreeStrategy::new(None).unwrap();
        let model = strategy.build_and_train(&X, &y).unwrap();

        let predictions = model.predict(&X).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 0.5, "prediction {p} too far from {t}");
        }
    }

    #[test]
    fn test_training_is_reproducible() {
        let X = array![[1.0, 5.0], [2.0, 3.0], [3.0, 8.0], [4.0, 1.0], [5.0, 2.0]];
        let y = array![1.0, 2.0, 1.5, 3.0, 2.5];
        let strategy = GradientBoostedTreeStrategy::new(Some(&overrides(
            serde_json::json!({ "subsample": 0.6, "n_estimators": 20 }),
        )))
        .unwrap();

        let first = strategy.build_and_train(&X, &y).unwrap();
        let second = strategy.build_and_train(&X, &y).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_depth_is_bounded() {
        let X = Array2::from_shape_fn((40, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y = Array1::from_shape_fn(40, |i| (i % 5) as f64);
        let strategy = GradientBoostedTreeStrategy::new(Some(&overrides(
            serde_json::json!({ "max_depth": 2, "n_estimators": 5 }),
        )))
        .unwrap();

        match strategy.build_and_train(&X, &y).unwrap() {
            FittedModel::GradientBoostedTree(fitted) => {
                assert_eq!(fitted.n_trees(), 5);
                assert!(fitted.max_tree_depth() <= 2);
            }
            other => panic!("unexpected model: {:?}", other.kind()),
        }
    }
}
