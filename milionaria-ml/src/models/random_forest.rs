use anyhow::{bail, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{normalize, CartBuilder, CartParams, TreeNode};
use super::{check_training_set, Regressor};

/// Forêt de régression : arbres CART complets sur échantillons bootstrap, moyenne des sorties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_estimators: usize,
    max_depth: Option<usize>,
    max_features: f64,
    min_samples_leaf: usize,
    seed: u64,
    trees: Vec<TreeNode>,
    importances: Vec<f64>,
}

impl RandomForest {
    pub fn new(
        n_estimators: usize,
        max_depth: Option<usize>,
        max_features: f64,
        min_samples_leaf: usize,
        seed: u64,
    ) -> Self {
        Self {
            n_estimators,
            max_depth,
            max_features,
            min_samples_leaf,
            seed,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_set(x, y)?;
        if self.n_estimators == 0 {
            bail!("RandomForest: n_estimators = 0");
        }
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let targets = y.to_vec();
        let params = CartParams {
            max_depth: self.max_depth,
            min_samples_split: 2,
            min_samples_leaf: self.min_samples_leaf,
            max_features: ((n_features as f64 * self.max_features).ceil() as usize)
                .clamp(1, n_features.max(1)),
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..self.n_estimators {
            // Bootstrap sampling
            let samples: Vec<usize> = (0..n_samples).map(|_| rng.random_range(0..n_samples)).collect();
            let (tree, mut tree_importances) =
                CartBuilder::new(x.view(), &targets, params).build(&samples, &mut rng);
            normalize(&mut tree_importances);
            for (acc, v) in importances.iter_mut().zip(&tree_importances) {
                *acc += v;
            }
            trees.push(tree);
        }

        normalize(&mut importances);
        self.trees = trees;
        self.importances = importances;
        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        if self.trees.is_empty() {
            return f64::NAN;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        sum / self.trees.len() as f64
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        (!self.importances.is_empty()).then(|| Array1::from(self.importances.clone()))
    }
}
