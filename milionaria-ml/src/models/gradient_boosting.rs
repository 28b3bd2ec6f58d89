use anyhow::{bail, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tree::{normalize, CartBuilder, CartParams, TreeNode};
use super::{check_training_set, Regressor};

/// Boosting de gradient (perte quadratique) : chaque arbre peu profond ajuste les résidus courants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    seed: u64,
    init: Option<f64>,
    trees: Vec<TreeNode>,
    importances: Vec<f64>,
}

impl GradientBoosting {
    pub fn new(n_estimators: usize, learning_rate: f64, max_depth: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth,
            seed,
            init: None,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_set(x, y)?;
        if self.learning_rate <= 0.0 {
            bail!("GradientBoosting: learning_rate doit être > 0");
        }
        let n = x.nrows();
        let samples: Vec<usize> = (0..n).collect();
        let params = CartParams {
            max_depth: Some(self.max_depth),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        };

        let init = y.sum() / n as f64;
        let mut current = vec![init; n];
        let mut residuals = vec![0.0; n];
        let mut importances = vec![0.0; x.ncols()];
        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut rng = StdRng::seed_from_u64(self.seed);

        for _ in 0..self.n_estimators {
            for ((r, &target), &fitted) in residuals.iter_mut().zip(y.iter()).zip(&current) {
                *r = target - fitted;
            }
            let (tree, tree_importances) =
                CartBuilder::new(x.view(), &residuals, params).build(&samples, &mut rng);
            for (acc, v) in importances.iter_mut().zip(&tree_importances) {
                *acc += v;
            }
            for (i, row) in x.rows().into_iter().enumerate() {
                current[i] += self.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        normalize(&mut importances);
        self.init = Some(init);
        self.trees = trees;
        self.importances = importances;
        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let Some(init) = self.init else {
            return f64::NAN;
        };
        let boost: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        init + self.learning_rate * boost
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        (!self.importances.is_empty()).then(|| Array1::from(self.importances.clone()))
    }
}
