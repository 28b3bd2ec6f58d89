use anyhow::{bail, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::tree::{midpoint, normalize, partition, TreeNode};
use super::{check_training_set, Regressor};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XgbParams {
    pub n_estimators: usize,
    /// eta
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Régularisation L2 des poids de feuille
    pub lambda: f64,
    /// Gain minimal pour accepter un split
    pub gamma: f64,
    pub min_child_weight: f64,
}

/// Boosting du second ordre, recherche de split exacte (gain = G²/(H+λ), feuilles -G/(H+λ)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XgbRegressor {
    params: XgbParams,
    base_score: Option<f64>,
    trees: Vec<TreeNode>,
    importances: Vec<f64>,
}

impl XgbRegressor {
    pub fn new(params: XgbParams) -> Self {
        Self {
            params,
            base_score: None,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }
}

impl Regressor for XgbRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_set(x, y)?;
        if self.params.lambda < 0.0 || self.params.learning_rate <= 0.0 {
            bail!("XgbRegressor: lambda >= 0 et learning_rate > 0 requis");
        }
        let n = x.nrows();
        let base_score = y.sum() / n as f64;
        let mut pred = vec![base_score; n];
        let mut grad = vec![0.0; n];
        // Perte quadratique : hessienne constante
        let hess = vec![1.0; n];
        let mut importances = vec![0.0; x.ncols()];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            for ((g, &p), &t) in grad.iter_mut().zip(&pred).zip(y.iter()) {
                *g = p - t;
            }
            let mut samples: Vec<usize> = (0..n).collect();
            let mut grower = XgbTreeGrower {
                x: x.view(),
                grad: &grad,
                hess: &hess,
                params: &self.params,
                importances: &mut importances,
            };
            let tree = grower.grow(&mut samples, 0);
            for (i, row) in x.rows().into_iter().enumerate() {
                pred[i] += tree.predict(row);
            }
            trees.push(tree);
        }

        normalize(&mut importances);
        self.base_score = Some(base_score);
        self.trees = trees;
        self.importances = importances;
        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let Some(base) = self.base_score else {
            return f64::NAN;
        };
        base + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        (!self.importances.is_empty()).then(|| Array1::from(self.importances.clone()))
    }
}

struct XgbTreeGrower<'a> {
    x: ArrayView2<'a, f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a XgbParams,
    importances: &'a mut [f64],
}

impl XgbTreeGrower<'_> {
    /// Poids de feuille déjà multiplié par eta.
    fn leaf(&self, g: f64, h: f64) -> TreeNode {
        TreeNode::Leaf {
            value: -g / (h + self.params.lambda) * self.params.learning_rate,
        }
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn grow(&mut self, samples: &mut [usize], depth: usize) -> TreeNode {
        let g: f64 = samples.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = samples.iter().map(|&i| self.hess[i]).sum();
        if depth >= self.params.max_depth || samples.len() < 2 || h + self.params.lambda <= 0.0 {
            return self.leaf(g, h);
        }

        let parent = self.score(g, h);
        let mut best: Option<(usize, f64, f64)> = None;
        let mut column: Vec<(f64, usize)> = Vec::with_capacity(samples.len());

        for f in 0..self.x.ncols() {
            column.clear();
            column.extend(samples.iter().map(|&i| (self.x[[i, f]], i)));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let (mut gl, mut hl) = (0.0, 0.0);
            for j in 0..column.len() - 1 {
                let i = column[j].1;
                gl += self.grad[i];
                hl += self.hess[i];
                if column[j].0 == column[j + 1].0 {
                    continue;
                }
                let (gr, hr) = (g - gl, h - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gain = 0.5 * (self.score(gl, hl) + self.score(gr, hr) - parent) - self.params.gamma;
                if gain > 1e-12 && best.is_none_or(|(_, _, b)| gain > b) {
                    best = Some((f, midpoint(column[j].0, column[j + 1].0), gain));
                }
            }
        }

        let Some((feature, threshold, gain)) = best else {
            return self.leaf(g, h);
        };
        let x = self.x;
        let mid = partition(samples, |i| x[[i, feature]] <= threshold);
        if mid == 0 || mid == samples.len() {
            return self.leaf(g, h);
        }
        self.importances[feature] += gain;
        let (left, right) = samples.split_at_mut(mid);
        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.grow(left, depth + 1)),
            right: Box::new(self.grow(right, depth + 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::make_regression_data;
    use ndarray::array;

    fn params(n_estimators: usize) -> XgbParams {
        XgbParams {
            n_estimators,
            learning_rate: 0.3,
            max_depth: 6,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
        }
    }

    #[test]
    fn test_xgb_fits_training_data() {
        let (x, y) = make_regression_data(60);
        let mut model = XgbRegressor::new(params(50));
        model.fit(x.view(), y.view()).unwrap();
        let mae: f64 = x
            .rows()
            .into_iter()
            .zip(y.iter())
            .map(|(row, &t)| (model.predict_row(row) - t).abs())
            .sum::<f64>()
            / 60.0;
        assert!(mae < 2.0, "mae={mae}");
    }

    #[test]
    fn test_single_stump_leaf_weights() {
        // Deux groupes : G = ±(écart à la moyenne), poids = -G/(H+λ)·eta
        let x = array![[0.0], [0.0], [1.0], [1.0]];
        let y = array![0.0, 0.0, 4.0, 4.0];
        let mut model = XgbRegressor::new(XgbParams {
            max_depth: 1,
            ..params(1)
        });
        model.fit(x.view(), y.view()).unwrap();
        // base 2, G_gauche = 4, H = 2 => -4/3 * 0.3
        let left = model.predict_row(array![0.0].view());
        assert!((left - (2.0 - 0.4)).abs() < 1e-12, "left={left}");
        let right = model.predict_row(array![1.0].view());
        assert!((right - (2.0 + 0.4)).abs() < 1e-12, "right={right}");
    }

    #[test]
    fn test_gamma_prunes_splits() {
        let (x, y) = make_regression_data(30);
        let mut model = XgbRegressor::new(XgbParams {
            gamma: 1e12,
            ..params(3)
        });
        model.fit(x.view(), y.view()).unwrap();
        assert!(model.trees.iter().all(|t| t.depth() == 0));
        assert!(model.feature_importances().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_min_child_weight_blocks_small_leaves() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![0.0, 0.0, 9.0];
        let mut model = XgbRegressor::new(XgbParams {
            min_child_weight: 2.0,
            ..params(1)
        });
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(model.trees[0].depth(), 0);
    }
}
