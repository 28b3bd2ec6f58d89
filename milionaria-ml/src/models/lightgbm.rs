use anyhow::{bail, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::tree::{midpoint, normalize, partition, TreeNode};
use super::{check_training_set, Regressor};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LgbmParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    pub min_data_in_leaf: usize,
    pub max_bin: usize,
    pub lambda: f64,
}

/// Boosting par histogrammes, croissance feuille par feuille (la feuille au meilleur gain est
/// découpée en premier, jusqu'à `num_leaves`). Importance = nombre de splits par feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LgbmRegressor {
    params: LgbmParams,
    init: Option<f64>,
    trees: Vec<TreeNode>,
    split_counts: Vec<f64>,
}

impl LgbmRegressor {
    pub fn new(params: LgbmParams) -> Self {
        Self {
            params,
            init: None,
            trees: Vec::new(),
            split_counts: Vec::new(),
        }
    }
}

impl Regressor for LgbmRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_set(x, y)?;
        if self.params.num_leaves < 2 || self.params.max_bin < 2 {
            bail!("LgbmRegressor: num_leaves et max_bin doivent être >= 2");
        }
        let n = x.nrows();
        let bins = BinnedDataset::new(x, self.params.max_bin);
        let init = y.sum() / n as f64;
        let mut pred = vec![init; n];
        let mut grad = vec![0.0; n];
        let hess = vec![1.0; n];
        let mut split_counts = vec![0.0; x.ncols()];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            for ((g, &p), &t) in grad.iter_mut().zip(&pred).zip(y.iter()) {
                *g = p - t;
            }
            let tree = LeafWiseGrower {
                bins: &bins,
                grad: &grad,
                hess: &hess,
                params: &self.params,
            }
            .grow(&mut split_counts);
            for (i, row) in x.rows().into_iter().enumerate() {
                pred[i] += tree.predict(row);
            }
            trees.push(tree);
        }

        normalize(&mut split_counts);
        self.init = Some(init);
        self.trees = trees;
        self.split_counts = split_counts;
        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let Some(init) = self.init else {
            return f64::NAN;
        };
        init + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        (!self.split_counts.is_empty()).then(|| Array1::from(self.split_counts.clone()))
    }
}

/// Features discrétisées : `bins[f][i]` est l'indice de bin de la ligne i,
/// `upper[f][b]` la borne haute (incluse) du bin b.
struct BinnedDataset {
    bins: Vec<Vec<u16>>,
    upper: Vec<Vec<f64>>,
}

impl BinnedDataset {
    fn new(x: ArrayView2<f64>, max_bin: usize) -> Self {
        let max_bin = max_bin.min(u16::MAX as usize);
        let mut bins = Vec::with_capacity(x.ncols());
        let mut upper = Vec::with_capacity(x.ncols());
        for column in x.columns() {
            let bounds = bin_bounds(column, max_bin);
            bins.push(
                column
                    .iter()
                    .map(|&v| bounds.partition_point(|&b| b < v) as u16)
                    .collect(),
            );
            upper.push(bounds);
        }
        Self { bins, upper }
    }

    fn n_bins(&self, feature: usize) -> usize {
        self.upper[feature].len() + 1
    }
}

/// Bornes entre valeurs distinctes, réduites par quantiles au-delà de `max_bin` bins.
fn bin_bounds(column: ArrayView1<f64>, max_bin: usize) -> Vec<f64> {
    let mut distinct: Vec<f64> = column.to_vec();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup();
    if distinct.len() <= 1 {
        return Vec::new();
    }
    if distinct.len() <= max_bin {
        return distinct.windows(2).map(|w| midpoint(w[0], w[1])).collect();
    }
    let mut bounds: Vec<f64> = (1..max_bin)
        .map(|k| {
            let idx = k * distinct.len() / max_bin;
            midpoint(distinct[idx - 1], distinct[idx])
        })
        .collect();
    bounds.dedup();
    bounds
}

#[derive(Debug, Clone, Copy)]
struct BinSplit {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct Leaf {
    node: usize,
    samples: Vec<usize>,
    best: Option<BinSplit>,
}

enum ArenaNode {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct LeafWiseGrower<'a> {
    bins: &'a BinnedDataset,
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a LgbmParams,
}

impl LeafWiseGrower<'_> {
    fn grow(&self, split_counts: &mut [f64]) -> TreeNode {
        let all: Vec<usize> = (0..self.grad.len()).collect();
        let mut arena = vec![ArenaNode::Leaf(0.0)];
        let mut leaves = vec![Leaf {
            node: 0,
            best: self.best_split(&all),
            samples: all,
        }];

        while leaves.len() < self.params.num_leaves {
            let candidate = leaves
                .iter()
                .enumerate()
                .filter_map(|(k, leaf)| leaf.best.map(|s| (k, s)))
                .max_by(|a, b| a.1.gain.total_cmp(&b.1.gain));
            let Some((k, split)) = candidate else {
                break;
            };

            let mut leaf = leaves.swap_remove(k);
            let column = &self.bins.bins[split.feature];
            let mid = partition(&mut leaf.samples, |i| column[i] as usize <= split.bin);
            let right_samples = leaf.samples.split_off(mid);
            let left_samples = leaf.samples;

            let (left, right) = (arena.len(), arena.len() + 1);
            arena.push(ArenaNode::Leaf(0.0));
            arena.push(ArenaNode::Leaf(0.0));
            arena[leaf.node] = ArenaNode::Split {
                feature: split.feature,
                threshold: self.bins.upper[split.feature][split.bin],
                left,
                right,
            };
            split_counts[split.feature] += 1.0;

            leaves.push(Leaf {
                node: left,
                best: self.best_split(&left_samples),
                samples: left_samples,
            });
            leaves.push(Leaf {
                node: right,
                best: self.best_split(&right_samples),
                samples: right_samples,
            });
        }

        for leaf in &leaves {
            let (g, h) = self.sums(&leaf.samples);
            arena[leaf.node] = ArenaNode::Leaf(-g / (h + self.params.lambda) * self.params.learning_rate);
        }
        to_tree(&arena, 0)
    }

    fn sums(&self, samples: &[usize]) -> (f64, f64) {
        samples
            .iter()
            .fold((0.0, 0.0), |(g, h), &i| (g + self.grad[i], h + self.hess[i]))
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn best_split(&self, samples: &[usize]) -> Option<BinSplit> {
        let min_data = self.params.min_data_in_leaf.max(1);
        if samples.len() < 2 * min_data {
            return None;
        }
        let (g, h) = self.sums(samples);
        let parent = self.score(g, h);
        let mut best: Option<BinSplit> = None;

        for feature in 0..self.bins.bins.len() {
            let n_bins = self.bins.n_bins(feature);
            if n_bins < 2 {
                continue;
            }
            let column = &self.bins.bins[feature];
            let mut hist = vec![(0.0f64, 0.0f64, 0usize); n_bins];
            for &i in samples {
                let slot = &mut hist[column[i] as usize];
                slot.0 += self.grad[i];
                slot.1 += self.hess[i];
                slot.2 += 1;
            }

            let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
            for (bin, &(bg, bh, bn)) in hist.iter().enumerate().take(n_bins - 1) {
                gl += bg;
                hl += bh;
                nl += bn;
                let nr = samples.len() - nl;
                if bn == 0 || nl < min_data || nr < min_data {
                    continue;
                }
                let gain = self.score(gl, hl) + self.score(g - gl, h - hl) - parent;
                if gain > 1e-12 && best.is_none_or(|b| gain > b.gain) {
                    best = Some(BinSplit { feature, bin, gain });
                }
            }
        }
        best
    }
}

fn to_tree(arena: &[ArenaNode], node: usize) -> TreeNode {
    match arena[node] {
        ArenaNode::Leaf(value) => TreeNode::Leaf { value },
        ArenaNode::Split {
            feature,
            threshold,
            left,
            right,
        } => TreeNode::Split {
            feature,
            threshold,
            left: Box::new(to_tree(arena, left)),
            right: Box::new(to_tree(arena, right)),
        },
    }
}
