use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// Arbre de régression binaire : `row[feature] <= threshold` part à gauche.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
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

impl TreeNode {
    pub fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Paramètres d'un arbre CART (critère : réduction de la somme des carrés).
#[derive(Debug, Clone, Copy)]
pub struct CartParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Nombre de features tirées à chaque nœud (toutes si >= n_features).
    pub max_features: usize,
}

/// Construit un arbre CART sur les lignes `samples` de `x` (doublons autorisés, cas du bootstrap).
/// `importances[f]` accumule la réduction de SSE obtenue par les splits sur f.
pub struct CartBuilder<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [f64],
    params: CartParams,
    importances: Vec<f64>,
}

impl<'a> CartBuilder<'a> {
    pub fn new(x: ArrayView2<'a, f64>, y: &'a [f64], params: CartParams) -> Self {
        Self {
            importances: vec![0.0; x.ncols()],
            x,
            y,
            params,
        }
    }

    pub fn build(mut self, samples: &[usize], rng: &mut StdRng) -> (TreeNode, Vec<f64>) {
        let mut samples = samples.to_vec();
        let root = self.grow(&mut samples, 0, rng);
        (root, self.importances)
    }

    fn grow(&mut self, samples: &mut [usize], depth: usize, rng: &mut StdRng) -> TreeNode {
        let n = samples.len();
        let sum: f64 = samples.iter().map(|&i| self.y[i]).sum();
        let leaf = TreeNode::Leaf {
            value: if n > 0 { sum / n as f64 } else { 0.0 },
        };

        if n < self.params.min_samples_split.max(2)
            || self.params.max_depth.is_some_and(|d| depth >= d)
        {
            return leaf;
        }
        let first = self.y[samples[0]];
        if samples.iter().all(|&i| (self.y[i] - first).abs() < 1e-12) {
            return leaf;
        }

        let Some(split) = self.best_split(samples, sum, rng) else {
            return leaf;
        };
        self.importances[split.feature] += split.gain;

        let x = self.x;
        let mid = partition(samples, |i| x[[i, split.feature]] <= split.threshold);
        if mid == 0 || mid == n {
            return leaf;
        }
        let (left, right) = samples.split_at_mut(mid);
        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.grow(left, depth + 1, rng)),
            right: Box::new(self.grow(right, depth + 1, rng)),
        }
    }

    fn best_split(&self, samples: &[usize], total: f64, rng: &mut StdRng) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let features: Vec<usize> = if self.params.max_features >= n_features {
            (0..n_features).collect()
        } else {
            index::sample(rng, n_features, self.params.max_features.max(1)).into_vec()
        };

        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent_score = total * total / n as f64;
        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, f64)> = Vec::with_capacity(n);

        for f in features {
            column.clear();
            column.extend(samples.iter().map(|&i| (self.x[[i, f]], self.y[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for j in 0..n - 1 {
                left_sum += column[j].1;
                let n_left = j + 1;
                if column[j].0 == column[j + 1].0 || n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }
                let right_sum = total - left_sum;
                let score = left_sum * left_sum / n_left as f64
                    + right_sum * right_sum / (n - n_left) as f64;
                let gain = score - parent_score;
                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature: f,
                        threshold: midpoint(column[j].0, column[j + 1].0),
                        gain,
                    });
                }
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Milieu de deux valeurs consécutives ; retombe sur `lo` si l'arrondi atteint `hi`.
pub fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi {
        lo
    } else {
        mid
    }
}

/// Réordonne `items` pour que ceux vérifiant `pred` soient en tête ; retourne leur nombre.
pub fn partition(items: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for j in 0..items.len() {
        if pred(items[j]) {
            items.swap(mid, j);
            mid += 1;
        }
    }
    mid
}

/// Normalise des importances brutes pour qu'elles somment à 1 (zéros si aucun split).
pub fn normalize(importances: &mut [f64]) {
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        for v in importances.iter_mut() {
            *v /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::SeedableRng;

    fn params(max_depth: Option<usize>) -> CartParams {
        CartParams {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }

    #[test]
    fn test_step_function_fits_exactly() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [5.0, 5.0, 5.0, 20.0, 20.0, 20.0];
        let mut rng = StdRng::seed_from_u64(0);
        let (tree, imp) = CartBuilder::new(x.view(), &y, params(None)).build(&[0, 1, 2, 3, 4, 5], &mut rng);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(array![2.5].view()), 5.0);
        assert_eq!(tree.predict(array![100.0].view()), 20.0);
        assert!(imp[0] > 0.0);
    }

    #[test]
    fn test_max_depth_respected() {
        let x = Array2::from_shape_fn((64, 2), |(i, j)| (i * (j + 1)) as f64);
        let y: Vec<f64> = (0..64).map(|i| ((i * 7) % 13) as f64).collect();
        let samples: Vec<usize> = (0..64).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let (tree, _) = CartBuilder::new(x.view(), &y, params(Some(3))).build(&samples, &mut rng);
        assert!(tree.depth() <= 3);
        assert!(tree.n_leaves() <= 8);
    }

    #[test]
    fn test_constant_target_is_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = [4.0, 4.0, 4.0];
        let mut rng = StdRng::seed_from_u64(2);
        let (tree, imp) = CartBuilder::new(x.view(), &y, params(None)).build(&[0, 1, 2], &mut rng);
        assert_eq!(tree, TreeNode::Leaf { value: 4.0 });
        assert_eq!(imp, vec![0.0]);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = [0.0, 10.0, 10.0, 10.0];
        let mut rng = StdRng::seed_from_u64(3);
        let p = CartParams {
            min_samples_leaf: 2,
            ..params(None)
        };
        let (tree, _) = CartBuilder::new(x.view(), &y, p).build(&[0, 1, 2, 3], &mut rng);
        if let TreeNode::Split { threshold, .. } = tree {
            assert_eq!(threshold, 2.5);
        } else {
            panic!("expected a split");
        }
    }

    #[test]
    fn test_partition_and_normalize() {
        let mut items = vec![5, 1, 4, 2, 3];
        let mid = partition(&mut items, |i| i <= 2);
        assert_eq!(mid, 2);
        assert!(items[..2].iter().all(|&i| i <= 2));

        let mut imp = vec![1.0, 3.0];
        normalize(&mut imp);
        assert_eq!(imp, vec![0.25, 0.75]);
        let mut zeros = vec![0.0, 0.0];
        normalize(&mut zeros);
        assert_eq!(zeros, vec![0.0, 0.0]);
    }
}
