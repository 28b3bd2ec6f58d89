pub mod compute;

use milionaria_data::models::NUMBERS_PER_DRAW;
use milionaria_data::{DrawTable, Pool};
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::config::FeatureConfig;

pub const CALENDAR_FEATURES: [&str; 3] = ["month", "day_of_week", "days_since_start"];

/// Matrice de features : une ligne par tirage, cible = les numéros de ce même tirage.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    /// [n_rows, n_features]
    pub x: Array2<f64>,
    /// [n_rows, NUMBERS_PER_DRAW]
    pub y: Array2<f64>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Lignes sans aucune valeur NaN, dans l'ordre d'origine.
    pub fn usable_rows(&self) -> FeatureMatrix {
        let keep: Vec<usize> = self
            .x
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
            .map(|(i, _)| i)
            .collect();
        FeatureMatrix {
            names: self.names.clone(),
            x: self.x.select(Axis(0), &keep),
            y: self.y.select(Axis(0), &keep),
        }
    }

    /// Le vecteur de features du tirage le plus récent.
    pub fn last_row(&self) -> Option<ArrayView1<'_, f64>> {
        let n = self.x.nrows();
        (n > 0).then(|| self.x.row(n - 1))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Noms de colonnes, dans l'ordre exact de `build`.
    pub fn feature_names(&self, has_dates: bool) -> Vec<String> {
        let mut names = Vec::new();
        for &w in &self.config.number_windows {
            for v in 1..=Pool::Numbers.size() {
                names.push(format!("freq_num_{v}_last_{w}"));
            }
        }
        for &w in &self.config.clover_windows {
            for c in 1..=Pool::Clovers.size() {
                names.push(format!("freq_trevo_{c}_last_{w}"));
            }
        }
        if has_dates {
            names.extend(CALENDAR_FEATURES.iter().map(|s| s.to_string()));
        }
        for &lag in &self.config.sum_lags {
            names.push(format!("sum_lag_{lag}"));
        }
        names
    }

    /// Construit la matrice complète. Déterministe : même table => même matrice, bit à bit.
    pub fn build(&self, table: &DrawTable) -> FeatureMatrix {
        let names = self.feature_names(table.has_dates());
        let n = table.len();
        let mut x = Array2::<f64>::zeros((n, names.len()));
        let mut col = 0;

        for (pool, windows) in [
            (Pool::Numbers, &self.config.number_windows),
            (Pool::Clovers, &self.config.clover_windows),
        ] {
            let prefix = compute::prefix_counts(table.draws(), pool);
            for &w in windows {
                for i in 0..n {
                    let freq = compute::window_frequencies(&prefix, i, w);
                    for (k, f) in freq.into_iter().enumerate() {
                        x[[i, col + k]] = f;
                    }
                }
                col += pool.size();
            }
        }

        if table.has_dates() {
            for (i, cal) in compute::calendar_features(table).into_iter().enumerate() {
                for (k, v) in cal.into_iter().enumerate() {
                    x[[i, col + k]] = v;
                }
            }
            col += CALENDAR_FEATURES.len();
        }

        for &lag in &self.config.sum_lags {
            x.column_mut(col)
                .assign(&Array1::from(compute::lagged_sums(table, lag)));
            col += 1;
        }
        debug_assert_eq!(col, names.len());

        let y = Array2::from_shape_fn((n, NUMBERS_PER_DRAW), |(i, slot)| {
            table.draws()[i].numbers[slot] as f64
        });

        FeatureMatrix { names, x, y }
    }
}
