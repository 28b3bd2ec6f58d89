use std::collections::BTreeMap;

use log::{debug, info, warn};
use milionaria_data::models::NUMBERS_PER_DRAW;
use milionaria_data::DrawTable;
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::TrainerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::features::{FeatureBuilder, FeatureMatrix};
use crate::models::{ModelFamily, Regressor, SlotModel};
use crate::scaler::StandardScaler;

/// Erreurs held-out, agrégées sur tous les slots et tous les échantillons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FamilyMetrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
}

impl FamilyMetrics {
    pub fn from_errors(errors: &[f64]) -> Self {
        if errors.is_empty() {
            return Self {
                mae: f64::NAN,
                mse: f64::NAN,
                rmse: f64::NAN,
            };
        }
        let n = errors.len() as f64;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        Self {
            mae,
            mse,
            rmse: mse.sqrt(),
        }
    }
}

/// Les six régresseurs d'une famille, un par position de numéro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelSet {
    pub family: ModelFamily,
    pub slots: [SlotModel; NUMBERS_PER_DRAW],
    pub scaler: Option<StandardScaler>,
    pub feature_names: Vec<String>,
    /// Importance moyenne sur les slots, dans l'ordre des features.
    pub importance: Option<Vec<(String, f64)>>,
}

impl TrainedModelSet {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn null_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_null()).count()
    }

    /// Une sortie brute par slot (non arrondie).
    pub fn predict_row(&self, row: ArrayView1<f64>) -> [f64; NUMBERS_PER_DRAW] {
        let scaled;
        let input = match &self.scaler {
            Some(scaler) => {
                scaled = scaler.transform_row(row);
                scaled.view()
            }
            None => row.view(),
        };
        std::array::from_fn(|slot| self.slots[slot].predict_row(input))
    }
}

/// Résultat d'un entraînement : modèles et métriques par famille.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub models: BTreeMap<ModelFamily, TrainedModelSet>,
    pub metrics: BTreeMap<ModelFamily, FamilyMetrics>,
}

pub struct Trainer {
    config: TrainerConfig,
    builder: FeatureBuilder,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        let builder = FeatureBuilder::new(config.features.clone());
        Self { config, builder }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn builder(&self) -> &FeatureBuilder {
        &self.builder
    }

    /// Matrice sans lignes NaN ; échoue sous `min_train_rows` lignes exploitables.
    pub fn prepare(&self, table: &DrawTable) -> PipelineResult<FeatureMatrix> {
        let matrix = self.builder.build(table).usable_rows();
        if matrix.n_rows() < self.config.min_train_rows {
            return Err(PipelineError::InsufficientData {
                required: self.config.min_train_rows,
                available: matrix.n_rows(),
            });
        }
        Ok(matrix)
    }

    /// Découpage (train, test) par permutation graine `config.seed` ; test = ceil(fraction × n).
    pub fn split(&self, n: usize) -> (Vec<usize>, Vec<usize>) {
        let n_test = ((self.config.test_fraction * n as f64).ceil() as usize)
            .clamp(1, n.saturating_sub(1).max(1));
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        indices.shuffle(&mut rng);
        let train = indices.split_off(n_test.min(n));
        (train, indices)
    }

    pub fn train(&self, table: &DrawTable) -> PipelineResult<TrainingOutcome> {
        self.train_families(table, &ModelFamily::ALL)
    }

    pub fn train_families(
        &self,
        table: &DrawTable,
        families: &[ModelFamily],
    ) -> PipelineResult<TrainingOutcome> {
        let matrix = self.prepare(table)?;
        let (train_idx, test_idx) = self.split(matrix.n_rows());
        let x_train = matrix.x.select(Axis(0), &train_idx);
        let y_train = matrix.y.select(Axis(0), &train_idx);
        let x_test = matrix.x.select(Axis(0), &test_idx);
        let y_test = matrix.y.select(Axis(0), &test_idx);
        info!(
            "Entraînement sur {} lignes ({} train / {} test, {} features)",
            matrix.n_rows(),
            train_idx.len(),
            test_idx.len(),
            matrix.n_features()
        );

        let mut models = BTreeMap::new();
        let mut metrics = BTreeMap::new();
        for &family in families {
            info!("Entraînement {family}...");
            let set = self.fit_family(family, &matrix.names, x_train.view(), y_train.view());
            let family_metrics = evaluate(&set, x_test.view(), y_test.view());
            info!(
                "{family} : MAE {:.3}, RMSE {:.3} ({} slot(s) nul(s))",
                family_metrics.mae,
                family_metrics.rmse,
                set.null_slots()
            );
            metrics.insert(family, family_metrics);
            models.insert(family, set);
        }
        Ok(TrainingOutcome { models, metrics })
    }

    /// Entraîne les six slots d'une famille. Un slot en échec devient `SlotModel::Null`.
    pub fn fit_family(
        &self,
        family: ModelFamily,
        names: &[String],
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
    ) -> TrainedModelSet {
        let (scaler, scaled) = if family.needs_scaling() {
            match StandardScaler::fit(x) {
                Ok(scaler) => {
                    let scaled = scaler.transform(x);
                    (Some(scaler), Some(scaled))
                }
                Err(e) => {
                    warn!("{family} : normalisation impossible ({e:#})");
                    (None, None)
                }
            }
        } else {
            (None, None)
        };
        let input = scaled.as_ref().map_or(x.view(), |s| s.view());
        let scaling_failed = family.needs_scaling() && scaler.is_none();

        let slots: [SlotModel; NUMBERS_PER_DRAW] = std::array::from_fn(|slot| {
            if scaling_failed {
                return SlotModel::Null;
            }
            let mut model = SlotModel::for_family(family, &self.config, slot);
            match model.fit(input, y.column(slot)) {
                Ok(()) => {
                    debug!("{family} slot {slot} entraîné");
                    model
                }
                Err(e) => {
                    warn!("{family} slot {slot} : échec de l'entraînement, modèle nul ({e:#})");
                    SlotModel::Null
                }
            }
        });

        let importance = average_importance(&slots, names);
        TrainedModelSet {
            family,
            slots,
            scaler,
            feature_names: names.to_vec(),
            importance,
        }
    }
}

/// Moyenne élément par élément des importances des slots qui en exposent.
fn average_importance(slots: &[SlotModel], names: &[String]) -> Option<Vec<(String, f64)>> {
    let per_slot: Vec<_> = slots
        .iter()
        .filter_map(|s| s.feature_importances())
        .filter(|imp| imp.len() == names.len())
        .collect();
    if per_slot.is_empty() {
        return None;
    }
    let n = per_slot.len() as f64;
    Some(
        names
            .iter()
            .enumerate()
            .map(|(f, name)| (name.clone(), per_slot.iter().map(|imp| imp[f]).sum::<f64>() / n))
            .collect(),
    )
}

/// MAE/MSE/RMSE sur les slots non nuls, tous échantillons confondus.
pub fn evaluate(set: &TrainedModelSet, x_test: ArrayView2<f64>, y_test: ArrayView2<f64>) -> FamilyMetrics {
    let mut errors = Vec::with_capacity(x_test.nrows() * NUMBERS_PER_DRAW);
    for (row, truth) in x_test.rows().into_iter().zip(y_test.rows()) {
        let pred = set.predict_row(row);
        for (slot, model) in set.slots.iter().enumerate() {
            if !model.is_null() {
                errors.push(pred[slot] - truth[slot]);
            }
        }
    }
    FamilyMetrics::from_errors(&errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use crate::test_config as fast_config;
    use milionaria_data::make_test_table;

    #[test]
    fn test_metrics_from_errors() {
        let m = FamilyMetrics::from_errors(&[1.0, -3.0]);
        assert_eq!(m.mae, 2.0);
        assert_eq!(m.mse, 5.0);
        assert!((m.rmse - 5f64.sqrt()).abs() < 1e-12);
        assert!(FamilyMetrics::from_errors(&[]).mae.is_nan());
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let trainer = Trainer::new(fast_config());
        let (train, test) = trainer.split(10);
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);
        let (train2, test2) = trainer.split(10);
        assert_eq!(train, train2);
        assert_eq!(test, test2);

        let (train, test) = trainer.split(101);
        assert_eq!(test.len(), 21);
        let mut all: Vec<usize> = train.into_iter().chain(test).collect();
        all.sort_unstable();
        assert_eq!(all, (0..101).collect::<Vec<_>>());
    }

    #[test]
    fn test_train_boundary_ten_rows() {
        let trainer = Trainer::new(fast_config());
        let outcome = trainer.train(&make_test_table(10)).unwrap();
        assert_eq!(outcome.models.len(), 5);
        assert_eq!(outcome.metrics.len(), 5);
    }

    #[test]
    fn test_train_nine_rows_is_insufficient() {
        let trainer = Trainer::new(fast_config());
        match trainer.train(&make_test_table(9)) {
            Err(PipelineError::InsufficientData { required, available }) => {
                assert_eq!(required, 10);
                assert_eq!(available, 9);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn test_training_is_reproducible() {
        let trainer = Trainer::new(fast_config());
        let table = make_test_table(40);
        let a = trainer.train(&table).unwrap();
        let b = trainer.train(&table).unwrap();
        for family in ModelFamily::ALL {
            let (ma, mb) = (a.metrics[&family], b.metrics[&family]);
            assert_eq!(ma.mae.to_bits(), mb.mae.to_bits(), "{family}");
            assert_eq!(ma.rmse.to_bits(), mb.rmse.to_bits(), "{family}");
        }
    }

    #[test]
    fn test_only_linear_has_scaler_and_trees_have_importance() {
        let trainer = Trainer::new(fast_config());
        let outcome = trainer.train(&make_test_table(30)).unwrap();
        for (family, set) in &outcome.models {
            assert_eq!(set.scaler.is_some(), family.needs_scaling());
            assert_eq!(set.importance.is_some(), *family != ModelFamily::LinearRegression);
            assert_eq!(set.null_slots(), 0);
            assert_eq!(set.n_features(), 168);
        }
        let imp = outcome.models[&ModelFamily::RandomForest].importance.as_ref().unwrap();
        let total: f64 = imp.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_slots_become_null() {
        let trainer = Trainer::new(fast_config());
        let names = vec!["a".to_string(), "b".to_string()];
        // Cible NaN : tous les fits échouent
        let x = Array2::from_shape_fn((12, 2), |(i, j)| (i + j) as f64);
        let y = Array2::from_elem((12, NUMBERS_PER_DRAW), f64::NAN);
        let set = trainer.fit_family(ModelFamily::XgBoost, &names, x.view(), y.view());
        assert_eq!(set.null_slots(), NUMBERS_PER_DRAW);
        assert!(set.importance.is_none());
        let metrics = evaluate(&set, x.view(), y.view());
        assert!(metrics.mae.is_nan());
    }
}
