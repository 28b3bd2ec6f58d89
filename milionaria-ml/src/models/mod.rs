pub mod gradient_boosting;
pub mod lightgbm;
pub mod linear;
pub mod random_forest;
pub mod tree;
pub mod xgboost;

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use milionaria_data::models::NUMBER_MAX;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::RngExt;
use serde::{Deserialize, Serialize};

use crate::config::TrainerConfig;
use gradient_boosting::GradientBoosting;
use lightgbm::{LgbmParams, LgbmRegressor};
use linear::LinearRegression;
use random_forest::RandomForest;
use xgboost::{XgbParams, XgbRegressor};

/// Capacité commune fit/predict d'un régresseur à une sortie.
pub trait Regressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()>;
    fn predict_row(&self, row: ArrayView1<f64>) -> f64;
    /// Importances normalisées (somme = 1), si le modèle en expose.
    fn feature_importances(&self) -> Option<Array1<f64>>;

    fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }
}

/// Refuse un jeu d'entraînement vide, mal dimensionné ou non fini.
pub fn check_training_set(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        bail!("jeu d'entraînement vide ({}x{})", x.nrows(), x.ncols());
    }
    if x.nrows() != y.len() {
        bail!("{} lignes pour {} cibles", x.nrows(), y.len());
    }
    if !x.iter().chain(y.iter()).all(|v| v.is_finite()) {
        bail!("valeurs non finies dans le jeu d'entraînement");
    }
    Ok(())
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    #[value(name = "random_forest")]
    RandomForest,
    #[value(name = "gradient_boosting")]
    GradientBoosting,
    #[value(name = "xgboost")]
    XgBoost,
    #[value(name = "lightgbm")]
    LightGbm,
    #[value(name = "linear_regression")]
    LinearRegression,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::XgBoost,
        ModelFamily::LightGbm,
        ModelFamily::LinearRegression,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::XgBoost => "xgboost",
            ModelFamily::LightGbm => "lightgbm",
            ModelFamily::LinearRegression => "linear_regression",
        }
    }

    /// Score de confiance statique affiché avec la prédiction.
    pub fn confidence(&self) -> f64 {
        confidence_for(self.name())
    }

    /// Seule la régression linéaire travaille sur des features standardisées.
    pub fn needs_scaling(&self) -> bool {
        matches!(self, ModelFamily::LinearRegression)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ModelFamily::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| anyhow::anyhow!("Famille de modèle inconnue : {s}"))
    }
}

/// Confiance par nom de famille ; 0.50 pour un nom inconnu.
pub fn confidence_for(family: &str) -> f64 {
    match family {
        "random_forest" => 0.65,
        "gradient_boosting" => 0.62,
        "xgboost" => 0.68,
        "lightgbm" => 0.66,
        "linear_regression" => 0.45,
        _ => 0.50,
    }
}

/// Régresseur d'un slot. `Null` remplace un modèle dont l'entraînement a échoué
/// et répond par un numéro uniforme dans [1, 50].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlotModel {
    Forest(RandomForest),
    Gbm(GradientBoosting),
    Xgb(XgbRegressor),
    Lgbm(LgbmRegressor),
    Linear(LinearRegression),
    Null,
}

impl SlotModel {
    /// Modèle non entraîné de la famille, graine dérivée du slot.
    pub fn for_family(family: ModelFamily, config: &TrainerConfig, slot: usize) -> Self {
        let seed = config.seed.wrapping_add(slot as u64);
        match family {
            ModelFamily::RandomForest => SlotModel::Forest(RandomForest::new(
                config.n_estimators,
                config.forest_max_depth,
                config.forest_max_features,
                config.forest_min_samples_leaf,
                seed,
            )),
            ModelFamily::GradientBoosting => SlotModel::Gbm(GradientBoosting::new(
                config.n_estimators,
                config.gbm_learning_rate,
                config.gbm_max_depth,
                seed,
            )),
            ModelFamily::XgBoost => SlotModel::Xgb(XgbRegressor::new(XgbParams {
                n_estimators: config.n_estimators,
                learning_rate: config.xgb_learning_rate,
                max_depth: config.xgb_max_depth,
                lambda: config.xgb_lambda,
                gamma: config.xgb_gamma,
                min_child_weight: config.xgb_min_child_weight,
            })),
            ModelFamily::LightGbm => SlotModel::Lgbm(LgbmRegressor::new(LgbmParams {
                n_estimators: config.n_estimators,
                learning_rate: config.lgbm_learning_rate,
                num_leaves: config.lgbm_num_leaves,
                min_data_in_leaf: config.lgbm_min_data_in_leaf,
                max_bin: config.lgbm_max_bin,
                lambda: config.lgbm_lambda,
            })),
            ModelFamily::LinearRegression => {
                SlotModel::Linear(LinearRegression::new(config.linear_ridge))
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SlotModel::Null)
    }

    fn inner(&self) -> Option<&dyn Regressor> {
        match self {
            SlotModel::Forest(m) => Some(m),
            SlotModel::Gbm(m) => Some(m),
            SlotModel::Xgb(m) => Some(m),
            SlotModel::Lgbm(m) => Some(m),
            SlotModel::Linear(m) => Some(m),
            SlotModel::Null => None,
        }
    }

    fn inner_mut(&mut self) -> Option<&mut dyn Regressor> {
        match self {
            SlotModel::Forest(m) => Some(m),
            SlotModel::Gbm(m) => Some(m),
            SlotModel::Xgb(m) => Some(m),
            SlotModel::Lgbm(m) => Some(m),
            SlotModel::Linear(m) => Some(m),
            SlotModel::Null => None,
        }
    }
}

impl Regressor for SlotModel {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        match self.inner_mut() {
            Some(model) => model.fit(x, y),
            None => Ok(()),
        }
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match self.inner() {
            Some(model) => model.predict_row(row),
            None => rand::rng().random_range(1..=NUMBER_MAX) as f64,
        }
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.inner().and_then(|m| m.feature_importances())
    }
}

/// Données de régression déterministes : y = 4·x0 + 0.5·x1 + 1, x2 est du bruit.
#[cfg(test)]
pub fn make_regression_data(n: usize) -> (ndarray::Array2<f64>, Array1<f64>) {
    let x = ndarray::Array2::from_shape_fn((n, 3), |(i, j)| match j {
        0 => (i % 10) as f64,
        1 => ((i * 3) % 7) as f64,
        _ => ((i * 5) % 11) as f64,
    });
    let y = x.rows().into_iter().map(|r| 4.0 * r[0] + 0.5 * r[1] + 1.0).collect();
    (x, y)
}
