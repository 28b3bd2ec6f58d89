use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Rolling windows (in draws) for primary-number frequencies.
    pub number_windows: Vec<usize>,
    /// Rolling windows (in draws) for clover frequencies.
    pub clover_windows: Vec<usize>,
    /// Lags of the primary-number sum.
    pub sum_lags: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            number_windows: vec![5, 10, 20],
            clover_windows: vec![5, 10],
            sum_lags: vec![1, 2, 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub features: FeatureConfig,
    /// Trees per ensemble, shared by every tree family.
    pub n_estimators: usize,
    pub seed: u64,
    pub test_fraction: f64,
    pub min_train_rows: usize,

    pub forest_max_depth: Option<usize>,
    /// Fraction of features examined at each forest split.
    pub forest_max_features: f64,
    pub forest_min_samples_leaf: usize,

    pub gbm_learning_rate: f64,
    pub gbm_max_depth: usize,

    pub xgb_learning_rate: f64,
    pub xgb_max_depth: usize,
    pub xgb_lambda: f64,
    pub xgb_gamma: f64,
    pub xgb_min_child_weight: f64,

    pub lgbm_learning_rate: f64,
    pub lgbm_num_leaves: usize,
    pub lgbm_min_data_in_leaf: usize,
    pub lgbm_max_bin: usize,
    pub lgbm_lambda: f64,

    pub linear_ridge: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            n_estimators: 100,
            seed: 42,
            test_fraction: 0.2,
            min_train_rows: 10,

            forest_max_depth: None,
            forest_max_features: 1.0,
            forest_min_samples_leaf: 1,

            gbm_learning_rate: 0.1,
            gbm_max_depth: 3,

            xgb_learning_rate: 0.3,
            xgb_max_depth: 6,
            xgb_lambda: 1.0,
            xgb_gamma: 0.0,
            xgb_min_child_weight: 1.0,

            lgbm_learning_rate: 0.1,
            lgbm_num_leaves: 31,
            lgbm_min_data_in_leaf: 20,
            lgbm_max_bin: 255,
            lgbm_lambda: 0.0,

            linear_ridge: 1e-8,
        }
    }
}

impl TrainerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid JSON in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Cannot write {}", path.display()))?;
        Ok(())
    }
}
