pub mod backtest;
pub mod config;
pub mod error;
pub mod features;
pub mod linalg;
pub mod models;
pub mod predictor;
pub mod scaler;
pub mod trainer;

pub use backtest::{backtest, backtest_with_progress, BacktestReport, DrawOutcome, FamilyBacktest};
pub use config::{FeatureConfig, TrainerConfig};
pub use error::{PipelineError, PipelineResult};
pub use features::{FeatureBuilder, FeatureMatrix};
pub use models::{confidence_for, ModelFamily, Regressor, SlotModel};
pub use predictor::{PredictionResult, Predictor};
pub use trainer::{FamilyMetrics, TrainedModelSet, Trainer};

/// Configuration allégée pour les tests.
#[cfg(test)]
pub(crate) fn test_config() -> TrainerConfig {
    TrainerConfig {
        n_estimators: 5,
        ..TrainerConfig::default()
    }
}
