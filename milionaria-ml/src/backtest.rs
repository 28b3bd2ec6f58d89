use std::collections::BTreeMap;

use log::{info, warn};
use milionaria_data::models::NUMBERS_PER_DRAW;
use milionaria_data::DrawTable;
use serde::{Deserialize, Serialize};

use crate::config::TrainerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::ModelFamily;
use crate::predictor::Predictor;

/// Lignes d'entraînement minimales en plus des tirages rejoués.
pub const MIN_BACKTEST_TRAIN_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawOutcome {
    pub draw_id: u32,
    /// `None` si la prédiction a échoué pour ce tirage.
    pub predicted: Option<[u8; NUMBERS_PER_DRAW]>,
    pub actual: [u8; NUMBERS_PER_DRAW],
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyBacktest {
    pub hits_per_draw: Vec<usize>,
    pub total_hits: usize,
    pub mean_hits: f64,
    pub max_hits: usize,
    pub hits_ge3_count: usize,
    pub hits_ge3_rate: f64,
    pub outcomes: Vec<DrawOutcome>,
}

impl FamilyBacktest {
    pub fn from_outcomes(outcomes: Vec<DrawOutcome>) -> Self {
        let hits_per_draw: Vec<usize> = outcomes.iter().map(|o| o.hits).collect();
        let n = hits_per_draw.len();
        let total_hits: usize = hits_per_draw.iter().sum();
        let hits_ge3_count = hits_per_draw.iter().filter(|&&h| h >= 3).count();
        let (mean_hits, hits_ge3_rate) = if n == 0 {
            (0.0, 0.0)
        } else {
            (total_hits as f64 / n as f64, hits_ge3_count as f64 / n as f64)
        };
        Self {
            max_hits: hits_per_draw.iter().copied().max().unwrap_or(0),
            hits_per_draw,
            total_hits,
            mean_hits,
            hits_ge3_count,
            hits_ge3_rate,
            outcomes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub train_size: usize,
    pub test_size: usize,
    pub families: BTreeMap<ModelFamily, FamilyBacktest>,
}

/// Nombre de numéros communs entre prédiction et tirage réel.
pub fn count_hits(predicted: &[u8], actual: &[u8]) -> usize {
    predicted.iter().filter(|n| actual.contains(n)).count()
}

pub fn backtest(table: &DrawTable, test_size: usize, config: &TrainerConfig) -> PipelineResult<BacktestReport> {
    backtest_with_progress(table, test_size, config, |_, _| {})
}

/// Entraîne une fois sur le préfixe, puis rejoue les `test_size` derniers tirages dans l'ordre :
/// la prédiction du tirage i utilise le préfixe plus les i tirages déjà révélés.
/// `progress(done, total)` est appelé après chaque tirage rejoué.
pub fn backtest_with_progress(
    table: &DrawTable,
    test_size: usize,
    config: &TrainerConfig,
    progress: impl FnMut(usize, usize),
) -> PipelineResult<BacktestReport> {
    let required = test_size + MIN_BACKTEST_TRAIN_ROWS;
    if table.len() < required {
        return Err(PipelineError::InsufficientData {
            required,
            available: table.len(),
        });
    }
    let train_size = table.len() - test_size;
    info!("Backtest : entraînement sur {train_size} tirages, {test_size} tirages rejoués");

    let mut predictor = Predictor::new(config.clone());
    predictor.train(&table.head(train_size))?;
    let trained = predictor.trained_families();
    let families = replay(
        table,
        train_size,
        &trained,
        |window, family| predictor.predict_next(window, family).map(|result| result.numbers),
        progress,
    );
    Ok(BacktestReport {
        train_size,
        test_size,
        families,
    })
}

/// Rejoue les tirages après `train_size`. Un échec de `predict` compte zéro numéro trouvé
/// et le rejeu continue.
fn replay(
    table: &DrawTable,
    train_size: usize,
    families: &[ModelFamily],
    mut predict: impl FnMut(&DrawTable, ModelFamily) -> PipelineResult<[u8; NUMBERS_PER_DRAW]>,
    mut progress: impl FnMut(usize, usize),
) -> BTreeMap<ModelFamily, FamilyBacktest> {
    let test_size = table.len().saturating_sub(train_size);
    let mut outcomes: BTreeMap<ModelFamily, Vec<DrawOutcome>> =
        families.iter().map(|&f| (f, Vec::with_capacity(test_size))).collect();

    for step in 0..test_size {
        let window = table.head(train_size + step);
        let actual = &table.draws()[train_size + step];
        for &family in families {
            let predicted = match predict(&window, family) {
                Ok(numbers) => Some(numbers),
                Err(e) => {
                    warn!("Backtest {family}, tirage {} : {e}", actual.id);
                    None
                }
            };
            let hits = predicted.map_or(0, |p| count_hits(&p, &actual.numbers));
            if let Some(list) = outcomes.get_mut(&family) {
                list.push(DrawOutcome {
                    draw_id: actual.id,
                    predicted,
                    actual: actual.numbers,
                    hits,
                });
            }
        }
        progress(step + 1, test_size);
    }

    outcomes
        .into_iter()
        .map(|(family, list)| (family, FamilyBacktest::from_outcomes(list)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_config;
    use milionaria_data::make_test_table;

    #[test]
    fn test_count_hits() {
        assert_eq!(count_hits(&[1, 2, 3, 4, 5, 6], &[4, 5, 6, 7, 8, 9]), 3);
        assert_eq!(count_hits(&[1, 2, 3, 4, 5, 6], &[7, 8, 9, 10, 11, 12]), 0);
        assert_eq!(count_hits(&[1, 2, 3, 4, 5, 6], &[6, 5, 4, 3, 2, 1]), 6);
    }

    #[test]
    fn test_summary_statistics() {
        let outcome = |hits| DrawOutcome {
            draw_id: 1,
            predicted: None,
            actual: [1, 2, 3, 4, 5, 6],
            hits,
        };
        let summary = FamilyBacktest::from_outcomes(vec![outcome(0), outcome(3), outcome(4), outcome(1)]);
        assert_eq!(summary.total_hits, 8);
        assert_eq!(summary.max_hits, 4);
        assert_eq!(summary.hits_ge3_count, 2);
        assert_eq!(summary.hits_ge3_rate, 0.5);
        assert_eq!(summary.mean_hits, 2.0);
        assert_eq!(summary.hits_per_draw, vec![0, 3, 4, 1]);
    }

    #[test]
    fn test_backtest_insufficient_data() {
        let table = make_test_table(29);
        match backtest(&table, 20, &test_config()) {
            Err(PipelineError::InsufficientData { required, available }) => {
                assert_eq!(required, 30);
                assert_eq!(available, 29);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn test_backtest_hits_match_intersection() {
        let table = make_test_table(35);
        let mut calls = 0;
        let report = backtest_with_progress(&table, 5, &test_config(), |done, total| {
            calls += 1;
            assert_eq!(total, 5);
            assert_eq!(done, calls);
        })
        .unwrap();
        assert_eq!(calls, 5);
        assert_eq!(report.train_size, 30);
        assert_eq!(report.test_size, 5);
        assert_eq!(report.families.len(), 5);

        for summary in report.families.values() {
            assert_eq!(summary.outcomes.len(), 5);
            for (k, outcome) in summary.outcomes.iter().enumerate() {
                let expected = &table.draws()[30 + k];
                assert_eq!(outcome.draw_id, expected.id);
                assert_eq!(outcome.actual, expected.numbers);
                assert!(outcome.hits <= 6);
                let predicted = outcome.predicted.unwrap();
                assert_eq!(outcome.hits, count_hits(&predicted, &outcome.actual));
            }
            assert_eq!(summary.hits_ge3_rate, summary.hits_ge3_count as f64 / 5.0);
        }
    }

    #[test]
    fn test_failed_prediction_counts_zero_hits() {
        let table = make_test_table(14);
        let families = [ModelFamily::RandomForest, ModelFamily::LinearRegression];
        let mut steps = 0;
        let summaries = replay(
            &table,
            10,
            &families,
            |window, family| {
                if family == ModelFamily::LinearRegression && window.len() == 11 {
                    return Err(PipelineError::InsufficientData {
                        required: 12,
                        available: window.len(),
                    });
                }
                Ok(table.draws()[window.len()].numbers)
            },
            |done, _| steps = done,
        );
        assert_eq!(steps, 4);

        let forest = &summaries[&ModelFamily::RandomForest];
        assert_eq!(forest.hits_per_draw, vec![6, 6, 6, 6]);

        let linear = &summaries[&ModelFamily::LinearRegression];
        assert_eq!(linear.hits_per_draw, vec![6, 0, 6, 6]);
        assert_eq!(linear.outcomes[1].predicted, None);
        assert_eq!(linear.outcomes[1].hits, 0);
        assert_eq!(linear.outcomes[1].draw_id, table.draws()[11].id);
        assert_eq!(linear.outcomes[2].predicted, Some(table.draws()[12].numbers));
        assert_eq!(linear.total_hits, 18);
    }
}
