use std::collections::BTreeSet;

use milionaria_data::{frequency_analysis, load, DataSource};
use milionaria_ml::{backtest, ModelFamily, PipelineError, Predictor, TrainerConfig};

fn quick_config() -> TrainerConfig {
    TrainerConfig {
        n_estimators: 8,
        ..TrainerConfig::default()
    }
}

#[test]
fn synthetic_load_train_predict_backtest() {
    let (table, meta) = load(None);
    assert!(meta.is_synthetic());
    assert_eq!(table.len(), 100);

    let freq = frequency_analysis(&table);
    assert_eq!(freq.numbers.values().sum::<usize>(), 600);
    assert_eq!(freq.clovers.values().sum::<usize>(), 200);

    let mut predictor = Predictor::new(quick_config());
    let metrics = predictor.train(&table).unwrap();
    assert_eq!(metrics.len(), 5);
    for m in metrics.values() {
        assert!(m.mae.is_finite() && m.mae >= 0.0);
        assert!((m.rmse * m.rmse - m.mse).abs() < 1e-9);
    }

    for family in ModelFamily::ALL {
        let prediction = predictor.predict_next(&table, family).unwrap();
        let unique: BTreeSet<u8> = prediction.numbers.iter().copied().collect();
        assert_eq!(unique.len(), 6);
        assert!(prediction.numbers.iter().all(|n| (1..=50).contains(n)));
        assert!(prediction.clovers[0] < prediction.clovers[1]);
    }

    let report = backtest(&table, 20, &quick_config()).unwrap();
    assert_eq!(report.train_size, 80);
    assert_eq!(report.test_size, 20);
    for summary in report.families.values() {
        assert_eq!(summary.hits_per_draw.len(), 20);
        assert_eq!(summary.hits_ge3_rate, summary.hits_ge3_count as f64 / 20.0);
        assert_eq!(summary.total_hits, summary.hits_per_draw.iter().sum::<usize>());
    }
}

#[test]
fn training_metrics_are_reproducible() {
    let (table, _) = load(None);
    let mut a = Predictor::new(quick_config());
    let mut b = Predictor::new(quick_config());
    let ma = a.train(&table).unwrap();
    let mb = b.train(&table).unwrap();
    assert_eq!(ma, mb);
}

#[test]
fn csv_file_is_loaded_and_trained() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("draws.csv");
    let mut csv = String::from("Concurso;Data;Num1;Num2;Num3;Num4;Num5;Num6;Trevo1;Trevo2\n");
    for i in 0..15u32 {
        let base = (i % 7) * 7;
        csv.push_str(&format!(
            "{};{:02}/01/2024;{};{};{};{};{};{};{};{}\n",
            i + 1,
            i + 1,
            base + 1,
            base + 2,
            base + 3,
            base + 4,
            base + 5,
            base + 6,
            i % 5 + 1,
            i % 5 + 2
        ));
    }
    std::fs::write(&path, csv).unwrap();

    let (table, meta) = load(Some(&DataSource::Path(path)));
    assert!(!meta.is_synthetic());
    assert_eq!(table.len(), 15);
    assert!(table.has_dates());

    let mut predictor = Predictor::new(quick_config());
    predictor.train_families(&table, &[ModelFamily::LinearRegression]).unwrap();
    let prediction = predictor
        .predict_next(&table, ModelFamily::LinearRegression)
        .unwrap();
    assert_eq!(prediction.confidence, 0.45);
}

#[test]
fn persisted_models_predict_identically() {
    let (table, _) = load(None);
    let mut predictor = Predictor::new(quick_config());
    predictor
        .train_families(&table, &[ModelFamily::RandomForest, ModelFamily::XgBoost])
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models.bin");
    predictor.save(&path).unwrap();
    let restored = Predictor::load(&path).unwrap();

    let matrix = predictor.builder().build(&table);
    let row = matrix.last_row().unwrap();
    for family in [ModelFamily::RandomForest, ModelFamily::XgBoost] {
        let before = predictor.model_set(family).unwrap().predict_row(row);
        let after = restored.model_set(family).unwrap().predict_row(row);
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.to_bits(), a.to_bits(), "{family}");
        }
    }
    assert!(matches!(
        restored.predict_next(&table, ModelFamily::LightGbm),
        Err(PipelineError::ModelNotTrained(ModelFamily::LightGbm))
    ));
}
