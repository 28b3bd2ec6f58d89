use std::collections::BTreeMap;

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use milionaria_data::{DataOrigin, DataSummary, DrawRecord, FrequencyAnalysis, LoadMetadata, Pool};
use milionaria_ml::{BacktestReport, FamilyMetrics, ModelFamily, PredictionResult};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn join_numbers(values: &[u8]) -> String {
    values
        .iter()
        .map(|v| format!("{v:2}"))
        .collect::<Vec<_>>()
        .join(" - ")
}

pub fn display_load_metadata(meta: &LoadMetadata) {
    match &meta.origin {
        DataOrigin::File(name) | DataOrigin::Upload(name) => {
            println!("Source : {name} ({} tirages lus)", meta.rows_read);
            if meta.rows_rejected > 0 {
                println!("  {} ligne(s) invalide(s) ignorée(s)", meta.rows_rejected);
            }
        }
        DataOrigin::Synthetic { reason: None } => {
            println!("Aucun fichier fourni : données d'exemple ({} tirages)", meta.rows_read);
        }
        DataOrigin::Synthetic { reason: Some(reason) } => {
            println!("Fichier inexploitable ({reason}) : données d'exemple ({} tirages)", meta.rows_read);
        }
    }
}

pub fn display_summary(summary: &DataSummary) {
    println!("\nTotal de tirages : {}", summary.total_draws);
    println!("Colonnes         : {}", summary.columns.join(", "));
    match summary.period {
        Some((start, end)) => println!("Période          : {start} → {end}"),
        None => println!("Période          : —"),
    }
}

pub fn display_draws(draws: &[DrawRecord]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Concurso", "Date", "Numéros", "Trèfles"]);
    for draw in draws.iter().rev() {
        table.add_row(vec![
            draw.id.to_string(),
            draw.date.map_or_else(|| "—".to_string(), |d| d.to_string()),
            join_numbers(&draw.numbers),
            join_numbers(&draw.clovers),
        ]);
    }
    println!("{table}");
}

pub fn display_frequencies(freq: &FrequencyAnalysis, top: usize) {
    println!("\n── Numéros les plus fréquents ──");
    let mut table = new_table(vec!["Numéro", "Apparitions"]);
    for (number, count) in freq.most_frequent(Pool::Numbers, top) {
        table.add_row(vec![format!("{number:2}"), count.to_string()]);
    }
    println!("{table}");

    println!("\n── Trèfles ──");
    let mut table = new_table(vec!["Trèfle", "Apparitions"]);
    for (clover, count) in freq.most_frequent(Pool::Clovers, Pool::Clovers.size()) {
        table.add_row(vec![format!("{clover}"), count.to_string()]);
    }
    println!("{table}");
}

pub fn display_metrics(metrics: &BTreeMap<ModelFamily, FamilyMetrics>) {
    println!("\n📊 Erreurs sur le jeu de test\n");
    let mut table = new_table(vec!["Modèle", "MAE", "MSE", "RMSE"]);
    for (family, m) in metrics {
        table.add_row(vec![
            family.to_string(),
            format!("{:.3}", m.mae),
            format!("{:.3}", m.mse),
            format!("{:.3}", m.rmse),
        ]);
    }
    println!("{table}");
}

pub fn display_predictions(predictions: &[PredictionResult]) {
    println!("\n🎯 Prédictions du prochain tirage\n");
    let mut table = new_table(vec!["Modèle", "Numéros", "Trèfles", "Confiance"]);
    for p in predictions {
        table.add_row(vec![
            Cell::new(p.family.to_string()),
            Cell::new(join_numbers(&p.numbers)),
            Cell::new(join_numbers(&p.clovers)),
            Cell::new(format!("{:.0}%", p.confidence * 100.0)),
        ]);
    }
    println!("{table}");
    println!("Les trèfles sont tirés au hasard.");
}

pub fn display_backtest(report: &BacktestReport) {
    println!(
        "\n🔁 Backtest : {} tirages d'entraînement, {} tirages rejoués\n",
        report.train_size, report.test_size
    );
    let mut table = new_table(vec!["Modèle", "Moyenne", "Max", "≥3 numéros", "Taux ≥3", "Total"]);
    for (family, summary) in &report.families {
        let color = if summary.hits_ge3_count > 0 {
            Color::Green
        } else {
            Color::White
        };
        table.add_row(vec![
            Cell::new(family.to_string()),
            Cell::new(format!("{:.2}", summary.mean_hits)),
            Cell::new(summary.max_hits.to_string()),
            Cell::new(summary.hits_ge3_count.to_string()).fg(color),
            Cell::new(format!("{:.1}%", summary.hits_ge3_rate * 100.0)),
            Cell::new(summary.total_hits.to_string()),
        ]);
    }
    println!("{table}");
}

pub fn display_importance(family: ModelFamily, importance: &[(String, f64)], top: usize) {
    println!("\n🌲 Importance des features ({family})\n");
    let mut sorted = importance.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut table = new_table(vec!["#", "Feature", "Importance"]);
    for (i, (name, value)) in sorted.iter().take(top).enumerate() {
        table.add_row(vec![format!("{}", i + 1), name.clone(), format!("{value:.4}")]);
    }
    println!("{table}");
}
