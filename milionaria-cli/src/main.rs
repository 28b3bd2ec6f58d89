mod display;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

use milionaria_data::{frequency_analysis, last_draws, load, summary_info, DataSource, DrawTable};
use milionaria_ml::{backtest_with_progress, ModelFamily, Predictor, TrainerConfig};

use crate::display::{
    display_backtest, display_draws, display_frequencies, display_importance, display_load_metadata,
    display_metrics, display_predictions, display_summary,
};

#[derive(Parser)]
#[command(name = "milionaria", about = "Analyse et prédiction des tirages +Milionária")]
struct Cli {
    /// Fichier de tirages (.xlsx, .xls, .ods, .csv). Données d'exemple si absent
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Configuration d'entraînement (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Résumé des données chargées
    Info,

    /// Lister les derniers tirages
    History {
        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: usize,
    },

    /// Fréquences des numéros et des trèfles
    Freq {
        /// Nombre de numéros les plus fréquents à afficher
        #[arg(short, long, default_value = "10")]
        top: usize,
    },

    /// Entraîner les cinq familles de modèles et afficher les erreurs held-out
    Train {
        /// Sauvegarder les modèles entraînés
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Prédire le prochain tirage
    Predict {
        /// Famille de modèle (toutes si absent)
        #[arg(short, long)]
        model: Option<ModelFamily>,

        /// Modèles sauvegardés à utiliser au lieu d'un nouvel entraînement
        #[arg(short, long)]
        load: Option<PathBuf>,
    },

    /// Rejouer les derniers tirages et compter les numéros trouvés
    Backtest {
        /// Nombre de tirages rejoués
        #[arg(short, long, default_value = "20")]
        test_size: usize,
    },

    /// Importance des features d'une famille
    Importance {
        #[arg(short, long, default_value = "random_forest")]
        model: ModelFamily,

        /// Nombre de features à afficher
        #[arg(short, long, default_value = "15")]
        top: usize,

        /// Modèles sauvegardés à utiliser au lieu d'un nouvel entraînement
        #[arg(short, long)]
        load: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    if let Some(path) = ignored_config(&cli) {
        warn!("--config {} ignoré : les modèles chargés gardent leur configuration", path.display());
    }

    let source = cli.file.map(DataSource::Path);
    let (table, meta) = load(source.as_ref());
    display_load_metadata(&meta);

    let config = match &cli.config {
        Some(path) => TrainerConfig::load(path)?,
        None => TrainerConfig::default(),
    };

    match cli.command {
        Command::Info => {
            display_summary(&summary_info(&table));
            Ok(())
        }
        Command::History { last } => {
            display_draws(last_draws(&table, last));
            Ok(())
        }
        Command::Freq { top } => {
            display_frequencies(&frequency_analysis(&table), top);
            Ok(())
        }
        Command::Train { save } => cmd_train(&table, config, save.as_deref()),
        Command::Predict { model, load } => cmd_predict(&table, config, model, load.as_deref()),
        Command::Backtest { test_size } => cmd_backtest(&table, &config, test_size),
        Command::Importance { model, top, load } => {
            cmd_importance(&table, config, model, top, load.as_deref())
        }
    }
}

/// `--config` n'a aucun effet quand les modèles viennent de `--load`.
fn ignored_config(cli: &Cli) -> Option<&Path> {
    let load = match &cli.command {
        Command::Predict { load, .. } | Command::Importance { load, .. } => load.as_ref(),
        _ => None,
    };
    load.and(cli.config.as_deref())
}

fn cmd_train(table: &DrawTable, config: TrainerConfig, save: Option<&Path>) -> Result<()> {
    let mut predictor = Predictor::new(config);
    let metrics = predictor.train(table).context("Entraînement impossible")?;
    display_metrics(&metrics);
    if let Some(path) = save {
        predictor.save(path)?;
        println!("Modèles sauvegardés dans {}", path.display());
    }
    Ok(())
}

/// Prédicteur chargé depuis `load`, ou entraîné sur `families`.
fn ready_predictor(
    table: &DrawTable,
    config: TrainerConfig,
    families: &[ModelFamily],
    load: Option<&Path>,
) -> Result<Predictor> {
    match load {
        Some(path) => Ok(Predictor::load(path)?),
        None => {
            let mut predictor = Predictor::new(config);
            predictor
                .train_families(table, families)
                .context("Entraînement impossible")?;
            Ok(predictor)
        }
    }
}

fn cmd_predict(
    table: &DrawTable,
    config: TrainerConfig,
    model: Option<ModelFamily>,
    load: Option<&Path>,
) -> Result<()> {
    let families: Vec<ModelFamily> = match model {
        Some(family) => vec![family],
        None => ModelFamily::ALL.to_vec(),
    };
    let predictor = ready_predictor(table, config, &families, load)?;
    let predictions = families
        .iter()
        .map(|&family| predictor.predict_next(table, family))
        .collect::<Result<Vec<_>, _>>()?;
    display_predictions(&predictions);
    Ok(())
}

fn cmd_backtest(table: &DrawTable, config: &TrainerConfig, test_size: usize) -> Result<()> {
    let pb = ProgressBar::new(test_size as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Template de progression invalide")?
            .progress_chars("=> "),
    );
    pb.set_message("tirages rejoués");

    let report = backtest_with_progress(table, test_size, config, |done, _| pb.set_position(done as u64));
    pb.finish_and_clear();
    display_backtest(&report?);
    Ok(())
}

fn cmd_importance(
    table: &DrawTable,
    config: TrainerConfig,
    model: ModelFamily,
    top: usize,
    load: Option<&Path>,
) -> Result<()> {
    let predictor = ready_predictor(table, config, &[model], load)?;
    match predictor.feature_importance(model)? {
        Some(importance) => display_importance(model, importance, top),
        None => println!("{model} n'expose pas d'importance de features."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_ignored_with_load() {
        let cli = Cli::try_parse_from(["milionaria", "-c", "cfg.json", "predict", "--load", "m.bin"]).unwrap();
        assert_eq!(ignored_config(&cli), Some(Path::new("cfg.json")));

        let cli = Cli::try_parse_from(["milionaria", "importance", "-l", "m.bin", "-c", "cfg.json"]).unwrap();
        assert_eq!(ignored_config(&cli), Some(Path::new("cfg.json")));
    }

    #[test]
    fn test_config_used_without_load() {
        let cli = Cli::try_parse_from(["milionaria", "-c", "cfg.json", "predict"]).unwrap();
        assert_eq!(ignored_config(&cli), None);

        let cli = Cli::try_parse_from(["milionaria", "train", "-c", "cfg.json"]).unwrap();
        assert_eq!(ignored_config(&cli), None);

        let cli = Cli::try_parse_from(["milionaria", "predict", "-l", "m.bin"]).unwrap();
        assert_eq!(ignored_config(&cli), None);
    }
}
