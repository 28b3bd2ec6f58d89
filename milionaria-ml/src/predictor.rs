use std::collections::BTreeMap;
use std::path::Path;

use log::info;
use milionaria_data::models::{CLOVERS_PER_DRAW, CLOVER_MAX, NUMBERS_PER_DRAW, NUMBER_MAX};
use milionaria_data::{DataFormatError, DrawTable};
use rand::seq::index;
use rand::{Rng, RngExt};
use serde::{Deserialize, Serialize};

use crate::config::TrainerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::features::FeatureBuilder;
use crate::models::ModelFamily;
use crate::trainer::{FamilyMetrics, TrainedModelSet, Trainer};

const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub numbers: [u8; NUMBERS_PER_DRAW],
    /// Tirés au hasard, indépendamment des modèles.
    pub clovers: [u8; CLOVERS_PER_DRAW],
    pub family: ModelFamily,
    pub confidence: f64,
}

#[derive(Serialize, Deserialize)]
struct ModelArtifact {
    version: u32,
    config: TrainerConfig,
    models: BTreeMap<ModelFamily, TrainedModelSet>,
    metrics: BTreeMap<ModelFamily, FamilyMetrics>,
}

/// Détient les modèles de la session courante ; chaque `train` remplace les précédents.
pub struct Predictor {
    trainer: Trainer,
    models: BTreeMap<ModelFamily, TrainedModelSet>,
    metrics: BTreeMap<ModelFamily, FamilyMetrics>,
}

impl Predictor {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            trainer: Trainer::new(config),
            models: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        self.trainer.config()
    }

    pub fn builder(&self) -> &FeatureBuilder {
        self.trainer.builder()
    }

    pub fn trained_families(&self) -> Vec<ModelFamily> {
        self.models.keys().copied().collect()
    }

    pub fn is_trained(&self, family: ModelFamily) -> bool {
        self.models.contains_key(&family)
    }

    pub fn model_set(&self, family: ModelFamily) -> PipelineResult<&TrainedModelSet> {
        self.models
            .get(&family)
            .ok_or(PipelineError::ModelNotTrained(family))
    }

    /// Métriques du dernier entraînement.
    pub fn metrics(&self) -> &BTreeMap<ModelFamily, FamilyMetrics> {
        &self.metrics
    }

    pub fn train(&mut self, table: &DrawTable) -> PipelineResult<BTreeMap<ModelFamily, FamilyMetrics>> {
        self.train_families(table, &ModelFamily::ALL)
    }

    pub fn train_families(
        &mut self,
        table: &DrawTable,
        families: &[ModelFamily],
    ) -> PipelineResult<BTreeMap<ModelFamily, FamilyMetrics>> {
        let outcome = self.trainer.train_families(table, families)?;
        self.models = outcome.models;
        self.metrics = outcome.metrics.clone();
        Ok(outcome.metrics)
    }

    /// Prédit le prochain tirage à partir du dernier vecteur de features de `table`.
    pub fn predict_next(&self, table: &DrawTable, family: ModelFamily) -> PipelineResult<PredictionResult> {
        let set = self.model_set(family)?;
        let matrix = self.builder().build(table);
        if matrix.n_features() != set.n_features() {
            return Err(DataFormatError::FeatureMismatch {
                expected: set.n_features(),
                found: matrix.n_features(),
            }
            .into());
        }
        let Some(last) = matrix.last_row() else {
            return Err(PipelineError::InsufficientData {
                required: 1,
                available: 0,
            });
        };

        let mut rng = rand::rng();
        let raw = set.predict_row(last);
        Ok(PredictionResult {
            numbers: finalize_numbers(&raw, &mut rng),
            clovers: random_clovers(&mut rng),
            family,
            confidence: family.confidence(),
        })
    }

    /// Importances moyennes (nom de feature, poids) ; `None` pour la famille linéaire.
    pub fn feature_importance(&self, family: ModelFamily) -> PipelineResult<Option<&[(String, f64)]>> {
        Ok(self.model_set(family)?.importance.as_deref())
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let artifact = ModelArtifact {
            version: ARTIFACT_VERSION,
            config: self.config().clone(),
            models: self.models.clone(),
            metrics: self.metrics.clone(),
        };
        let bytes = bincode::serialize(&artifact).map_err(|e| PipelineError::Persistence(e.to_string()))?;
        std::fs::write(path, bytes)
            .map_err(|e| PipelineError::Persistence(format!("{}: {e}", path.display())))?;
        info!("{} famille(s) sauvegardée(s) dans {}", self.models.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::Persistence(format!("{}: {e}", path.display())))?;
        let artifact: ModelArtifact =
            bincode::deserialize(&bytes).map_err(|e| PipelineError::Persistence(e.to_string()))?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(PipelineError::Persistence(format!(
                "version d'artefact {} non supportée",
                artifact.version
            )));
        }
        info!("{} famille(s) chargée(s) depuis {}", artifact.models.len(), path.display());
        Ok(Self {
            trainer: Trainer::new(artifact.config),
            models: artifact.models,
            metrics: artifact.metrics,
        })
    }

    #[cfg(test)]
    pub(crate) fn insert_model_set(&mut self, set: TrainedModelSet) {
        self.models.insert(set.family, set);
    }
}

/// Arrondit (égalités vers le pair), borne à [1, 50], dédoublonne (premier arrivé gardé), complète au hasard puis trie.
pub fn finalize_numbers(raw: &[f64], rng: &mut impl Rng) -> [u8; NUMBERS_PER_DRAW] {
    let mut picked: Vec<u8> = Vec::with_capacity(NUMBERS_PER_DRAW);
    for &value in raw {
        let n = if value.is_finite() {
            value.round_ties_even().clamp(1.0, NUMBER_MAX as f64) as u8
        } else {
            rng.random_range(1..=NUMBER_MAX)
        };
        if !picked.contains(&n) && picked.len() < NUMBERS_PER_DRAW {
            picked.push(n);
        }
    }

    if picked.len() < NUMBERS_PER_DRAW {
        let unused: Vec<u8> = (1..=NUMBER_MAX).filter(|n| !picked.contains(n)).collect();
        let missing = NUMBERS_PER_DRAW - picked.len();
        picked.extend(index::sample(rng, unused.len(), missing).into_iter().map(|i| unused[i]));
    }

    let mut numbers = [0u8; NUMBERS_PER_DRAW];
    numbers.copy_from_slice(&picked);
    numbers.sort_unstable();
    numbers
}

/// Trèfles uniformes sans remise dans [1, 6], triés.
pub fn random_clovers(rng: &mut impl Rng) -> [u8; CLOVERS_PER_DRAW] {
    let mut clovers = [0u8; CLOVERS_PER_DRAW];
    for (slot, idx) in index::sample(rng, CLOVER_MAX as usize, CLOVERS_PER_DRAW)
        .into_iter()
        .enumerate()
    {
        clovers[slot] = idx as u8 + 1;
    }
    clovers.sort_unstable();
    clovers
}
