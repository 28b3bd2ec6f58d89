use std::collections::HashSet;

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::DataFormatError;
use crate::models::{DrawRecord, Pool, CLOVERS_PER_DRAW, NUMBERS_PER_DRAW};
use crate::schema::{self, ColumnMapping};
use crate::source::{read_source, Cell, DataSource, RawTable};
use crate::table::DrawTable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub draws: usize,
    pub seed: u64,
    pub start: NaiveDate,
    pub spacing_days: i64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            draws: 100,
            seed: 42,
            start: NaiveDate::from_ymd_opt(2022, 5, 28).unwrap_or_default(),
            spacing_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataOrigin {
    File(String),
    Upload(String),
    /// `reason` vaut `None` si aucune source n'a été fournie.
    Synthetic { reason: Option<String> },
}

#[derive(Debug, Clone)]
pub struct LoadMetadata {
    pub origin: DataOrigin,
    pub rows_read: usize,
    pub rows_rejected: usize,
    pub mapping: Option<ColumnMapping>,
}

impl LoadMetadata {
    pub fn is_synthetic(&self) -> bool {
        matches!(self.origin, DataOrigin::Synthetic { .. })
    }
}

/// Charge les tirages depuis `source`. N'échoue jamais : toute erreur de format
/// (ou l'absence de source) bascule sur le jeu synthétique déterministe.
pub fn load(source: Option<&DataSource>) -> (DrawTable, LoadMetadata) {
    let reason = match source {
        None => None,
        Some(src) => match try_load(src) {
            Ok(loaded) => return loaded,
            Err(e) => {
                log::warn!("Chargement de {} impossible : {}", src.describe(), e);
                Some(e.to_string())
            }
        },
    };

    let config = SyntheticConfig::default();
    let table = synthetic(&config);
    log::info!("Utilisation de données d'exemple ({} tirages simulés)", table.len());
    let meta = LoadMetadata {
        origin: DataOrigin::Synthetic { reason },
        rows_read: table.len(),
        rows_rejected: 0,
        mapping: None,
    };
    (table, meta)
}

/// Variante faillible de `load`, sans repli synthétique.
pub fn try_load(source: &DataSource) -> Result<(DrawTable, LoadMetadata), DataFormatError> {
    let raw = read_source(source)?;
    let (table, mapping, rejected) = table_from_raw(&raw)?;
    log::info!(
        "Données chargées : {} tirages ({} lignes rejetées)",
        table.len(),
        rejected
    );

    let origin = match source {
        DataSource::Path(p) => DataOrigin::File(p.display().to_string()),
        DataSource::Upload { name, .. } => DataOrigin::Upload(name.clone()),
    };
    let meta = LoadMetadata {
        origin,
        rows_read: raw.rows.len(),
        rows_rejected: rejected,
        mapping: Some(mapping),
    };
    Ok((table, meta))
}

/// Résout le schéma puis convertit chaque ligne en `DrawRecord`.
/// Les lignes invalides (valeurs hors bornes, doublons, identifiant répété) sont rejetées.
pub fn table_from_raw(
    raw: &RawTable,
) -> Result<(DrawTable, ColumnMapping, usize), DataFormatError> {
    if raw.rows.is_empty() {
        return Err(DataFormatError::Empty);
    }
    let mapping = schema::resolve(raw)?;

    let mut draws = Vec::with_capacity(raw.rows.len());
    let mut seen_ids = HashSet::new();
    let mut rejected = 0;

    for row in 0..raw.rows.len() {
        // Lignes entièrement vides en fin de tableur
        if raw.rows[row].iter().all(|c| *c == Cell::Empty) {
            continue;
        }
        match parse_row(raw, &mapping, row) {
            Ok(draw) if seen_ids.insert(draw.id) => draws.push(draw),
            Ok(draw) => {
                log::warn!("Ligne {} : concurso {} en double, ignorée", row + 2, draw.id);
                rejected += 1;
            }
            Err(e) => {
                log::warn!("Ligne {} rejetée : {}", row + 2, e);
                rejected += 1;
            }
        }
    }

    if draws.is_empty() {
        return Err(DataFormatError::NoValidRows {
            rows: raw.rows.len(),
        });
    }

    let table = DrawTable::new(raw.headers.clone(), mapping.date.is_some(), draws);
    Ok((table, mapping, rejected))
}

fn parse_row(raw: &RawTable, mapping: &ColumnMapping, row: usize) -> Result<DrawRecord> {
    let id = match mapping.id {
        Some(col) => integer_cell(raw.cell(row, col), "Concurso")?,
        None => (row + 1) as u32,
    };
    let date = mapping.date.and_then(|col| raw.cell(row, col).as_date());

    let mut numbers = [0u8; NUMBERS_PER_DRAW];
    for (slot, &col) in mapping.numbers.iter().enumerate() {
        numbers[slot] = small_integer_cell(raw.cell(row, col), &raw.headers[col])?;
    }
    let mut clovers = [0u8; CLOVERS_PER_DRAW];
    for (slot, &col) in mapping.clovers.iter().enumerate() {
        clovers[slot] = small_integer_cell(raw.cell(row, col), &raw.headers[col])?;
    }

    DrawRecord::new(id, date, numbers, clovers)
}

fn integer_cell(cell: &Cell, column: &str) -> Result<u32> {
    match cell.as_number() {
        Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(v as u32),
        Some(v) => bail!("Valeur non entière dans '{}': {}", column, v),
        None => bail!("Valeur manquante dans '{}'", column),
    }
}

fn small_integer_cell(cell: &Cell, column: &str) -> Result<u8> {
    let v = integer_cell(cell, column)?;
    u8::try_from(v).map_err(|_| anyhow::anyhow!("Valeur hors limites dans '{}': {}", column, v))
}

/// Jeu de données d'exemple : tirages hebdomadaires, numéros triés tirés sans remise.
pub fn synthetic(config: &SyntheticConfig) -> DrawTable {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let draws: Vec<DrawRecord> = (0..config.draws)
        .map(|i| {
            let date = config.start + Duration::days(config.spacing_days * i as i64);
            let numbers = sample_sorted::<NUMBERS_PER_DRAW>(&mut rng, Pool::Numbers);
            let clovers = sample_sorted::<CLOVERS_PER_DRAW>(&mut rng, Pool::Clovers);
            DrawRecord {
                id: (i + 1) as u32,
                date: Some(date),
                numbers,
                clovers,
            }
        })
        .collect();

    DrawTable::new(standard_columns(), true, draws)
}

fn sample_sorted<const N: usize>(rng: &mut StdRng, pool: Pool) -> [u8; N] {
    let mut out = [0u8; N];
    for (slot, idx) in index::sample(rng, pool.size(), N).into_iter().enumerate() {
        out[slot] = (idx + 1) as u8;
    }
    out.sort_unstable();
    out
}

/// En-têtes conventionnels du fichier de la Caixa.
pub fn standard_columns() -> Vec<String> {
    let mut columns = vec!["Concurso".to_string(), "Data".to_string()];
    columns.extend((1..=NUMBERS_PER_DRAW).map(|i| format!("Num{}", i)));
    columns.extend((1..=CLOVERS_PER_DRAW).map(|i| format!("Trevo{}", i)));
    columns
}
