use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DerivedFeatures, DrawRecord};

/// Table normalisée des tirages, triée par identifiant croissant.
/// Les `DerivedFeatures` sont attachées ligne à ligne et recalculées à chaque modification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawTable {
    columns: Vec<String>,
    has_dates: bool,
    draws: Vec<DrawRecord>,
    derived: Vec<DerivedFeatures>,
}

impl DrawTable {
    pub fn new(columns: Vec<String>, has_dates: bool, mut draws: Vec<DrawRecord>) -> Self {
        draws.sort_by_key(|d| d.id);
        let mut table = Self {
            columns,
            has_dates,
            draws,
            derived: Vec::new(),
        };
        table.derive_features();
        table
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn derived(&self) -> &[DerivedFeatures] {
        &self.derived
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Vrai si le schéma source comporte une colonne de date.
    pub fn has_dates(&self) -> bool {
        self.has_dates
    }

    /// Recalcule les features dérivées de chaque ligne. Idempotent.
    pub fn derive_features(&mut self) {
        self.derived = self.draws.iter().map(DerivedFeatures::from_draw).collect();
    }

    /// Les `n` premiers tirages (les plus anciens).
    pub fn head(&self, n: usize) -> DrawTable {
        let n = n.min(self.draws.len());
        DrawTable {
            columns: self.columns.clone(),
            has_dates: self.has_dates,
            draws: self.draws[..n].to_vec(),
            derived: self.derived[..n].to_vec(),
        }
    }

    /// Les `n` derniers tirages (les plus récents), dans l'ordre chronologique.
    pub fn tail(&self, n: usize) -> &[DrawRecord] {
        let start = self.draws.len().saturating_sub(n);
        &self.draws[start..]
    }

    /// Ajoute un tirage à la fin de l'historique. L'identifiant doit être supérieur au dernier.
    pub fn push(&mut self, draw: DrawRecord) -> anyhow::Result<()> {
        if let Some(last) = self.draws.last() {
            if draw.id <= last.id {
                anyhow::bail!(
                    "Identifiant {} non croissant (dernier : {})",
                    draw.id,
                    last.id
                );
            }
        }
        self.derived.push(DerivedFeatures::from_draw(&draw));
        self.draws.push(draw);
        Ok(())
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.draws.iter().filter_map(|d| d.date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}

pub fn derive_features(table: &mut DrawTable) {
    table.derive_features();
}
