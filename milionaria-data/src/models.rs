use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const NUMBERS_PER_DRAW: usize = 6;
pub const CLOVERS_PER_DRAW: usize = 2;
pub const NUMBER_MAX: u8 = 50;
pub const CLOVER_MAX: u8 = 6;
/// Nombre de tranches de largeur égale couvrant [1, NUMBER_MAX].
pub const DECADE_BUCKETS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub id: u32,
    pub date: Option<NaiveDate>,
    pub numbers: [u8; NUMBERS_PER_DRAW],
    pub clovers: [u8; CLOVERS_PER_DRAW],
}

impl DrawRecord {
    pub fn new(
        id: u32,
        date: Option<NaiveDate>,
        numbers: [u8; NUMBERS_PER_DRAW],
        clovers: [u8; CLOVERS_PER_DRAW],
    ) -> Result<Self> {
        validate_draw(&numbers, &clovers)?;
        Ok(Self { id, date, numbers, clovers })
    }

    pub fn numbers_sum(&self) -> u32 {
        self.numbers.iter().map(|&n| n as u32).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pool {
    Numbers,
    Clovers,
}

impl Pool {
    pub fn size(&self) -> usize {
        match self {
            Pool::Numbers => NUMBER_MAX as usize,
            Pool::Clovers => CLOVER_MAX as usize,
        }
    }

    pub fn pick_count(&self) -> usize {
        match self {
            Pool::Numbers => NUMBERS_PER_DRAW,
            Pool::Clovers => CLOVERS_PER_DRAW,
        }
    }

    pub fn numbers_from<'a>(&self, draw: &'a DrawRecord) -> &'a [u8] {
        match self {
            Pool::Numbers => &draw.numbers,
            Pool::Clovers => &draw.clovers,
        }
    }
}

/// Résumé statistique d'un tirage, toujours recalculé depuis le `DrawRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub sum: u32,
    pub mean: f64,
    pub std: f64,
    pub min: u8,
    pub max: u8,
    pub amplitude: u8,
    pub clover_sum: u32,
    pub even: u8,
    pub odd: u8,
    pub decades: [u8; DECADE_BUCKETS],
    pub year: Option<i32>,
    pub month: Option<u32>,
    /// Lundi = 0
    pub weekday: Option<u32>,
}

impl DerivedFeatures {
    pub fn from_draw(draw: &DrawRecord) -> Self {
        let n = NUMBERS_PER_DRAW as f64;
        let sum = draw.numbers_sum();
        let mean = sum as f64 / n;
        // Écart-type échantillon (ddof = 1)
        let variance = draw
            .numbers
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        let min = draw.numbers.iter().copied().min().unwrap_or(0);
        let max = draw.numbers.iter().copied().max().unwrap_or(0);

        let even = draw.numbers.iter().filter(|&&x| x % 2 == 0).count() as u8;

        let width = NUMBER_MAX as usize / DECADE_BUCKETS;
        let mut decades = [0u8; DECADE_BUCKETS];
        for &x in &draw.numbers {
            let bucket = ((x as usize).saturating_sub(1) / width).min(DECADE_BUCKETS - 1);
            decades[bucket] += 1;
        }

        Self {
            sum,
            mean,
            std: variance.sqrt(),
            min,
            max,
            amplitude: max - min,
            clover_sum: draw.clovers.iter().map(|&c| c as u32).sum(),
            even,
            odd: NUMBERS_PER_DRAW as u8 - even,
            decades,
            year: draw.date.map(|d| d.year()),
            month: draw.date.map(|d| d.month()),
            weekday: draw.date.map(|d| d.weekday().num_days_from_monday()),
        }
    }
}

pub fn validate_draw(
    numbers: &[u8; NUMBERS_PER_DRAW],
    clovers: &[u8; CLOVERS_PER_DRAW],
) -> Result<()> {
    for &n in numbers {
        if n < 1 || n > NUMBER_MAX {
            bail!("Numéro {} hors limites (1-{})", n, NUMBER_MAX);
        }
    }
    for &c in clovers {
        if c < 1 || c > CLOVER_MAX {
            bail!("Trèfle {} hors limites (1-{})", c, CLOVER_MAX);
        }
    }
    for i in 0..numbers.len() {
        for j in (i + 1)..numbers.len() {
            if numbers[i] == numbers[j] {
                bail!("Numéro en double : {}", numbers[i]);
            }
        }
    }
    if clovers[0] == clovers[1] {
        bail!("Trèfle en double : {}", clovers[0]);
    }
    Ok(())
}
