pub mod analysis;
pub mod error;
pub mod loader;
pub mod models;
pub mod schema;
pub mod source;
pub mod table;

pub use analysis::{frequency_analysis, last_draws, summary_info, DataSummary, FrequencyAnalysis};
pub use error::DataFormatError;
pub use loader::{load, try_load, DataOrigin, LoadMetadata, SyntheticConfig};
pub use models::{DerivedFeatures, DrawRecord, Pool};
pub use source::DataSource;
pub use table::{derive_features, DrawTable};

use chrono::{Duration, NaiveDate};
use models::{CLOVERS_PER_DRAW, NUMBERS_PER_DRAW};

/// Table déterministe pour les tests : tirages hebdomadaires valides, motifs répétés.
pub fn make_test_table(n: usize) -> DrawTable {
    let start = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap_or_default();
    let draws = (0..n)
        .map(|i| {
            let base = (i % 8) as u8;
            let shift = ((i / 8) % 2) as u8;
            let mut numbers = [0u8; NUMBERS_PER_DRAW];
            for (j, n) in numbers.iter_mut().enumerate() {
                *n = base * 6 + j as u8 + 1 + shift;
            }
            let clovers: [u8; CLOVERS_PER_DRAW] = [base % 6 + 1, (base + 1) % 6 + 1];
            DrawRecord {
                id: (i + 1) as u32,
                date: Some(start + Duration::days(7 * i as i64)),
                numbers,
                clovers,
            }
        })
        .collect();
    DrawTable::new(loader::standard_columns(), true, draws)
}
