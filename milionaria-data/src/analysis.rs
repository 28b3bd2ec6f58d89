use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DrawRecord, Pool};
use crate::table::DrawTable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyAnalysis {
    pub numbers: BTreeMap<u8, usize>,
    pub clovers: BTreeMap<u8, usize>,
}

impl FrequencyAnalysis {
    pub fn for_pool(&self, pool: Pool) -> &BTreeMap<u8, usize> {
        match pool {
            Pool::Numbers => &self.numbers,
            Pool::Clovers => &self.clovers,
        }
    }

    /// Les `n` valeurs les plus fréquentes (à égalité, la plus petite d'abord).
    pub fn most_frequent(&self, pool: Pool, n: usize) -> Vec<(u8, usize)> {
        let mut entries: Vec<(u8, usize)> =
            self.for_pool(pool).iter().map(|(&v, &c)| (v, c)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub total_draws: usize,
    pub columns: Vec<String>,
    pub period: Option<(NaiveDate, NaiveDate)>,
}

/// Nombre d'apparitions de chaque valeur possible (zéro compris).
pub fn frequency_analysis(table: &DrawTable) -> FrequencyAnalysis {
    FrequencyAnalysis {
        numbers: count_pool(table.draws(), Pool::Numbers),
        clovers: count_pool(table.draws(), Pool::Clovers),
    }
}

fn count_pool(draws: &[DrawRecord], pool: Pool) -> BTreeMap<u8, usize> {
    let mut counts: BTreeMap<u8, usize> = (1..=pool.size() as u8).map(|v| (v, 0)).collect();
    for draw in draws {
        for &v in pool.numbers_from(draw) {
            *counts.entry(v).or_insert(0) += 1;
        }
    }
    counts
}

pub fn summary_info(table: &DrawTable) -> DataSummary {
    DataSummary {
        total_draws: table.len(),
        columns: table.columns().to_vec(),
        period: if table.has_dates() {
            table.date_range()
        } else {
            None
        },
    }
}

pub fn last_draws(table: &DrawTable, n: usize) -> &[DrawRecord] {
    table.tail(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{synthetic, SyntheticConfig};
    use crate::make_test_table;

    #[test]
    fn test_frequency_sums() {
        let table = make_test_table(37);
        let freq = frequency_analysis(&table);
        assert_eq!(freq.numbers.len(), 50);
        assert_eq!(freq.clovers.len(), 6);
        assert_eq!(freq.numbers.values().sum::<usize>(), 6 * 37);
        assert_eq!(freq.clovers.values().sum::<usize>(), 2 * 37);
    }

    #[test]
    fn test_frequency_counts_values() {
        let table = make_test_table(1);
        let freq = frequency_analysis(&table);
        for &n in &table.draws()[0].numbers {
            assert_eq!(freq.numbers[&n], 1);
        }
    }

    #[test]
    fn test_most_frequent_order() {
        let table = make_test_table(16);
        let freq = frequency_analysis(&table);
        let top = freq.most_frequent(Pool::Numbers, 3);
        assert_eq!(top.len(), 3);
        assert!(top[0].1 >= top[1].1 && top[1].1 >= top[2].1);
    }

    #[test]
    fn test_summary_info_synthetic() {
        let table = synthetic(&SyntheticConfig::default());
        let info = summary_info(&table);
        assert_eq!(info.total_draws, 100);
        assert_eq!(info.columns[0], "Concurso");
        assert_eq!(info.columns.len(), 10);
        let (start, end) = info.period.unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2022, 5, 28).unwrap());
        assert_eq!((end - start).num_days(), 99 * 7);
    }

    #[test]
    fn test_summary_without_dates() {
        let table = DrawTable::new(vec!["a".to_string()], false, make_test_table(5).draws().to_vec());
        assert_eq!(summary_info(&table).period, None);
    }

    #[test]
    fn test_last_draws() {
        let table = make_test_table(12);
        let last = last_draws(&table, 10);
        assert_eq!(last.len(), 10);
        assert_eq!(last[9].id, 12);
    }
}
