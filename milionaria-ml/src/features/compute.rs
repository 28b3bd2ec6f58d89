use milionaria_data::{DrawRecord, DrawTable, Pool};

/// Comptes cumulés par valeur : `prefix[i][v - 1]` = apparitions de v dans les tirages [0, i).
pub fn prefix_counts(draws: &[DrawRecord], pool: Pool) -> Vec<Vec<u32>> {
    let size = pool.size();
    let mut prefix = Vec::with_capacity(draws.len() + 1);
    let mut running = vec![0u32; size];
    prefix.push(running.clone());
    for draw in draws {
        for &v in pool.numbers_from(draw) {
            running[v as usize - 1] += 1;
        }
        prefix.push(running.clone());
    }
    prefix
}

/// Fréquence de chaque valeur sur les `window` tirages strictement avant `i`,
/// rapportée au nombre de tirages de la fenêtre. Fenêtre vide => 0.
pub fn window_frequencies(prefix: &[Vec<u32>], i: usize, window: usize) -> Vec<f64> {
    let start = i.saturating_sub(window);
    let rows = i - start;
    if rows == 0 {
        return vec![0.0; prefix[0].len()];
    }
    prefix[i]
        .iter()
        .zip(&prefix[start])
        .map(|(&hi, &lo)| (hi - lo) as f64 / rows as f64)
        .collect()
}

/// Mois, jour de semaine (lundi = 0) et jours écoulés depuis le premier tirage daté.
/// NaN pour un tirage sans date.
pub fn calendar_features(table: &DrawTable) -> Vec<[f64; 3]> {
    let origin = table.draws().iter().filter_map(|d| d.date).min();
    table
        .draws()
        .iter()
        .zip(table.derived())
        .map(|(draw, derived)| match (draw.date, derived.month, derived.weekday, origin) {
            (Some(date), Some(month), Some(weekday), Some(origin)) => [
                month as f64,
                weekday as f64,
                (date - origin).num_days() as f64,
            ],
            _ => [f64::NAN; 3],
        })
        .collect()
}

/// Somme des numéros `lag` tirages plus tôt ; le début d'historique reçoit la moyenne de la table.
pub fn lagged_sums(table: &DrawTable, lag: usize) -> Vec<f64> {
    let sums: Vec<f64> = table.derived().iter().map(|d| d.sum as f64).collect();
    let mean = if sums.is_empty() {
        f64::NAN
    } else {
        sums.iter().sum::<f64>() / sums.len() as f64
    };
    (0..sums.len())
        .map(|i| if i >= lag { sums[i - lag] } else { mean })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use milionaria_data::make_test_table;

    #[test]
    fn test_prefix_counts_total() {
        let table = make_test_table(12);
        let prefix = prefix_counts(table.draws(), Pool::Numbers);
        assert_eq!(prefix.len(), 13);
        assert_eq!(prefix[0].iter().sum::<u32>(), 0);
        assert_eq!(prefix[12].iter().sum::<u32>(), 12 * 6);
    }

    #[test]
    fn test_window_excludes_current_row() {
        let table = make_test_table(3);
        let prefix = prefix_counts(table.draws(), Pool::Numbers);
        // La ligne 0 n'a aucun historique
        assert!(window_frequencies(&prefix, 0, 5).iter().all(|&f| f == 0.0));
        // La ligne 1 ne voit que le tirage 0
        let freq = window_frequencies(&prefix, 1, 5);
        for &v in &table.draws()[0].numbers {
            assert_eq!(freq[v as usize - 1], 1.0);
        }
        for &v in &table.draws()[1].numbers {
            if !table.draws()[0].numbers.contains(&v) {
                assert_eq!(freq[v as usize - 1], 0.0);
            }
        }
    }

    #[test]
    fn test_window_truncated_at_size() {
        let table = make_test_table(30);
        let prefix = prefix_counts(table.draws(), Pool::Clovers);
        let freq = window_frequencies(&prefix, 25, 5);
        // 5 tirages × 2 trèfles / 5 tirages
        assert!((freq.iter().sum::<f64>() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_calendar_features() {
        let table = make_test_table(3);
        let cal = calendar_features(&table);
        assert_eq!(cal[0][2], 0.0);
        assert_eq!(cal[2][2], 14.0);
        // 2024-01-06 est un samedi
        assert_eq!(cal[0][1], 5.0);
        assert_eq!(cal[0][0], 1.0);
    }

    #[test]
    fn test_lagged_sums_fill_with_mean() {
        let table = make_test_table(4);
        let sums: Vec<f64> = table.derived().iter().map(|d| d.sum as f64).collect();
        let mean = sums.iter().sum::<f64>() / 4.0;
        let lag2 = lagged_sums(&table, 2);
        assert_eq!(lag2[0], mean);
        assert_eq!(lag2[1], mean);
        assert_eq!(lag2[2], sums[0]);
        assert_eq!(lag2[3], sums[1]);
    }
}
