use serde::{Deserialize, Serialize};

use crate::error::DataFormatError;
use crate::models::{CLOVERS_PER_DRAW, NUMBERS_PER_DRAW};
use crate::source::RawTable;

/// Sous-chaînes (sensibles à la casse) identifiant les colonnes de numéros.
pub const NUMBER_TOKENS: &[&str] = &["Num"];
pub const CLOVER_TOKENS: &[&str] = &["Trevo", "Clover"];
pub const ID_COLUMNS: &[&str] = &["Concurso"];
pub const DATE_COLUMNS: &[&str] = &["Data", "Date"];

/// Correspondance typée entre colonnes de la table brute et champs d'un tirage.
/// Résolue une seule fois au chargement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub id: Option<usize>,
    pub date: Option<usize>,
    pub numbers: [usize; NUMBERS_PER_DRAW],
    pub clovers: [usize; CLOVERS_PER_DRAW],
    /// Vrai si numéros ou trèfles ont été déduits par position.
    pub positional: bool,
}

pub fn resolve(raw: &RawTable) -> Result<ColumnMapping, DataFormatError> {
    if raw.headers.is_empty() {
        return Err(DataFormatError::Empty);
    }

    let id = find_exact(raw, ID_COLUMNS);
    let date = find_exact(raw, DATE_COLUMNS);
    let reserved = |col: usize| Some(col) == id || Some(col) == date;

    let named_numbers: Vec<usize> = find_containing(raw, NUMBER_TOKENS)
        .into_iter()
        .filter(|&c| !reserved(c))
        .collect();
    let named_clovers: Vec<usize> = find_containing(raw, CLOVER_TOKENS)
        .into_iter()
        .filter(|&c| !reserved(c) && !named_numbers.contains(&c))
        .collect();

    // Colonnes numériques hors identifiant et date, dans l'ordre du fichier
    let numeric: Vec<usize> = (0..raw.headers.len())
        .filter(|&c| !reserved(c) && raw.is_numeric_column(c))
        .collect();

    let mut positional = false;

    let numbers: Vec<usize> = if named_numbers.is_empty() {
        positional = true;
        let required = NUMBERS_PER_DRAW + CLOVERS_PER_DRAW;
        if numeric.len() < required {
            return Err(DataFormatError::NotEnoughColumns {
                required,
                found: numeric.len(),
            });
        }
        numeric[..NUMBERS_PER_DRAW].to_vec()
    } else if named_numbers.len() < NUMBERS_PER_DRAW {
        return Err(DataFormatError::IncompleteColumns {
            token: NUMBER_TOKENS.join("|"),
            required: NUMBERS_PER_DRAW,
            found: named_numbers.len(),
        });
    } else {
        named_numbers[..NUMBERS_PER_DRAW].to_vec()
    };

    let clovers: Vec<usize> = if named_clovers.len() >= CLOVERS_PER_DRAW {
        named_clovers[..CLOVERS_PER_DRAW].to_vec()
    } else {
        positional = true;
        let remaining: Vec<usize> = numeric
            .iter()
            .copied()
            .filter(|c| !numbers.contains(c))
            .take(CLOVERS_PER_DRAW)
            .collect();
        if remaining.len() < CLOVERS_PER_DRAW {
            return Err(DataFormatError::NotEnoughColumns {
                required: NUMBERS_PER_DRAW + CLOVERS_PER_DRAW,
                found: numbers.len() + remaining.len(),
            });
        }
        remaining
    };

    let mut mapping = ColumnMapping {
        id,
        date,
        numbers: [0; NUMBERS_PER_DRAW],
        clovers: [0; CLOVERS_PER_DRAW],
        positional,
    };
    mapping.numbers.copy_from_slice(&numbers);
    mapping.clovers.copy_from_slice(&clovers);
    Ok(mapping)
}

fn find_exact(raw: &RawTable, names: &[&str]) -> Option<usize> {
    raw.headers.iter().position(|h| names.contains(&h.as_str()))
}

fn find_containing(raw: &RawTable, tokens: &[&str]) -> Vec<usize> {
    raw.headers
        .iter()
        .enumerate()
        .filter(|(_, h)| tokens.iter().any(|t| h.contains(t)))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Cell;

    fn raw(headers: &[&str], rows: Vec<Vec<Cell>>) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    fn numbers_row(values: &[f64]) -> Vec<Cell> {
        values.iter().map(|&v| Cell::Number(v)).collect()
    }

    #[test]
    fn test_resolve_named_columns() {
        let table = raw(
            &["Concurso", "Data", "Num1", "Num2", "Num3", "Num4", "Num5", "Num6", "Trevo1", "Trevo2"],
            vec![],
        );
        let mapping = resolve(&table).unwrap();
        assert_eq!(mapping.id, Some(0));
        assert_eq!(mapping.date, Some(1));
        assert_eq!(mapping.numbers, [2, 3, 4, 5, 6, 7]);
        assert_eq!(mapping.clovers, [8, 9]);
        assert!(!mapping.positional);
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        // "num" ne correspond pas au jeton "Num" : repli positionnel
        let table = raw(
            &["Concurso", "num1", "num2", "num3", "num4", "num5", "num6", "t1", "t2"],
            vec![numbers_row(&[1.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 1.0, 2.0])],
        );
        let mapping = resolve(&table).unwrap();
        assert!(mapping.positional);
        assert_eq!(mapping.numbers, [1, 2, 3, 4, 5, 6]);
        assert_eq!(mapping.clovers, [7, 8]);
    }

    #[test]
    fn test_resolve_positional_skips_text_columns() {
        let mut row = vec![Cell::Number(1.0), Cell::Text("SAB".to_string())];
        row.extend(numbers_row(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 1.0, 2.0]));
        let table = raw(&["Concurso", "Jour", "a", "b", "c", "d", "e", "f", "g", "h"], vec![row]);
        let mapping = resolve(&table).unwrap();
        assert_eq!(mapping.numbers, [2, 3, 4, 5, 6, 7]);
        assert_eq!(mapping.clovers, [8, 9]);
    }

    #[test]
    fn test_resolve_not_enough_numeric_columns() {
        let table = raw(&["a", "b", "c"], vec![numbers_row(&[1.0, 2.0, 3.0])]);
        let err = resolve(&table).unwrap_err();
        assert!(matches!(
            err,
            DataFormatError::NotEnoughColumns { required: 8, found: 3 }
        ));
    }

    #[test]
    fn test_resolve_incomplete_named_numbers() {
        let table = raw(&["Num1", "Num2", "Trevo1", "Trevo2"], vec![]);
        assert!(matches!(
            resolve(&table).unwrap_err(),
            DataFormatError::IncompleteColumns { found: 2, .. }
        ));
    }

    #[test]
    fn test_resolve_named_numbers_positional_clovers() {
        let table = raw(
            &["Num1", "Num2", "Num3", "Num4", "Num5", "Num6", "x", "y"],
            vec![numbers_row(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 1.0, 2.0])],
        );
        let mapping = resolve(&table).unwrap();
        assert_eq!(mapping.clovers, [6, 7]);
        assert!(mapping.positional);
    }
}
