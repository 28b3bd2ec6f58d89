use thiserror::Error;

/// Structure de table d'entrée inexploitable.
#[derive(Debug, Error)]
pub enum DataFormatError {
    #[error("source illisible : {0}")]
    Unreadable(String),

    #[error("format de fichier non supporté : {0}")]
    UnsupportedFormat(String),

    #[error("table vide (aucune ligne de données)")]
    Empty,

    #[error("colonnes insuffisantes : {found} colonnes numériques, {required} requises")]
    NotEnoughColumns { required: usize, found: usize },

    #[error("colonnes '{token}' incomplètes : {found} trouvées, {required} requises")]
    IncompleteColumns {
        token: String,
        required: usize,
        found: usize,
    },

    #[error("aucun tirage valide parmi {rows} lignes")]
    NoValidRows { rows: usize },

    #[error("matrice de features incompatible : {expected} colonnes attendues, {found} obtenues")]
    FeatureMismatch { expected: usize, found: usize },
}
