use milionaria_data::DataFormatError;
use thiserror::Error;

use crate::models::ModelFamily;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("données insuffisantes : {required} lignes requises, {available} disponibles")]
    InsufficientData { required: usize, available: usize },

    #[error("le modèle {0} n'a pas été entraîné")]
    ModelNotTrained(ModelFamily),

    #[error(transparent)]
    DataFormat(#[from] DataFormatError),

    #[error("persistance du modèle : {0}")]
    Persistence(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
