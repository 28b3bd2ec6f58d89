use anyhow::Result;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{check_training_set, Regressor};
use crate::linalg::least_squares;

/// Moindres carrés avec intercept. Attend des entrées standardisées.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    ridge: f64,
    weights: Option<Array1<f64>>,
    intercept: f64,
}

impl LinearRegression {
    pub fn new(ridge: f64) -> Self {
        Self {
            ridge,
            weights: None,
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> Option<(&Array1<f64>, f64)> {
        self.weights.as_ref().map(|w| (w, self.intercept))
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_set(x, y)?;
        let (weights, intercept) = least_squares(x, y, self.ridge)?;
        self.weights = Some(weights);
        self.intercept = intercept;
        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match &self.weights {
            Some(w) if w.len() == row.len() => w.dot(&row) + self.intercept,
            _ => f64::NAN,
        }
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}
