//! Feature scaling

use crate::error::{CliniqError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Standardizes features to zero mean and unit variance.
///
/// Columns with zero variance keep a divisor of 1 so constant features pass
/// through unchanged instead of producing NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Array1<f64>,
    stds: Array1<f64>,
    is_fitted: bool,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            means: Array1::zeros(0),
            stds: Array1::zeros(0),
            is_fitted: false,
        }
    }

    /// Learn per-column centers and scales from the batch
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(CliniqError::InvalidInput(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let means = x.mean_axis(Axis(0)).ok_or_else(|| {
            CliniqError::InvalidInput("cannot fit scaler on an empty matrix".to_string())
        })?;

        let n = x.nrows() as f64;
        let mut stds = Array1::zeros(x.ncols());
        for (j, col) in x.axis_iter(Axis(1)).enumerate() {
            let mean = means[j];
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            stds[j] = if std == 0.0 { 1.0 } else { std };
        }

        self.means = means;
        self.stds = stds;
        self.is_fitted = true;
        Ok(self)
    }

    /// Apply the learned scaling
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(CliniqError::ModelNotFitted);
        }
        if x.ncols() != self.means.len() {
            return Err(CliniqError::ShapeError {
                expected: format!("{} columns", self.means.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let mean = self.means[j];
            let std = self.stds[j];
            col.mapv_inplace(|v| (v - mean) / std);
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Undo the scaling
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(CliniqError::ModelNotFitted);
        }
        if x.ncols() != self.means.len() {
            return Err(CliniqError::ShapeError {
                expected: format!("{} columns", self.means.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let mean = self.means[j];
            let std = self.stds[j];
            col.mapv_inplace(|v| v * std + mean);
        }
        Ok(out)
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
