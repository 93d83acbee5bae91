//! Label encoding

use crate::error::{CliniqError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps class names to dense integer codes.
///
/// Classes are sorted lexicographically before assignment, so the encoding
/// depends only on the set of labels, never on row order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
    mapping: HashMap<String, usize>,
    is_fitted: bool,
}

impl Default for LabelEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            mapping: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Learn the class set from a batch of labels
    pub fn fit<S: AsRef<str>>(&mut self, labels: &[S]) -> Result<&mut Self> {
        if labels.is_empty() {
            return Err(CliniqError::InvalidInput(
                "cannot fit label encoder on an empty batch".to_string(),
            ));
        }

        let mut classes: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();

        self.mapping = classes
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        self.classes = classes;
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode labels to their integer codes (as f64, the numeric type every
    /// model in this crate trains on)
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(CliniqError::ModelNotFitted);
        }

        let mut encoded = Vec::with_capacity(labels.len());
        for label in labels {
            let name = label.as_ref();
            let idx = self.mapping.get(name).ok_or_else(|| {
                CliniqError::InvalidInput(format!("unseen label '{name}' in transform"))
            })?;
            encoded.push(*idx as f64);
        }
        Ok(Array1::from_vec(encoded))
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, labels: &[S]) -> Result<Array1<f64>> {
        self.fit(labels)?;
        self.transform(labels)
    }

    /// Decode integer codes back to class names
    pub fn inverse_transform(&self, y: &Array1<f64>) -> Result<Vec<String>> {
        if !self.is_fitted {
            return Err(CliniqError::ModelNotFitted);
        }

        y.iter()
            .map(|&code| {
                let idx = code.round() as usize;
                self.classes.get(idx).cloned().ok_or_else(|| {
                    CliniqError::InvalidInput(format!("code {code} out of range"))
                })
            })
            .collect()
    }

    /// Class names in code order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
