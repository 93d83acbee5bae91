//! Hyperparameter grids
//!
//! Every trainer declares its search space as a [`ParamGrid`]: named axes of
//! discrete values, expanded to the full cartesian product. Axes keep
//! declaration order and the product enumerates the last axis fastest, so
//! candidate order (and therefore tie-breaking during search) is
//! deterministic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Text(String),
    /// Explicitly absent, e.g. an unlimited tree depth
    Unset,
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v}"),
            ParamValue::Unset => write!(f, "none"),
        }
    }
}

/// A full hyperparameter assignment for one candidate fit
pub type Candidate = HashMap<String, ParamValue>;

/// Render a candidate as `name=value` pairs in stable order, for logs
pub fn describe(candidate: &Candidate) -> String {
    let mut pairs: Vec<(&String, &ParamValue)> = candidate.iter().collect();
    pairs.sort_by_key(|(name, _)| name.as_str());
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Exhaustive grid over named axes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamGrid {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis with explicit values
    pub fn axis(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.axes.push((name.to_string(), values));
        self
    }

    pub fn floats(self, name: &str, values: &[f64]) -> Self {
        self.axis(name, values.iter().map(|&v| ParamValue::Float(v)).collect())
    }

    pub fn ints(self, name: &str, values: &[i64]) -> Self {
        self.axis(name, values.iter().map(|&v| ParamValue::Int(v)).collect())
    }

    pub fn texts(self, name: &str, values: &[&str]) -> Self {
        self.axis(
            name,
            values.iter().map(|v| ParamValue::Text(v.to_string())).collect(),
        )
    }

    /// Number of candidates the grid expands to
    pub fn n_candidates(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|(_, values)| values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.n_candidates() == 0
    }

    /// Expand to the full cartesian product, in deterministic order
    pub fn candidates(&self) -> Vec<Candidate> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut out = vec![Candidate::new()];
        for (name, values) in &self.axes {
            let mut next = Vec::with_capacity(out.len() * values.len());
            for partial in &out {
                for value in values {
                    let mut candidate = partial.clone();
                    candidate.insert(name.clone(), value.clone());
                    next.push(candidate);
                }
            }
            out = next;
        }
        out
    }
}
