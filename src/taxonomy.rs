//! Disease-category taxonomy
//!
//! Maps free-text physician diagnoses onto a fixed coarse taxonomy through an
//! ordered keyword table. The table is scanned in declaration order and the
//! first category with a matching term wins; anything unmatched lands in
//! [`DiseaseCategory::Other`]. The mapping is total and deterministic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse diagnostic class a physician diagnosis is bucketed into
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseCategory {
    Hypertension,
    Hypotension,
    Arrhythmia,
    Diabetes,
    Hypoglycemia,
    Infection,
    Digestive,
    Neurological,
    Other,
}

/// Keyword table in evaluation order. Earlier categories shadow later ones
/// when a diagnosis mentions terms from more than one.
const CATEGORY_KEYWORDS: &[(DiseaseCategory, &[&str])] = &[
    (
        DiseaseCategory::Hypertension,
        &["hypertension", "high blood pressure"],
    ),
    (
        DiseaseCategory::Hypotension,
        &["hypotension", "low blood pressure"],
    ),
    (
        DiseaseCategory::Arrhythmia,
        &["arrhythmia", "tachycardia", "bradycardia", "palpitation"],
    ),
    (
        DiseaseCategory::Diabetes,
        &["diabetes", "high blood sugar", "hyperglycemia"],
    ),
    (
        DiseaseCategory::Hypoglycemia,
        &["hypoglycemia", "low blood sugar"],
    ),
    (
        DiseaseCategory::Infection,
        &["infection", "inflammation", "sepsis"],
    ),
    (
        DiseaseCategory::Digestive,
        &["gastritis", "stomach", "bowel", "digest", "diarrhea", "constipation"],
    ),
    (
        DiseaseCategory::Neurological,
        &["headache", "migraine", "insomnia", "anxiety", "depression"],
    ),
];

impl DiseaseCategory {
    /// Every category, in taxonomy order
    pub const ALL: [DiseaseCategory; 9] = [
        DiseaseCategory::Hypertension,
        DiseaseCategory::Hypotension,
        DiseaseCategory::Arrhythmia,
        DiseaseCategory::Diabetes,
        DiseaseCategory::Hypoglycemia,
        DiseaseCategory::Infection,
        DiseaseCategory::Digestive,
        DiseaseCategory::Neurological,
        DiseaseCategory::Other,
    ];

    /// Map a free-text diagnosis to its category.
    ///
    /// Matching is case-folded substring search over the ordered keyword
    /// table; the first category with any matching term wins.
    pub fn from_diagnosis(diagnosis: &str) -> Self {
        let diagnosis = diagnosis.to_lowercase();
        for (category, keywords) in CATEGORY_KEYWORDS {
            if keywords.iter().any(|kw| diagnosis.contains(kw)) {
                return *category;
            }
        }
        DiseaseCategory::Other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseCategory::Hypertension => "hypertension",
            DiseaseCategory::Hypotension => "hypotension",
            DiseaseCategory::Arrhythmia => "arrhythmia",
            DiseaseCategory::Diabetes => "diabetes",
            DiseaseCategory::Hypoglycemia => "hypoglycemia",
            DiseaseCategory::Infection => "infection",
            DiseaseCategory::Digestive => "digestive",
            DiseaseCategory::Neurological => "neurological",
            DiseaseCategory::Other => "other",
        }
    }
}

impl fmt::Display for DiseaseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
