//! Confidence scoring over answer provenance
//!
//! Each answered field is weighted by the mechanism that supplied it; the
//! weighted mean is the overall confidence. Completeness is measured over
//! the template's required questions only.

use crate::answers::{AnswerStore, ProvenanceSource};
use crate::template::QuestionTemplate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confidence attached to a quote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceRecord {
    /// Weighted mean of source weights (0.0 - 1.0)
    pub overall: f64,
    /// Answered required / required (0.0 - 1.0)
    pub completeness: f64,
    /// Number of answered fields
    pub answered: usize,
    /// Number of required questions
    pub required_total: usize,
    /// Number of required questions answered
    pub required_answered: usize,
    /// Answered fields per source
    pub by_source: BTreeMap<ProvenanceSource, usize>,
}

/// Score a store against an optional template
#[must_use]
pub fn score(store: &AnswerStore, template: Option<&QuestionTemplate>) -> ConfidenceRecord {
    let mut by_source: BTreeMap<ProvenanceSource, usize> = BTreeMap::new();
    let mut weight_sum = 0.0;
    let mut answered = 0usize;

    for key in store.answers().keys() {
        if !store.is_answered(key) {
            continue;
        }
        // Values without provenance came from a restored snapshot; treat as defaults.
        let source = store
            .source_of(key)
            .unwrap_or(ProvenanceSource::QuestionDefault);
        weight_sum += source.weight();
        answered += 1;
        *by_source.entry(source).or_default() += 1;
    }

    let overall = if answered == 0 {
        0.0
    } else {
        weight_sum / answered as f64
    };

    let (required_total, required_answered) = template.map_or((0, 0), |t| {
        t.required_ids().fold((0, 0), |(total, done), id| {
            (total + 1, done + usize::from(store.is_answered(id)))
        })
    });
    let completeness = if required_total == 0 {
        1.0
    } else {
        required_answered as f64 / required_total as f64
    };

    ConfidenceRecord {
        overall,
        completeness,
        answered,
        required_total,
        required_answered,
        by_source,
    }
}
