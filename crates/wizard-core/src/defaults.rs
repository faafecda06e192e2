//! Baseline default computation
//!
//! One canonical merge order is used everywhere defaults are computed
//! (first load, per-part application, reset):
//!
//! 1. question-level defaults
//! 2. template-level defaults
//! 3. location enrichment
//! 4. business detection
//!
//! Later layers win. Layers 3 and 4 only contribute keys the template asks.

use crate::answers::{AnswerPatch, AnswerStore, ProvenanceSource};
use crate::intel::LocationIntel;
use crate::template::QuestionTemplate;
use crate::types::BusinessCard;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which questions a default operation covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "partId", rename_all = "camelCase")]
pub enum DefaultsScope {
    /// Whole form
    All,
    /// One template part
    Part(String),
}

/// Inputs to default computation
#[derive(Debug, Clone, Copy)]
pub struct DefaultsContext<'a> {
    /// Loaded template
    pub template: &'a QuestionTemplate,
    /// Current enrichment
    pub intel: &'a LocationIntel,
    /// Detected business, if any
    pub business: Option<&'a BusinessCard>,
}

impl<'a> DefaultsContext<'a> {
    /// Create context
    #[inline]
    #[must_use]
    pub fn new(
        template: &'a QuestionTemplate,
        intel: &'a LocationIntel,
        business: Option<&'a BusinessCard>,
    ) -> Self {
        Self {
            template,
            intel,
            business,
        }
    }

    /// Default layers in canonical order
    #[must_use]
    pub fn layers(&self) -> Vec<(ProvenanceSource, AnswerPatch)> {
        let question_defaults = self
            .template
            .questions()
            .filter_map(|q| q.default.clone().map(|v| (q.id.clone(), v)))
            .collect();
        let template_defaults = self.template.defaults.clone();
        let intel = self.known_only(self.intel.answer_patch());
        let business = self
            .business
            .map(|b| self.known_only(b.answer_hints.clone()))
            .unwrap_or_default();

        vec![
            (ProvenanceSource::QuestionDefault, question_defaults),
            (ProvenanceSource::TemplateDefault, template_defaults),
            (ProvenanceSource::LocationEnrichment, intel),
            (ProvenanceSource::BusinessDetection, business),
        ]
    }

    /// Flattened defaults with the source that won for each key
    #[must_use]
    pub fn resolved(&self) -> BTreeMap<String, (Value, ProvenanceSource)> {
        let mut resolved = BTreeMap::new();
        for (source, layer) in self.layers() {
            for (key, value) in layer {
                resolved.insert(key, (value, source));
            }
        }
        resolved
    }

    /// Default for one question
    #[must_use]
    pub fn default_for(&self, key: &str) -> Option<(Value, ProvenanceSource)> {
        self.resolved().remove(key)
    }

    /// Question ids covered by `scope`
    #[must_use]
    pub fn scope_keys(&self, scope: &DefaultsScope) -> Vec<&'a str> {
        let template: &'a QuestionTemplate = self.template;
        match scope {
            DefaultsScope::All => template.questions().map(|q| q.id.as_str()).collect(),
            DefaultsScope::Part(id) => template
                .part(id)
                .map(|p| p.questions.iter().map(|q| q.id.as_str()).collect())
                .unwrap_or_default(),
        }
    }

    /// Seed a fresh answer store from all layers
    #[must_use]
    pub fn seed(&self, at: DateTime<Utc>) -> AnswerStore {
        let mut layers = self.layers().into_iter();
        let mut store = match layers.next() {
            Some((source, first)) => AnswerStore::new().set_answers(first, source, at),
            None => AnswerStore::new(),
        };
        for (source, layer) in layers {
            if !layer.is_empty() {
                store = store.patch_answers(layer, source, at).store;
            }
        }
        store
    }

    fn known_only(&self, patch: AnswerPatch) -> AnswerPatch {
        patch
            .into_iter()
            .filter(|(key, _)| self.template.has_question(key))
            .collect()
    }
}
