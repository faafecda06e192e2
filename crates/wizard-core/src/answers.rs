//! Provenance-aware answer store
//!
//! Every answer carries a provenance entry recording which mechanism wrote
//! it, when, and what it replaced. The merge rules protect operator intent:
//! - [`AnswerStore::set_answers`] replaces everything (first load / reset)
//! - [`AnswerStore::patch_answers`] never touches `user-edit` keys
//! - [`AnswerStore::reset_to_defaults`] is the only write allowed to
//!   overwrite `user-edit` keys, and keeps the old value for audit
//!
//! All operations are pure and return a new store; the backing `im` maps
//! share structure with the previous snapshot.

use chrono::{DateTime, Utc};
use im::OrdMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Answer values keyed by question id
pub type AnswerPatch = BTreeMap<String, Value>;

/// Mechanism that supplied an answer value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvenanceSource {
    /// Operator typed or picked the value
    UserEdit,
    /// Industry template default
    TemplateDefault,
    /// Question-level default
    QuestionDefault,
    /// Location enrichment lookup
    LocationEnrichment,
    /// Business detection
    BusinessDetection,
}

impl ProvenanceSource {
    /// Confidence weight of this source
    #[inline]
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            ProvenanceSource::UserEdit => 1.0,
            ProvenanceSource::LocationEnrichment => 0.8,
            ProvenanceSource::BusinessDetection => 0.7,
            ProvenanceSource::TemplateDefault | ProvenanceSource::QuestionDefault => 0.3,
        }
    }

    /// Check if this source is one of the default kinds
    #[inline]
    #[must_use]
    pub fn is_default(self) -> bool {
        matches!(
            self,
            ProvenanceSource::TemplateDefault | ProvenanceSource::QuestionDefault
        )
    }
}

/// Provenance metadata for one answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceEntry {
    /// Writer of the current value
    pub source: ProvenanceSource,
    /// When the current value was written
    pub timestamp: DateTime<Utc>,
    /// Value replaced by the current write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<Value>,
}

/// Result of a patch
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    /// Store after the patch
    pub store: AnswerStore,
    /// Keys written
    pub applied: Vec<String>,
    /// Keys dropped because the operator owns them
    pub skipped: Vec<String>,
}

/// Answers plus provenance; provenance keys are always a subset of answer keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerStore {
    answers: OrdMap<String, Value>,
    provenance: OrdMap<String, ProvenanceEntry>,
}

impl AnswerStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer for a key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.answers.get(key)
    }

    /// Numeric answer for a key
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.answers.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text answer for a key
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.answers.get(key).and_then(Value::as_str)
    }

    /// Provenance for a key
    #[inline]
    #[must_use]
    pub fn provenance(&self, key: &str) -> Option<&ProvenanceEntry> {
        self.provenance.get(key)
    }

    /// Current source for a key
    #[inline]
    #[must_use]
    pub fn source_of(&self, key: &str) -> Option<ProvenanceSource> {
        self.provenance.get(key).map(|p| p.source)
    }

    /// Check if a key holds a usable (non-null, non-blank) value
    #[must_use]
    pub fn is_answered(&self, key: &str) -> bool {
        match self.answers.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Answer map
    #[inline]
    #[must_use]
    pub fn answers(&self) -> &OrdMap<String, Value> {
        &self.answers
    }

    /// Provenance map
    #[inline]
    #[must_use]
    pub fn provenance_map(&self) -> &OrdMap<String, ProvenanceEntry> {
        &self.provenance
    }

    /// Number of answers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Replace every answer, stamping each key with `source`.
    ///
    /// Used for first load of a template's baseline or an explicit reset.
    #[must_use]
    pub fn set_answers(&self, answers: AnswerPatch, source: ProvenanceSource, at: DateTime<Utc>) -> Self {
        let mut next = Self::new();
        for (key, value) in answers {
            let previous_value = self.answers.get(&key).filter(|old| **old != value).cloned();
            next.provenance.insert(
                key.clone(),
                ProvenanceEntry {
                    source,
                    timestamp: at,
                    previous_value,
                },
            );
            next.answers.insert(key, value);
        }
        next
    }

    /// Merge enrichment values without clobbering operator edits.
    ///
    /// Keys whose current source is `user-edit` are dropped unless the patch
    /// itself is a `user-edit`.
    #[must_use]
    pub fn patch_answers(&self, patch: AnswerPatch, source: ProvenanceSource, at: DateTime<Utc>) -> PatchOutcome {
        let mut store = self.clone();
        let mut applied = Vec::new();
        let mut skipped = Vec::new();

        for (key, value) in patch {
            let owned_by_operator = self.source_of(&key) == Some(ProvenanceSource::UserEdit);
            if owned_by_operator && source != ProvenanceSource::UserEdit {
                tracing::debug!(key = %key, ?source, "patch dropped for operator-owned answer");
                skipped.push(key);
                continue;
            }
            store.write(key.clone(), value, source, at);
            applied.push(key);
        }

        PatchOutcome {
            store,
            applied,
            skipped,
        }
    }

    /// Record an operator edit
    #[must_use]
    pub fn set_user_answer(&self, key: impl Into<String>, value: Value, at: DateTime<Utc>) -> Self {
        let mut store = self.clone();
        store.write(key.into(), value, ProvenanceSource::UserEdit, at);
        store
    }

    /// Rewrite `keys` from recomputed defaults, overwriting operator edits.
    ///
    /// Keys without a default are set to `null`; the overwritten value is
    /// kept in `previous_value`.
    #[must_use]
    pub fn reset_to_defaults<'a>(
        &self,
        defaults: &BTreeMap<String, (Value, ProvenanceSource)>,
        keys: impl IntoIterator<Item = &'a str>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut store = self.clone();
        for key in keys {
            let (value, source) = defaults
                .get(key)
                .cloned()
                .unwrap_or((Value::Null, ProvenanceSource::QuestionDefault));
            if store.answers.get(key).is_none() && value.is_null() {
                continue;
            }
            store.write(key.to_string(), value, source, at);
        }
        store
    }

    /// Drop provenance entries whose answer is missing
    #[must_use]
    pub fn normalized(&self) -> Self {
        let provenance = self
            .provenance
            .iter()
            .filter(|(key, _)| self.answers.contains_key(*key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            answers: self.answers.clone(),
            provenance,
        }
    }

    fn write(&mut self, key: String, value: Value, source: ProvenanceSource, at: DateTime<Utc>) {
        let previous_value = self.answers.get(&key).cloned();
        self.provenance.insert(
            key.clone(),
            ProvenanceEntry {
                source,
                timestamp: at,
                previous_value,
            },
        );
        self.answers.insert(key, value);
    }
}
