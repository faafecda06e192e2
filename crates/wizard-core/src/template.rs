//! Industry question templates
//!
//! A template is an ordered list of parts (profile sub-sections), each with
//! questions carrying a kind, an optional question-level default and a
//! required flag. Templates may also carry template-level defaults that
//! override question defaults for that industry.

use crate::error::TemplateError;
use crate::types::IndustrySlug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Question input kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    /// Numeric input
    Number {
        /// Display unit
        #[serde(default)]
        unit: Option<String>,
        /// Lower bound
        #[serde(default)]
        min: Option<f64>,
        /// Upper bound
        #[serde(default)]
        max: Option<f64>,
    },
    /// Single choice
    Select {
        /// Allowed values
        options: Vec<SelectOption>,
    },
    /// Boolean
    Toggle,
    /// Free text
    Text,
}

/// Option of a select question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Stored value
    pub value: String,
    /// Display label
    pub label: String,
}

fn default_true() -> bool {
    true
}

/// A single profile question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Answer key
    pub id: String,
    /// Prompt text
    pub label: String,
    /// Input kind
    #[serde(flatten)]
    pub kind: QuestionKind,
    /// Question-level default
    #[serde(default)]
    pub default: Option<Value>,
    /// Must be answered before the profile can be completed
    #[serde(default)]
    pub required: bool,
    /// Contributes to the pricing request key
    #[serde(default = "default_true")]
    pub pricing_input: bool,
    /// Help text
    #[serde(default)]
    pub help_text: Option<String>,
}

impl Question {
    /// Create a numeric question
    #[must_use]
    pub fn number(id: impl Into<String>, label: impl Into<String>, unit: Option<&str>) -> Self {
        Self::new(
            id,
            label,
            QuestionKind::Number {
                unit: unit.map(str::to_string),
                min: None,
                max: None,
            },
        )
    }

    /// Create a select question
    #[must_use]
    pub fn select(id: impl Into<String>, label: impl Into<String>, options: &[(&str, &str)]) -> Self {
        let options = options
            .iter()
            .map(|(value, label)| SelectOption {
                value: (*value).to_string(),
                label: (*label).to_string(),
            })
            .collect();
        Self::new(id, label, QuestionKind::Select { options })
    }

    fn new(id: impl Into<String>, label: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            default: None,
            required: false,
            pricing_input: true,
            help_text: None,
        }
    }

    /// With default value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Mark as required
    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Exclude from the pricing request key
    #[inline]
    #[must_use]
    pub fn not_pricing_input(mut self) -> Self {
        self.pricing_input = false;
        self
    }

    /// Check whether a value fits this question's kind
    ///
    /// # Errors
    /// Returns the reason the value was rejected.
    pub fn accepts(&self, value: &Value) -> Result<(), String> {
        match (&self.kind, value) {
            (_, Value::Null) => Ok(()),
            (QuestionKind::Number { min, max, .. }, Value::Number(n)) => {
                let n = n.as_f64().unwrap_or(f64::NAN);
                if min.is_some_and(|lo| n < lo) || max.is_some_and(|hi| n > hi) {
                    Err(format!("{n} is out of range"))
                } else {
                    Ok(())
                }
            }
            (QuestionKind::Select { options }, Value::String(s)) => {
                if options.iter().any(|o| &o.value == s) {
                    Ok(())
                } else {
                    Err(format!("{s} is not an option"))
                }
            }
            (QuestionKind::Toggle, Value::Bool(_)) | (QuestionKind::Text, Value::String(_)) => {
                Ok(())
            }
            (_, other) => Err(format!("unexpected value {other}")),
        }
    }
}

/// Profile sub-section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatePart {
    /// Part identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Questions in display order
    pub questions: Vec<Question>,
}

/// Question template for one industry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionTemplate {
    /// Industry this template belongs to
    pub industry: IndustrySlug,
    /// Content version
    #[serde(default)]
    pub version: String,
    /// Ordered parts
    pub parts: Vec<TemplatePart>,
    /// Template-level defaults (question id -> value)
    #[serde(default)]
    pub defaults: BTreeMap<String, Value>,
    /// Built locally because the real template could not be fetched
    #[serde(default)]
    pub fallback: bool,
}

impl QuestionTemplate {
    /// Validate structural invariants
    ///
    /// # Errors
    /// Returns the first [`TemplateError`] found.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.parts.is_empty() {
            return Err(TemplateError::Empty(self.industry.to_string()));
        }

        let mut part_ids = BTreeSet::new();
        let mut question_ids = BTreeSet::new();
        for part in &self.parts {
            if !part_ids.insert(part.id.as_str()) {
                return Err(TemplateError::DuplicatePart(part.id.clone()));
            }
            for question in &part.questions {
                if !question_ids.insert(question.id.as_str()) {
                    return Err(TemplateError::DuplicateQuestion(question.id.clone()));
                }
                if let Some(default) = &question.default {
                    question
                        .accepts(default)
                        .map_err(|reason| TemplateError::InvalidDefault {
                            question: question.id.clone(),
                            reason,
                        })?;
                }
            }
        }

        for (key, value) in &self.defaults {
            let question = self
                .question(key)
                .ok_or_else(|| TemplateError::UnknownDefault(key.clone()))?;
            question
                .accepts(value)
                .map_err(|reason| TemplateError::InvalidDefault {
                    question: key.clone(),
                    reason,
                })?;
        }

        Ok(())
    }

    /// Iterate all questions in display order
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.parts.iter().flat_map(|p| p.questions.iter())
    }

    /// Find a question by id
    #[must_use]
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions().find(|q| q.id == id)
    }

    /// Find a part by id
    #[must_use]
    pub fn part(&self, id: &str) -> Option<&TemplatePart> {
        self.parts.iter().find(|p| p.id == id)
    }

    /// Ids of required questions
    pub fn required_ids(&self) -> impl Iterator<Item = &str> {
        self.questions().filter(|q| q.required).map(|q| q.id.as_str())
    }

    /// Check if a question id belongs to this template
    #[inline]
    #[must_use]
    pub fn has_question(&self, id: &str) -> bool {
        self.question(id).is_some()
    }

    /// Generic template used when the industry template cannot be fetched
    #[must_use]
    pub fn generic(industry: IndustrySlug) -> Self {
        let facility = TemplatePart {
            id: "facility".to_string(),
            title: "Facility".to_string(),
            questions: vec![
                Question::number("facilitySize", "Facility size (sq ft)", Some("sq ft"))
                    .with_default(10_000),
                Question::number("operatingHours", "Daily operating hours", Some("hours"))
                    .with_default(12)
                    .required(),
                Question::number("peakLoad", "Peak power demand (if known)", Some("MW"))
                    .with_default(0),
                Question::select(
                    "gridConnection",
                    "Grid connection quality",
                    &[
                        ("reliable", "Reliable Grid"),
                        ("unreliable", "Unreliable Grid"),
                        ("limited", "Limited Capacity"),
                        ("off_grid", "Off-Grid"),
                        ("microgrid", "Microgrid"),
                    ],
                )
                .with_default("reliable")
                .required(),
                Question::number("gridCapacity", "Grid connection capacity (if limited)", Some("MW"))
                    .with_default(0),
            ],
        };
        let energy = TemplatePart {
            id: "energy".to_string(),
            title: "Energy costs".to_string(),
            questions: vec![
                Question::number("electricityRate", "Electricity rate", Some("$/kWh"))
                    .with_default(0.15),
                Question::number("demandCharge", "Demand charge", Some("$/kW"))
                    .with_default(15),
                Question::number("peakSunHours", "Peak sun hours", Some("h/day")),
            ],
        };
        Self {
            industry,
            version: "generic".to_string(),
            parts: vec![facility, energy],
            defaults: BTreeMap::new(),
            fallback: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generic_template_is_valid() {
        let template = QuestionTemplate::generic(IndustrySlug::new("hotel"));
        assert!(template.validate().is_ok());
        assert!(template.fallback);
        assert!(template.has_question("electricityRate"));
        let required: Vec<_> = template.required_ids().collect();
        assert_eq!(required, vec!["operatingHours", "gridConnection"]);
    }

    #[test]
    fn generic_load_questions_are_in_megawatts() {
        let template = QuestionTemplate::generic(IndustrySlug::new("hotel"));
        for id in ["peakLoad", "gridCapacity"] {
            let question = template.question(id).unwrap();
            assert!(
                matches!(&question.kind, QuestionKind::Number { unit: Some(unit), .. } if unit == "MW")
            );
            assert_eq!(question.default, Some(json!(0)));
        }
    }

    #[test]
    fn duplicate_question_rejected() {
        let mut template = QuestionTemplate::generic(IndustrySlug::new("hotel"));
        let dup = template.parts[0].questions[0].clone();
        template.parts[1].questions.push(dup);
        assert_eq!(
            template.validate(),
            Err(TemplateError::DuplicateQuestion("facilitySize".into()))
        );
    }

    #[test]
    fn invalid_select_default_rejected() {
        let mut template = QuestionTemplate::generic(IndustrySlug::new("hotel"));
        template
            .defaults
            .insert("gridConnection".into(), json!("lunar"));
        assert!(matches!(
            template.validate(),
            Err(TemplateError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn unknown_template_default_rejected() {
        let mut template = QuestionTemplate::generic(IndustrySlug::new("hotel"));
        template.defaults.insert("roomCount".into(), json!(100));
        assert_eq!(
            template.validate(),
            Err(TemplateError::UnknownDefault("roomCount".into()))
        );
    }

    #[test]
    fn question_deserializes_flattened_kind() {
        let question: Question = serde_json::from_value(json!({
            "id": "roomCount",
            "label": "Number of rooms",
            "type": "number",
            "unit": "rooms",
            "default": 150,
            "required": true
        }))
        .unwrap();
        assert!(question.required);
        assert!(question.pricing_input);
        assert!(matches!(question.kind, QuestionKind::Number { .. }));
    }
}
