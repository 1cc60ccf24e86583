//! # Field Specifications and Extraction Results
//!
//! A `FieldSpec` maps a logical field name to a selector strategy plus a
//! post-processing step and a required/optional flag. An
//! `ExtractionResult` is the per-page record produced by the field
//! extractor: field name to value-or-absent, plus field-level
//! diagnostics. Results are created fresh per page and immutable after
//! construction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::selector::SelectorStrategy;

/// Tie-break policy when a probe yields multiple matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// First match in document order.
    #[default]
    First,
    /// Last match in document order (responsive-image lists conventionally
    /// put the highest-resolution source last).
    Last,
    /// Every match, deduplicated by resolved value (image galleries).
    All,
}

/// Where the raw value of a field is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// The element's text content.
    #[default]
    Text,
    /// A named attribute, e.g. `src` or `href`.
    Attribute(String),
}

/// Post-processing applied to the raw string read from the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcess {
    /// Trim and collapse whitespace.
    #[default]
    Trim,
    /// Parse a price-like string into a finite non-negative number.
    ParsePrice,
    /// Resolve against the page's base URL.
    NormalizeUrl,
}

/// A named field's strategy plus post-processing and required policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub strategy: SelectorStrategy,
    pub post_process: PostProcess,
    pub required: bool,
    pub policy: MatchPolicy,
    pub source: ValueSource,
}

impl FieldSpec {
    /// Creates an optional text field with trim post-processing.
    pub fn new(name: impl Into<String>, strategy: SelectorStrategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            post_process: PostProcess::Trim,
            required: false,
            policy: MatchPolicy::First,
            source: ValueSource::Text,
        }
    }

    /// Marks the field required. A missing required field rejects the
    /// whole record.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Parses the raw value as a price.
    #[must_use]
    pub fn parse_price(mut self) -> Self {
        self.post_process = PostProcess::ParsePrice;
        self
    }

    /// Normalizes the raw value as a URL against the page base.
    #[must_use]
    pub fn normalize_url(mut self) -> Self {
        self.post_process = PostProcess::NormalizeUrl;
        self
    }

    /// Reads the value from a named attribute instead of text content.
    #[must_use]
    pub fn from_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.source = ValueSource::Attribute(attribute.into());
        self
    }

    /// Selects the last match in document order.
    #[must_use]
    pub fn pick_last(mut self) -> Self {
        self.policy = MatchPolicy::Last;
        self
    }

    /// Collects every match, deduplicated by resolved value.
    #[must_use]
    pub fn pick_all(mut self) -> Self {
        self.policy = MatchPolicy::All;
        self
    }
}

/// A field value, or the explicit absent marker. An empty string is never
/// conflated with "not found".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Url(String),
    Many(Vec<String>),
    Absent,
}

impl FieldValue {
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Url(s) => Some(s),
            _ => None,
        }
    }
}

/// How a field's strategy evaluation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// A probe matched; `level` is 1-based, 1 = most stable probe.
    MatchedAt { level: usize },
    /// Every probe was tried without a match. `timed_out` records whether
    /// any probe wait expired rather than returning empty immediately.
    Exhausted { probes_tried: usize, timed_out: bool },
}

/// Field-level diagnostic attached to an extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiagnostic {
    pub field: String,
    pub outcome: ProbeOutcome,
}

/// The record extracted from one page: field name to value-or-absent plus
/// diagnostics. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub url: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub diagnostics: Vec<FieldDiagnostic>,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionResult {
    #[must_use]
    pub fn new(
        url: String,
        fields: BTreeMap<String, FieldValue>,
        diagnostics: Vec<FieldDiagnostic>,
    ) -> Self {
        Self {
            url,
            fields,
            diagnostics,
            extracted_at: Utc::now(),
        }
    }

    /// Value of a field, `Absent` when the field was never specified.
    #[must_use]
    pub fn value(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&FieldValue::Absent)
    }

    /// First required field that resolved to absent, if any.
    #[must_use]
    pub fn first_missing_required<'a>(&self, specs: &'a [FieldSpec]) -> Option<&'a str> {
        specs
            .iter()
            .filter(|spec| spec.required)
            .find(|spec| self.value(&spec.name).is_absent())
            .map(|spec| spec.name.as_str())
    }

    /// Record equality modulo the extraction timestamp; used for
    /// idempotence checks.
    #[must_use]
    pub fn same_record(&self, other: &Self) -> bool {
        self.url == other.url && self.fields == other.fields
    }

    /// Plain field-name to value mapping suitable for direct
    /// serialization by the caller (one JSON object per item).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "url": self.url,
            "fields": self.fields,
            "extracted_at": self.extracted_at,
        })
    }
}
