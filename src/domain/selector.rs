//! # Selector Strategies
//!
//! A selector strategy is an ordered, composable description of "where to
//! look for a field", independent of any single page's markup. Each entry
//! is a typed probe; probes are tried in priority order (most stable
//! first) and evaluation stops at the first probe yielding at least one
//! match.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One concrete rule for locating elements on a page.
///
/// Probes are interpreted by the page-access collaborator; this type is
/// the wire format of that contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Probe {
    /// Exact attribute match, e.g. `data-testid="product-title"`.
    AttributeExact { name: String, value: String },

    /// Attribute substring match, e.g. a partial class token.
    AttributeContains { name: String, fragment: String },

    /// Accessible role, optionally narrowed by a regex over the
    /// accessible name.
    Role {
        role: String,
        name_pattern: Option<String>,
    },

    /// Regex over the element's own text content.
    TextPattern { pattern: String },

    /// Tag name with optional ancestor/descendant context tokens
    /// (a tag name or class token).
    Structural {
        tag: String,
        ancestor: Option<String>,
        descendant: Option<String>,
    },
}

impl Probe {
    /// Exact attribute probe.
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AttributeExact {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Attribute substring probe.
    pub fn attribute_contains(name: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::AttributeContains {
            name: name.into(),
            fragment: fragment.into(),
        }
    }

    /// Accessible-role probe.
    pub fn role(role: impl Into<String>, name_pattern: Option<&str>) -> Self {
        Self::Role {
            role: role.into(),
            name_pattern: name_pattern.map(str::to_string),
        }
    }

    /// Text-content probe.
    pub fn text(pattern: impl Into<String>) -> Self {
        Self::TextPattern {
            pattern: pattern.into(),
        }
    }

    /// Structural probe.
    pub fn structural(
        tag: impl Into<String>,
        ancestor: Option<&str>,
        descendant: Option<&str>,
    ) -> Self {
        Self::Structural {
            tag: tag.into(),
            ancestor: ancestor.map(str::to_string),
            descendant: descendant.map(str::to_string),
        }
    }

    /// Compact description used in diagnostics and logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::AttributeExact { name, value } => format!("attr[{name}={value}]"),
            Self::AttributeContains { name, fragment } => format!("attr[{name}*={fragment}]"),
            Self::Role { role, name_pattern } => match name_pattern {
                Some(p) => format!("role[{role} name~/{p}/]"),
                None => format!("role[{role}]"),
            },
            Self::TextPattern { pattern } => format!("text~/{pattern}/"),
            Self::Structural {
                tag,
                ancestor,
                descendant,
            } => {
                let mut out = format!("tag[{tag}");
                if let Some(a) = ancestor {
                    out.push_str(&format!(" in {a}"));
                }
                if let Some(d) = descendant {
                    out.push_str(&format!(" having {d}"));
                }
                out.push(']');
                out
            }
        }
    }

    /// Returns the regex pattern carried by this probe, if any.
    fn pattern(&self) -> Option<&str> {
        match self {
            Self::Role {
                name_pattern: Some(p),
                ..
            } => Some(p.as_str()),
            Self::TextPattern { pattern } => Some(pattern.as_str()),
            _ => None,
        }
    }
}

/// Errors raised while constructing a strategy.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("a selector strategy requires at least one probe")]
    EmptyStrategy,

    #[error("invalid pattern in probe {probe}: {source}")]
    InvalidPattern {
        probe: String,
        source: regex::Error,
    },
}

/// An ordered, immutable list of probes for one logical field.
///
/// Probe grouping is an explicit, validated list: construction fails on an
/// empty list or on a probe carrying a malformed regex, so fallback
/// precedence is always auditable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorStrategy {
    probes: Vec<Probe>,
}

impl SelectorStrategy {
    /// Builds a strategy from probes in priority order.
    ///
    /// # Errors
    /// Fails if the list is empty or any probe carries an invalid regex.
    pub fn new(probes: Vec<Probe>) -> Result<Self, StrategyError> {
        if probes.is_empty() {
            return Err(StrategyError::EmptyStrategy);
        }
        for probe in &probes {
            if let Some(pattern) = probe.pattern() {
                Regex::new(pattern).map_err(|source| StrategyError::InvalidPattern {
                    probe: probe.describe(),
                    source,
                })?;
            }
        }
        Ok(Self { probes })
    }

    /// Single-probe convenience constructor.
    ///
    /// # Errors
    /// Fails if the probe carries an invalid regex.
    pub fn single(probe: Probe) -> Result<Self, StrategyError> {
        Self::new(vec![probe])
    }

    /// Probes in priority order (most stable first).
    #[must_use]
    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    /// Number of fallback levels.
    #[must_use]
    pub fn levels(&self) -> usize {
        self.probes.len()
    }
}
