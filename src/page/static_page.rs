//! # Static Page Collaborator
//!
//! Adapts a fixed HTML snapshot (parsed by the `scraper` crate) to the
//! [`PageAccess`] contract. The reference collaborator for extraction
//! over already-fetched pages: probes resolve immediately, activation
//! never changes the document and the content extent never grows.
//!
//! Node handles are document-order element indices, recomputed from the
//! stored source on every call so handles stay stable without keeping a
//! non-`Send` DOM tree alive across awaits.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};

use crate::domain::selector::Probe;
use crate::page::{LoadSignal, NodeHandle, PageAccess, PageError};

/// A fixed HTML snapshot with a URL.
pub struct StaticPage {
    url: String,
    source: String,
}

impl StaticPage {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }

    fn with_dom<T>(&self, f: impl FnOnce(&Html) -> T) -> T {
        let dom = Html::parse_document(&self.source);
        f(&dom)
    }

    fn elements(dom: &Html) -> impl Iterator<Item = ElementRef<'_>> {
        dom.root_element().descendants().filter_map(ElementRef::wrap)
    }

    fn element_at(dom: &Html, index: u64) -> Option<ElementRef<'_>> {
        Self::elements(dom).nth(index as usize)
    }

    fn find_matches(dom: &Html, matcher: &ProbeMatcher) -> Vec<NodeHandle> {
        Self::elements(dom)
            .enumerate()
            .filter(|(_, el)| matcher.matches(*el))
            .map(|(ix, _)| NodeHandle::new(ix as u64))
            .collect()
    }

    fn interactable(el: ElementRef<'_>) -> bool {
        let v = el.value();
        if v.attr("disabled").is_some() || v.attr("hidden").is_some() {
            return false;
        }
        if v.attr("aria-disabled") == Some("true") {
            return false;
        }
        !v.attr("style")
            .is_some_and(|style| style.replace(' ', "").contains("display:none"))
    }
}

/// Probe with patterns compiled once per query.
enum ProbeMatcher<'a> {
    AttributeExact {
        name: &'a str,
        value: &'a str,
    },
    AttributeContains {
        name: &'a str,
        fragment: &'a str,
    },
    Role {
        role: &'a str,
        name_pattern: Option<Regex>,
    },
    TextPattern {
        pattern: Regex,
    },
    Structural {
        tag: &'a str,
        ancestor: Option<&'a str>,
        descendant: Option<&'a str>,
    },
}

impl<'a> ProbeMatcher<'a> {
    fn compile(probe: &'a Probe) -> Result<Self, PageError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| PageError::Collaborator(format!("invalid probe pattern: {e}")))
        };
        Ok(match probe {
            Probe::AttributeExact { name, value } => Self::AttributeExact { name, value },
            Probe::AttributeContains { name, fragment } => {
                Self::AttributeContains { name, fragment }
            }
            Probe::Role { role, name_pattern } => Self::Role {
                role,
                name_pattern: name_pattern.as_deref().map(compile).transpose()?,
            },
            Probe::TextPattern { pattern } => Self::TextPattern {
                pattern: compile(pattern)?,
            },
            Probe::Structural {
                tag,
                ancestor,
                descendant,
            } => Self::Structural {
                tag,
                ancestor: ancestor.as_deref(),
                descendant: descendant.as_deref(),
            },
        })
    }

    fn matches(&self, el: ElementRef<'_>) -> bool {
        match self {
            Self::AttributeExact { name, value } => el.value().attr(name) == Some(*value),
            Self::AttributeContains { name, fragment } => el
                .value()
                .attr(name)
                .is_some_and(|attr| attr.contains(*fragment)),
            Self::Role { role, name_pattern } => {
                accessible_role(el) == Some(*role)
                    && name_pattern
                        .as_ref()
                        .is_none_or(|p| p.is_match(&accessible_name(el)))
            }
            Self::TextPattern { pattern } => pattern.is_match(&own_text(el)),
            Self::Structural {
                tag,
                ancestor,
                descendant,
            } => {
                el.value().name() == *tag
                    && ancestor.is_none_or(|token| {
                        el.ancestors()
                            .filter_map(ElementRef::wrap)
                            .any(|a| token_matches(a, token))
                    })
                    && descendant.is_none_or(|token| {
                        el.descendants()
                            .skip(1)
                            .filter_map(ElementRef::wrap)
                            .any(|d| token_matches(d, token))
                    })
            }
        }
    }
}

/// Tag name or class token match, used for structural context.
fn token_matches(el: ElementRef<'_>, token: &str) -> bool {
    el.value().name() == token || el.value().classes().any(|class| class == token)
}

/// Explicit `role` attribute, else the implicit role of common elements.
fn accessible_role<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    if let Some(explicit) = el.value().attr("role") {
        return Some(explicit);
    }
    match el.value().name() {
        "a" => el.value().attr("href").is_some().then_some("link"),
        "button" => Some("button"),
        "img" => Some("img"),
        "nav" => Some("navigation"),
        "main" => Some("main"),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("heading"),
        "ul" | "ol" => Some("list"),
        "li" => Some("listitem"),
        "select" => Some("combobox"),
        "textarea" => Some("textbox"),
        "input" => match el.value().attr("type").unwrap_or("text") {
            "button" | "submit" | "reset" => Some("button"),
            "checkbox" => Some("checkbox"),
            "radio" => Some("radio"),
            _ => Some("textbox"),
        },
        _ => None,
    }
}

fn accessible_name(el: ElementRef<'_>) -> String {
    el.value()
        .attr("aria-label")
        .map(str::to_string)
        .unwrap_or_else(|| own_text(el))
}

fn own_text(el: ElementRef<'_>) -> String {
    let joined = el.text().collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl PageAccess for StaticPage {
    async fn wait_for_load_signal(
        &self,
        _signal: LoadSignal,
        _timeout: Duration,
    ) -> Result<(), PageError> {
        // A snapshot is already settled.
        Ok(())
    }

    async fn query_nodes(&self, probe: &Probe) -> Result<Vec<NodeHandle>, PageError> {
        let matcher = ProbeMatcher::compile(probe)?;
        Ok(self.with_dom(|dom| Self::find_matches(dom, &matcher)))
    }

    async fn read_text(&self, node: NodeHandle) -> Result<Option<String>, PageError> {
        self.with_dom(|dom| {
            let el = Self::element_at(dom, node.raw()).ok_or(PageError::StaleNode(node.raw()))?;
            let text = own_text(el);
            Ok((!text.is_empty()).then_some(text))
        })
    }

    async fn read_attribute(
        &self,
        node: NodeHandle,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        self.with_dom(|dom| {
            let el = Self::element_at(dom, node.raw()).ok_or(PageError::StaleNode(node.raw()))?;
            Ok(el.value().attr(name).map(str::to_string))
        })
    }

    async fn is_interactable(
        &self,
        node: NodeHandle,
        _timeout: Duration,
    ) -> Result<bool, PageError> {
        self.with_dom(|dom| {
            let el = Self::element_at(dom, node.raw()).ok_or(PageError::StaleNode(node.raw()))?;
            Ok(Self::interactable(el))
        })
    }

    async fn activate(&self, node: NodeHandle, timeout: Duration) -> Result<(), PageError> {
        if self.is_interactable(node, timeout).await? {
            // Accepted, but a snapshot never changes.
            Ok(())
        } else {
            Err(PageError::Interaction(format!(
                "node {} is not interactable",
                node.raw()
            )))
        }
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }

    async fn measure_content_extent(&self) -> Result<u64, PageError> {
        // Element count stands in for layout height on a snapshot.
        Ok(self.with_dom(|dom| Self::elements(dom).count() as u64))
    }

    async fn request_scroll_to_end(&self) -> Result<(), PageError> {
        Ok(())
    }
}
