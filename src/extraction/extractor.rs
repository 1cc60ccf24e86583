//! # Field Extractor
//!
//! Composes extraction rules (one per logical field) into a record, then
//! runs cross-field pricing validation. A missing field resolves to the
//! typed absent marker; nothing at field level ever raises.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::field::{
    ExtractionResult, FieldDiagnostic, FieldSpec, FieldValue, MatchPolicy, PostProcess,
    ProbeOutcome, ValueSource,
};
use crate::extraction::post_process;
use crate::extraction::rule_engine::{MatchSet, ProbeEvaluation, RuleEngine};
use crate::infrastructure::config::ExtractionConfig;
use crate::page::{NodeHandle, PageAccess, PageError};

/// Cross-field sale-price consistency rules.
///
/// A discount is only derived when both prices are present, numeric and
/// `original > current`. A violated pair downgrades the original price
/// to absent: malformed sale banners are common and must not fabricate a
/// discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRules {
    pub current_field: String,
    pub original_field: String,
    pub discount_field: String,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            current_field: "price".to_string(),
            original_field: "original_price".to_string(),
            discount_field: "discount".to_string(),
        }
    }
}

impl PricingRules {
    fn apply(&self, fields: &mut BTreeMap<String, FieldValue>) {
        let current = fields.get(&self.current_field).and_then(FieldValue::as_number);
        let original = fields
            .get(&self.original_field)
            .and_then(FieldValue::as_number);

        match (current, original) {
            (Some(current), Some(original)) if original > current => {
                let discount = ((original - current) / original * 100.0).round();
                fields.insert(self.discount_field.clone(), FieldValue::Number(discount));
            }
            (Some(current), Some(original)) => {
                warn!(
                    current,
                    original, "inconsistent sale pricing, downgrading original price"
                );
                fields.insert(self.original_field.clone(), FieldValue::Absent);
            }
            // Absent fields are excluded from cross-field validation.
            _ => {}
        }
    }
}

/// Extracts a record from one page according to a list of field specs.
pub struct FieldExtractor {
    engine: RuleEngine,
    pricing: Option<PricingRules>,
}

impl FieldExtractor {
    #[must_use]
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            engine: RuleEngine::new(config),
            pricing: None,
        }
    }

    /// Extractor with no probe waiting, for already-settled snapshots.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            engine: RuleEngine::immediate(),
            pricing: None,
        }
    }

    /// Enables cross-field pricing validation.
    #[must_use]
    pub fn with_pricing(mut self, rules: PricingRules) -> Self {
        self.pricing = Some(rules);
        self
    }

    /// Extracts every field, applies post-processing and cross-field
    /// validation, and returns the record with diagnostics.
    ///
    /// # Errors
    /// Propagates hard collaborator faults only; missing fields resolve
    /// to absent.
    pub async fn extract(
        &self,
        specs: &[FieldSpec],
        page: &dyn PageAccess,
    ) -> Result<ExtractionResult, PageError> {
        let base_url = page.current_url();
        let mut fields = BTreeMap::new();
        let mut diagnostics = Vec::with_capacity(specs.len());

        for spec in specs {
            let (value, diagnostic) = self.extract_field(spec, page, &base_url).await?;
            debug!(field = %spec.name, absent = value.is_absent(), "field resolved");
            fields.insert(spec.name.clone(), value);
            diagnostics.push(diagnostic);
        }

        if let Some(pricing) = &self.pricing {
            pricing.apply(&mut fields);
        }

        Ok(ExtractionResult::new(base_url, fields, diagnostics))
    }

    async fn extract_field(
        &self,
        spec: &FieldSpec,
        page: &dyn PageAccess,
        base_url: &str,
    ) -> Result<(FieldValue, FieldDiagnostic), PageError> {
        match self.engine.evaluate(&spec.strategy, page).await? {
            ProbeEvaluation::Exhausted { traces } => {
                let timed_out = traces.iter().any(|trace| trace.timed_out);
                Ok((
                    FieldValue::Absent,
                    FieldDiagnostic {
                        field: spec.name.clone(),
                        outcome: ProbeOutcome::Exhausted {
                            probes_tried: traces.len(),
                            timed_out,
                        },
                    },
                ))
            }
            ProbeEvaluation::Matched(set) => {
                let value = self.read_matches(spec, page, base_url, &set).await?;
                Ok((
                    value,
                    FieldDiagnostic {
                        field: spec.name.clone(),
                        outcome: ProbeOutcome::MatchedAt {
                            level: set.confidence,
                        },
                    },
                ))
            }
        }
    }

    async fn read_matches(
        &self,
        spec: &FieldSpec,
        page: &dyn PageAccess,
        base_url: &str,
        set: &MatchSet,
    ) -> Result<FieldValue, PageError> {
        match spec.policy {
            MatchPolicy::First => {
                let node = set.nodes[0];
                self.read_one(spec, page, base_url, node).await
            }
            MatchPolicy::Last => {
                let node = *set.nodes.last().unwrap_or(&set.nodes[0]);
                self.read_one(spec, page, base_url, node).await
            }
            MatchPolicy::All => {
                let mut values = Vec::new();
                for node in &set.nodes {
                    if let Some(value) = self.read_raw(spec, page, *node).await? {
                        if let Some(processed) = apply_post_process(spec, &value, base_url) {
                            if let Some(text) = processed_as_string(&processed) {
                                // Deduplicate by resolved value, keeping
                                // document order.
                                if !values.contains(&text) {
                                    values.push(text);
                                }
                            }
                        }
                    }
                }
                Ok(if values.is_empty() {
                    FieldValue::Absent
                } else {
                    FieldValue::Many(values)
                })
            }
        }
    }

    async fn read_one(
        &self,
        spec: &FieldSpec,
        page: &dyn PageAccess,
        base_url: &str,
        node: NodeHandle,
    ) -> Result<FieldValue, PageError> {
        let Some(raw) = self.read_raw(spec, page, node).await? else {
            return Ok(FieldValue::Absent);
        };
        Ok(apply_post_process(spec, &raw, base_url).unwrap_or(FieldValue::Absent))
    }

    async fn read_raw(
        &self,
        spec: &FieldSpec,
        page: &dyn PageAccess,
        node: NodeHandle,
    ) -> Result<Option<String>, PageError> {
        match &spec.source {
            ValueSource::Text => page.read_text(node).await,
            ValueSource::Attribute(name) => page.read_attribute(node, name).await,
        }
    }
}

fn apply_post_process(spec: &FieldSpec, raw: &str, base_url: &str) -> Option<FieldValue> {
    match spec.post_process {
        PostProcess::Trim => post_process::clean_text(raw).map(FieldValue::Text),
        PostProcess::ParsePrice => post_process::parse_price(raw).map(FieldValue::Number),
        PostProcess::NormalizeUrl => post_process::normalize_url(raw, base_url).map(FieldValue::Url),
    }
}

fn processed_as_string(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(s) | FieldValue::Url(s) => Some(s.clone()),
        FieldValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::selector::{Probe, SelectorStrategy};
    use crate::page::StaticPage;

    const DETAIL_PAGE: &str = r#"
        <html><body>
          <h1 data-testid="product-title">Aurora Desk Lamp</h1>
          <span class="price-current">$49.99</span>
          <span class="price-was">$79.99</span>
          <div class="gallery">
            <img src="/img/a.jpg">
            <img src="/img/b.jpg">
            <img src="/img/a.jpg">
          </div>
          <picture>
            <source srcset="/img/low.jpg">
            <source srcset="/img/high.jpg">
          </picture>
        </body></html>
    "#;

    fn title_spec() -> FieldSpec {
        FieldSpec::new(
            "title",
            SelectorStrategy::new(vec![
                Probe::attribute("data-testid", "product-title"),
                Probe::structural("h1", None, None),
            ])
            .unwrap(),
        )
        .required()
    }

    fn price_spec(name: &str, class: &str) -> FieldSpec {
        FieldSpec::new(
            name,
            SelectorStrategy::single(Probe::attribute_contains("class", class)).unwrap(),
        )
        .parse_price()
    }

    fn page() -> StaticPage {
        StaticPage::new("https://shop.example.com/p/lamp", DETAIL_PAGE)
    }

    #[tokio::test]
    async fn extracts_and_post_processes_fields() {
        let specs = vec![
            title_spec(),
            price_spec("price", "price-current"),
            price_spec("original_price", "price-was"),
        ];
        let result = FieldExtractor::immediate()
            .extract(&specs, &page())
            .await
            .unwrap();

        assert_eq!(
            result.value("title"),
            &FieldValue::Text("Aurora Desk Lamp".into())
        );
        assert_eq!(result.value("price"), &FieldValue::Number(49.99));
        assert_eq!(result.value("original_price"), &FieldValue::Number(79.99));
        assert_eq!(result.first_missing_required(&specs), None);
    }

    #[tokio::test]
    async fn exhausted_field_is_absent_and_skips_validation() {
        let specs = vec![
            price_spec("price", "price-current"),
            price_spec("original_price", "no-such-class"),
        ];
        let result = FieldExtractor::immediate()
            .with_pricing(PricingRules::default())
            .extract(&specs, &page())
            .await
            .unwrap();

        assert!(result.value("original_price").is_absent());
        assert!(result.value("discount").is_absent());
        assert_eq!(result.value("price"), &FieldValue::Number(49.99));
    }

    #[tokio::test]
    async fn valid_sale_pricing_derives_discount() {
        let specs = vec![
            price_spec("price", "price-current"),
            price_spec("original_price", "price-was"),
        ];
        let result = FieldExtractor::immediate()
            .with_pricing(PricingRules::default())
            .extract(&specs, &page())
            .await
            .unwrap();

        // 49.99 of 79.99 is a 38% discount, rounded.
        assert_eq!(result.value("discount"), &FieldValue::Number(38.0));
    }

    #[tokio::test]
    async fn inconsistent_sale_pricing_downgrades_original() {
        let page = StaticPage::new(
            "https://shop.example.com/p/x",
            r#"<html><body>
                <span class="price-current">$50.00</span>
                <span class="price-was">$40.00</span>
            </body></html>"#,
        );
        let specs = vec![
            price_spec("price", "price-current"),
            price_spec("original_price", "price-was"),
        ];
        let result = FieldExtractor::immediate()
            .with_pricing(PricingRules::default())
            .extract(&specs, &page)
            .await
            .unwrap();

        assert_eq!(result.value("price"), &FieldValue::Number(50.0));
        assert!(result.value("original_price").is_absent());
        assert!(result.value("discount").is_absent());
    }

    #[tokio::test]
    async fn half_price_sale_derives_fifty_percent() {
        let page = StaticPage::new(
            "https://shop.example.com/p/x",
            r#"<html><body>
                <span class="price-current">$50.00</span>
                <span class="price-was">$100.00</span>
            </body></html>"#,
        );
        let specs = vec![
            price_spec("price", "price-current"),
            price_spec("original_price", "price-was"),
        ];
        let result = FieldExtractor::immediate()
            .with_pricing(PricingRules::default())
            .extract(&specs, &page)
            .await
            .unwrap();

        assert_eq!(result.value("discount"), &FieldValue::Number(50.0));
    }

    #[tokio::test]
    async fn gallery_collects_all_images_deduplicated() {
        let spec = FieldSpec::new(
            "images",
            SelectorStrategy::single(Probe::structural("img", Some("gallery"), None)).unwrap(),
        )
        .from_attribute("src")
        .normalize_url()
        .pick_all();

        let result = FieldExtractor::immediate()
            .extract(&[spec], &page())
            .await
            .unwrap();

        assert_eq!(
            result.value("images"),
            &FieldValue::Many(vec![
                "https://shop.example.com/img/a.jpg".to_string(),
                "https://shop.example.com/img/b.jpg".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn responsive_source_list_picks_last() {
        let spec = FieldSpec::new(
            "hero_image",
            SelectorStrategy::single(Probe::structural("source", Some("picture"), None)).unwrap(),
        )
        .from_attribute("srcset")
        .normalize_url()
        .pick_last();

        let result = FieldExtractor::immediate()
            .extract(&[spec], &page())
            .await
            .unwrap();

        assert_eq!(
            result.value("hero_image"),
            &FieldValue::Url("https://shop.example.com/img/high.jpg".to_string())
        );
    }

    #[tokio::test]
    async fn diagnostics_record_probe_levels() {
        let specs = vec![
            FieldSpec::new(
                "title",
                SelectorStrategy::new(vec![
                    Probe::attribute("data-testid", "missing"),
                    Probe::structural("h1", None, None),
                ])
                .unwrap(),
            ),
            FieldSpec::new(
                "sku",
                SelectorStrategy::single(Probe::attribute("data-testid", "sku")).unwrap(),
            ),
        ];
        let result = FieldExtractor::immediate()
            .extract(&specs, &page())
            .await
            .unwrap();

        assert_eq!(
            result.diagnostics[0].outcome,
            ProbeOutcome::MatchedAt { level: 2 }
        );
        assert_eq!(
            result.diagnostics[1].outcome,
            ProbeOutcome::Exhausted {
                probes_tried: 1,
                timed_out: false
            }
        );
    }
}
