//! # Extraction Rule Engine
//!
//! Evaluates a selector strategy against a page: probes are tried in
//! priority order and evaluation stops at the first probe yielding at
//! least one match. A failing probe is not an error, it is the signal to
//! advance to the next probe; only exhausting all probes yields an
//! absent evaluation. Per-probe waits are bounded and a timeout behaves
//! exactly like no match, distinguished only in the trace.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::domain::selector::{Probe, SelectorStrategy};
use crate::infrastructure::config::ExtractionConfig;
use crate::page::{NodeHandle, PageAccess, PageError};

/// Matched nodes in document order plus the 1-based probe level that
/// produced them (1 = most stable probe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSet {
    pub nodes: Vec<NodeHandle>,
    pub confidence: usize,
}

/// What happened to one probe during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTrace {
    /// 1-based probe level.
    pub level: usize,
    /// Compact probe description.
    pub probe: String,
    /// Whether the bounded wait expired rather than returning empty
    /// immediately.
    pub timed_out: bool,
}

/// Outcome of evaluating a full strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvaluation {
    Matched(MatchSet),
    Exhausted { traces: Vec<ProbeTrace> },
}

enum ProbeHit {
    Nodes(Vec<NodeHandle>),
    Empty { timed_out: bool },
}

/// Strategy interpreter. Evaluation is pure with respect to the page; it
/// never mutates the DOM.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    probe_timeout: Duration,
    poll_interval: Duration,
}

impl RuleEngine {
    #[must_use]
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            probe_timeout: config.probe_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Engine with no probe waiting, for already-settled snapshots.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            probe_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
        }
    }

    /// Evaluates probes in priority order against `page`.
    ///
    /// # Errors
    /// Propagates hard collaborator faults; a probe miss never errors.
    pub async fn evaluate(
        &self,
        strategy: &SelectorStrategy,
        page: &dyn PageAccess,
    ) -> Result<ProbeEvaluation, PageError> {
        let mut traces = Vec::with_capacity(strategy.levels());

        for (index, probe) in strategy.probes().iter().enumerate() {
            let level = index + 1;
            match self.probe_once(probe, page).await? {
                ProbeHit::Nodes(nodes) => {
                    debug!(
                        probe = %probe.describe(),
                        level,
                        matches = nodes.len(),
                        "probe matched"
                    );
                    return Ok(ProbeEvaluation::Matched(MatchSet {
                        nodes,
                        confidence: level,
                    }));
                }
                ProbeHit::Empty { timed_out } => {
                    traces.push(ProbeTrace {
                        level,
                        probe: probe.describe(),
                        timed_out,
                    });
                }
            }
        }

        debug!(levels = strategy.levels(), "strategy exhausted");
        Ok(ProbeEvaluation::Exhausted { traces })
    }

    /// Polls one probe until it matches or its bounded wait expires.
    async fn probe_once(
        &self,
        probe: &Probe,
        page: &dyn PageAccess,
    ) -> Result<ProbeHit, PageError> {
        let deadline = Instant::now() + self.probe_timeout;

        loop {
            let nodes = page.query_nodes(probe).await?;
            if !nodes.is_empty() {
                return Ok(ProbeHit::Nodes(nodes));
            }
            if self.probe_timeout.is_zero() {
                return Ok(ProbeHit::Empty { timed_out: false });
            }
            if Instant::now() >= deadline {
                return Ok(ProbeHit::Empty { timed_out: true });
            }
            sleep(self.poll_interval.max(Duration::from_millis(10))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::StaticPage;

    const LISTING: &str = r#"
        <html><body>
          <div class="card">
            <span data-testid="price" class="price-tag">$10.00</span>
          </div>
          <div class="card">
            <span class="price-tag">$20.00</span>
          </div>
        </body></html>
    "#;

    #[tokio::test]
    async fn most_stable_probe_wins() {
        let page = StaticPage::new("https://shop.example.com/l", LISTING);
        let strategy = SelectorStrategy::new(vec![
            Probe::attribute("data-testid", "price"),
            Probe::attribute_contains("class", "price-tag"),
        ])
        .unwrap();

        let evaluation = RuleEngine::immediate()
            .evaluate(&strategy, &page)
            .await
            .unwrap();

        let ProbeEvaluation::Matched(set) = evaluation else {
            panic!("expected a match");
        };
        assert_eq!(set.confidence, 1);
        assert_eq!(set.nodes.len(), 1);
        assert_eq!(
            page.read_text(set.nodes[0]).await.unwrap().as_deref(),
            Some("$10.00")
        );
    }

    #[tokio::test]
    async fn fallback_probe_is_reached_when_primary_misses() {
        let page = StaticPage::new("https://shop.example.com/l", LISTING);
        let strategy = SelectorStrategy::new(vec![
            Probe::attribute("data-testid", "does-not-exist"),
            Probe::attribute_contains("class", "price-tag"),
        ])
        .unwrap();

        let evaluation = RuleEngine::immediate()
            .evaluate(&strategy, &page)
            .await
            .unwrap();

        let ProbeEvaluation::Matched(set) = evaluation else {
            panic!("expected a match");
        };
        assert_eq!(set.confidence, 2);
        assert_eq!(set.nodes.len(), 2);
    }

    #[tokio::test]
    async fn exhausted_strategy_reports_every_probe() {
        let page = StaticPage::new("https://shop.example.com/l", LISTING);
        let strategy = SelectorStrategy::new(vec![
            Probe::attribute("data-testid", "nope"),
            Probe::text("not on this page at all"),
        ])
        .unwrap();

        let evaluation = RuleEngine::immediate()
            .evaluate(&strategy, &page)
            .await
            .unwrap();

        let ProbeEvaluation::Exhausted { traces } = evaluation else {
            panic!("expected exhaustion");
        };
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].level, 1);
        assert!(!traces[0].timed_out);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_wait_expires_as_timeout() {
        let page = StaticPage::new("https://shop.example.com/l", LISTING);
        let strategy =
            SelectorStrategy::single(Probe::attribute("data-testid", "late-node")).unwrap();
        let engine = RuleEngine::new(&ExtractionConfig {
            probe_timeout_ms: 500,
            poll_interval_ms: 100,
        });

        let evaluation = engine.evaluate(&strategy, &page).await.unwrap();

        let ProbeEvaluation::Exhausted { traces } = evaluation else {
            panic!("expected exhaustion");
        };
        assert!(traces[0].timed_out);
    }
}
