//! # Traversal Coordinator
//!
//! Drives the listing-to-detail workflow: for each listing page, run
//! pagination to exhaustion, collect and deduplicate detail links in
//! document order, then dispatch detail extraction onto a bounded
//! worker pool. Item and request slots are claimed atomically before
//! dispatch, so concurrent workers can never overshoot the budget.
//!
//! Nothing here aborts a run: rejected records and page faults become
//! failure entries with stable reason codes and the run continues with
//! the remaining work. The only refusal is a zero budget at start.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::sync::OwnedSemaphorePermit;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::budget::TraversalBudget;
use crate::domain::field::{ExtractionResult, FieldSpec};
use crate::domain::selector::SelectorStrategy;
use crate::domain::summary::{ReasonCode, RunSummary};
use crate::extraction::extractor::{FieldExtractor, PricingRules};
use crate::extraction::post_process;
use crate::extraction::rule_engine::{ProbeEvaluation, RuleEngine};
use crate::infrastructure::config::{EngineConfig, ExtractionConfig};
use crate::page::{LoadSignal, PageAccess, PageProvider};
use crate::pagination::controller::{PaginationController, PaginationProbes};
use crate::traversal::accounting::RunAccountant;

/// Configuration errors that stop a run before it starts. Everything
/// else is recorded per URL and never terminates the run.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("budget must allow at least one request and one item")]
    EmptyBudget,
}

/// What to extract and how to traverse: field specs for detail pages, a
/// link-collection strategy for listings and the pagination probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionPlan {
    pub field_specs: Vec<FieldSpec>,
    pub link_strategy: SelectorStrategy,
    pub link_attribute: String,
    pub pagination: PaginationProbes,
    pub pricing: Option<PricingRules>,
}

impl ExtractionPlan {
    #[must_use]
    pub fn new(
        field_specs: Vec<FieldSpec>,
        link_strategy: SelectorStrategy,
        pagination: PaginationProbes,
    ) -> Self {
        Self {
            field_specs,
            link_strategy,
            link_attribute: "href".to_string(),
            pagination,
            pricing: None,
        }
    }

    /// Enables cross-field pricing validation on detail records.
    #[must_use]
    pub fn with_pricing(mut self, pricing: PricingRules) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Reads detail links from a different attribute than `href`.
    #[must_use]
    pub fn links_from_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.link_attribute = attribute.into();
        self
    }
}

/// Bounded channel for streaming accepted records to the caller, so a
/// consumer can persist incrementally instead of buffering the run.
#[must_use]
pub fn record_channel(
    capacity: usize,
) -> (
    mpsc::Sender<ExtractionResult>,
    ReceiverStream<ExtractionResult>,
) {
    let (sender, receiver) = mpsc::channel(capacity);
    (sender, ReceiverStream::new(receiver))
}

enum ListingOutcome {
    Links(Vec<String>),
    RequestBudgetExhausted,
}

/// Orchestrates one extraction run.
pub struct TraversalCoordinator {
    provider: Arc<dyn PageProvider>,
    config: EngineConfig,
    budget: Arc<TraversalBudget>,
    accountant: Arc<RunAccountant>,
    cancel: CancellationToken,
    record_sink: Option<mpsc::Sender<ExtractionResult>>,
}

impl TraversalCoordinator {
    #[must_use]
    pub fn new(
        provider: Arc<dyn PageProvider>,
        config: EngineConfig,
        budget: TraversalBudget,
    ) -> Self {
        Self {
            provider,
            config,
            budget: Arc::new(budget),
            accountant: Arc::new(RunAccountant::new()),
            cancel: CancellationToken::new(),
            record_sink: None,
        }
    }

    /// Streams each accepted record into `sink` as it completes.
    #[must_use]
    pub fn with_record_sink(mut self, sink: mpsc::Sender<ExtractionResult>) -> Self {
        self.record_sink = Some(sink);
        self
    }

    /// Token for a graceful stop: no new work is enqueued, in-flight
    /// page operations drain rather than being forcibly cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn budget(&self) -> &TraversalBudget {
        &self.budget
    }

    /// Runs listing traversal and detail extraction for the given seeds.
    ///
    /// Within one listing, detail links are dispatched in document
    /// order; across workers no ordering is guaranteed. Re-running with
    /// the same seeds against unchanged pages reproduces the same
    /// accepted records, modulo timestamps.
    ///
    /// # Errors
    /// Only a zero budget fails; everything else is recorded in the
    /// summary.
    pub async fn run(
        &self,
        seeds: &[String],
        plan: &ExtractionPlan,
    ) -> Result<RunSummary, EngineError> {
        if !self.budget.is_startable() {
            return Err(EngineError::EmptyBudget);
        }
        info!(
            run_id = %self.accountant.run_id(),
            seeds = seeds.len(),
            workers = self.config.traversal.max_concurrent_workers,
            "starting extraction run"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.traversal.max_concurrent_workers));
        let specs = Arc::new(plan.field_specs.clone());
        let mut handles = Vec::new();

        'seeds: for seed in seeds {
            if self.cancel.is_cancelled() {
                info!("cancellation requested, draining in-flight work");
                break;
            }
            if self.budget.items_exhausted() {
                debug!("item budget exhausted, no further listings");
                break;
            }

            let links = match self.collect_listing_links(seed, plan).await {
                ListingOutcome::Links(links) => links,
                ListingOutcome::RequestBudgetExhausted => break,
            };

            for link in links {
                if self.cancel.is_cancelled() {
                    info!("cancellation requested, draining in-flight work");
                    break 'seeds;
                }
                // Claim slots before dispatch; the claim is the
                // single-step check-then-increment.
                if !self.budget.try_claim_item() {
                    debug!("item budget exhausted");
                    break 'seeds;
                }
                if !self.budget.try_claim_request() {
                    debug!("request budget exhausted");
                    break 'seeds;
                }

                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break 'seeds;
                };
                handles.push(tokio::spawn(Self::process_detail(
                    Arc::clone(&self.provider),
                    Arc::clone(&specs),
                    plan.pricing.clone(),
                    self.config.extraction.clone(),
                    Arc::clone(&self.accountant),
                    self.record_sink.clone(),
                    permit,
                    link,
                )));
            }
        }

        join_all(handles).await;

        let summary = self.accountant.finalize().await;
        info!(
            run_id = %summary.run_id,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "extraction run finished"
        );
        Ok(summary)
    }

    /// Opens one listing, drives pagination to exhaustion and returns
    /// its detail links, deduplicated in document order. Faults are
    /// recorded against the listing URL and yield no links.
    async fn collect_listing_links(&self, seed: &str, plan: &ExtractionPlan) -> ListingOutcome {
        if !self.budget.try_claim_request() {
            debug!("request budget exhausted before listing open");
            return ListingOutcome::RequestBudgetExhausted;
        }

        let page = match self.provider.open(seed).await {
            Ok(page) => page,
            Err(fault) => {
                self.accountant
                    .record_failure(seed, ReasonCode::PageAccessFault, fault.to_string())
                    .await;
                return ListingOutcome::Links(Vec::new());
            }
        };
        if let Err(fault) = page
            .wait_for_load_signal(LoadSignal::DomReady, self.config.extraction.probe_timeout())
            .await
        {
            self.accountant
                .record_failure(seed, ReasonCode::PageAccessFault, fault.to_string())
                .await;
            return ListingOutcome::Links(Vec::new());
        }

        let engine = RuleEngine::new(&self.config.extraction);
        let mut controller = PaginationController::new(self.config.pagination.clone());
        if let Err(fault) = controller
            .run_to_exhaustion(&*page, &plan.pagination, &engine)
            .await
        {
            self.accountant
                .record_failure(seed, ReasonCode::PageAccessFault, fault.to_string())
                .await;
            return ListingOutcome::Links(Vec::new());
        }

        match self.extract_links(&engine, &*page, plan).await {
            Ok(links) => {
                debug!(listing = seed, links = links.len(), "detail links collected");
                ListingOutcome::Links(links)
            }
            Err(fault) => {
                self.accountant
                    .record_failure(seed, ReasonCode::PageAccessFault, fault.to_string())
                    .await;
                ListingOutcome::Links(Vec::new())
            }
        }
    }

    async fn extract_links(
        &self,
        engine: &RuleEngine,
        page: &dyn PageAccess,
        plan: &ExtractionPlan,
    ) -> Result<Vec<String>, crate::page::PageError> {
        let evaluation = engine.evaluate(&plan.link_strategy, page).await?;
        let ProbeEvaluation::Matched(set) = evaluation else {
            warn!(url = %page.current_url(), "no detail links matched on listing");
            return Ok(Vec::new());
        };

        let base = page.current_url();
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for node in set.nodes {
            let Some(href) = page.read_attribute(node, &plan.link_attribute).await? else {
                continue;
            };
            let Some(normalized) = post_process::normalize_url(&href, &base) else {
                continue;
            };
            if seen.insert(normalized.clone()) {
                links.push(normalized);
            }
        }
        Ok(links)
    }

    /// One detail page, processed on a worker. Every outcome lands in
    /// accounting; nothing escalates past here.
    async fn process_detail(
        provider: Arc<dyn PageProvider>,
        specs: Arc<Vec<FieldSpec>>,
        pricing: Option<PricingRules>,
        extraction: ExtractionConfig,
        accountant: Arc<RunAccountant>,
        sink: Option<mpsc::Sender<ExtractionResult>>,
        _permit: OwnedSemaphorePermit,
        url: String,
    ) {
        accountant.record_attempt();

        let page = match provider.open(&url).await {
            Ok(page) => page,
            Err(fault) => {
                accountant
                    .record_failure(&url, ReasonCode::PageAccessFault, fault.to_string())
                    .await;
                return;
            }
        };
        if let Err(fault) = page
            .wait_for_load_signal(LoadSignal::DomReady, extraction.probe_timeout())
            .await
        {
            accountant
                .record_failure(&url, ReasonCode::PageAccessFault, fault.to_string())
                .await;
            return;
        }

        let mut extractor = FieldExtractor::new(&extraction);
        if let Some(rules) = pricing {
            extractor = extractor.with_pricing(rules);
        }

        match extractor.extract(&specs, &*page).await {
            Err(fault) => {
                accountant
                    .record_failure(&url, ReasonCode::PageAccessFault, fault.to_string())
                    .await;
            }
            Ok(result) => {
                if let Some(field) = result.first_missing_required(&specs) {
                    accountant
                        .record_failure(
                            &url,
                            ReasonCode::RequiredFieldMissing,
                            format!("required field `{field}` resolved to absent"),
                        )
                        .await;
                } else {
                    accountant.record_success();
                    debug!(url = %url, "record accepted");
                    if let Some(sink) = &sink {
                        if sink.send(result).await.is_err() {
                            debug!("record stream receiver dropped, continuing");
                        }
                    }
                }
            }
        }
    }
}

/// Convenience entry point: builds a coordinator and runs it.
///
/// # Errors
/// Fails only on a zero budget.
pub async fn run_extraction(
    provider: Arc<dyn PageProvider>,
    seeds: &[String],
    plan: &ExtractionPlan,
    budget: TraversalBudget,
    config: EngineConfig,
) -> Result<RunSummary, EngineError> {
    TraversalCoordinator::new(provider, config, budget)
        .run(seeds, plan)
        .await
}
