//! # Pagination Controller
//!
//! Drives one listing page to content exhaustion. Two interchangeable
//! strategies, selected by which control is structurally present: a
//! control-driven loop (locate and activate a load-more control, wait
//! for the item count to grow) and a scroll-driven loop (scroll to the
//! end, wait a settle interval, compare content extent). Both share a
//! hard step ceiling: structural termination signals are unreliable on
//! sites with synthetic infinite content or broken disabled attributes,
//! and an unbounded loop is unacceptable.
//!
//! Pagination for a given listing is strictly sequential: each step must
//! observe the result of the previous one before deciding to continue.

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::domain::pagination::{PaginationState, TerminationReason};
use crate::domain::selector::{Probe, SelectorStrategy};
use crate::extraction::rule_engine::{ProbeEvaluation, RuleEngine};
use crate::infrastructure::config::PaginationConfig;
use crate::page::{PageAccess, PageError};

/// Structural probes a listing is paginated with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationProbes {
    /// Probe counting the listing's items.
    pub item_probe: Probe,
    /// Strategy locating the load-more control, when the site has one.
    pub control_strategy: Option<SelectorStrategy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepMode {
    ControlDriven,
    ScrollDriven,
}

/// One listing's pagination loop. `Idle` until [`Self::run_to_exhaustion`]
/// is called, then stepping until a termination reason is recorded.
pub struct PaginationController {
    config: PaginationConfig,
    state: PaginationState,
}

impl PaginationController {
    #[must_use]
    pub fn new(config: PaginationConfig) -> Self {
        Self {
            config,
            state: PaginationState::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Steps until the listing stops growing, the control disappears or
    /// the step ceiling is reached. Returns the terminal state.
    ///
    /// # Errors
    /// Propagates hard collaborator faults; structural termination is a
    /// state, not an error.
    pub async fn run_to_exhaustion(
        &mut self,
        page: &dyn PageAccess,
        probes: &PaginationProbes,
        engine: &RuleEngine,
    ) -> Result<&PaginationState, PageError> {
        let mode = self.select_mode(page, probes, engine).await?;
        debug!(?mode, url = %page.current_url(), "pagination mode selected");

        self.state.last_observed_count = self.count_items(page, probes).await?;
        self.state.last_observed_extent = page.measure_content_extent().await?;

        while !self.state.terminated {
            if self.state.steps_taken >= self.config.max_steps {
                self.state.terminate(TerminationReason::BudgetExceeded);
                break;
            }
            match mode {
                StepMode::ControlDriven => self.step_control(page, probes, engine).await?,
                StepMode::ScrollDriven => self.step_scroll(page).await?,
            }
        }

        info!(
            steps = self.state.steps_taken,
            items = self.state.last_observed_count,
            reason = self.state.termination_reason.map(TerminationReason::as_str),
            "pagination terminated"
        );
        Ok(&self.state)
    }

    /// Control-driven when the control strategy structurally matches.
    async fn select_mode(
        &self,
        page: &dyn PageAccess,
        probes: &PaginationProbes,
        engine: &RuleEngine,
    ) -> Result<StepMode, PageError> {
        if let Some(strategy) = &probes.control_strategy {
            if let ProbeEvaluation::Matched(_) = engine.evaluate(strategy, page).await? {
                return Ok(StepMode::ControlDriven);
            }
        }
        Ok(StepMode::ScrollDriven)
    }

    async fn count_items(
        &self,
        page: &dyn PageAccess,
        probes: &PaginationProbes,
    ) -> Result<u64, PageError> {
        Ok(page.query_nodes(&probes.item_probe).await?.len() as u64)
    }

    async fn step_control(
        &mut self,
        page: &dyn PageAccess,
        probes: &PaginationProbes,
        engine: &RuleEngine,
    ) -> Result<(), PageError> {
        let before = self.count_items(page, probes).await?;

        // The control is located fresh each step; sites re-render it.
        let Some(strategy) = probes.control_strategy.as_ref() else {
            self.state.terminate(TerminationReason::NoMoreControl);
            return Ok(());
        };
        let control = match engine.evaluate(strategy, page).await? {
            ProbeEvaluation::Matched(set) => set.nodes[0],
            ProbeEvaluation::Exhausted { .. } => {
                self.state.terminate(TerminationReason::NoMoreControl);
                return Ok(());
            }
        };

        if !page
            .is_interactable(control, self.config.activation_timeout())
            .await?
        {
            self.state.terminate(TerminationReason::NoMoreControl);
            return Ok(());
        }
        page.activate(control, self.config.activation_timeout())
            .await?;

        // Bounded wait for the item count to exceed the prior count.
        let deadline = Instant::now() + self.config.growth_timeout();
        loop {
            let after = self.count_items(page, probes).await?;
            if after > before {
                let extent = page.measure_content_extent().await?;
                self.state.record_growth(after, extent);
                debug!(step = self.state.steps_taken, items = after, "listing grew");
                return Ok(());
            }
            if Instant::now() >= deadline {
                self.state.terminate(TerminationReason::NoGrowth);
                return Ok(());
            }
            sleep(self.config.poll_interval()).await;
        }
    }

    async fn step_scroll(&mut self, page: &dyn PageAccess) -> Result<(), PageError> {
        let before = page.measure_content_extent().await?;
        page.request_scroll_to_end().await?;
        sleep(self.config.settle_delay()).await;

        let after = page.measure_content_extent().await?;
        if after > before {
            let count = self.state.last_observed_count;
            self.state.record_growth(count, after);
            debug!(step = self.state.steps_taken, extent = after, "content extended");
        } else {
            self.state.terminate(TerminationReason::NoGrowth);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::SimPage;

    fn item_probe() -> Probe {
        Probe::attribute_contains("class", "product-card")
    }

    fn control_strategy() -> SelectorStrategy {
        SelectorStrategy::new(vec![
            Probe::attribute("data-testid", "load-more"),
            Probe::role("button", Some("(?i)load more")),
        ])
        .unwrap()
    }

    fn probes() -> PaginationProbes {
        PaginationProbes {
            item_probe: item_probe(),
            control_strategy: Some(control_strategy()),
        }
    }

    fn config() -> PaginationConfig {
        PaginationConfig {
            max_steps: 20,
            growth_timeout_ms: 1_000,
            settle_delay_ms: 100,
            poll_interval_ms: 50,
            activation_timeout_ms: 500,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalls_with_no_growth_after_three_steps() {
        let page = SimPage::listing("https://shop.example.com/list", item_probe())
            .items(12)
            .grows_to(48, 12)
            .load_more(Probe::role("button", Some("(?i)load more")))
            .build();

        let mut controller = PaginationController::new(config());
        let state = controller
            .run_to_exhaustion(&*page, &probes(), &RuleEngine::immediate())
            .await
            .unwrap();

        assert!(state.terminated);
        assert_eq!(state.termination_reason, Some(TerminationReason::NoGrowth));
        assert_eq!(state.steps_taken, 3);
        assert_eq!(state.last_observed_count, 48);
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_control_terminates_without_growth_wait() {
        let page = SimPage::listing("https://shop.example.com/list", item_probe())
            .items(10)
            .grows_to(30, 10)
            .load_more_vanishing(Probe::role("button", Some("(?i)load more")))
            .build();

        let mut controller = PaginationController::new(config());
        let state = controller
            .run_to_exhaustion(&*page, &probes(), &RuleEngine::immediate())
            .await
            .unwrap();

        assert_eq!(
            state.termination_reason,
            Some(TerminationReason::NoMoreControl)
        );
        assert_eq!(state.steps_taken, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn step_ceiling_caps_synthetic_infinite_listings() {
        let page = SimPage::listing("https://shop.example.com/list", item_probe())
            .items(10)
            .grows_to(1_000_000, 10)
            .load_more(Probe::role("button", Some("(?i)load more")))
            .build();

        let mut controller = PaginationController::new(PaginationConfig {
            max_steps: 5,
            ..config()
        });
        let state = controller
            .run_to_exhaustion(&*page, &probes(), &RuleEngine::immediate())
            .await
            .unwrap();

        assert_eq!(
            state.termination_reason,
            Some(TerminationReason::BudgetExceeded)
        );
        assert_eq!(state.steps_taken, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_scroll_mode_without_a_control() {
        let page = SimPage::listing("https://shop.example.com/feed", item_probe())
            .items(5)
            .grows_to(20, 5)
            .scrollable()
            .build();

        let mut controller = PaginationController::new(config());
        let state = controller
            .run_to_exhaustion(&*page, &probes(), &RuleEngine::immediate())
            .await
            .unwrap();

        assert_eq!(state.termination_reason, Some(TerminationReason::NoGrowth));
        assert_eq!(state.steps_taken, 3);
        assert_eq!(state.last_observed_extent, 2_000);
    }

    #[tokio::test(start_paused = true)]
    async fn static_listing_terminates_immediately() {
        let page = SimPage::listing("https://shop.example.com/list", item_probe())
            .items(8)
            .build();

        let mut controller = PaginationController::new(config());
        let state = controller
            .run_to_exhaustion(&*page, &probes(), &RuleEngine::immediate())
            .await
            .unwrap();

        assert!(state.terminated);
        assert_eq!(state.steps_taken, 0);
        assert_eq!(state.last_observed_count, 8);
    }
}
