//! # Scripted Page Collaborator
//!
//! Deterministic simulated pages and a scripted page provider, used to
//! exercise pagination, traversal and budget behavior without any real
//! browser. Growth schedules, control disappearance and per-URL faults
//! are all scripted up front, so every run is reproducible.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::selector::Probe;
use crate::page::{LoadSignal, NodeHandle, PageAccess, PageError, PageProvider};

const CONTROL_HANDLE: u64 = 1;
const ITEM_BASE: u64 = 10_000;
const LINK_BASE: u64 = 20_000;
const FIELD_BASE: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrowthMode {
    /// Growth happens when the load-more control is activated.
    Control,
    /// Growth happens when a scroll to the end is requested.
    Scroll,
    /// The page never grows.
    Static,
}

/// A scripted text/attribute node.
#[derive(Debug, Clone, Default)]
struct SimNode {
    text: Option<String>,
    attrs: HashMap<String, String>,
}

#[derive(Debug)]
struct SimState {
    item_count: u64,
    growth_cap: u64,
    growth_step: u64,
    control_present: bool,
    control_vanishes_at_cap: bool,
}

impl SimState {
    /// One growth pulse; returns whether anything changed.
    fn grow(&mut self) -> bool {
        if self.item_count >= self.growth_cap {
            if self.control_vanishes_at_cap {
                self.control_present = false;
            }
            return false;
        }
        self.item_count = (self.item_count + self.growth_step).min(self.growth_cap);
        if self.item_count >= self.growth_cap && self.control_vanishes_at_cap {
            self.control_present = false;
        }
        true
    }
}

/// A simulated listing or detail page with a scripted growth schedule.
pub struct SimPage {
    url: String,
    item_probe: Probe,
    control_probe: Option<Probe>,
    link_probe: Option<Probe>,
    links: Vec<String>,
    fields: Vec<(Probe, SimNode)>,
    extent_per_item: u64,
    mode: GrowthMode,
    state: Mutex<SimState>,
}

impl SimPage {
    /// Starts building a listing whose items answer to `item_probe`.
    #[must_use]
    pub fn listing(url: impl Into<String>, item_probe: Probe) -> SimPageBuilder {
        SimPageBuilder {
            url: url.into(),
            item_probe,
            control_probe: None,
            link_probe: None,
            links: Vec::new(),
            fields: Vec::new(),
            initial_items: 0,
            growth_cap: 0,
            growth_step: 0,
            control_vanishes_at_cap: false,
            extent_per_item: 100,
            mode: GrowthMode::Static,
        }
    }

    /// Current simulated item count.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.state.lock().expect("sim state poisoned").item_count
    }

    fn field_node(&self, handle: u64) -> Result<&SimNode, PageError> {
        let index = handle
            .checked_sub(FIELD_BASE)
            .ok_or(PageError::StaleNode(handle))? as usize;
        self.fields
            .get(index)
            .map(|(_, node)| node)
            .ok_or(PageError::StaleNode(handle))
    }
}

/// Builder for [`SimPage`].
pub struct SimPageBuilder {
    url: String,
    item_probe: Probe,
    control_probe: Option<Probe>,
    link_probe: Option<Probe>,
    links: Vec<String>,
    fields: Vec<(Probe, SimNode)>,
    initial_items: u64,
    growth_cap: u64,
    growth_step: u64,
    control_vanishes_at_cap: bool,
    extent_per_item: u64,
    mode: GrowthMode,
}

impl SimPageBuilder {
    /// Item count before any pagination step.
    #[must_use]
    pub fn items(mut self, count: u64) -> Self {
        self.initial_items = count;
        self
    }

    /// Grows by `step` items per pulse until `cap` is reached.
    #[must_use]
    pub fn grows_to(mut self, cap: u64, step: u64) -> Self {
        self.growth_cap = cap;
        self.growth_step = step;
        self
    }

    /// Adds a load-more control that stays in the page even after growth
    /// stops.
    #[must_use]
    pub fn load_more(mut self, control_probe: Probe) -> Self {
        self.control_probe = Some(control_probe);
        self.mode = GrowthMode::Control;
        self
    }

    /// Adds a load-more control that disappears once growth is exhausted.
    #[must_use]
    pub fn load_more_vanishing(mut self, control_probe: Probe) -> Self {
        self.control_probe = Some(control_probe);
        self.control_vanishes_at_cap = true;
        self.mode = GrowthMode::Control;
        self
    }

    /// Grows on scroll instead of an explicit control.
    #[must_use]
    pub fn scrollable(mut self) -> Self {
        self.mode = GrowthMode::Scroll;
        self
    }

    /// Detail links answering to `link_probe` through their `href`.
    #[must_use]
    pub fn links(mut self, link_probe: Probe, links: Vec<String>) -> Self {
        self.link_probe = Some(link_probe);
        self.links = links;
        self
    }

    /// Scripted text node answering to `probe`.
    #[must_use]
    pub fn field(mut self, probe: Probe, text: impl Into<String>) -> Self {
        self.fields.push((
            probe,
            SimNode {
                text: Some(text.into()),
                attrs: HashMap::new(),
            },
        ));
        self
    }

    /// Scripted attribute node answering to `probe`.
    #[must_use]
    pub fn field_attr(
        mut self,
        probe: Probe,
        attr: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.fields.push((
            probe,
            SimNode {
                text: None,
                attrs: HashMap::from([(attr.into(), value.into())]),
            },
        ));
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<SimPage> {
        let growth_cap = self.growth_cap.max(self.initial_items);
        Arc::new(SimPage {
            url: self.url,
            item_probe: self.item_probe,
            control_probe: self.control_probe,
            link_probe: self.link_probe,
            links: self.links,
            fields: self.fields,
            extent_per_item: self.extent_per_item,
            mode: self.mode,
            state: Mutex::new(SimState {
                item_count: self.initial_items,
                growth_cap,
                growth_step: self.growth_step.max(1),
                control_present: true,
                control_vanishes_at_cap: self.control_vanishes_at_cap,
            }),
        })
    }
}

#[async_trait]
impl PageAccess for SimPage {
    async fn wait_for_load_signal(
        &self,
        _signal: LoadSignal,
        _timeout: Duration,
    ) -> Result<(), PageError> {
        Ok(())
    }

    async fn query_nodes(&self, probe: &Probe) -> Result<Vec<NodeHandle>, PageError> {
        if self.control_probe.as_ref() == Some(probe) {
            let state = self.state.lock().expect("sim state poisoned");
            return Ok(if state.control_present {
                vec![NodeHandle::new(CONTROL_HANDLE)]
            } else {
                vec![]
            });
        }
        if *probe == self.item_probe {
            let count = self.item_count();
            return Ok((0..count).map(|i| NodeHandle::new(ITEM_BASE + i)).collect());
        }
        if self.link_probe.as_ref() == Some(probe) {
            return Ok((0..self.links.len() as u64)
                .map(|i| NodeHandle::new(LINK_BASE + i))
                .collect());
        }
        Ok(self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, (field_probe, _))| field_probe == probe)
            .map(|(ix, _)| NodeHandle::new(FIELD_BASE + ix as u64))
            .collect())
    }

    async fn read_text(&self, node: NodeHandle) -> Result<Option<String>, PageError> {
        if node.raw() >= FIELD_BASE {
            return Ok(self.field_node(node.raw())?.text.clone());
        }
        Ok(None)
    }

    async fn read_attribute(
        &self,
        node: NodeHandle,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let raw = node.raw();
        if raw >= FIELD_BASE {
            return Ok(self.field_node(raw)?.attrs.get(name).cloned());
        }
        if raw >= LINK_BASE {
            let index = (raw - LINK_BASE) as usize;
            let link = self.links.get(index).ok_or(PageError::StaleNode(raw))?;
            return Ok((name == "href").then(|| link.clone()));
        }
        Ok(None)
    }

    async fn is_interactable(
        &self,
        node: NodeHandle,
        _timeout: Duration,
    ) -> Result<bool, PageError> {
        if node.raw() == CONTROL_HANDLE {
            let state = self.state.lock().expect("sim state poisoned");
            return Ok(state.control_present);
        }
        Ok(true)
    }

    async fn activate(&self, node: NodeHandle, _timeout: Duration) -> Result<(), PageError> {
        if node.raw() != CONTROL_HANDLE {
            return Ok(());
        }
        let mut state = self.state.lock().expect("sim state poisoned");
        if !state.control_present {
            return Err(PageError::Interaction(
                "load-more control is gone".to_string(),
            ));
        }
        if self.mode == GrowthMode::Control {
            state.grow();
        }
        Ok(())
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }

    async fn measure_content_extent(&self) -> Result<u64, PageError> {
        Ok(self.item_count() * self.extent_per_item)
    }

    async fn request_scroll_to_end(&self) -> Result<(), PageError> {
        if self.mode == GrowthMode::Scroll {
            self.state.lock().expect("sim state poisoned").grow();
        }
        Ok(())
    }
}

/// Scripted page provider with per-URL fault injection and open
/// accounting, so tests can assert how many page requests were actually
/// dispatched.
#[derive(Default)]
pub struct SimProvider {
    pages: Mutex<HashMap<String, Arc<dyn PageAccess>>>,
    faulting: Mutex<HashSet<String>>,
    opens: AtomicU64,
    open_log: Mutex<Vec<String>>,
}

impl SimProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a page under its URL.
    pub fn insert(&self, url: impl Into<String>, page: Arc<dyn PageAccess>) {
        self.pages
            .lock()
            .expect("sim provider poisoned")
            .insert(url.into(), page);
    }

    /// Makes `open` fault for this URL.
    pub fn fail(&self, url: impl Into<String>) {
        self.faulting
            .lock()
            .expect("sim provider poisoned")
            .insert(url.into());
    }

    /// Total number of `open` calls, including faulted ones.
    #[must_use]
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of `open` calls for one URL.
    #[must_use]
    pub fn opens_of(&self, url: &str) -> usize {
        self.open_log
            .lock()
            .expect("sim provider poisoned")
            .iter()
            .filter(|logged| logged.as_str() == url)
            .count()
    }
}

#[async_trait]
impl PageProvider for SimProvider {
    async fn open(&self, url: &str) -> Result<Arc<dyn PageAccess>, PageError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open_log
            .lock()
            .expect("sim provider poisoned")
            .push(url.to_string());

        if self
            .faulting
            .lock()
            .expect("sim provider poisoned")
            .contains(url)
        {
            return Err(PageError::Navigation {
                url: url.to_string(),
                message: "scripted fault".to_string(),
            });
        }
        self.pages
            .lock()
            .expect("sim provider poisoned")
            .get(url)
            .cloned()
            .ok_or_else(|| PageError::Navigation {
                url: url.to_string(),
                message: "no page scripted for this URL".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_probe() -> Probe {
        Probe::attribute_contains("class", "product-card")
    }

    fn control_probe() -> Probe {
        Probe::role("button", Some("Load more"))
    }

    #[tokio::test]
    async fn control_growth_stops_at_cap() {
        let page = SimPage::listing("https://shop.example.com/list", item_probe())
            .items(12)
            .grows_to(30, 12)
            .load_more(control_probe())
            .build();

        let control = page.query_nodes(&control_probe()).await.unwrap();
        assert_eq!(control.len(), 1);

        page.activate(control[0], Duration::from_secs(1)).await.unwrap();
        assert_eq!(page.item_count(), 24);
        page.activate(control[0], Duration::from_secs(1)).await.unwrap();
        assert_eq!(page.item_count(), 30);
        page.activate(control[0], Duration::from_secs(1)).await.unwrap();
        assert_eq!(page.item_count(), 30);
    }

    #[tokio::test]
    async fn vanishing_control_disappears_after_cap() {
        let page = SimPage::listing("https://shop.example.com/list", item_probe())
            .items(10)
            .grows_to(20, 10)
            .load_more_vanishing(control_probe())
            .build();

        let control = page.query_nodes(&control_probe()).await.unwrap();
        page.activate(control[0], Duration::from_secs(1)).await.unwrap();
        assert_eq!(page.item_count(), 20);

        assert!(page.query_nodes(&control_probe()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scroll_growth_extends_content_extent() {
        let page = SimPage::listing("https://shop.example.com/feed", item_probe())
            .items(5)
            .grows_to(10, 5)
            .scrollable()
            .build();

        let before = page.measure_content_extent().await.unwrap();
        page.request_scroll_to_end().await.unwrap();
        let after = page.measure_content_extent().await.unwrap();
        assert!(after > before);

        page.request_scroll_to_end().await.unwrap();
        let capped = page.measure_content_extent().await.unwrap();
        page.request_scroll_to_end().await.unwrap();
        assert_eq!(page.measure_content_extent().await.unwrap(), capped);
    }

    #[tokio::test]
    async fn provider_faults_and_counts_opens() {
        let provider = SimProvider::new();
        let page = SimPage::listing("https://shop.example.com/list", item_probe())
            .items(3)
            .build();
        provider.insert("https://shop.example.com/list", page);
        provider.fail("https://shop.example.com/broken");

        assert!(provider.open("https://shop.example.com/list").await.is_ok());
        assert!(matches!(
            provider.open("https://shop.example.com/broken").await,
            Err(PageError::Navigation { .. })
        ));
        assert!(matches!(
            provider.open("https://shop.example.com/unknown").await,
            Err(PageError::Navigation { .. })
        ));
        assert_eq!(provider.open_count(), 3);
        assert_eq!(provider.opens_of("https://shop.example.com/list"), 1);
    }
}
