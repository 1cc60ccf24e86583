//! # Page Access Contract
//!
//! The engine's boundary to the page-access collaborator. Browser process
//! management, network transport and HTML tokenization all live behind
//! these traits; the engine only ever sees opaque node handles and
//! bounded-timeout operations.
//!
//! Two in-tree collaborators ship with the crate: [`static_page`] adapts
//! a parsed HTML snapshot, and [`sim`] provides scripted pages for
//! hermetic tests.

pub mod sim;
pub mod static_page;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::selector::Probe;

pub use sim::{SimPage, SimProvider};
pub use static_page::StaticPage;

/// Opaque handle to a node within one page. Valid only for the page that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(u64);

impl NodeHandle {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Load signals a caller can wait on before probing a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSignal {
    /// DOM content parsed.
    DomReady,
    /// Network-idle-equivalent settling.
    NetworkIdle,
}

/// Fault raised by the page-access collaborator. Always non-fatal to a
/// run; the coordinator records it per URL and continues.
#[derive(Error, Debug, Clone)]
pub enum PageError {
    #[error("navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("page interaction failed: {0}")]
    Interaction(String),

    #[error("page access timed out: {0}")]
    Timeout(String),

    #[error("stale node handle {0}")]
    StaleNode(u64),

    #[error("collaborator fault: {0}")]
    Collaborator(String),
}

/// Read and interaction surface of one open page.
///
/// All waits are bounded; no method may block indefinitely. Retries of a
/// failed fetch are the collaborator's responsibility and are treated as
/// already applied before a fault reaches the engine.
#[async_trait]
pub trait PageAccess: Send + Sync {
    /// Waits for a load signal, bounded by `timeout`.
    async fn wait_for_load_signal(
        &self,
        signal: LoadSignal,
        timeout: Duration,
    ) -> Result<(), PageError>;

    /// Nodes matching a probe, in document order.
    async fn query_nodes(&self, probe: &Probe) -> Result<Vec<NodeHandle>, PageError>;

    /// Text content of a node; `None` when the node carries no text.
    async fn read_text(&self, node: NodeHandle) -> Result<Option<String>, PageError>;

    /// A named attribute of a node.
    async fn read_attribute(
        &self,
        node: NodeHandle,
        name: &str,
    ) -> Result<Option<String>, PageError>;

    /// Whether a node can currently be activated, observed within `timeout`.
    async fn is_interactable(&self, node: NodeHandle, timeout: Duration)
    -> Result<bool, PageError>;

    /// Activates a node (e.g. clicks a load-more control), bounded by
    /// `timeout`.
    async fn activate(&self, node: NodeHandle, timeout: Duration) -> Result<(), PageError>;

    /// URL of the page, used as the base for link resolution.
    fn current_url(&self) -> String;

    /// Total content extent (a layout-height equivalent) for scroll-driven
    /// growth detection.
    async fn measure_content_extent(&self) -> Result<u64, PageError>;

    /// Requests the environment scroll to the bottom of the page.
    async fn request_scroll_to_end(&self) -> Result<(), PageError>;
}

/// Opens pages for URLs. The seam to the fetching collaborator; each
/// `open` is final once it returns, retry policy lives behind it.
#[async_trait]
pub trait PageProvider: Send + Sync {
    async fn open(&self, url: &str) -> Result<Arc<dyn PageAccess>, PageError>;
}
