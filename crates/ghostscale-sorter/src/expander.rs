//! The expander capability consumed by the sorter.
//!
//! Implementations perform the real side effects: adding a node to a node
//! group, binding a workload to a node, and removing a workload. The sorter
//! only decides; it never talks to a cloud or orchestrator directly.

use async_trait::async_trait;
use thiserror::Error;

use ghostscale_core::Resources;

/// A capacity unit freshly allocated by [`Expander::provision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedUnit {
    pub id: String,
    pub capacity: Resources,
}

/// Failure of a single expander call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpanderError {
    /// The call may succeed if retried.
    #[error("transient expander failure: {0}")]
    Transient(String),

    /// The backing provider refused the operation.
    #[error("rejected by provider: {0}")]
    Rejected(String),

    #[error("expander call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait]
pub trait Expander: Send + Sync + 'static {
    /// Allocate a new capacity unit out-of-band.
    async fn provision(&self) -> Result<ProvisionedUnit, ExpanderError>;

    /// Schedule a demand of `resources` in `group_id` onto `unit_id`.
    async fn bind(
        &self,
        resources: Resources,
        group_id: &str,
        unit_id: &str,
    ) -> Result<(), ExpanderError>;

    /// Remove a previously bound demand unit.
    async fn unbind(&self, item_id: &str) -> Result<(), ExpanderError>;

    /// True iff a placeholder is currently reserved on behalf of the
    /// ordinary demand unit `item_id`.
    async fn has_reserved_placeholder(&self, item_id: &str) -> bool;
}
