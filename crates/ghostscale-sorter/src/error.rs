//! Sorter error types.

use thiserror::Error;

use crate::expander::ExpanderError;

/// Reasons an admission or removal could not be completed.
///
/// None of these are fatal to the sorter: admissions that fail are
/// requeued, and the consumer loop keeps running.
#[derive(Debug, Error)]
pub enum SorterError {
    #[error("provisioning failed after retries: {0}")]
    Provision(#[source] ExpanderError),

    #[error("binding {item} to {unit} failed after retries: {source}")]
    Bind {
        item: String,
        unit: String,
        #[source]
        source: ExpanderError,
    },

    #[error("evicting placeholder {item} failed after retries: {source}")]
    Eviction {
        item: String,
        #[source]
        source: ExpanderError,
    },

    #[error("{item} does not fit on {unit}")]
    InsufficientCapacity {
        item: String,
        unit: String,
        /// The unit was empty and freshly provisioned.
        fresh: bool,
    },

    #[error("no resident placeholder for group {0}")]
    PlaceholderNotFound(String),

    #[error("request queue is full")]
    QueueFull,

    #[error("sorter has stopped")]
    Stopped,
}

impl SorterError {
    /// An item too large for an empty, freshly provisioned unit will never
    /// fit anywhere the expander can provide.
    pub fn is_permanent(&self) -> bool {
        matches!(self, SorterError::InsufficientCapacity { fresh: true, .. })
    }
}

pub type SorterResult<T> = Result<T, SorterError>;
