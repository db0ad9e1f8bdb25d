//! Watch adapter error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("malformed created-by annotation on {workload}: {source}")]
    CreatedBy {
        workload: String,
        #[source]
        source: serde_json::Error,
    },
}
