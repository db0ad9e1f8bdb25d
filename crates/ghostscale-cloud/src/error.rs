//! Cloud lookup error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("node id {0:?} is not an AWS provider id")]
    UnrecognizedNodeId(String),

    #[error("no node group owns instance {0}")]
    NodeGroupNotFound(String),

    #[error("invalid node id pattern: {0}")]
    Pattern(#[from] regex::Error),
}
