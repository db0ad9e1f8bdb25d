//! ghostscale-cloud — maps orchestrator nodes to cloud node groups.
//!
//! A node's provider identifier (`aws:///<zone>/<instance-id>`) is reduced
//! to an instance id, which a [`CloudProvider`] resolves to the node group
//! (an auto-scaling group on AWS) that owns it.

pub mod error;
pub mod inspect;
pub mod node;
pub mod provider;

pub use error::CloudError;
pub use inspect::describe_roster;
pub use node::{NodeGroup, NodeId};
pub use provider::{CloudProvider, StaticProvider};
