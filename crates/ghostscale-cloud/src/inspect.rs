//! Startup inspection of the capacity roster.

use tracing::{error, info};

use ghostscale_core::CapacityUnit;

use crate::error::CloudError;
use crate::node::{NodeGroup, NodeId};
use crate::provider::CloudProvider;

/// Resolve and log the node group of every capacity unit.
///
/// Unit ids are treated as provider ids. Lookup failures are logged and
/// returned alongside the successes, in roster order.
pub async fn describe_roster<P>(
    provider: &P,
    units: &[CapacityUnit],
) -> Vec<Result<NodeGroup, CloudError>>
where
    P: CloudProvider + ?Sized,
{
    let mut lookups = Vec::with_capacity(units.len());
    for unit in units {
        info!(
            unit = %unit.id,
            capacity = %unit.capacity,
            remaining = %unit.remaining,
            "capacity unit"
        );
        let lookup = provider.node_group_for_node(&NodeId::new(unit.id.clone())).await;
        match &lookup {
            Ok(group) => info!(unit = %unit.id, group = %group.id, "node group"),
            Err(e) => error!(unit = %unit.id, error = %e, "failed to resolve node group"),
        }
        lookups.push(lookup);
    }
    lookups
}
