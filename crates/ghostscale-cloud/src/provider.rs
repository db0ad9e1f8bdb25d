//! Cloud provider capability and a static implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CloudError;
use crate::node::{NodeGroup, NodeId};

#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// The node group that owns `node`.
    async fn node_group_for_node(&self, node: &NodeId) -> Result<NodeGroup, CloudError>;
}

/// Fixed instance-id to node-group table.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    groups: HashMap<String, NodeGroup>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(mut self, instance_id: impl Into<String>, group: NodeGroup) -> Self {
        self.insert(instance_id, group);
        self
    }

    pub fn insert(&mut self, instance_id: impl Into<String>, group: NodeGroup) {
        self.groups.insert(instance_id.into(), group);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[async_trait]
impl CloudProvider for StaticProvider {
    async fn node_group_for_node(&self, node: &NodeId) -> Result<NodeGroup, CloudError> {
        let instance_id = node.provider_instance_id()?;
        debug!(node = %node, instance = %instance_id, "resolved provider instance id");
        self.groups
            .get(&instance_id)
            .cloned()
            .ok_or(CloudError::NodeGroupNotFound(instance_id))
    }
}
