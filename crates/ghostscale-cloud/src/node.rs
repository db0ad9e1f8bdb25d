//! Node identifiers and node groups.

use std::fmt;

use regex::Regex;

use crate::error::CloudError;

/// Provider id as reported by the orchestrator, e.g.
/// `aws:///eu-central-1a/i-0123456789abcdef0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The cloud instance id embedded in the provider id.
    pub fn provider_instance_id(&self) -> Result<String, CloudError> {
        let re = Regex::new(r"^aws:///[^/]+/(.+)$")?;
        re.captures(&self.0)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| CloudError::UnrecognizedNodeId(self.0.clone()))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A group of identically shaped nodes the provider scales as one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeGroup {
    pub id: String,
}

impl NodeGroup {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_instance_id() {
        let id = NodeId::new("aws:///eu-central-1a/i-0abc123");
        assert_eq!(id.provider_instance_id().unwrap(), "i-0abc123");
    }

    #[test]
    fn rejects_other_formats() {
        for raw in ["", "i-0abc123", "gce://project/zone/vm", "aws:///eu-central-1a/"] {
            let err = NodeId::new(raw).provider_instance_id().unwrap_err();
            assert!(matches!(err, CloudError::UnrecognizedNodeId(_)), "{raw}");
        }
    }
}
