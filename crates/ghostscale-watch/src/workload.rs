//! Workload records as delivered by the orchestrator watch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use ghostscale_core::Resources;

use crate::error::WatchError;

/// Legacy annotation holding a serialized reference to the creating object.
pub const CREATED_BY_ANNOTATION: &str = "kubernetes.io/created-by";

/// The controller that owns a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub uid: String,
    pub namespace: String,
    pub name: String,
    /// Requested CPU in millicores.
    pub cpu: u64,
    /// Requested memory in bytes.
    pub memory: u64,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
}

/// A lifecycle change observed by the watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadEvent {
    Created(Workload),
    Updated { old: Workload, new: Workload },
    Deleted(Workload),
}

#[derive(Deserialize)]
struct SerializedReference {
    reference: OwnerRef,
}

impl Workload {
    /// `<namespace>/<name>`, used as the demand unit id.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn resources(&self) -> Resources {
        Resources::new(self.cpu, self.memory)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// The owning controller, from the owner field or else the created-by
    /// annotation.
    pub fn owner_ref(&self) -> Result<Option<OwnerRef>, WatchError> {
        if let Some(owner) = &self.owner {
            return Ok(Some(owner.clone()));
        }
        let Some(raw) = self.annotation(CREATED_BY_ANNOTATION) else {
            return Ok(None);
        };
        let parsed: SerializedReference =
            serde_json::from_str(raw).map_err(|source| WatchError::CreatedBy {
                workload: self.key(),
                source,
            })?;
        Ok(Some(parsed.reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload() -> Workload {
        Workload {
            uid: "w-1".into(),
            namespace: "default".into(),
            name: "web-0".into(),
            cpu: 500,
            memory: 1024,
            annotations: HashMap::new(),
            owner: None,
        }
    }

    #[test]
    fn key_joins_namespace_and_name() {
        assert_eq!(workload().key(), "default/web-0");
        assert_eq!(workload().resources(), Resources::new(500, 1024));
    }

    #[test]
    fn owner_field_wins() {
        let mut w = workload();
        w.owner = Some(OwnerRef {
            kind: "ReplicaSet".into(),
            uid: "rs-1".into(),
        });
        w.annotations.insert(
            CREATED_BY_ANNOTATION.into(),
            r#"{"reference":{"kind":"DaemonSet","uid":"ds-1"}}"#.into(),
        );
        assert_eq!(w.owner_ref().unwrap().unwrap().kind, "ReplicaSet");
    }

    #[test]
    fn created_by_annotation_is_decoded() {
        let mut w = workload();
        w.annotations.insert(
            CREATED_BY_ANNOTATION.into(),
            r#"{"kind":"SerializedReference","apiVersion":"v1","reference":{"kind":"Job","namespace":"default","uid":"job-7"}}"#.into(),
        );
        let owner = w.owner_ref().unwrap().unwrap();
        assert_eq!(owner.kind, "Job");
        assert_eq!(owner.uid, "job-7");
    }

    #[test]
    fn malformed_annotation_is_an_error() {
        let mut w = workload();
        w.annotations
            .insert(CREATED_BY_ANNOTATION.into(), "not json".into());
        assert!(matches!(w.owner_ref(), Err(WatchError::CreatedBy { .. })));
    }

    #[test]
    fn no_owner_at_all() {
        assert_eq!(workload().owner_ref().unwrap(), None);
    }
}
