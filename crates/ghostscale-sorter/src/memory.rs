//! In-memory expander.
//!
//! Provisions capacity units of a fixed shape with sequential identifiers
//! and records every call. Failures can be injected per operation, which
//! makes it the backing provider for dry runs and for tests.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use ghostscale_core::Resources;

use crate::expander::{Expander, ExpanderError, ProvisionedUnit};

/// A recorded `bind` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindCall {
    pub resources: Resources,
    pub group_id: String,
    pub unit_id: String,
}

/// Everything the expander has been asked to do so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    pub provision_attempts: u32,
    pub provisioned: Vec<String>,
    pub bind_attempts: u32,
    pub binds: Vec<BindCall>,
    pub unbind_attempts: u32,
    pub unbinds: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    next_unit: u32,
    fail_provision: u32,
    fail_bind: u32,
    fail_unbind: u32,
    reserved: HashSet<String>,
    log: CallLog,
}

#[derive(Debug)]
pub struct InMemoryExpander {
    unit_shape: Resources,
    /// Node group ceiling; provisioning beyond it is rejected.
    max_units: Option<u32>,
    inner: Mutex<Inner>,
}

impl InMemoryExpander {
    pub fn new(unit_shape: Resources) -> Self {
        Self {
            unit_shape,
            max_units: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_max_units(mut self, max_units: u32) -> Self {
        self.max_units = Some(max_units);
        self
    }

    /// Fail the next `n` provision calls.
    pub async fn fail_provision(&self, n: u32) {
        self.inner.lock().await.fail_provision = n;
    }

    /// Fail the next `n` bind calls.
    pub async fn fail_bind(&self, n: u32) {
        self.inner.lock().await.fail_bind = n;
    }

    /// Fail the next `n` unbind calls.
    pub async fn fail_unbind(&self, n: u32) {
        self.inner.lock().await.fail_unbind = n;
    }

    /// Mark `item_id` as having a placeholder reserved on its behalf.
    pub async fn reserve(&self, item_id: &str) {
        self.inner.lock().await.reserved.insert(item_id.to_string());
    }

    pub async fn clear_reservation(&self, item_id: &str) {
        self.inner.lock().await.reserved.remove(item_id);
    }

    pub async fn calls(&self) -> CallLog {
        self.inner.lock().await.log.clone()
    }
}

/// Consume one injected failure, if any are pending.
fn take_failure(pending: &mut u32) -> bool {
    if *pending > 0 {
        *pending -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl Expander for InMemoryExpander {
    async fn provision(&self) -> Result<ProvisionedUnit, ExpanderError> {
        let mut inner = self.inner.lock().await;
        inner.log.provision_attempts += 1;

        if take_failure(&mut inner.fail_provision) {
            return Err(ExpanderError::Transient("injected provision failure".into()));
        }
        if self.max_units.is_some_and(|max| inner.next_unit >= max) {
            return Err(ExpanderError::Rejected("node group at max size".into()));
        }

        inner.next_unit += 1;
        let id = format!("node-{}", inner.next_unit);
        inner.log.provisioned.push(id.clone());
        debug!(unit = %id, "provisioned in-memory unit");

        Ok(ProvisionedUnit {
            id,
            capacity: self.unit_shape,
        })
    }

    async fn bind(
        &self,
        resources: Resources,
        group_id: &str,
        unit_id: &str,
    ) -> Result<(), ExpanderError> {
        let mut inner = self.inner.lock().await;
        inner.log.bind_attempts += 1;

        if take_failure(&mut inner.fail_bind) {
            return Err(ExpanderError::Transient("injected bind failure".into()));
        }

        inner.log.binds.push(BindCall {
            resources,
            group_id: group_id.to_string(),
            unit_id: unit_id.to_string(),
        });
        Ok(())
    }

    async fn unbind(&self, item_id: &str) -> Result<(), ExpanderError> {
        let mut inner = self.inner.lock().await;
        inner.log.unbind_attempts += 1;

        if take_failure(&mut inner.fail_unbind) {
            return Err(ExpanderError::Transient("injected unbind failure".into()));
        }

        inner.log.unbinds.push(item_id.to_string());
        Ok(())
    }

    async fn has_reserved_placeholder(&self, item_id: &str) -> bool {
        self.inner.lock().await.reserved.contains(item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provisions_sequential_units() {
        let expander = InMemoryExpander::new(Resources::new(4, 8));
        let a = expander.provision().await.unwrap();
        let b = expander.provision().await.unwrap();

        assert_eq!(a.id, "node-1");
        assert_eq!(b.id, "node-2");
        assert_eq!(a.capacity, Resources::new(4, 8));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let expander = InMemoryExpander::new(Resources::new(4, 8));
        expander.fail_provision(2).await;

        assert!(expander.provision().await.is_err());
        assert!(expander.provision().await.is_err());
        assert!(expander.provision().await.is_ok());

        let log = expander.calls().await;
        assert_eq!(log.provision_attempts, 3);
        assert_eq!(log.provisioned, vec!["node-1".to_string()]);
    }

    #[tokio::test]
    async fn max_units_rejects() {
        let expander = InMemoryExpander::new(Resources::new(4, 8)).with_max_units(1);
        assert!(expander.provision().await.is_ok());
        assert!(matches!(
            expander.provision().await,
            Err(ExpanderError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn reservations_answer_queries() {
        let expander = InMemoryExpander::new(Resources::new(4, 8));
        assert!(!expander.has_reserved_placeholder("o1").await);

        expander.reserve("o1").await;
        assert!(expander.has_reserved_placeholder("o1").await);

        expander.clear_reservation("o1").await;
        assert!(!expander.has_reserved_placeholder("o1").await);
    }
}
