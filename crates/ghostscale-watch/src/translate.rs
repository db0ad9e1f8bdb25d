//! Workload events to sorter requests.

use tracing::{debug, info};

use ghostscale_core::config::WatchSection;
use ghostscale_core::{DemandKind, DemandUnit, RequestKind};

use crate::filter::WorkloadFilter;
use crate::workload::{Workload, WorkloadEvent};

#[derive(Debug, Clone)]
pub struct Translator {
    placeholder_annotation: String,
    group_annotation: String,
    filter: WorkloadFilter,
}

impl Default for Translator {
    fn default() -> Self {
        Self::from_config(&WatchSection::default())
    }
}

impl Translator {
    pub fn from_config(config: &WatchSection) -> Self {
        Self {
            placeholder_annotation: config.placeholder_annotation.clone(),
            group_annotation: config.group_annotation.clone(),
            filter: WorkloadFilter::from_config(config),
        }
    }

    pub fn filter_mut(&mut self) -> &mut WorkloadFilter {
        &mut self.filter
    }

    /// The demand unit a workload represents.
    ///
    /// The group falls back from the group annotation to the owner uid and
    /// finally to the workload's own uid.
    pub fn demand(&self, workload: &Workload) -> DemandUnit {
        let group_id = workload
            .annotation(&self.group_annotation)
            .map(str::to_string)
            .or_else(|| workload.owner_ref().ok().flatten().map(|o| o.uid))
            .unwrap_or_else(|| workload.uid.clone());

        let kind = if workload.annotation(&self.placeholder_annotation) == Some("true") {
            DemandKind::Placeholder
        } else {
            DemandKind::Ordinary
        };

        DemandUnit {
            id: workload.key(),
            resources: workload.resources(),
            kind,
            group_id,
        }
    }

    /// Requests to submit for `event`, in submission order.
    ///
    /// Deletions are never filtered; removing an item the sorter does not
    /// hold is a no-op.
    pub fn translate(&self, event: &WorkloadEvent) -> Vec<(RequestKind, DemandUnit)> {
        match event {
            WorkloadEvent::Created(w) => {
                if self.skipped(w) {
                    return Vec::new();
                }
                info!(workload = %w.key(), "workload created");
                vec![(RequestKind::Admit, self.demand(w))]
            }
            WorkloadEvent::Updated { old, new } => {
                if self.skipped(new) {
                    return Vec::new();
                }
                let before = self.demand(old);
                let after = self.demand(new);
                if same_demand(&before, &after) {
                    debug!(workload = %new.key(), "workload updated, demand unchanged");
                    return Vec::new();
                }
                info!(workload = %new.key(), "workload demand changed");
                vec![(RequestKind::Remove, before), (RequestKind::Admit, after)]
            }
            WorkloadEvent::Deleted(w) => {
                info!(workload = %w.key(), "workload deleted");
                vec![(RequestKind::Remove, self.demand(w))]
            }
        }
    }

    fn skipped(&self, workload: &Workload) -> bool {
        match self.filter.skip(workload) {
            Some(reason) => {
                info!(workload = %workload.key(), %reason, "skipping workload");
                true
            }
            None => false,
        }
    }
}

fn same_demand(a: &DemandUnit, b: &DemandUnit) -> bool {
    a.id == b.id && a.resources == b.resources && a.kind == b.kind && a.group_id == b.group_id
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ghostscale_core::Resources;

    use super::*;
    use crate::workload::OwnerRef;

    fn workload(name: &str) -> Workload {
        Workload {
            uid: format!("uid-{name}"),
            namespace: "apps".into(),
            name: name.into(),
            cpu: 250,
            memory: 512,
            annotations: HashMap::new(),
            owner: Some(OwnerRef {
                kind: "ReplicaSet".into(),
                uid: "rs-9".into(),
            }),
        }
    }

    fn placeholder(name: &str) -> Workload {
        let mut w = workload(name);
        w.annotations
            .insert("ghostscale.io/placeholder".into(), "true".into());
        w.annotations
            .insert("ghostscale.io/group".into(), "checkout".into());
        w
    }

    #[test]
    fn created_becomes_admit() {
        let t = Translator::default();
        let out = t.translate(&WorkloadEvent::Created(workload("api-0")));

        assert_eq!(out.len(), 1);
        let (kind, item) = &out[0];
        assert_eq!(*kind, RequestKind::Admit);
        assert_eq!(item.id, "apps/api-0");
        assert_eq!(item.resources, Resources::new(250, 512));
        assert_eq!(item.kind, DemandKind::Ordinary);
        assert_eq!(item.group_id, "rs-9");
    }

    #[test]
    fn placeholder_annotation_and_group() {
        let item = Translator::default().demand(&placeholder("hold-0"));
        assert!(item.is_placeholder());
        assert_eq!(item.group_id, "checkout");
    }

    #[test]
    fn annotation_must_be_true() {
        let mut w = workload("api-0");
        w.annotations
            .insert("ghostscale.io/placeholder".into(), "yes".into());
        assert!(!Translator::default().demand(&w).is_placeholder());
    }

    #[test]
    fn group_falls_back_to_workload_uid() {
        let mut w = workload("solo");
        w.owner = None;
        assert_eq!(Translator::default().demand(&w).group_id, "uid-solo");
    }

    #[test]
    fn deleted_becomes_remove() {
        let out = Translator::default().translate(&WorkloadEvent::Deleted(workload("api-0")));
        assert_eq!(out[0].0, RequestKind::Remove);
        assert_eq!(out[0].1.id, "apps/api-0");
    }

    #[test]
    fn unchanged_update_is_ignored() {
        let old = workload("api-0");
        let mut new = old.clone();
        new.annotations.insert("unrelated".into(), "x".into());

        let out = Translator::default().translate(&WorkloadEvent::Updated { old, new });
        assert!(out.is_empty());
    }

    #[test]
    fn resized_update_replaces_demand() {
        let old = workload("api-0");
        let mut new = old.clone();
        new.memory = 2048;

        let out = Translator::default().translate(&WorkloadEvent::Updated { old, new });
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, RequestKind::Remove);
        assert_eq!(out[0].1.resources.memory, 512);
        assert_eq!(out[1].0, RequestKind::Admit);
        assert_eq!(out[1].1.resources.memory, 2048);
    }

    #[test]
    fn filtered_workloads_produce_nothing_but_deletes_pass() {
        let mut w = workload("agent");
        w.owner = Some(OwnerRef {
            kind: "DaemonSet".into(),
            uid: "ds-1".into(),
        });
        let t = Translator::default();

        assert!(t.translate(&WorkloadEvent::Created(w.clone())).is_empty());
        assert_eq!(t.translate(&WorkloadEvent::Deleted(w)).len(), 1);
    }

    #[test]
    fn registered_cron_jobs_are_skipped() {
        let mut w = workload("nightly-1234");
        w.owner = Some(OwnerRef {
            kind: "Job".into(),
            uid: "job-5".into(),
        });
        let mut t = Translator::default();
        t.filter_mut().register_cron_job("job-5");

        assert!(t.translate(&WorkloadEvent::Created(w)).is_empty());
    }
}
