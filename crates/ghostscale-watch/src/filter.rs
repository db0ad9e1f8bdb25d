//! Workload-kind filtering.
//!
//! Daemon-owned workloads run on every node regardless of capacity, and
//! cron-scheduled jobs are short-lived; neither should drive scale-out.

use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use ghostscale_core::config::WatchSection;

use crate::workload::Workload;

const DAEMON_SET: &str = "DaemonSet";
const JOB: &str = "Job";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DaemonOwned,
    CronJobOwned,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DaemonOwned => write!(f, "owned by a daemon set"),
            SkipReason::CronJobOwned => write!(f, "owned by a cron job"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadFilter {
    skip_daemon_owned: bool,
    skip_cron_owned: bool,
    /// Uids of jobs created by a cron schedule.
    cron_jobs: HashSet<String>,
}

impl Default for WorkloadFilter {
    fn default() -> Self {
        Self::from_config(&WatchSection::default())
    }
}

impl WorkloadFilter {
    pub fn from_config(config: &WatchSection) -> Self {
        Self {
            skip_daemon_owned: config.skip_daemon_owned,
            skip_cron_owned: config.skip_cron_owned,
            cron_jobs: HashSet::new(),
        }
    }

    pub fn register_cron_job(&mut self, job_uid: impl Into<String>) {
        self.cron_jobs.insert(job_uid.into());
    }

    pub fn forget_cron_job(&mut self, job_uid: &str) -> bool {
        self.cron_jobs.remove(job_uid)
    }

    /// Why `workload` should be ignored, or `None` to let it through.
    ///
    /// An unreadable owner reference is treated as no owner.
    pub fn skip(&self, workload: &Workload) -> Option<SkipReason> {
        let owner = match workload.owner_ref() {
            Ok(Some(owner)) => owner,
            Ok(None) => return None,
            Err(e) => {
                warn!(workload = %workload.key(), error = %e, "ignoring unreadable owner reference");
                return None;
            }
        };

        if self.skip_daemon_owned && owner.kind == DAEMON_SET {
            return Some(SkipReason::DaemonOwned);
        }
        if self.skip_cron_owned && owner.kind == JOB && self.cron_jobs.contains(&owner.uid) {
            return Some(SkipReason::CronJobOwned);
        }
        None
    }
}
