//! The sorter, single authority over the capacity roster.
//!
//! Producers enqueue [`Request`]s through a [`SorterHandle`]; one consumer
//! loop ([`Sorter::run`]) drains the bounded queue and processes each
//! request to completion before reading the next. Roster mutation and
//! [`SorterHandle::resync`] share one lock, so a resync never interleaves
//! with a half-applied admission.
//!
//! # Admission
//!
//! ```text
//! placeholder            -> first fit over existing units, else provision
//! ordinary, no reserve   -> provision a fresh unit and bind there
//! ordinary, reserved     -> evict the group's placeholder, bind in its
//!                           place, re-accommodate the placeholder elsewhere
//! any failure            -> requeue with backoff, dead-letter when exhausted
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use ghostscale_core::{
    CapacityUnit, ConfigError, DemandUnit, GhostscaleConfig, Request, RequestKind, parse_duration,
};

use crate::error::{SorterError, SorterResult};
use crate::expander::Expander;
use crate::ids::RequestIds;
use crate::requeue::{DeadLetter, InFlight, RequeueDecision, RequeuePolicy};
use crate::retry::{RetryPolicy, retry};
use crate::roster::Roster;
use crate::stats::{SorterStats, StatsSnapshot, render_prometheus};

/// Tunables for a [`Sorter`].
#[derive(Debug, Clone)]
pub struct SorterConfig {
    pub queue_capacity: usize,
    pub retry: RetryPolicy,
    pub requeue: RequeuePolicy,
    /// Fixed seed for request ids; `None` draws from OS entropy.
    pub id_seed: Option<u64>,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            retry: RetryPolicy::default(),
            requeue: RequeuePolicy::default(),
            id_seed: None,
        }
    }
}

impl TryFrom<&GhostscaleConfig> for SorterConfig {
    type Error = ConfigError;

    fn try_from(config: &GhostscaleConfig) -> Result<Self, Self::Error> {
        config.validate()?;
        Ok(Self {
            queue_capacity: config.sorter.queue_capacity,
            retry: RetryPolicy {
                attempts: config.retry.attempts,
                call_timeout: config.call_timeout()?,
            },
            requeue: RequeuePolicy {
                max_attempts: config.requeue.max_attempts,
                base_backoff: parse_duration(&config.requeue.base_backoff)?,
                max_backoff: parse_duration(&config.requeue.max_backoff)?,
            },
            id_seed: None,
        })
    }
}

/// State shared between the consumer loop and every handle.
struct Shared {
    roster: tokio::sync::Mutex<Roster>,
    ids: Mutex<RequestIds>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    in_flight: Mutex<InFlight>,
    stats: SorterStats,
}

impl Shared {
    fn next_id(&self) -> String {
        lock(&self.ids).next_id()
    }
}

/// Lock a std mutex, recovering the data from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable producer-side handle to a [`Sorter`].
#[derive(Clone)]
pub struct SorterHandle {
    tx: mpsc::Sender<Request>,
    shared: Arc<Shared>,
}

impl SorterHandle {
    /// Enqueue a request, waiting while the queue is full.
    pub async fn submit(&self, req: Request) -> SorterResult<()> {
        self.tx.send(req).await.map_err(|_| SorterError::Stopped)
    }

    /// Enqueue a request without waiting.
    pub fn try_submit(&self, req: Request) -> SorterResult<()> {
        self.tx.try_send(req).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SorterError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SorterError::Stopped,
        })
    }

    /// Wrap `item` in a fresh admit request and enqueue it.
    pub async fn admit(&self, item: DemandUnit) -> SorterResult<()> {
        self.submit(self.request(RequestKind::Admit, item)).await
    }

    /// Wrap `item` in a fresh remove request and enqueue it.
    pub async fn remove(&self, item: DemandUnit) -> SorterResult<()> {
        self.submit(self.request(RequestKind::Remove, item)).await
    }

    /// Build a request with a fresh identifier.
    pub fn request(&self, kind: RequestKind, item: DemandUnit) -> Request {
        Request::new(self.shared.next_id(), kind, item)
    }

    /// Replace the whole roster.
    pub async fn resync(&self, units: Vec<CapacityUnit>) {
        let mut roster = self.shared.roster.lock().await;
        info!(units = units.len(), "roster resynced");
        *roster = Roster::new(units);
    }

    /// Snapshot of the current roster.
    pub async fn roster(&self) -> Vec<CapacityUnit> {
        self.shared.roster.lock().await.units().to_vec()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        lock(&self.shared.dead_letters).clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Requests currently waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Counters and queue depth in Prometheus text format.
    pub fn render_metrics(&self) -> String {
        render_prometheus(&self.stats(), self.queue_depth())
    }
}

/// The placement engine. Owns the consuming end of the request queue.
pub struct Sorter<E: Expander> {
    expander: Arc<E>,
    shared: Arc<Shared>,
    rx: mpsc::Receiver<Request>,
    /// Used to requeue failed admissions.
    tx: mpsc::Sender<Request>,
    retry: RetryPolicy,
    requeue: RequeuePolicy,
}

impl<E: Expander> Sorter<E> {
    /// Build a sorter over `initial` and a handle for producers.
    ///
    /// Nothing is processed until [`Sorter::run`] starts.
    pub fn build(
        initial: Vec<CapacityUnit>,
        expander: Arc<E>,
        config: SorterConfig,
    ) -> (Self, SorterHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let ids = match config.id_seed {
            Some(seed) => RequestIds::seeded(seed),
            None => RequestIds::from_entropy(),
        };
        let shared = Arc::new(Shared {
            roster: tokio::sync::Mutex::new(Roster::new(initial)),
            ids: Mutex::new(ids),
            dead_letters: Mutex::new(Vec::new()),
            in_flight: Mutex::new(InFlight::default()),
            stats: SorterStats::default(),
        });

        let handle = SorterHandle {
            tx: tx.clone(),
            shared: Arc::clone(&shared),
        };
        let sorter = Self {
            expander,
            shared,
            rx,
            tx,
            retry: config.retry,
            requeue: config.requeue,
        };
        (sorter, handle)
    }

    /// Drain the queue until `shutdown` fires.
    ///
    /// Shutdown is only observed between requests; an in-flight request
    /// always runs to completion.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(queue_capacity = self.tx.max_capacity(), "sorter started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                req = self.rx.recv() => match req {
                    Some(req) => self.handle_request(req).await,
                    None => break,
                },
            }
        }

        info!("sorter terminating");
    }

    /// Process one request to completion.
    pub async fn handle_request(&mut self, req: Request) {
        info!(
            request = %req.describe(),
            item = %req.item.id,
            attempt = req.attempt,
            "new request"
        );

        match req.kind {
            RequestKind::Admit => {
                if req.attempt > 0 && lock(&self.shared.in_flight).settle(&req.item.id) {
                    self.shared.stats.record_cancelled();
                    info!(
                        request = %req.describe(),
                        item = %req.item.id,
                        "item was removed while awaiting requeue, dropping admission"
                    );
                    return;
                }
                match self.admit(&req.item).await {
                    Ok(true) => self.shared.stats.record_admitted(),
                    Ok(false) => {}
                    Err(e) if e.is_permanent() => {
                        error!(item = %req.item.id, error = %e, "admission can never succeed");
                        self.dead_letter(req, e.to_string());
                    }
                    Err(e) => {
                        error!(
                            item = %req.item.id,
                            group = %req.item.group_id,
                            error = %e,
                            "failed to accommodate item, requeuing"
                        );
                        self.requeue(req, e.to_string());
                    }
                }
            }
            RequestKind::Remove => self.remove(&req.item).await,
        }
    }

    /// Place `item` on the roster, scaling out or evicting as needed.
    ///
    /// Returns `false` if the item was already resident.
    pub async fn admit(&self, item: &DemandUnit) -> SorterResult<bool> {
        if item.is_placeholder() {
            let mut roster = self.shared.roster.lock().await;
            if roster.locate(&item.id).is_some() {
                debug!(item = %item.id, "item already resident");
                return Ok(false);
            }
            self.accommodate_placeholder(&mut roster, item, None).await?;
            return Ok(true);
        }

        // Read-only query; deliberately outside the roster lock.
        let reserved = self.expander.has_reserved_placeholder(&item.id).await;

        let mut roster = self.shared.roster.lock().await;
        if roster.locate(&item.id).is_some() {
            debug!(item = %item.id, "item already resident");
            return Ok(false);
        }
        if reserved {
            self.evict_and_replace(&mut roster, item).await?;
        } else {
            self.scale_out(&mut roster, item).await?;
        }
        Ok(true)
    }

    /// Remove `item` from whichever unit holds it.
    ///
    /// An absent item whose admission is waiting to be requeued is
    /// tombstoned so that admission is dropped; otherwise absence is a no-op.
    pub async fn remove(&self, item: &DemandUnit) {
        let mut roster = self.shared.roster.lock().await;
        let Some(slot) = roster.locate(&item.id) else {
            if lock(&self.shared.in_flight).cancel(&item.id) {
                info!(item = %item.id, "item removed while its admission awaits requeue");
            } else {
                debug!(item = %item.id, "item not resident, nothing to remove");
            }
            return;
        };

        let removed = roster.release(slot);
        let unit = roster.unit(slot.0);
        self.shared.stats.record_removed();
        info!(
            item = %removed.id,
            unit = %unit.id,
            remaining = %unit.remaining,
            "item removed"
        );

        let expander = &self.expander;
        let id = removed.id.as_str();
        if let Err(e) = retry("unbind", &self.retry, move || expander.unbind(id)).await {
            self.shared.stats.record_expander_failure();
            warn!(item = %removed.id, error = %e, "unbind failed after removal");
        }
    }

    /// First fit over existing units (skipping `exclude`), else provision.
    async fn accommodate_placeholder(
        &self,
        roster: &mut Roster,
        item: &DemandUnit,
        exclude: Option<&str>,
    ) -> SorterResult<()> {
        for idx in roster.candidates(&item.resources, exclude) {
            let unit_id = roster.unit(idx).id.clone();
            match self.bind(item, &unit_id).await {
                Ok(()) => {
                    self.commit(roster, idx, None, item);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        item = %item.id,
                        group = %item.group_id,
                        unit = %unit_id,
                        error = %e,
                        "failed to place placeholder on unit"
                    );
                }
            }
        }

        debug!(item = %item.id, "no unit can accommodate placeholder, provisioning");
        self.scale_out(roster, item).await
    }

    /// Provision a fresh unit and bind `item` there.
    async fn scale_out(&self, roster: &mut Roster, item: &DemandUnit) -> SorterResult<()> {
        let idx = self.provision(roster).await?;
        self.bind_and_commit(roster, idx, None, item).await
    }

    /// Evict the placeholder of `item`'s group and put `item` in its place.
    async fn evict_and_replace(&self, roster: &mut Roster, item: &DemandUnit) -> SorterResult<()> {
        let Some(slot) = roster.find_placeholder(&item.group_id) else {
            return Err(SorterError::PlaceholderNotFound(item.group_id.clone()));
        };
        if !roster.fits_after_release(slot, &item.resources) {
            warn!(
                item = %item.id,
                group = %item.group_id,
                "item exceeds the capacity its placeholder would vacate, scaling out"
            );
            return self.scale_out(roster, item).await;
        }

        let (unit_idx, item_idx) = slot;
        let unit_id = roster.unit(unit_idx).id.clone();
        let placeholder_id = roster.unit(unit_idx).placed[item_idx].id.clone();

        let expander = &self.expander;
        let id = placeholder_id.as_str();
        retry("unbind", &self.retry, move || expander.unbind(id))
            .await
            .map_err(|source| {
                self.shared.stats.record_expander_failure();
                SorterError::Eviction {
                    item: placeholder_id.clone(),
                    source,
                }
            })?;

        let placeholder = roster.release(slot);
        self.shared.stats.record_evicted();
        info!(
            placeholder = %placeholder.id,
            unit = %unit_id,
            group = %item.group_id,
            "evicted placeholder"
        );

        if let Err(e) = self.bind_and_commit(roster, unit_idx, Some(item_idx), item).await {
            // The placeholder is already gone from the unit; give it its
            // own chance at a new home.
            self.requeue(
                Request::new(self.shared.next_id(), RequestKind::Admit, placeholder),
                e.to_string(),
            );
            return Err(e);
        }

        match self
            .accommodate_placeholder(roster, &placeholder, Some(&unit_id))
            .await
        {
            Ok(()) => self.shared.stats.record_relocated(),
            Err(e) => {
                warn!(
                    placeholder = %placeholder.id,
                    error = %e,
                    "failed to re-accommodate evicted placeholder, requeuing"
                );
                self.requeue(
                    Request::new(self.shared.next_id(), RequestKind::Admit, placeholder),
                    e.to_string(),
                );
            }
        }
        Ok(())
    }

    async fn provision(&self, roster: &mut Roster) -> SorterResult<usize> {
        let expander = &self.expander;
        let unit = retry("provision", &self.retry, move || expander.provision())
            .await
            .map_err(|e| {
                self.shared.stats.record_expander_failure();
                SorterError::Provision(e)
            })?;

        self.shared.stats.record_provisioned();
        info!(
            unit = %unit.id,
            capacity = %unit.capacity,
            units = roster.units().len() + 1,
            "provisioned capacity unit"
        );
        Ok(roster.push(CapacityUnit::empty(unit.id, unit.capacity)))
    }

    async fn bind(&self, item: &DemandUnit, unit_id: &str) -> SorterResult<()> {
        let expander = &self.expander;
        retry("bind", &self.retry, move || {
            expander.bind(item.resources, &item.group_id, unit_id)
        })
        .await
        .map_err(|source| {
            self.shared.stats.record_expander_failure();
            SorterError::Bind {
                item: item.id.clone(),
                unit: unit_id.to_string(),
                source,
            }
        })
    }

    /// Bind `item` onto unit `idx` and record it, checking fit first.
    async fn bind_and_commit(
        &self,
        roster: &mut Roster,
        idx: usize,
        position: Option<usize>,
        item: &DemandUnit,
    ) -> SorterResult<()> {
        let unit = roster.unit(idx);
        if !unit.remaining.fits(&item.resources) {
            return Err(SorterError::InsufficientCapacity {
                item: item.id.clone(),
                unit: unit.id.clone(),
                fresh: unit.placed.is_empty() && unit.remaining == unit.capacity,
            });
        }

        let unit_id = unit.id.clone();
        self.bind(item, &unit_id).await?;
        self.commit(roster, idx, position, item);
        Ok(())
    }

    fn commit(&self, roster: &mut Roster, idx: usize, position: Option<usize>, item: &DemandUnit) {
        let result = match position {
            Some(pos) => roster.commit_at(idx, pos, item.clone()),
            None => roster.commit(idx, item.clone()),
        };
        let unit = roster.unit(idx);
        match result {
            Ok(()) => {
                info!(
                    item = %item.id,
                    kind = ?item.kind,
                    unit = %unit.id,
                    remaining = %unit.remaining,
                    "item placed"
                );
            }
            Err(item) => {
                error!(item = %item.id, unit = %unit.id, "bound item does not fit its unit");
            }
        }
    }

    /// Resubmit a failed admission as a new request, or dead-letter it.
    ///
    /// The resubmission happens from a spawned task so the consumer loop
    /// never blocks on its own queue.
    fn requeue(&self, req: Request, reason: String) {
        let attempt = req.attempt + 1;
        match self.requeue.decide(attempt) {
            RequeueDecision::DeadLetter => self.dead_letter(req, reason),
            RequeueDecision::Retry { delay } => {
                let next = Request {
                    id: self.shared.next_id(),
                    kind: req.kind,
                    item: req.item,
                    attempt,
                };
                self.shared.stats.record_requeued();
                lock(&self.shared.in_flight).track(&next.item.id);
                warn!(
                    request = %next.describe(),
                    item = %next.item.id,
                    group = %next.item.group_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "requeuing request"
                );

                let tx = self.tx.clone();
                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    if tx.send(next).await.is_err() {
                        debug!("sorter stopped before requeued request was delivered");
                    }
                });
            }
        }
    }

    fn dead_letter(&self, request: Request, reason: String) {
        self.shared.stats.record_dead_lettered();
        error!(
            item = %request.item.id,
            group = %request.item.group_id,
            attempt = request.attempt,
            %reason,
            "giving up on request"
        );
        lock(&self.shared.dead_letters).push(DeadLetter { request, reason });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ghostscale_core::Resources;

    use super::*;
    use crate::memory::InMemoryExpander;

    fn config() -> SorterConfig {
        SorterConfig {
            queue_capacity: 16,
            retry: RetryPolicy {
                attempts: 3,
                call_timeout: None,
            },
            requeue: RequeuePolicy {
                max_attempts: 2,
                base_backoff: Duration::ZERO,
                max_backoff: Duration::ZERO,
            },
            id_seed: Some(1),
        }
    }

    fn setup(units: Vec<CapacityUnit>) -> (Sorter<InMemoryExpander>, SorterHandle, Arc<InMemoryExpander>) {
        let expander = Arc::new(InMemoryExpander::new(Resources::new(4, 8)));
        let (sorter, handle) = Sorter::build(units, Arc::clone(&expander), config());
        (sorter, handle, expander)
    }

    fn u1() -> CapacityUnit {
        CapacityUnit::empty("u1", Resources::new(4, 8))
    }

    fn p1() -> DemandUnit {
        DemandUnit::placeholder("p1", Resources::new(2, 4), "g")
    }

    fn admit(handle: &SorterHandle, item: DemandUnit) -> Request {
        handle.request(RequestKind::Admit, item)
    }

    fn assert_conserved(units: &[CapacityUnit]) {
        for unit in units {
            assert!(unit.is_conserved(), "unit {} violates conservation", unit.id);
        }
    }

    #[tokio::test]
    async fn placeholder_lands_on_first_fit() {
        let (mut sorter, handle, expander) = setup(vec![u1()]);

        sorter.handle_request(admit(&handle, p1())).await;

        let roster = handle.roster().await;
        assert_eq!(roster.len(), 1);
        assert!(roster[0].holds("p1"));
        assert_eq!(roster[0].remaining, Resources::new(2, 4));
        assert!(expander.calls().await.provisioned.is_empty());
        assert_conserved(&roster);
    }

    #[tokio::test]
    async fn reserved_ordinary_evicts_placeholder() {
        let (mut sorter, handle, expander) = setup(vec![u1()]);
        sorter.handle_request(admit(&handle, p1())).await;

        expander.reserve("o1").await;
        let o1 = DemandUnit::ordinary("o1", Resources::new(2, 4), "g");
        sorter.handle_request(admit(&handle, o1)).await;

        let roster = handle.roster().await;
        assert_eq!(roster.len(), 2);
        assert!(roster[0].holds("o1"));
        assert!(!roster[0].holds("p1"));
        assert_eq!(roster[1].id, "node-1");
        assert!(roster[1].holds("p1"));
        assert_eq!(expander.calls().await.unbinds, vec!["p1".to_string()]);
        let stats = handle.stats();
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.relocated, 1);
        assert_eq!(stats.admitted, 2);
        assert_conserved(&roster);
    }

    #[tokio::test]
    async fn unreserved_ordinary_always_scales_out() {
        let (mut sorter, handle, expander) = setup(vec![u1()]);

        let o2 = DemandUnit::ordinary("o2", Resources::new(1, 1), "h");
        sorter.handle_request(admit(&handle, o2)).await;

        let roster = handle.roster().await;
        assert_eq!(roster.len(), 2);
        assert!(roster[0].placed.is_empty());
        assert!(roster[1].holds("o2"));
        assert_eq!(expander.calls().await.provisioned, vec!["node-1".to_string()]);
    }

    #[tokio::test]
    async fn failed_provisioning_requeues_with_new_id() {
        let (mut sorter, handle, expander) = setup(vec![u1()]);
        expander.fail_provision(3).await;

        let p2 = DemandUnit::placeholder("p2", Resources::new(8, 16), "k");
        let original = admit(&handle, p2);
        let original_id = original.id.clone();
        sorter.handle_request(original).await;

        let requeued = sorter.rx.recv().await.unwrap();
        assert_ne!(requeued.id, original_id);
        assert_eq!(requeued.kind, RequestKind::Admit);
        assert_eq!(requeued.item.id, "p2");
        assert_eq!(requeued.attempt, 1);

        let roster = handle.roster().await;
        assert_eq!(roster.len(), 1);
        assert!(roster[0].placed.is_empty());
        assert_eq!(expander.calls().await.provision_attempts, 3);
        assert_eq!(handle.stats().requeued, 1);
    }

    #[tokio::test]
    async fn oversized_item_is_dead_lettered() {
        let (mut sorter, handle, _expander) = setup(vec![]);

        let huge = DemandUnit::ordinary("huge", Resources::new(64, 64), "x");
        sorter.handle_request(admit(&handle, huge)).await;

        let dead = handle.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].request.item.id, "huge");
        assert_eq!(handle.stats().requeued, 0);
    }

    #[tokio::test]
    async fn requeue_gives_up_after_max_attempts() {
        let (mut sorter, handle, expander) = setup(vec![]);
        expander.fail_provision(u32::MAX).await;

        let mut req = admit(&handle, p1());
        req.attempt = 2;
        sorter.handle_request(req).await;

        assert_eq!(handle.dead_letters().len(), 1);
        assert_eq!(handle.stats().dead_lettered, 1);
        assert!(sorter.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_placeholder_requeues_ordinary() {
        let (mut sorter, handle, expander) = setup(vec![u1()]);
        expander.reserve("o1").await;

        let o1 = DemandUnit::ordinary("o1", Resources::new(2, 4), "g");
        sorter.handle_request(admit(&handle, o1)).await;

        let requeued = sorter.rx.recv().await.unwrap();
        assert_eq!(requeued.item.id, "o1");
        assert!(handle.roster().await[0].placed.is_empty());
    }

    #[tokio::test]
    async fn eviction_failure_leaves_placeholder_resident() {
        let (mut sorter, handle, expander) = setup(vec![u1()]);
        sorter.handle_request(admit(&handle, p1())).await;

        expander.reserve("o1").await;
        expander.fail_unbind(3).await;
        let o1 = DemandUnit::ordinary("o1", Resources::new(2, 4), "g");
        sorter.handle_request(admit(&handle, o1)).await;

        let roster = handle.roster().await;
        assert!(roster[0].holds("p1"));
        assert!(!roster[0].holds("o1"));
        let requeued = sorter.rx.recv().await.unwrap();
        assert_eq!(requeued.item.id, "o1");
    }

    #[tokio::test]
    async fn bind_failure_after_eviction_requeues_both() {
        let (mut sorter, handle, expander) = setup(vec![u1()]);
        sorter.handle_request(admit(&handle, p1())).await;

        expander.reserve("o1").await;
        expander.fail_bind(3).await;
        let o1 = DemandUnit::ordinary("o1", Resources::new(2, 4), "g");
        sorter.handle_request(admit(&handle, o1)).await;

        let mut requeued = vec![
            sorter.rx.recv().await.unwrap().item.id,
            sorter.rx.recv().await.unwrap().item.id,
        ];
        requeued.sort();
        assert_eq!(requeued, vec!["o1".to_string(), "p1".to_string()]);

        let roster = handle.roster().await;
        assert!(roster[0].placed.is_empty());
        assert_conserved(&roster);
    }

    #[tokio::test]
    async fn remove_credits_capacity_and_unbinds() {
        let (mut sorter, handle, expander) = setup(vec![u1()]);
        sorter.handle_request(admit(&handle, p1())).await;

        let req = handle.request(RequestKind::Remove, p1());
        sorter.handle_request(req).await;

        let roster = handle.roster().await;
        assert!(roster[0].placed.is_empty());
        assert_eq!(roster[0].remaining, Resources::new(4, 8));
        assert_eq!(expander.calls().await.unbinds, vec!["p1".to_string()]);
        assert_eq!(handle.stats().removed, 1);
    }

    #[tokio::test]
    async fn remove_during_backoff_drops_requeued_admission() {
        let (mut sorter, handle, expander) = setup(vec![]);
        expander.fail_provision(3).await;
        let o1 = DemandUnit::ordinary("o1", Resources::new(1, 1), "g");

        sorter.handle_request(admit(&handle, o1.clone())).await;
        let requeued = sorter.rx.recv().await.unwrap();
        sorter
            .handle_request(handle.request(RequestKind::Remove, o1.clone()))
            .await;
        sorter.handle_request(requeued).await;

        assert!(handle.roster().await.is_empty());
        let calls = expander.calls().await;
        assert_eq!(calls.provision_attempts, 3);
        assert!(calls.binds.is_empty());
        let stats = handle.stats();
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.admitted, 0);

        // The tombstone is spent; a fresh admission goes through.
        sorter.handle_request(admit(&handle, o1)).await;
        assert!(handle.roster().await[0].holds("o1"));
    }

    #[tokio::test]
    async fn removing_absent_item_is_noop() {
        let (mut sorter, handle, expander) = setup(vec![u1()]);

        let ghost = DemandUnit::ordinary("nobody", Resources::new(1, 1), "g");
        sorter.handle_request(handle.request(RequestKind::Remove, ghost)).await;

        assert_eq!(handle.roster().await[0].remaining, Resources::new(4, 8));
        assert!(expander.calls().await.unbinds.is_empty());
        assert_eq!(handle.stats().removed, 0);
        assert_eq!(handle.stats().cancelled, 0);
    }

    #[tokio::test]
    async fn resync_replaces_roster() {
        let (_sorter, handle, _expander) = setup(vec![u1()]);

        handle
            .resync(vec![CapacityUnit::empty("fresh", Resources::new(2, 2))])
            .await;

        let roster = handle.roster().await;
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, "fresh");
    }

    #[tokio::test]
    async fn try_submit_reports_full_queue() {
        let expander = Arc::new(InMemoryExpander::new(Resources::new(4, 8)));
        let cfg = SorterConfig {
            queue_capacity: 1,
            ..config()
        };
        let (_sorter, handle) = Sorter::build(vec![], expander, cfg);

        handle.try_submit(admit(&handle, p1())).unwrap();
        assert_eq!(handle.queue_depth(), 1);
        assert!(matches!(
            handle.try_submit(admit(&handle, p1())),
            Err(SorterError::QueueFull)
        ));
    }

    #[test]
    fn config_from_file_settings() {
        let file = GhostscaleConfig::from_toml_str(
            "[retry]\nattempts = 5\ncall_timeout = \"2s\"\n[requeue]\nbase_backoff = \"1s\"\n",
        )
        .unwrap();
        let cfg = SorterConfig::try_from(&file).unwrap();

        assert_eq!(cfg.queue_capacity, 1000);
        assert_eq!(cfg.retry.attempts, 5);
        assert_eq!(cfg.retry.call_timeout, Some(Duration::from_secs(2)));
        assert_eq!(cfg.requeue.base_backoff, Duration::from_secs(1));
        assert_eq!(cfg.requeue.max_attempts, 10);
    }
}
