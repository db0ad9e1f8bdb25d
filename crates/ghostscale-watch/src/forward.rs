//! Event pump from the watch into a sorter.

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use ghostscale_sorter::{SorterHandle, SorterResult};

use crate::translate::Translator;
use crate::workload::WorkloadEvent;

/// Translate events and submit them until the stream closes or `shutdown`
/// fires. Returns the number of requests submitted.
///
/// Submission waits while the sorter queue is full, so a slow sorter
/// backpressures the watch. Fails only if the sorter has stopped.
pub async fn forward(
    mut events: mpsc::Receiver<WorkloadEvent>,
    translator: Translator,
    handle: SorterHandle,
    mut shutdown: watch::Receiver<bool>,
) -> SorterResult<u64> {
    let mut submitted = 0u64;

    loop {
        if *shutdown.borrow() {
            break;
        }
        let event = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    info!("workload event stream closed");
                    break;
                }
            },
        };

        for (kind, item) in translator.translate(&event) {
            let request = handle.request(kind, item);
            if let Err(e) = handle.submit(request).await {
                warn!(error = %e, "sorter unavailable, stopping forwarder");
                return Err(e);
            }
            submitted += 1;
        }
    }

    info!(submitted, "forwarder stopped");
    Ok(submitted)
}
