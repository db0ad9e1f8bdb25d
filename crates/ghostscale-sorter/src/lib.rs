//! ghostscale-sorter — the placement engine.
//!
//! The sorter owns the capacity roster and serializes every mutation to it
//! through a bounded request queue. It bin-packs placeholder workloads
//! first-fit onto existing capacity, scales out for ordinary workloads, and
//! evicts a group's placeholder when the real workload it stood in for
//! arrives.
//!
//! # Components
//!
//! - **`engine`** — the `Sorter` actor and its `SorterHandle`
//! - **`roster`** — ordered capacity units with first-fit and lookup scans
//! - **`expander`** — the capability trait the sorter drives
//! - **`memory`** — an in-memory `Expander` with failure injection
//! - **`retry`** — bounded local retries of expander calls
//! - **`requeue`** — attempt counting, backoff, and dead-lettering
//! - **`ids`** — seedable request identifiers
//! - **`stats`** — counters and Prometheus exposition

pub mod engine;
pub mod error;
pub mod expander;
pub mod ids;
pub mod memory;
pub mod requeue;
pub mod retry;
pub mod roster;
pub mod stats;

pub use engine::{Sorter, SorterConfig, SorterHandle};
pub use error::{SorterError, SorterResult};
pub use expander::{Expander, ExpanderError, ProvisionedUnit};
pub use memory::InMemoryExpander;
pub use requeue::{DeadLetter, RequeuePolicy};
pub use retry::RetryPolicy;
pub use stats::StatsSnapshot;
