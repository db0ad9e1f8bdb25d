//! ghostscale-watch — turns workload lifecycle events into sorter requests.
//!
//! The orchestrator side (listing and watching workloads) is out of scope;
//! this crate defines the event contract it must satisfy and the logic that
//! sits between it and the sorter.
//!
//! ```text
//! WorkloadEvent ──► WorkloadFilter ──► Translator ──► SorterHandle
//!   created            skip daemon        admit
//!   updated            skip cron job      remove + admit
//!   deleted                               remove
//! ```

pub mod error;
pub mod filter;
pub mod forward;
pub mod translate;
pub mod workload;

pub use error::WatchError;
pub use filter::{SkipReason, WorkloadFilter};
pub use forward::forward;
pub use translate::Translator;
pub use workload::{CREATED_BY_ANNOTATION, OwnerRef, Workload, WorkloadEvent};
