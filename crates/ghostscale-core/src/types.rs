//! Domain records shared across Ghostscale crates.
//!
//! A [`CapacityUnit`] is one node's resource budget plus the workloads
//! placed on it; a [`DemandUnit`] is one workload's requirement. Requests
//! carry a demand unit into the sorter's queue.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a capacity unit (assigned by the expander).
pub type UnitId = String;

/// Identifier of a demand unit (unique within the sorter's lifetime).
pub type ItemId = String;

/// Opaque request identifier, used only for tracing.
pub type RequestId = String;

// ── Resources ─────────────────────────────────────────────────────

/// A two-dimensional resource amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu: u64,
    pub memory: u64,
}

impl Resources {
    pub fn new(cpu: u64, memory: u64) -> Self {
        Self { cpu, memory }
    }

    /// True if `demand` fits into `self` in both dimensions.
    pub fn fits(&self, demand: &Resources) -> bool {
        self.cpu >= demand.cpu && self.memory >= demand.memory
    }

    pub fn checked_sub(&self, other: &Resources) -> Option<Resources> {
        Some(Resources {
            cpu: self.cpu.checked_sub(other.cpu)?,
            memory: self.memory.checked_sub(other.memory)?,
        })
    }

    pub fn saturating_add(&self, other: &Resources) -> Resources {
        Resources {
            cpu: self.cpu.saturating_add(other.cpu),
            memory: self.memory.saturating_add(other.memory),
        }
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu={} mem={}", self.cpu, self.memory)
    }
}

// ── Demand unit ───────────────────────────────────────────────────

/// Whether a demand unit is a real workload or a speculative reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandKind {
    Ordinary,
    /// Pre-reserved on behalf of an anticipated ordinary workload; can be
    /// evicted at any time and re-accommodated later.
    Placeholder,
}

/// One workload's resource requirement and scheduling metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandUnit {
    pub id: ItemId,
    pub resources: Resources,
    pub kind: DemandKind,
    /// Links a placeholder to the ordinary unit it shadows.
    pub group_id: String,
}

impl DemandUnit {
    pub fn ordinary(id: impl Into<String>, resources: Resources, group_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resources,
            kind: DemandKind::Ordinary,
            group_id: group_id.into(),
        }
    }

    pub fn placeholder(id: impl Into<String>, resources: Resources, group_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resources,
            kind: DemandKind::Placeholder,
            group_id: group_id.into(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == DemandKind::Placeholder
    }
}

impl PartialEq for DemandUnit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DemandUnit {}

// ── Capacity unit ─────────────────────────────────────────────────

/// One node's remaining budget and the demand units placed on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityUnit {
    pub id: UnitId,
    /// Budget as originally provisioned.
    pub capacity: Resources,
    /// Budget left after every placed unit is subtracted.
    pub remaining: Resources,
    /// Placed units in insertion order.
    pub placed: Vec<DemandUnit>,
}

impl CapacityUnit {
    /// A freshly provisioned, empty unit.
    pub fn empty(id: impl Into<String>, capacity: Resources) -> Self {
        Self {
            id: id.into(),
            capacity,
            remaining: capacity,
            placed: Vec::new(),
        }
    }

    /// Sum of the demands of every placed unit.
    pub fn used(&self) -> Resources {
        self.placed
            .iter()
            .fold(Resources::default(), |acc, item| acc.saturating_add(&item.resources))
    }

    /// `used + remaining == capacity` in both dimensions.
    pub fn is_conserved(&self) -> bool {
        self.used().saturating_add(&self.remaining) == self.capacity
    }

    pub fn holds(&self, item_id: &str) -> bool {
        self.placed.iter().any(|i| i.id == item_id)
    }
}

impl PartialEq for CapacityUnit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CapacityUnit {}

// ── Request ───────────────────────────────────────────────────────

/// Operation requested of the sorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Admit,
    Remove,
}

impl RequestKind {
    pub fn label(&self) -> &'static str {
        match self {
            RequestKind::Admit => "admit",
            RequestKind::Remove => "remove",
        }
    }
}

/// Envelope submitted to the sorter's queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub kind: RequestKind,
    pub item: DemandUnit,
    /// Number of global requeues this payload has already been through.
    #[serde(default)]
    pub attempt: u32,
}

impl Request {
    pub fn new(id: impl Into<String>, kind: RequestKind, item: DemandUnit) -> Self {
        Self {
            id: id.into(),
            kind,
            item,
            attempt: 0,
        }
    }

    /// Short human-readable description for log lines.
    pub fn describe(&self) -> String {
        format!("[{}] request id:{}", self.kind.label(), self.id)
    }
}
