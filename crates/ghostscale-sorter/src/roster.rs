//! The capacity roster: ordered capacity units and their placed items.
//!
//! Scans are linear in roster order. Roster order doubles as the first-fit
//! order, so units provisioned earlier are always tried first.

use ghostscale_core::{CapacityUnit, DemandUnit, Resources};

/// Position of a placed item: (unit index, item index within the unit).
pub type Slot = (usize, usize);

#[derive(Debug, Clone, Default)]
pub struct Roster {
    units: Vec<CapacityUnit>,
}

impl Roster {
    pub fn new(units: Vec<CapacityUnit>) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &[CapacityUnit] {
        &self.units
    }

    pub fn unit(&self, idx: usize) -> &CapacityUnit {
        &self.units[idx]
    }

    /// Append a unit and return its index.
    pub fn push(&mut self, unit: CapacityUnit) -> usize {
        self.units.push(unit);
        self.units.len() - 1
    }

    /// Indices of every unit whose remaining budget fits `demand`, in
    /// roster order, skipping the unit named `exclude`.
    pub fn candidates(&self, demand: &Resources, exclude: Option<&str>) -> Vec<usize> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| exclude != Some(u.id.as_str()) && u.remaining.fits(demand))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// The first resident placeholder in `group_id`.
    pub fn find_placeholder(&self, group_id: &str) -> Option<Slot> {
        self.find(|item| item.is_placeholder() && item.group_id == group_id)
    }

    /// Where the demand unit `item_id` is placed, if anywhere.
    pub fn locate(&self, item_id: &str) -> Option<Slot> {
        self.find(|item| item.id == item_id)
    }

    fn find(&self, pred: impl Fn(&DemandUnit) -> bool) -> Option<Slot> {
        self.units.iter().enumerate().find_map(|(unit_idx, unit)| {
            unit.placed
                .iter()
                .position(&pred)
                .map(|item_idx| (unit_idx, item_idx))
        })
    }

    /// Place `item` at the end of a unit's placed list.
    ///
    /// Returns the item back if it does not fit; the unit is untouched.
    pub fn commit(&mut self, unit_idx: usize, item: DemandUnit) -> Result<(), DemandUnit> {
        let position = self.units[unit_idx].placed.len();
        self.commit_at(unit_idx, position, item)
    }

    /// Place `item` at `position` in a unit's placed list.
    pub fn commit_at(
        &mut self,
        unit_idx: usize,
        position: usize,
        item: DemandUnit,
    ) -> Result<(), DemandUnit> {
        let unit = &mut self.units[unit_idx];
        match unit.remaining.checked_sub(&item.resources) {
            Some(left) => {
                unit.remaining = left;
                let position = position.min(unit.placed.len());
                unit.placed.insert(position, item);
                Ok(())
            }
            None => Err(item),
        }
    }

    /// Take an item off its unit and credit its demand back.
    pub fn release(&mut self, (unit_idx, item_idx): Slot) -> DemandUnit {
        let unit = &mut self.units[unit_idx];
        let item = unit.placed.remove(item_idx);
        unit.remaining = unit.remaining.saturating_add(&item.resources);
        item
    }

    /// True if `demand` would fit once the item at `slot` is released.
    pub fn fits_after_release(&self, (unit_idx, item_idx): Slot, demand: &Resources) -> bool {
        let unit = &self.units[unit_idx];
        unit.remaining
            .saturating_add(&unit.placed[item_idx].resources)
            .fits(demand)
    }
}
