//! Slot search shared by every request type.
//!
//! A search scans one rail for the first eligible depth, skipping blocked
//! slots, and falls back to the other storage rails of the zone before
//! giving up.

use std::collections::BTreeMap;

use rackflow_core::{GridTopology, PalletRecord, SlotKey, Zone};
use tracing::debug;

use crate::error::{PlanError, Result};

/// Inventory as seen by the planner.
pub type InventoryView = BTreeMap<SlotKey, PalletRecord>;

/// What a search is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSearch {
    /// Put-away: the deepest empty slot, scanning from the far end.
    DeepestEmpty,
    /// Retrieval: the occupied slot nearest the aisle.
    NearestOccupied,
}

impl SlotSearch {
    fn wants(self, occupied: bool) -> bool {
        match self {
            SlotSearch::DeepestEmpty => !occupied,
            SlotSearch::NearestOccupied => occupied,
        }
    }

    fn depths(self, topology: &GridTopology, row: i32) -> Vec<i32> {
        match self {
            SlotSearch::DeepestEmpty => topology.depths_far_to_near(row),
            SlotSearch::NearestOccupied => topology.depths_near_to_far(row),
        }
    }

    fn exhausted(self, row: i32, level: i32) -> PlanError {
        match self {
            SlotSearch::DeepestEmpty => PlanError::SlotSaturated { row, level },
            SlotSearch::NearestOccupied => PlanError::SlotEmpty { row, level },
        }
    }
}

/// Slot search within one zone.
pub struct SlotLocator<'a> {
    topology: &'a GridTopology,
    zone: &'a Zone,
}

impl<'a> SlotLocator<'a> {
    /// Create a locator for a zone.
    pub fn new(topology: &'a GridTopology, zone: &'a Zone) -> Self {
        Self { topology, zone }
    }

    /// Whether an occupied cell sits at the same depth and level strictly
    /// between the zone highway and the slot's rail.
    pub fn is_blocked(&self, slot: SlotKey, inventory: &InventoryView) -> bool {
        let highway = self.zone.highway_y;
        let (lo, hi) = if slot.y < highway {
            (slot.y + 1, highway - 1)
        } else {
            (highway + 1, slot.y - 1)
        };
        (lo..=hi).any(|y| inventory.contains_key(&SlotKey::new(slot.x, y, slot.z)))
    }

    /// First eligible, unblocked slot on one rail.
    pub fn scan_row(
        &self,
        search: SlotSearch,
        row: i32,
        level: i32,
        inventory: &InventoryView,
    ) -> Option<SlotKey> {
        search.depths(self.topology, row).into_iter().find_map(|x| {
            let slot = SlotKey::new(x, row, level);
            if !search.wants(inventory.contains_key(&slot)) {
                return None;
            }
            if self.is_blocked(slot, inventory) {
                debug!("slot {} rejected, path from highway {} is blocked", slot, self.zone.highway_y);
                return None;
            }
            Some(slot)
        })
    }

    /// Scan the requested rail, then every other storage rail of the zone
    /// (nearest first), before failing.
    pub fn locate(
        &self,
        search: SlotSearch,
        row: i32,
        level: i32,
        inventory: &InventoryView,
    ) -> Result<SlotKey> {
        if let Some(slot) = self.scan_row(search, row, level, inventory) {
            return Ok(slot);
        }

        let mut fallback: Vec<i32> = (self.zone.rail_lo..=self.zone.rail_hi)
            .filter(|&y| y != row && !self.topology.is_horizontal_highway(y))
            .collect();
        fallback.sort_by_key(|&y| (y.abs_diff(row), y));

        for y in fallback {
            if let Some(slot) = self.scan_row(search, y, level, inventory) {
                debug!("rail {} level {} unavailable, falling back to rail {}", row, level, y);
                return Ok(slot);
            }
        }
        Err(search.exhausted(row, level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackflow_core::PalletRecord;

    fn fixture() -> GridTopology {
        GridTopology::reference().unwrap()
    }

    fn with(slots: &[(i32, i32, i32)]) -> InventoryView {
        slots
            .iter()
            .map(|&(x, y, z)| (SlotKey::new(x, y, z), PalletRecord::new("#3b82f6")))
            .collect()
    }

    #[test]
    fn deepest_empty_on_empty_row() {
        let topo = fixture();
        let zone = topo.zone_for_rail(6).unwrap();
        let locator = SlotLocator::new(&topo, zone);
        let slot = locator
            .locate(SlotSearch::DeepestEmpty, 6, 1, &InventoryView::new())
            .unwrap();
        assert_eq!(slot, SlotKey::new(25, 6, 1));
    }

    #[test]
    fn nearest_occupied_scans_from_aisle() {
        let topo = fixture();
        let zone = topo.zone_for_rail(6).unwrap();
        let locator = SlotLocator::new(&topo, zone);
        let inv = with(&[(25, 6, 1), (9, 6, 1)]);
        assert_eq!(
            locator.locate(SlotSearch::NearestOccupied, 6, 1, &inv).unwrap(),
            SlotKey::new(9, 6, 1)
        );
    }

    #[test]
    fn blocked_depth_is_skipped() {
        let topo = fixture();
        let zone = topo.zone_for_rail(6).unwrap();
        let locator = SlotLocator::new(&topo, zone);
        let inv = with(&[(25, 5, 1)]);
        assert!(locator.is_blocked(SlotKey::new(25, 6, 1), &inv));
        assert!(!locator.is_blocked(SlotKey::new(25, 3, 1), &inv));
        assert_eq!(
            locator.locate(SlotSearch::DeepestEmpty, 6, 1, &inv).unwrap(),
            SlotKey::new(24, 6, 1)
        );
    }

    #[test]
    fn pallet_beyond_the_highway_does_not_block_rail_three() {
        // Highway 4 sits between rails 3 and 5, so (25,5,1) is never on
        // rail 3's access path.
        let topo = fixture();
        let zone = topo.zone_for_rail(3).unwrap();
        assert_eq!(zone.highway_y, 4);
        let locator = SlotLocator::new(&topo, zone);
        let inv = with(&[(25, 5, 1)]);
        assert_eq!(
            locator.locate(SlotSearch::DeepestEmpty, 3, 1, &inv).unwrap(),
            SlotKey::new(25, 3, 1)
        );
    }

    #[test]
    fn below_highway_checks_rails_between() {
        let topo = fixture();
        let zone = topo.zone_for_rail(1).unwrap();
        let locator = SlotLocator::new(&topo, zone);
        let inv = with(&[(25, 2, 1), (25, 3, 1)]);
        assert!(locator.is_blocked(SlotKey::new(25, 1, 1), &inv));
        assert!(!locator.is_blocked(SlotKey::new(25, 3, 2), &inv));
    }

    #[test]
    fn full_row_falls_back_to_nearest_rail() {
        let topo = fixture();
        let zone = topo.zone_for_rail(6).unwrap();
        let locator = SlotLocator::new(&topo, zone);
        let full: Vec<_> = (5..=25).map(|x| (x, 6, 1)).collect();
        let inv = with(&full);
        let slot = locator.locate(SlotSearch::DeepestEmpty, 6, 1, &inv).unwrap();
        assert_eq!(slot, SlotKey::new(25, 5, 1));
    }

    #[test]
    fn empty_zone_level_is_slot_empty() {
        let topo = fixture();
        let zone = topo.zone_for_rail(6).unwrap();
        let locator = SlotLocator::new(&topo, zone);
        let inv = with(&[(10, 15, 1)]);
        assert_eq!(
            locator.locate(SlotSearch::NearestOccupied, 6, 1, &inv),
            Err(PlanError::SlotEmpty { row: 6, level: 1 })
        );
    }

    #[test]
    fn saturated_zone_level() {
        let topo = fixture();
        let zone = topo.zone_for_rail(6).unwrap();
        let locator = SlotLocator::new(&topo, zone);
        let mut all = Vec::new();
        for y in (1..=12).filter(|y| *y != 4 && *y != 12) {
            for x in 5..=25 {
                all.push((x, y, 2));
            }
        }
        let inv = with(&all);
        assert_eq!(
            locator.locate(SlotSearch::DeepestEmpty, 6, 2, &inv),
            Err(PlanError::SlotSaturated { row: 6, level: 2 })
        );
        assert!(locator.locate(SlotSearch::DeepestEmpty, 6, 1, &inv).is_ok());
    }
}
