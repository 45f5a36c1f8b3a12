//! Read-only state snapshot handed to observers.

use rackflow_core::{ConveyorPallet, LiftState, PalletRecord, ShuttleState, SlotKey, Time};
use serde::{Deserialize, Serialize};

/// One occupied inventory slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotEntry {
    /// Slot
    pub slot: SlotKey,
    /// Pallet in it
    pub pallet: PalletRecord,
}

/// Copy of the whole world state taken under one lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// When it was taken
    pub taken_at: Time,
    /// Shuttles, ordered by id
    pub shuttles: Vec<ShuttleState>,
    /// Lifts, ordered by id
    pub lifts: Vec<LiftState>,
    /// Occupied slots, ordered by key
    pub inventory: Vec<SlotEntry>,
    /// Pallets on conveyors
    pub conveyor_pallets: Vec<ConveyorPallet>,
}

impl WorldSnapshot {
    /// Number of occupied slots.
    pub fn occupied_slots(&self) -> usize {
        self.inventory.len()
    }

    /// Pretty-printed JSON for external observers.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Pallets anywhere in the system: slots, shuttles and conveyors.
    pub fn pallet_count(&self) -> usize {
        self.inventory.len()
            + self.shuttles.iter().filter(|s| s.carried.is_some()).count()
            + self.conveyor_pallets.len()
    }
}
