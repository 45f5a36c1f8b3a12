//! Storage trait abstraction.
//!
//! One trait covers both the inventory (slot -> pallet) and the live
//! resource state (shuttles, lifts, conveyor pallets). Every pallet
//! hand-off between containers is a single storage operation so a pallet
//! is never visible in two places at once.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rackflow_core::{
    Cell, ConveyorPallet, LiftId, LiftState, PalletId, PalletRecord, ShuttleId, ShuttleState,
    SlotKey, WorldPosition,
};

use crate::snapshot::WorldSnapshot;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Slot already holds a pallet
    #[error("slot {0} is already occupied")]
    SlotOccupied(SlotKey),

    /// Slot holds no pallet
    #[error("slot {0} is empty")]
    SlotEmpty(SlotKey),

    /// Shuttle not registered
    #[error("unknown shuttle {0}")]
    UnknownShuttle(ShuttleId),

    /// Lift not registered
    #[error("unknown lift {0}")]
    UnknownLift(LiftId),

    /// No conveyor pallet with this id
    #[error("no conveyor pallet {0}")]
    UnknownConveyorPallet(PalletId),

    /// A conveyor pallet with this id already exists
    #[error("conveyor pallet {0} already exists")]
    DuplicateConveyorPallet(PalletId),

    /// Shuttle has nothing to put down
    #[error("shuttle {0} is not carrying a pallet")]
    NotCarrying(ShuttleId),

    /// Shuttle's carry slot is taken
    #[error("shuttle {0} is already carrying a pallet")]
    AlreadyCarrying(ShuttleId),
}

/// Storage abstraction for warehouse state.
///
/// All mutations complete before the call returns; implementations must
/// serialize writes so no reader observes a half-applied change.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Inventory ===

    /// Pallet stored in a slot.
    async fn get_pallet(&self, slot: SlotKey) -> Option<PalletRecord>;

    /// Store a pallet in an empty slot.
    async fn set_pallet(&self, slot: SlotKey, pallet: PalletRecord) -> Result<()>;

    /// Remove and return the pallet in a slot.
    async fn delete_pallet(&self, slot: SlotKey) -> Result<PalletRecord>;

    /// Copy of the whole inventory.
    async fn inventory(&self) -> BTreeMap<SlotKey, PalletRecord>;

    /// Whether a slot holds a pallet.
    async fn is_occupied(&self, slot: SlotKey) -> bool {
        self.get_pallet(slot).await.is_some()
    }

    // === Shuttles ===

    /// Register (or replace) a shuttle.
    async fn register_shuttle(&self, shuttle: ShuttleState);

    /// Load a shuttle.
    async fn shuttle(&self, id: &ShuttleId) -> Result<ShuttleState>;

    /// Apply an update to a shuttle atomically.
    async fn update_shuttle<F, R>(&self, id: &ShuttleId, f: F) -> Result<R>
    where
        F: FnOnce(&mut ShuttleState) -> R + Send,
        R: Send;

    /// All shuttles.
    async fn shuttles(&self) -> Vec<ShuttleState>;

    // === Lifts ===

    /// Register (or replace) a lift.
    async fn register_lift(&self, lift: LiftState);

    /// Load a lift.
    async fn lift(&self, id: &LiftId) -> Result<LiftState>;

    /// Apply an update to a lift atomically.
    async fn update_lift<F, R>(&self, id: &LiftId, f: F) -> Result<R>
    where
        F: FnOnce(&mut LiftState) -> R + Send,
        R: Send;

    /// All lifts.
    async fn lifts(&self) -> Vec<LiftState>;

    // === Conveyor pallets ===

    /// Put a new pallet on a conveyor.
    async fn spawn_conveyor_pallet(&self, pallet: ConveyorPallet) -> Result<()>;

    /// Apply an update to a conveyor pallet atomically.
    async fn update_conveyor_pallet<F, R>(&self, id: PalletId, f: F) -> Result<R>
    where
        F: FnOnce(&mut ConveyorPallet) -> R + Send,
        R: Send;

    /// Remove a conveyor pallet, handing back its record.
    async fn despawn_conveyor_pallet(&self, id: PalletId) -> Result<ConveyorPallet>;

    /// All conveyor pallets.
    async fn conveyor_pallets(&self) -> Vec<ConveyorPallet>;

    // === Hand-offs ===

    /// Move a pallet from a slot onto a shuttle.
    async fn pick_from_slot(&self, shuttle: &ShuttleId, slot: SlotKey) -> Result<PalletRecord>;

    /// Move a shuttle's pallet into a slot.
    async fn place_in_slot(&self, shuttle: &ShuttleId, slot: SlotKey) -> Result<PalletRecord>;

    /// Move a conveyor pallet into a slot.
    async fn conveyor_to_slot(&self, pallet: PalletId, slot: SlotKey) -> Result<PalletRecord>;

    /// Move a shuttle's pallet onto the conveyor at `cell`.
    async fn unload_to_conveyor(
        &self,
        shuttle: &ShuttleId,
        cell: Cell,
        level: i32,
        position: WorldPosition,
    ) -> Result<PalletId>;

    // === Snapshot ===

    /// Consistent copy of every map, for observers.
    async fn snapshot(&self) -> WorldSnapshot;
}
