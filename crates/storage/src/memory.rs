//! In-memory storage backend.
//!
//! All maps live behind one `RwLock`, so every mutation is serialized and a
//! hand-off between two containers happens under a single write guard.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rackflow_core::{
    Cell, ConveyorPallet, ConveyorStatus, GridTopology, LiftId, LiftState, PalletId,
    PalletRecord, ShuttleId, ShuttleState, SlotKey, WorldPosition,
};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::{Result, Storage, StorageError};
use crate::snapshot::{SlotEntry, WorldSnapshot};

#[derive(Debug, Default)]
struct World {
    inventory: BTreeMap<SlotKey, PalletRecord>,
    shuttles: BTreeMap<ShuttleId, ShuttleState>,
    lifts: BTreeMap<LiftId, LiftState>,
    conveyor: BTreeMap<PalletId, ConveyorPallet>,
}

impl World {
    fn shuttle_mut(&mut self, id: &ShuttleId) -> Result<&mut ShuttleState> {
        self.shuttles
            .get_mut(id)
            .ok_or_else(|| StorageError::UnknownShuttle(id.clone()))
    }
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    world: RwLock<World>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage with every zone's shuttle parked at its home cell and
    /// every lift idle on level 1.
    pub fn for_topology(topology: &GridTopology) -> Self {
        let mut world = World::default();
        for zone in topology.zones() {
            let home = zone.shuttle_home;
            world.shuttles.insert(
                zone.shuttle.clone(),
                ShuttleState::parked(zone.shuttle.clone(), home, topology.grid_to_world(home)),
            );
            world
                .lifts
                .insert(zone.lift.clone(), LiftState::idle(zone.lift.clone(), 1));
        }
        Self {
            world: RwLock::new(world),
        }
    }

    /// Fill slots with pallets, replacing whatever was there.
    pub async fn seed_inventory(&self, pallets: impl IntoIterator<Item = (SlotKey, PalletRecord)>) {
        let mut world = self.world.write().await;
        for (slot, pallet) in pallets {
            world.inventory.insert(slot, pallet);
        }
        debug!("Seeded inventory, {} slots occupied", world.inventory.len());
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_pallet(&self, slot: SlotKey) -> Option<PalletRecord> {
        self.world.read().await.inventory.get(&slot).cloned()
    }

    async fn set_pallet(&self, slot: SlotKey, pallet: PalletRecord) -> Result<()> {
        let mut world = self.world.write().await;
        if world.inventory.contains_key(&slot) {
            return Err(StorageError::SlotOccupied(slot));
        }
        trace!("set {} = {}", slot, pallet.id);
        world.inventory.insert(slot, pallet);
        Ok(())
    }

    async fn delete_pallet(&self, slot: SlotKey) -> Result<PalletRecord> {
        let mut world = self.world.write().await;
        let pallet = world
            .inventory
            .remove(&slot)
            .ok_or(StorageError::SlotEmpty(slot))?;
        trace!("delete {} ({})", slot, pallet.id);
        Ok(pallet)
    }

    async fn inventory(&self) -> BTreeMap<SlotKey, PalletRecord> {
        self.world.read().await.inventory.clone()
    }

    async fn register_shuttle(&self, shuttle: ShuttleState) {
        let mut world = self.world.write().await;
        world.shuttles.insert(shuttle.id.clone(), shuttle);
    }

    async fn shuttle(&self, id: &ShuttleId) -> Result<ShuttleState> {
        self.world
            .read()
            .await
            .shuttles
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::UnknownShuttle(id.clone()))
    }

    async fn update_shuttle<F, R>(&self, id: &ShuttleId, f: F) -> Result<R>
    where
        F: FnOnce(&mut ShuttleState) -> R + Send,
        R: Send,
    {
        let mut world = self.world.write().await;
        Ok(f(world.shuttle_mut(id)?))
    }

    async fn shuttles(&self) -> Vec<ShuttleState> {
        self.world.read().await.shuttles.values().cloned().collect()
    }

    async fn register_lift(&self, lift: LiftState) {
        let mut world = self.world.write().await;
        world.lifts.insert(lift.id.clone(), lift);
    }

    async fn lift(&self, id: &LiftId) -> Result<LiftState> {
        self.world
            .read()
            .await
            .lifts
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::UnknownLift(id.clone()))
    }

    async fn update_lift<F, R>(&self, id: &LiftId, f: F) -> Result<R>
    where
        F: FnOnce(&mut LiftState) -> R + Send,
        R: Send,
    {
        let mut world = self.world.write().await;
        let lift = world
            .lifts
            .get_mut(id)
            .ok_or_else(|| StorageError::UnknownLift(id.clone()))?;
        Ok(f(lift))
    }

    async fn lifts(&self) -> Vec<LiftState> {
        self.world.read().await.lifts.values().cloned().collect()
    }

    async fn spawn_conveyor_pallet(&self, pallet: ConveyorPallet) -> Result<()> {
        let mut world = self.world.write().await;
        let id = pallet.id();
        if world.conveyor.contains_key(&id) {
            return Err(StorageError::DuplicateConveyorPallet(id));
        }
        world.conveyor.insert(id, pallet);
        Ok(())
    }

    async fn update_conveyor_pallet<F, R>(&self, id: PalletId, f: F) -> Result<R>
    where
        F: FnOnce(&mut ConveyorPallet) -> R + Send,
        R: Send,
    {
        let mut world = self.world.write().await;
        let pallet = world
            .conveyor
            .get_mut(&id)
            .ok_or(StorageError::UnknownConveyorPallet(id))?;
        Ok(f(pallet))
    }

    async fn despawn_conveyor_pallet(&self, id: PalletId) -> Result<ConveyorPallet> {
        self.world
            .write()
            .await
            .conveyor
            .remove(&id)
            .ok_or(StorageError::UnknownConveyorPallet(id))
    }

    async fn conveyor_pallets(&self) -> Vec<ConveyorPallet> {
        self.world.read().await.conveyor.values().cloned().collect()
    }

    async fn pick_from_slot(&self, shuttle: &ShuttleId, slot: SlotKey) -> Result<PalletRecord> {
        let mut world = self.world.write().await;
        if world.shuttle_mut(shuttle)?.carried.is_some() {
            return Err(StorageError::AlreadyCarrying(shuttle.clone()));
        }
        let pallet = world
            .inventory
            .remove(&slot)
            .ok_or(StorageError::SlotEmpty(slot))?;
        world.shuttle_mut(shuttle)?.carried = Some(pallet.clone());
        debug!("{} picked {} from {}", shuttle, pallet.id, slot);
        Ok(pallet)
    }

    async fn place_in_slot(&self, shuttle: &ShuttleId, slot: SlotKey) -> Result<PalletRecord> {
        let mut world = self.world.write().await;
        if world.inventory.contains_key(&slot) {
            return Err(StorageError::SlotOccupied(slot));
        }
        let pallet = world
            .shuttle_mut(shuttle)?
            .carried
            .take()
            .ok_or_else(|| StorageError::NotCarrying(shuttle.clone()))?;
        world.inventory.insert(slot, pallet.clone());
        debug!("{} placed {} in {}", shuttle, pallet.id, slot);
        Ok(pallet)
    }

    async fn conveyor_to_slot(&self, pallet: PalletId, slot: SlotKey) -> Result<PalletRecord> {
        let mut world = self.world.write().await;
        if world.inventory.contains_key(&slot) {
            return Err(StorageError::SlotOccupied(slot));
        }
        let entry = world
            .conveyor
            .remove(&pallet)
            .ok_or(StorageError::UnknownConveyorPallet(pallet))?;
        world.inventory.insert(slot, entry.pallet.clone());
        Ok(entry.pallet)
    }

    async fn unload_to_conveyor(
        &self,
        shuttle: &ShuttleId,
        cell: Cell,
        level: i32,
        position: WorldPosition,
    ) -> Result<PalletId> {
        let mut world = self.world.write().await;
        let carried = world.shuttle_mut(shuttle)?.carried.clone();
        let pallet = carried.ok_or_else(|| StorageError::NotCarrying(shuttle.clone()))?;
        let id = pallet.id;
        if world.conveyor.contains_key(&id) {
            return Err(StorageError::DuplicateConveyorPallet(id));
        }
        world.shuttle_mut(shuttle)?.carried = None;
        world.conveyor.insert(
            id,
            ConveyorPallet {
                pallet,
                cell,
                level,
                position,
                status: ConveyorStatus::Waiting,
            },
        );
        Ok(id)
    }

    async fn snapshot(&self) -> WorldSnapshot {
        let world = self.world.read().await;
        WorldSnapshot {
            taken_at: chrono::Utc::now(),
            shuttles: world.shuttles.values().cloned().collect(),
            lifts: world.lifts.values().cloned().collect(),
            inventory: world
                .inventory
                .iter()
                .map(|(slot, pallet)| SlotEntry {
                    slot: *slot,
                    pallet: pallet.clone(),
                })
                .collect(),
            conveyor_pallets: world.conveyor.values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackflow_core::{GridCoordinate, MotionStatus};

    fn storage() -> (GridTopology, MemoryStorage) {
        let topo = GridTopology::reference().unwrap();
        let storage = MemoryStorage::for_topology(&topo);
        (topo, storage)
    }

    fn shuttle_1() -> ShuttleId {
        ShuttleId::new("SHUTTLE_1")
    }

    #[tokio::test]
    async fn parks_shuttles_at_home() {
        let (_, storage) = storage();
        let s1 = storage.shuttle(&shuttle_1()).await.unwrap();
        assert_eq!(s1.position, GridCoordinate::new(4, 4, 1));
        assert_eq!(s1.status, MotionStatus::Idle);
        assert_eq!(storage.lifts().await.len(), 2);
    }

    #[tokio::test]
    async fn set_refuses_occupied_slot() {
        let (_, storage) = storage();
        let slot = GridCoordinate::new(25, 6, 1);
        storage.set_pallet(slot, PalletRecord::new("#fff")).await.unwrap();
        let err = storage
            .set_pallet(slot, PalletRecord::new("#000"))
            .await
            .unwrap_err();
        assert_eq!(err, StorageError::SlotOccupied(slot));
    }

    #[tokio::test]
    async fn pick_and_place_move_the_same_record() {
        let (_, storage) = storage();
        let from = GridCoordinate::new(25, 6, 1);
        let to = GridCoordinate::new(25, 8, 1);
        let pallet = PalletRecord::new("#ef4444");
        storage.set_pallet(from, pallet.clone()).await.unwrap();

        let picked = storage.pick_from_slot(&shuttle_1(), from).await.unwrap();
        assert_eq!(picked, pallet);
        assert!(!storage.is_occupied(from).await);
        assert_eq!(storage.snapshot().await.pallet_count(), 1);

        let err = storage.pick_from_slot(&shuttle_1(), to).await.unwrap_err();
        assert_eq!(err, StorageError::AlreadyCarrying(shuttle_1()));

        storage.place_in_slot(&shuttle_1(), to).await.unwrap();
        assert_eq!(storage.get_pallet(to).await, Some(pallet));
        assert!(storage.shuttle(&shuttle_1()).await.unwrap().carried.is_none());
    }

    #[tokio::test]
    async fn conveyor_hand_offs_conserve_pallets() {
        let (topo, storage) = storage();
        let lift_slot = GridCoordinate::new(2, 5, 1);
        let pallet = PalletRecord::new(PalletRecord::INBOUND_COLOR);
        let id = pallet.id;
        storage
            .spawn_conveyor_pallet(ConveyorPallet {
                pallet,
                cell: Cell::new(0, 6),
                level: 1,
                position: topo.grid_to_world(GridCoordinate::new(0, 6, 1)),
                status: ConveyorStatus::Moving,
            })
            .await
            .unwrap();
        storage.conveyor_to_slot(id, lift_slot).await.unwrap();
        assert!(storage.conveyor_pallets().await.is_empty());

        storage.pick_from_slot(&shuttle_1(), lift_slot).await.unwrap();
        let unloaded = storage
            .unload_to_conveyor(&shuttle_1(), Cell::new(2, 5), 1, WorldPosition::default())
            .await
            .unwrap();
        assert_eq!(unloaded, id);
        let snapshot = storage.snapshot().await;
        assert_eq!(snapshot.pallet_count(), 1);
        assert_eq!(snapshot.conveyor_pallets.len(), 1);

        storage.despawn_conveyor_pallet(id).await.unwrap();
        assert_eq!(storage.snapshot().await.pallet_count(), 0);
    }

    #[tokio::test]
    async fn unknown_ids_are_errors() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.shuttle(&ShuttleId::new("NOPE")).await,
            Err(StorageError::UnknownShuttle(_))
        ));
        assert!(matches!(
            storage.update_lift(&LiftId::new("NOPE"), |l| l.level = 3).await,
            Err(StorageError::UnknownLift(_))
        ));
    }
}
