//! Shuttle motion.
//!
//! The executor hands a driver a list of unit steps and then waits for the
//! shuttle's status to return to idle. [`SimulatedDriver`] advances one cell
//! per tick on a background task; a hardware driver would report progress
//! from the vehicle instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rackflow_core::{Cell, GridTopology, KinematicMode, MotionStatus, ShuttleId};
use rackflow_storage::{Result, Storage};
use tracing::{debug, trace, warn};

/// Moves shuttles along pre-computed paths.
#[async_trait]
pub trait MotionDriver: Send + Sync {
    /// Start driving `shuttle` through `steps` (excluding its current cell).
    ///
    /// The shuttle must be marked moving before this returns; it goes back
    /// to idle once the last step is reached.
    async fn drive(&self, shuttle: &ShuttleId, steps: Vec<Cell>) -> Result<()>;
}

/// Time-based simulation of shuttle travel.
pub struct SimulatedDriver<S: Storage> {
    storage: Arc<S>,
    topology: Arc<GridTopology>,
    cell_travel: Duration,
}

impl<S: Storage> SimulatedDriver<S> {
    /// Create a driver advancing one cell every `cell_travel`.
    pub fn new(storage: Arc<S>, topology: Arc<GridTopology>, cell_travel: Duration) -> Self {
        Self {
            storage,
            topology,
            cell_travel,
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> MotionDriver for SimulatedDriver<S> {
    async fn drive(&self, shuttle: &ShuttleId, steps: Vec<Cell>) -> Result<()> {
        let target = steps.last().copied();
        self.storage
            .update_shuttle(shuttle, |s| {
                s.path = steps.into_iter().collect();
                s.target = target;
                s.status = if s.path.is_empty() {
                    MotionStatus::Idle
                } else {
                    MotionStatus::Moving
                };
            })
            .await?;

        let Some(target) = target else {
            return Ok(());
        };
        debug!("{} driving to {}", shuttle, target);

        let storage = self.storage.clone();
        let topology = self.topology.clone();
        let tick = self.cell_travel;
        let id = shuttle.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                let topology = &topology;
                let advanced = storage
                    .update_shuttle(&id, |s| {
                        let Some(next) = s.path.pop_front() else {
                            s.status = MotionStatus::Idle;
                            s.target = None;
                            return false;
                        };
                        // The wheels follow the axis of each step.
                        if let Some(mode) = KinematicMode::for_step(s.position.cell(), next) {
                            s.mode = mode;
                        }
                        s.position = next.at_level(s.position.z);
                        s.world = topology.grid_to_world(s.position);
                        trace!("{} at {}", s.id, s.position);
                        if s.path.is_empty() {
                            s.status = MotionStatus::Idle;
                            s.target = None;
                            return false;
                        }
                        true
                    })
                    .await;
                match advanced {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => {
                        warn!("Simulated drive of {} stopped: {}", id, e);
                        break;
                    }
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackflow_core::GridCoordinate;
    use rackflow_storage::MemoryStorage;

    #[tokio::test(start_paused = true)]
    async fn drives_cell_by_cell_then_idles() {
        let topology = Arc::new(GridTopology::reference().unwrap());
        let storage = Arc::new(MemoryStorage::for_topology(&topology));
        let driver = SimulatedDriver::new(storage.clone(), topology.clone(), Duration::from_millis(300));
        let id = ShuttleId::new("SHUTTLE_1");

        let steps = Cell::new(4, 4).steps_to(Cell::new(7, 4));
        driver.drive(&id, steps).await.unwrap();
        assert!(!storage.shuttle(&id).await.unwrap().is_idle());

        tokio::time::sleep(Duration::from_millis(350)).await;
        let s = storage.shuttle(&id).await.unwrap();
        assert_eq!(s.position, GridCoordinate::new(5, 4, 1));
        assert_eq!(s.world, topology.grid_to_world(s.position));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let s = storage.shuttle(&id).await.unwrap();
        assert!(s.is_idle());
        assert_eq!(s.position, GridCoordinate::new(7, 4, 1));
        assert!(s.path.is_empty());
        assert_eq!(s.target, None);
    }

    #[tokio::test(start_paused = true)]
    async fn mode_follows_step_axis() {
        let topology = Arc::new(GridTopology::reference().unwrap());
        let storage = Arc::new(MemoryStorage::for_topology(&topology));
        let driver = SimulatedDriver::new(storage.clone(), topology, Duration::from_millis(10));
        let id = ShuttleId::new("SHUTTLE_1");

        driver.drive(&id, Cell::new(4, 4).steps_to(Cell::new(4, 6))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(storage.shuttle(&id).await.unwrap().mode, KinematicMode::Rail);
    }

    #[tokio::test]
    async fn empty_path_stays_idle() {
        let topology = Arc::new(GridTopology::reference().unwrap());
        let storage = Arc::new(MemoryStorage::for_topology(&topology));
        let driver = SimulatedDriver::new(storage.clone(), topology, Duration::from_millis(10));
        let id = ShuttleId::new("SHUTTLE_2");
        driver.drive(&id, Vec::new()).await.unwrap();
        assert!(storage.shuttle(&id).await.unwrap().is_idle());
    }
}
