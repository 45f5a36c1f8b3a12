//! The sequence executor.
//!
//! Interprets one [`TaskSequence`] against shared state:
//! ```text
//! for each command, in order:
//!     apply -> (suspend until complete) -> log
//! on error: log, abandon the rest
//! always:   settle the shuttle
//! ```

use std::sync::Arc;
use std::time::Duration;

use rackflow_core::{
    Cell, Command, ConveyorPallet, ConveyorStatus, GridTopology, LiftId, LiftStatus, MotionStatus,
    Severity, ShuttleId, SlotKey, TaskSequence,
};
use rackflow_planning::Pathfinder;
use rackflow_storage::{ActivityLog, Storage};
use tracing::{debug, error, info};

use crate::config::ExecutorConfig;
use crate::driver::MotionDriver;
use crate::error::ExecutionError;

type Result<T> = std::result::Result<T, ExecutionError>;

/// Runs task sequences one command at a time.
pub struct SequenceExecutor<S: Storage, D: MotionDriver> {
    storage: Arc<S>,
    topology: Arc<GridTopology>,
    driver: Arc<D>,
    log: Arc<ActivityLog>,
    config: ExecutorConfig,
}

impl<S: Storage, D: MotionDriver> SequenceExecutor<S, D> {
    /// Create an executor.
    pub fn new(
        storage: Arc<S>,
        topology: Arc<GridTopology>,
        driver: Arc<D>,
        log: Arc<ActivityLog>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            storage,
            topology,
            driver,
            log,
            config,
        }
    }

    /// Execute every command of `sequence` in order.
    ///
    /// The first failing command aborts the sequence. Commands already
    /// applied are not undone.
    pub async fn run(&self, sequence: &TaskSequence) -> Result<()> {
        info!("Running sequence {} ({}), {} commands", sequence.id, sequence.kind, sequence.len());

        let mut outcome = Ok(());
        for (i, command) in sequence.commands.iter().enumerate() {
            debug!("[{}/{}] {}", i + 1, sequence.len(), command.name());
            if let Err(e) = self.apply(command).await {
                error!("Sequence {} failed at command {} ({}): {}", sequence.id, i + 1, command.name(), e);
                self.log.push(Severity::Error, format!("{} aborted: {}", sequence.kind, e));
                outcome = Err(e);
                break;
            }
        }

        self.settle(&sequence.shuttle).await;
        outcome
    }

    /// Force a shuttle still flagged as moving back to idle.
    async fn settle(&self, shuttle: &ShuttleId) {
        let forced = self
            .storage
            .update_shuttle(shuttle, |s| {
                if s.status != MotionStatus::Moving {
                    return false;
                }
                s.status = MotionStatus::Idle;
                s.path.clear();
                s.target = None;
                true
            })
            .await;
        if let Ok(true) = forced {
            debug!("{} forced idle after sequence", shuttle);
        }
    }

    /// Apply one command, suspending until it completes.
    pub async fn apply(&self, command: &Command) -> Result<()> {
        match command {
            Command::Navigate { shuttle, target } => self.navigate(shuttle, *target).await,
            Command::Move { shuttle, target } => self.move_straight(shuttle, *target).await,
            Command::SetMode { shuttle, mode } => {
                let current = self.storage.shuttle(shuttle).await?.mode;
                if current == *mode {
                    debug!("{} already in {} mode", shuttle, mode);
                    return Ok(());
                }
                self.log.push(Severity::Action, format!("{shuttle} switching to {mode} mode"));
                tokio::time::sleep(self.config.mode_switch).await;
                let mode = *mode;
                self.storage.update_shuttle(shuttle, move |s| s.mode = mode).await?;
                Ok(())
            }
            Command::BoardLift { shuttle, lift } => {
                self.storage.lift(lift).await?;
                let id = lift.clone();
                self.storage.update_shuttle(shuttle, move |s| s.on_lift = Some(id)).await?;
                self.log.push(Severity::Action, format!("{shuttle} boarded {lift}"));
                Ok(())
            }
            Command::DisembarkLift { shuttle } => {
                let left = self
                    .storage
                    .update_shuttle(shuttle, |s| s.on_lift.take())
                    .await?;
                if let Some(lift) = left {
                    self.log.push(Severity::Action, format!("{shuttle} left {lift}"));
                }
                Ok(())
            }
            Command::MoveLift { lift, level } => self.move_lift(lift, *level).await,
            Command::SetDeck { shuttle, raised } => {
                let current = self.storage.shuttle(shuttle).await?.deck_raised;
                if current == *raised {
                    return Ok(());
                }
                tokio::time::sleep(self.config.deck).await;
                let raised = *raised;
                self.storage.update_shuttle(shuttle, move |s| s.deck_raised = raised).await?;
                let verb = if raised { "raised" } else { "lowered" };
                self.log.push(Severity::Info, format!("{shuttle} deck {verb}"));
                Ok(())
            }
            Command::PickFromSlot { shuttle, slot } => {
                let pallet = self.storage.pick_from_slot(shuttle, *slot).await?;
                self.log.push(Severity::Action, format!("{shuttle} picked {} at {slot}", pallet.id));
                Ok(())
            }
            Command::PlaceInSlot { shuttle, slot } => {
                let pallet = self.storage.place_in_slot(shuttle, *slot).await?;
                self.log.push(Severity::Action, format!("{shuttle} placed {} at {slot}", pallet.id));
                Ok(())
            }
            Command::SpawnConveyorPallet { pallet, at, level } => {
                let id = pallet.id;
                self.storage
                    .spawn_conveyor_pallet(ConveyorPallet {
                        pallet: pallet.clone(),
                        cell: *at,
                        level: *level,
                        position: self.topology.grid_to_world(at.at_level(*level)),
                        status: ConveyorStatus::Waiting,
                    })
                    .await?;
                self.log.push(Severity::Info, format!("{id} spawned on conveyor at {at}"));
                Ok(())
            }
            Command::MoveConveyorPallet { pallet, to } => {
                self.storage
                    .update_conveyor_pallet(*pallet, |p| p.status = ConveyorStatus::Moving)
                    .await?;
                tokio::time::sleep(self.config.conveyor_step).await;
                let topology = &self.topology;
                let to = *to;
                self.storage
                    .update_conveyor_pallet(*pallet, move |p| {
                        p.cell = to;
                        p.position = topology.grid_to_world(to.at_level(p.level));
                        p.status = ConveyorStatus::Waiting;
                    })
                    .await?;
                self.log.push(Severity::Info, format!("{pallet} conveyed to {to}"));
                Ok(())
            }
            Command::ConveyorToSlot { pallet, slot } => {
                self.storage.conveyor_to_slot(*pallet, *slot).await?;
                self.log.push(Severity::Action, format!("{pallet} handed to lift at {slot}"));
                Ok(())
            }
            Command::UnloadToConveyor { shuttle, at, level } => {
                let position = self.topology.grid_to_world(at.at_level(*level));
                let pallet = self
                    .storage
                    .unload_to_conveyor(shuttle, *at, *level, position)
                    .await?;
                self.log.push(Severity::Action, format!("{shuttle} unloaded {pallet} onto conveyor"));
                Ok(())
            }
            Command::DespawnConveyorPallet { pallet } => {
                self.storage.despawn_conveyor_pallet(*pallet).await?;
                self.log.push(Severity::Success, format!("{pallet} exported"));
                Ok(())
            }
            Command::Wait { duration, reason } => {
                debug!("waiting {:?}: {}", duration, reason);
                tokio::time::sleep(*duration).await;
                Ok(())
            }
            Command::WaitForPallet { slot, timeout } => {
                self.wait_for_pallet(*slot, *timeout).await;
                Ok(())
            }
            Command::Log { message, severity } => {
                self.log.push(*severity, message.clone());
                Ok(())
            }
        }
    }

    async fn navigate(&self, shuttle: &ShuttleId, target: Cell) -> Result<()> {
        let from = self.storage.shuttle(shuttle).await?.position.cell();
        let path = Pathfinder::new(&self.topology).find_path(from, target)?;
        let steps: Vec<Cell> = path.into_iter().skip(1).collect();
        if steps.is_empty() {
            return Ok(());
        }
        self.log.push(Severity::Move, format!("{shuttle} navigating to {target}"));
        self.driver.drive(shuttle, steps).await?;
        self.wait_idle(shuttle).await
    }

    async fn move_straight(&self, shuttle: &ShuttleId, target: Cell) -> Result<()> {
        let state = self.storage.shuttle(shuttle).await?;
        let from = state.position.cell();
        state.mode.validate(from, target)?;
        if from == target {
            return Ok(());
        }
        self.log.push(Severity::Move, format!("{shuttle} moving to {target}"));
        self.driver.drive(shuttle, from.steps_to(target)).await?;
        self.wait_idle(shuttle).await
    }

    async fn move_lift(&self, lift: &LiftId, level: i32) -> Result<()> {
        let current = self.storage.lift(lift).await?.level;
        if current == level {
            debug!("{} already at level {}", lift, level);
            return Ok(());
        }

        self.log.push(Severity::Action, format!("{lift} moving to level {level}"));
        self.storage
            .update_lift(lift, move |l| {
                l.target_level = level;
                l.status = LiftStatus::Moving;
            })
            .await?;
        tokio::time::sleep(self.config.lift_move).await;
        self.storage
            .update_lift(lift, move |l| {
                l.level = level;
                l.status = LiftStatus::Idle;
            })
            .await?;
        self.log.push(Severity::Info, format!("{lift} arrived at level {level}"));

        // Carry whoever is standing on the platform.
        let riders: Vec<ShuttleId> = self
            .storage
            .shuttles()
            .await
            .into_iter()
            .filter(|s| s.on_lift.as_ref() == Some(lift))
            .map(|s| s.id)
            .collect();
        for rider in riders {
            let topology = &self.topology;
            self.storage
                .update_shuttle(&rider, move |s| {
                    s.position.z = level;
                    s.world = topology.grid_to_world(s.position);
                })
                .await?;
            debug!("{} carried to level {}", rider, level);
        }
        Ok(())
    }

    /// Suspend until the shuttle reports idle. There is no upper bound.
    async fn wait_idle(&self, shuttle: &ShuttleId) -> Result<()> {
        loop {
            if self.storage.shuttle(shuttle).await?.is_idle() {
                return Ok(());
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn wait_for_pallet(&self, slot: SlotKey, timeout: Duration) {
        let arrived = tokio::time::timeout(timeout, async {
            while !self.storage.is_occupied(slot).await {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        })
        .await;
        if arrived.is_err() {
            self.log.push(
                Severity::Warning,
                format!("Pallet did not reach {slot} within {}s, continuing", timeout.as_secs()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SimulatedDriver;
    use rackflow_core::{GridCoordinate, KinematicMode, ModeViolation, PalletRecord, TaskKind};
    use rackflow_storage::MemoryStorage;

    type Fixture = (Arc<MemoryStorage>, Arc<ActivityLog>, SequenceExecutor<MemoryStorage, SimulatedDriver<MemoryStorage>>);

    fn fixture() -> Fixture {
        let topology = Arc::new(GridTopology::reference().unwrap());
        let storage = Arc::new(MemoryStorage::for_topology(&topology));
        let config = ExecutorConfig::default();
        let driver = Arc::new(SimulatedDriver::new(storage.clone(), topology.clone(), config.cell_travel));
        let log = Arc::new(ActivityLog::default());
        let executor = SequenceExecutor::new(storage.clone(), topology, driver, log.clone(), config);
        (storage, log, executor)
    }

    fn shuttle() -> ShuttleId {
        ShuttleId::new("SHUTTLE_1")
    }

    fn sequence(commands: Vec<Command>) -> TaskSequence {
        TaskSequence::new(
            TaskKind::Inbound { slot: SlotKey::new(25, 6, 1) },
            shuttle(),
            commands,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn move_waits_for_arrival() {
        let (storage, _, executor) = fixture();
        executor
            .apply(&Command::Move { shuttle: shuttle(), target: Cell::new(9, 4) })
            .await
            .unwrap();
        let s = storage.shuttle(&shuttle()).await.unwrap();
        assert!(s.is_idle());
        assert_eq!(s.position, GridCoordinate::new(9, 4, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn move_against_mode_aborts_sequence() {
        let (storage, log, executor) = fixture();
        storage.seed_inventory([(SlotKey::new(4, 5, 1), PalletRecord::new("#f59e0b"))]).await;
        let seq = sequence(vec![
            Command::Move { shuttle: shuttle(), target: Cell::new(4, 5) },
            Command::PickFromSlot { shuttle: shuttle(), slot: SlotKey::new(4, 5, 1) },
        ]);
        let err = executor.run(&seq).await.unwrap_err();
        assert_eq!(
            err,
            ExecutionError::ModeViolation(ModeViolation {
                mode: KinematicMode::Aisle,
                from: Cell::new(4, 4),
                to: Cell::new(4, 5),
            })
        );
        assert!(storage.get_pallet(SlotKey::new(4, 5, 1)).await.is_some());
        assert!(log.contains("aborted"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_applied_commands() {
        let (storage, _, executor) = fixture();
        let slot = SlotKey::new(9, 5, 1);
        storage.seed_inventory([(slot, PalletRecord::new("#f59e0b"))]).await;
        let seq = sequence(vec![
            Command::PickFromSlot { shuttle: shuttle(), slot },
            Command::PickFromSlot { shuttle: shuttle(), slot: SlotKey::new(10, 5, 1) },
        ]);
        assert!(executor.run(&seq).await.is_err());
        assert!(storage.get_pallet(slot).await.is_none());
        assert!(storage.shuttle(&shuttle()).await.unwrap().carried.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn redundant_mode_switch_takes_no_time() {
        let (_, log, executor) = fixture();
        let start = tokio::time::Instant::now();
        executor
            .apply(&Command::SetMode { shuttle: shuttle(), mode: KinematicMode::Aisle })
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(!log.contains("switching"));

        executor
            .apply(&Command::SetMode { shuttle: shuttle(), mode: KinematicMode::Rail })
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn lift_carries_boarded_shuttle() {
        let (storage, _, executor) = fixture();
        let lift = LiftId::new("LIFT_LOWER");
        let seq = sequence(vec![
            Command::Move { shuttle: shuttle(), target: Cell::new(2, 4) },
            Command::SetMode { shuttle: shuttle(), mode: KinematicMode::Rail },
            Command::Move { shuttle: shuttle(), target: Cell::new(2, 5) },
            Command::BoardLift { shuttle: shuttle(), lift: lift.clone() },
            Command::MoveLift { lift: lift.clone(), level: 3 },
        ]);
        executor.run(&seq).await.unwrap();

        let s = storage.shuttle(&shuttle()).await.unwrap();
        assert_eq!(s.position, GridCoordinate::new(2, 5, 3));
        assert_eq!(s.on_lift, Some(lift.clone()));
        let l = storage.lift(&lift).await.unwrap();
        assert_eq!((l.level, l.status), (3, LiftStatus::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn pallet_timeout_is_soft() {
        let (_, log, executor) = fixture();
        let seq = sequence(vec![
            Command::WaitForPallet { slot: SlotKey::new(2, 5, 1), timeout: Duration::from_secs(10) },
            Command::Log { message: "after wait".into(), severity: Severity::Success },
        ]);
        executor.run(&seq).await.unwrap();
        assert!(log.contains("did not reach"));
        assert!(log.contains("after wait"));
    }

    #[tokio::test(start_paused = true)]
    async fn navigate_routes_out_of_rack() {
        let (storage, _, executor) = fixture();
        storage
            .update_shuttle(&shuttle(), |s| s.position = GridCoordinate::new(20, 7, 1))
            .await
            .unwrap();
        executor
            .apply(&Command::Navigate { shuttle: shuttle(), target: Cell::new(10, 4) })
            .await
            .unwrap();
        let s = storage.shuttle(&shuttle()).await.unwrap();
        assert_eq!(s.position.cell(), Cell::new(10, 4));
        assert_eq!(s.mode, KinematicMode::Aisle);
    }

    #[tokio::test(start_paused = true)]
    async fn moving_shuttle_is_settled_after_run() {
        let (storage, _, executor) = fixture();
        storage
            .update_shuttle(&shuttle(), |s| s.status = MotionStatus::Moving)
            .await
            .unwrap();
        executor.run(&sequence(Vec::new())).await.unwrap();
        assert!(storage.shuttle(&shuttle()).await.unwrap().is_idle());
    }
}
