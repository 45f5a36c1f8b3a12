//! Task sequence generation.
//!
//! Every request reduces to one relocation: take a pallet from a source
//! endpoint (the inbound conveyor or a rack slot) and bring it to a
//! destination endpoint (a rack slot or the outbound conveyor). Slots are
//! resolved by [`SlotLocator`] before a single command is emitted, so a
//! failed request never produces a partial sequence.

use std::time::Duration;

use rackflow_core::{
    Cell, Command, GridTopology, KinematicMode, LiftState, PalletId, PalletRecord, Severity, ShuttleId,
    ShuttleState, SlotKey, TaskKind, TaskSequence, Zone,
};
use tracing::{debug, info};

use crate::error::{PlanError, Result};
use crate::locate::{InventoryView, SlotLocator, SlotSearch};
use crate::movement::MovementPlanner;
use crate::pathfinder::Pathfinder;

/// Level served by the conveyors.
pub const CONVEYOR_LEVEL: i32 = 1;

/// Fixed delays baked into generated sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanTimings {
    /// Pause after a pallet appears on the conveyor
    pub spawn_settle: Duration,
    /// Upper bound on the conveyor to lift hand-off
    pub pallet_arrival_timeout: Duration,
}

impl Default for PlanTimings {
    fn default() -> Self {
        Self {
            spawn_settle: Duration::from_millis(500),
            pallet_arrival_timeout: Duration::from_secs(10),
        }
    }
}

/// Resource state a plan starts from.
#[derive(Debug, Clone)]
pub struct PlanningView {
    /// The zone's shuttle
    pub shuttle: ShuttleState,
    /// The zone's lift
    pub lift: LiftState,
    /// Current inventory
    pub inventory: InventoryView,
}

/// Where a relocation starts or ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Conveyor,
    Slot(SlotKey),
}

/// Builds inbound, outbound and transfer sequences.
pub struct TaskSequencer<'a> {
    topology: &'a GridTopology,
    timings: PlanTimings,
    movement: MovementPlanner,
}

impl<'a> TaskSequencer<'a> {
    /// Create a sequencer with default timings.
    pub fn new(topology: &'a GridTopology) -> Self {
        Self {
            topology,
            timings: PlanTimings::default(),
            movement: MovementPlanner::new(),
        }
    }

    /// Override the timings.
    pub fn with_timings(mut self, timings: PlanTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Zone owning a rail.
    pub fn zone_for(&self, row: i32) -> Result<&'a Zone> {
        self.topology
            .zone_for_rail(row)
            .ok_or(PlanError::RowOutsideZones(row))
    }

    fn check_level(&self, level: i32) -> Result<()> {
        if self.topology.level_in_range(level) {
            Ok(())
        } else {
            Err(PlanError::LevelOutOfRange(level))
        }
    }

    /// Conveyor to the deepest accessible empty slot on `row`.
    pub fn inbound(&self, view: &PlanningView, row: i32, level: i32) -> Result<TaskSequence> {
        self.check_level(level)?;
        let zone = self.zone_for(row)?;
        let slot = SlotLocator::new(self.topology, zone).locate(
            SlotSearch::DeepestEmpty,
            row,
            level,
            &view.inventory,
        )?;
        info!("inbound rail {} level {} resolved to {}", row, level, slot);
        self.relocate(view, zone, TaskKind::Inbound { slot }, Endpoint::Conveyor, Endpoint::Slot(slot))
    }

    /// Nearest accessible pallet on `row` to the conveyor.
    pub fn outbound(&self, view: &PlanningView, row: i32, level: i32) -> Result<TaskSequence> {
        self.check_level(level)?;
        let zone = self.zone_for(row)?;
        let slot = SlotLocator::new(self.topology, zone).locate(
            SlotSearch::NearestOccupied,
            row,
            level,
            &view.inventory,
        )?;
        info!("outbound rail {} level {} resolved to {}", row, level, slot);
        self.relocate(view, zone, TaskKind::Outbound { slot }, Endpoint::Slot(slot), Endpoint::Conveyor)
    }

    /// Rack to rack inside one zone.
    pub fn transfer(
        &self,
        view: &PlanningView,
        from_row: i32,
        from_level: i32,
        to_row: i32,
        to_level: i32,
    ) -> Result<TaskSequence> {
        self.check_level(from_level)?;
        self.check_level(to_level)?;
        let zone = self.zone_for(from_row)?;
        if !zone.contains_rail(to_row) {
            return Err(PlanError::CrossZoneTransfer { from_row, to_row });
        }

        let locator = SlotLocator::new(self.topology, zone);
        let from = locator.locate(SlotSearch::NearestOccupied, from_row, from_level, &view.inventory)?;
        // The source pallet is gone by the time the destination is entered.
        let mut after_pick = view.inventory.clone();
        after_pick.remove(&from);
        let to = locator.locate(SlotSearch::DeepestEmpty, to_row, to_level, &after_pick)?;
        info!("transfer resolved to {} -> {}", from, to);
        self.relocate(
            view,
            zone,
            TaskKind::Transfer { from, to },
            Endpoint::Slot(from),
            Endpoint::Slot(to),
        )
    }

    fn relocate(
        &self,
        view: &PlanningView,
        zone: &Zone,
        kind: TaskKind,
        source: Endpoint,
        target: Endpoint,
    ) -> Result<TaskSequence> {
        let mut chor = Choreography::new(self, zone, view);
        chor.log(Severity::Start, format!("{} started for {}", capitalize(&kind.to_string()), zone.shuttle));

        let pallet = match source {
            Endpoint::Conveyor => chor.collect_from_conveyor()?,
            Endpoint::Slot(slot) => {
                let pallet = view.inventory.get(&slot).map(|p| p.id).ok_or(PlanError::SlotEmpty {
                    row: slot.y,
                    level: slot.z,
                })?;
                chor.go_to_level(slot.z)?;
                chor.travel(slot.cell())?;
                chor.pick(slot);
                pallet
            }
        };

        match target {
            Endpoint::Slot(slot) => {
                chor.go_to_level(slot.z)?;
                chor.travel(slot.cell())?;
                chor.place(slot);
                chor.travel(Cell::new(slot.x, zone.highway_y))?;
            }
            Endpoint::Conveyor => chor.deliver_to_conveyor(pallet)?,
        }

        chor.log(Severity::Success, format!("{} complete", capitalize(&kind.to_string())));
        let commands = chor.finish();
        debug!("{} planned as {} commands", kind, commands.len());
        Ok(TaskSequence::new(kind, zone.shuttle.clone(), commands))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Command emitter that tracks where the shuttle and lift will be once the
/// commands emitted so far have run.
struct Choreography<'s, 'a> {
    seq: &'s TaskSequencer<'a>,
    zone: &'s Zone,
    shuttle: ShuttleId,
    pos: Cell,
    level: i32,
    mode: KinematicMode,
    on_lift: bool,
    lift_level: i32,
    deck_raised: bool,
    commands: Vec<Command>,
}

impl<'s, 'a> Choreography<'s, 'a> {
    fn new(seq: &'s TaskSequencer<'a>, zone: &'s Zone, view: &PlanningView) -> Self {
        let shuttle = &view.shuttle;
        Self {
            seq,
            zone,
            shuttle: shuttle.id.clone(),
            pos: shuttle.position.cell(),
            level: shuttle.position.z,
            mode: shuttle.mode,
            on_lift: shuttle.on_lift.is_some(),
            lift_level: view.lift.target_level,
            deck_raised: shuttle.deck_raised,
            commands: Vec::new(),
        }
    }

    fn finish(self) -> Vec<Command> {
        self.commands
    }

    fn log(&mut self, severity: Severity, message: String) {
        self.commands.push(Command::Log { message, severity });
    }

    fn set_mode(&mut self, mode: KinematicMode) {
        if self.mode != mode {
            self.commands.push(Command::SetMode {
                shuttle: self.shuttle.clone(),
                mode,
            });
            self.mode = mode;
        }
    }

    fn step(&mut self, mode: KinematicMode, to: Cell) -> Result<()> {
        mode.validate(self.pos, to)?;
        self.set_mode(mode);
        self.commands.push(Command::Move {
            shuttle: self.shuttle.clone(),
            target: to,
        });
        self.pos = to;
        Ok(())
    }

    /// Reposition on the current level. The route is checked against the
    /// highway network first so an unreachable target fails the whole plan.
    fn travel(&mut self, to: Cell) -> Result<()> {
        if self.pos == to {
            return Ok(());
        }
        if self.on_lift {
            self.leave_lift()?;
        }
        Pathfinder::new(self.seq.topology).find_path(self.pos, to)?;
        let planned = self.seq.movement.plan(&self.shuttle, self.pos, to, self.zone)?;
        for command in planned {
            match command {
                Command::SetMode { mode, .. } => self.set_mode(mode),
                Command::Move { target, .. } => {
                    self.pos = target;
                    self.commands.push(command);
                }
                other => self.commands.push(other),
            }
        }
        Ok(())
    }

    fn move_lift(&mut self, level: i32) {
        if self.lift_level != level {
            self.commands.push(Command::MoveLift {
                lift: self.zone.lift.clone(),
                level,
            });
            self.lift_level = level;
            if self.on_lift {
                self.level = level;
            }
        }
    }

    fn board_lift(&mut self) -> Result<()> {
        if self.on_lift {
            return Ok(());
        }
        self.move_lift(self.level);
        self.travel(self.zone.lift_approach())?;
        self.step(KinematicMode::Rail, self.zone.lift_cell)?;
        self.commands.push(Command::BoardLift {
            shuttle: self.shuttle.clone(),
            lift: self.zone.lift.clone(),
        });
        self.on_lift = true;
        Ok(())
    }

    fn leave_lift(&mut self) -> Result<()> {
        self.on_lift = false;
        self.step(KinematicMode::Rail, self.zone.lift_approach())?;
        self.commands.push(Command::DisembarkLift {
            shuttle: self.shuttle.clone(),
        });
        Ok(())
    }

    fn ensure_on_lift_at(&mut self, level: i32) -> Result<()> {
        self.board_lift()?;
        self.move_lift(level);
        Ok(())
    }

    fn go_to_level(&mut self, level: i32) -> Result<()> {
        if self.level == level {
            return Ok(());
        }
        self.ensure_on_lift_at(level)
    }

    fn deck(&mut self, raised: bool) {
        if self.deck_raised != raised {
            self.commands.push(Command::SetDeck {
                shuttle: self.shuttle.clone(),
                raised,
            });
            self.deck_raised = raised;
        }
    }

    fn pick(&mut self, slot: SlotKey) {
        self.deck(true);
        self.commands.push(Command::PickFromSlot {
            shuttle: self.shuttle.clone(),
            slot,
        });
    }

    fn place(&mut self, slot: SlotKey) {
        self.deck(false);
        self.commands.push(Command::PlaceInSlot {
            shuttle: self.shuttle.clone(),
            slot,
        });
    }

    fn collect_from_conveyor(&mut self) -> Result<PalletId> {
        self.ensure_on_lift_at(CONVEYOR_LEVEL)?;

        let path = self.zone.conveyor_inbound_path();
        let hand_off = self.zone.lift_slot(CONVEYOR_LEVEL);
        let pallet = PalletRecord::new(PalletRecord::INBOUND_COLOR);
        let id = pallet.id;
        let (entry, rest) = match path.split_first() {
            Some((entry, rest)) => (*entry, rest),
            None => (self.zone.lift_cell, &[][..]),
        };

        self.log(Severity::Action, format!("Pallet {id} arriving on conveyor {}", self.zone.conveyor_row));
        self.commands.push(Command::SpawnConveyorPallet {
            pallet,
            at: entry,
            level: CONVEYOR_LEVEL,
        });
        self.commands.push(Command::Wait {
            duration: self.seq.timings.spawn_settle,
            reason: "conveyor spawn".into(),
        });
        for &to in rest {
            self.commands.push(Command::MoveConveyorPallet { pallet: id, to });
        }
        self.commands.push(Command::ConveyorToSlot {
            pallet: id,
            slot: hand_off,
        });
        self.commands.push(Command::WaitForPallet {
            slot: hand_off,
            timeout: self.seq.timings.pallet_arrival_timeout,
        });
        self.pick(hand_off);
        Ok(id)
    }

    fn deliver_to_conveyor(&mut self, pallet: PalletId) -> Result<()> {
        self.ensure_on_lift_at(CONVEYOR_LEVEL)?;
        self.deck(false);

        let path = self.zone.conveyor_outbound_path();
        let (at, rest) = match path.split_first() {
            Some((at, rest)) => (*at, rest),
            None => (self.zone.lift_cell, &[][..]),
        };
        self.commands.push(Command::UnloadToConveyor {
            shuttle: self.shuttle.clone(),
            at,
            level: CONVEYOR_LEVEL,
        });
        self.log(Severity::Action, format!("Pallet {pallet} leaving on conveyor {}", self.zone.conveyor_row));
        for &to in rest {
            self.commands.push(Command::MoveConveyorPallet { pallet, to });
        }
        self.commands.push(Command::DespawnConveyorPallet { pallet });
        self.leave_lift()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackflow_core::{GridCoordinate, LiftId};

    fn fixture() -> GridTopology {
        GridTopology::reference().unwrap()
    }

    fn view(topo: &GridTopology, row: i32) -> PlanningView {
        let zone = topo.zone_for_rail(row).unwrap();
        PlanningView {
            shuttle: ShuttleState::parked(
                zone.shuttle.clone(),
                zone.shuttle_home,
                topo.grid_to_world(zone.shuttle_home),
            ),
            lift: LiftState::idle(zone.lift.clone(), 1),
            inventory: InventoryView::new(),
        }
    }

    fn occupy(view: &mut PlanningView, slots: &[(i32, i32, i32)]) {
        for &(x, y, z) in slots {
            view.inventory.insert(SlotKey::new(x, y, z), PalletRecord::new("#3b82f6"));
        }
    }

    fn names(seq: &TaskSequence) -> Vec<&'static str> {
        seq.commands.iter().map(Command::name).collect()
    }

    /// Replays the shuttle moves and checks each against the active mode.
    fn assert_moves_respect_modes(seq: &TaskSequence, start: Cell, start_mode: KinematicMode) {
        let mut pos = start;
        let mut mode = start_mode;
        for command in &seq.commands {
            match command {
                Command::SetMode { mode: m, .. } => mode = *m,
                Command::Move { target, .. } => {
                    assert!(mode.validate(pos, *target).is_ok(), "{mode} {pos} -> {target}");
                    pos = *target;
                }
                _ => {}
            }
        }
    }

    #[test]
    fn inbound_on_empty_warehouse_targets_deepest_slot() {
        let topo = fixture();
        let v = view(&topo, 6);
        let seq = TaskSequencer::new(&topo).inbound(&v, 6, 1).unwrap();

        assert_eq!(seq.kind, TaskKind::Inbound { slot: SlotKey::new(25, 6, 1) });
        assert_eq!(seq.shuttle, ShuttleId::new("SHUTTLE_1"));
        assert!(matches!(seq.commands.first(), Some(Command::Log { severity: Severity::Start, .. })));
        assert!(matches!(seq.commands.last(), Some(Command::Log { severity: Severity::Success, .. })));
        assert!(seq.commands.contains(&Command::PlaceInSlot {
            shuttle: seq.shuttle.clone(),
            slot: SlotKey::new(25, 6, 1),
        }));

        let last_move = seq.commands.iter().rev().find_map(|c| match c {
            Command::Move { target, .. } => Some(*target),
            _ => None,
        });
        assert_eq!(last_move, Some(Cell::new(25, 4)));
        assert_moves_respect_modes(&seq, Cell::new(4, 4), KinematicMode::Aisle);
    }

    #[test]
    fn inbound_walks_conveyor_to_lift() {
        let topo = fixture();
        let v = view(&topo, 6);
        let seq = TaskSequencer::new(&topo).inbound(&v, 6, 1).unwrap();
        let steps: Vec<Cell> = seq
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::MoveConveyorPallet { to, .. } => Some(*to),
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec![Cell::new(1, 6), Cell::new(2, 6), Cell::new(2, 5)]);

        let n = names(&seq);
        let board = n.iter().position(|c| *c == "board_lift").unwrap();
        let spawn = n.iter().position(|c| *c == "spawn_conveyor_pallet").unwrap();
        let wait = n.iter().position(|c| *c == "wait_for_pallet").unwrap();
        let pick = n.iter().position(|c| *c == "pick_from_slot").unwrap();
        assert!(board < spawn && spawn < wait && wait < pick);
    }

    #[test]
    fn inbound_to_upper_level_rides_lift_with_pallet() {
        let topo = fixture();
        let v = view(&topo, 6);
        let seq = TaskSequencer::new(&topo).inbound(&v, 6, 3).unwrap();
        let lift_moves: Vec<i32> = seq
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::MoveLift { level, .. } => Some(*level),
                _ => None,
            })
            .collect();
        assert_eq!(lift_moves, vec![3]);

        let n = names(&seq);
        let pick = n.iter().position(|c| *c == "pick_from_slot").unwrap();
        let lift = n.iter().position(|c| *c == "move_lift").unwrap();
        let disembark = n.iter().position(|c| *c == "disembark_lift").unwrap();
        assert!(pick < lift && lift < disembark);
    }

    #[test]
    fn lift_is_called_to_shuttle_level_first() {
        let topo = fixture();
        let mut v = view(&topo, 6);
        v.lift = LiftState::idle(LiftId::new("LIFT_LOWER"), 4);
        let seq = TaskSequencer::new(&topo).inbound(&v, 6, 1).unwrap();
        let first_lift = seq.commands.iter().find_map(|c| match c {
            Command::MoveLift { level, .. } => Some(*level),
            _ => None,
        });
        assert_eq!(first_lift, Some(1));
    }

    #[test]
    fn shuttle_on_other_level_boards_before_conveyor_work() {
        let topo = fixture();
        let mut v = view(&topo, 6);
        v.shuttle.position = GridCoordinate::new(10, 4, 2);
        v.lift = LiftState::idle(LiftId::new("LIFT_LOWER"), 1);
        let seq = TaskSequencer::new(&topo).inbound(&v, 6, 1).unwrap();
        let lifts: Vec<i32> = seq
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::MoveLift { level, .. } => Some(*level),
                _ => None,
            })
            .collect();
        assert_eq!(lifts, vec![2, 1]);
    }

    #[test]
    fn outbound_picks_sole_pallet_and_unloads() {
        let topo = fixture();
        let mut v = view(&topo, 6);
        occupy(&mut v, &[(25, 6, 1)]);
        let seq = TaskSequencer::new(&topo).outbound(&v, 6, 1).unwrap();

        assert_eq!(seq.kind, TaskKind::Outbound { slot: SlotKey::new(25, 6, 1) });
        let n = names(&seq);
        let pick = n.iter().position(|c| *c == "pick_from_slot").unwrap();
        let unload = n.iter().position(|c| *c == "unload_to_conveyor").unwrap();
        assert!(pick < unload);
        assert!(!n.contains(&"spawn_conveyor_pallet"));
        let pallet = v.inventory[&SlotKey::new(25, 6, 1)].id;
        assert!(seq.commands.contains(&Command::MoveConveyorPallet { pallet, to: Cell::new(0, 6) }));
        assert!(unload < n.iter().position(|c| *c == "despawn_conveyor_pallet").unwrap());
        assert_moves_respect_modes(&seq, Cell::new(4, 4), KinematicMode::Aisle);
    }

    #[test]
    fn travel_follows_movement_plan_without_redundant_modes() {
        let topo = fixture();
        let mut v = view(&topo, 6);
        occupy(&mut v, &[(25, 6, 1)]);
        let zone = topo.zone_for_rail(6).unwrap();
        let seq = TaskSequencer::new(&topo).outbound(&v, 6, 1).unwrap();

        let planned = MovementPlanner::new()
            .plan(&zone.shuttle, Cell::new(4, 4), Cell::new(25, 6), zone)
            .unwrap();
        // The parked shuttle is already in AISLE mode, so the first switch is dropped.
        assert_eq!(planned[0], Command::SetMode { shuttle: zone.shuttle.clone(), mode: KinematicMode::Aisle });
        assert_eq!(&seq.commands[1..4], &planned[1..]);
    }

    #[test]
    fn blocked_depth_is_not_targeted() {
        let topo = fixture();
        let mut v = view(&topo, 6);
        occupy(&mut v, &[(25, 5, 1)]);
        let seq = TaskSequencer::new(&topo).inbound(&v, 6, 1).unwrap();
        assert_eq!(seq.kind, TaskKind::Inbound { slot: SlotKey::new(24, 6, 1) });
    }

    #[test]
    fn transfer_never_touches_conveyor() {
        let topo = fixture();
        let mut v = view(&topo, 6);
        occupy(&mut v, &[(25, 6, 1)]);
        let seq = TaskSequencer::new(&topo).transfer(&v, 6, 1, 8, 1).unwrap();
        assert_eq!(
            seq.kind,
            TaskKind::Transfer {
                from: SlotKey::new(25, 6, 1),
                to: SlotKey::new(25, 8, 1),
            }
        );
        assert!(seq.commands.iter().all(|c| !matches!(
            c,
            Command::SpawnConveyorPallet { .. }
                | Command::UnloadToConveyor { .. }
                | Command::ConveyorToSlot { .. }
        )));
        assert_moves_respect_modes(&seq, Cell::new(4, 4), KinematicMode::Aisle);
    }

    #[test]
    fn transfer_across_levels_uses_lift() {
        let topo = fixture();
        let mut v = view(&topo, 6);
        occupy(&mut v, &[(20, 6, 1)]);
        let seq = TaskSequencer::new(&topo).transfer(&v, 6, 1, 8, 2).unwrap();
        assert!(names(&seq).contains(&"move_lift"));
    }

    #[test]
    fn request_errors_are_raised_before_planning() {
        let topo = fixture();
        let v = view(&topo, 6);
        let sequencer = TaskSequencer::new(&topo);
        assert_eq!(sequencer.outbound(&v, 6, 1).unwrap_err(), PlanError::SlotEmpty { row: 6, level: 1 });
        assert_eq!(sequencer.inbound(&v, 30, 1).unwrap_err(), PlanError::RowOutsideZones(30));
        assert_eq!(sequencer.inbound(&v, 6, 9).unwrap_err(), PlanError::LevelOutOfRange(9));
        assert_eq!(
            sequencer.transfer(&v, 6, 1, 15, 1).unwrap_err(),
            PlanError::CrossZoneTransfer { from_row: 6, to_row: 15 }
        );
    }

    #[test]
    fn redundant_mode_switches_are_not_emitted() {
        let topo = fixture();
        let v = view(&topo, 6);
        let seq = TaskSequencer::new(&topo).inbound(&v, 6, 1).unwrap();
        let modes: Vec<KinematicMode> = seq
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::SetMode { mode, .. } => Some(*mode),
                _ => None,
            })
            .collect();
        assert!(modes.windows(2).all(|w| w[0] != w[1]));
        assert_ne!(modes.first(), Some(&KinematicMode::Aisle));
    }
}
