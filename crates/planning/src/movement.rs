//! Kinematic movement planning.
//!
//! A shuttle cannot move diagonally: it drives along depth in AISLE mode
//! and along the rail in RAIL mode. Any repositioning therefore splits into
//! at most three straight legs, each emitted only when needed:
//!
//! ```text
//! ESCAPE   (RAIL)  leave the rack onto the zone highway
//! TRAVEL   (AISLE) drive along the highway to the target depth
//! APPROACH (RAIL)  enter the target rail
//! ```

use rackflow_core::{Cell, Command, KinematicMode, ShuttleId, Zone};
use tracing::trace;

use crate::error::Result;

/// Phase a leg belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Off the rack onto the highway
    Escape,
    /// Along the highway
    Travel,
    /// Into the target rail
    Approach,
}

/// One straight move in a fixed kinematic mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    /// Phase
    pub phase: Phase,
    /// Wheel configuration for the move
    pub mode: KinematicMode,
    /// Start cell
    pub from: Cell,
    /// End cell
    pub to: Cell,
}

/// Stateless ESCAPE -> TRAVEL -> APPROACH planner.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementPlanner;

impl MovementPlanner {
    /// Create a planner.
    pub fn new() -> Self {
        Self
    }

    /// Decompose a repositioning into validated legs.
    pub fn legs(&self, from: Cell, to: Cell, highway_y: i32) -> Result<Vec<Leg>> {
        let mut legs = Vec::with_capacity(3);
        if from == to {
            return Ok(legs);
        }

        let mut cur = from;
        if cur.y != highway_y {
            let next = Cell::new(cur.x, highway_y);
            legs.push(Leg {
                phase: Phase::Escape,
                mode: KinematicMode::Rail,
                from: cur,
                to: next,
            });
            cur = next;
        }
        if cur.x != to.x {
            let next = Cell::new(to.x, cur.y);
            legs.push(Leg {
                phase: Phase::Travel,
                mode: KinematicMode::Aisle,
                from: cur,
                to: next,
            });
            cur = next;
        }
        if cur.y != to.y {
            let next = Cell::new(cur.x, to.y);
            legs.push(Leg {
                phase: Phase::Approach,
                mode: KinematicMode::Rail,
                from: cur,
                to: next,
            });
        }

        for leg in &legs {
            leg.mode.validate(leg.from, leg.to)?;
            trace!("{:?} {} {} -> {}", leg.phase, leg.mode, leg.from, leg.to);
        }
        Ok(legs)
    }

    /// Plan a repositioning inside a zone as mode/move command pairs.
    pub fn plan(&self, shuttle: &ShuttleId, from: Cell, to: Cell, zone: &Zone) -> Result<Vec<Command>> {
        let legs = self.legs(from, to, zone.highway_y)?;
        let mut commands = Vec::with_capacity(legs.len() * 2);
        for leg in legs {
            commands.push(Command::SetMode {
                shuttle: shuttle.clone(),
                mode: leg.mode,
            });
            commands.push(Command::Move {
                shuttle: shuttle.clone(),
                target: leg.to,
            });
        }
        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackflow_core::GridTopology;

    fn phases(legs: &[Leg]) -> Vec<Phase> {
        legs.iter().map(|l| l.phase).collect()
    }

    #[test]
    fn full_three_phase_move() {
        let legs = MovementPlanner::new()
            .legs(Cell::new(25, 6), Cell::new(10, 9), 4)
            .unwrap();
        assert_eq!(phases(&legs), vec![Phase::Escape, Phase::Travel, Phase::Approach]);
        assert_eq!(legs[0].to, Cell::new(25, 4));
        assert_eq!(legs[1].to, Cell::new(10, 4));
        assert_eq!(legs[2].to, Cell::new(10, 9));
    }

    #[test]
    fn from_highway_skips_escape() {
        let legs = MovementPlanner::new()
            .legs(Cell::new(4, 4), Cell::new(25, 6), 4)
            .unwrap();
        assert_eq!(phases(&legs), vec![Phase::Travel, Phase::Approach]);
    }

    #[test]
    fn same_depth_returns_via_highway() {
        let legs = MovementPlanner::new()
            .legs(Cell::new(25, 6), Cell::new(25, 4), 4)
            .unwrap();
        assert_eq!(phases(&legs), vec![Phase::Escape]);
    }

    #[test]
    fn no_movement_no_legs() {
        assert!(MovementPlanner::new()
            .legs(Cell::new(7, 7), Cell::new(7, 7), 4)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn legs_never_move_diagonally() {
        let planner = MovementPlanner::new();
        for (fx, fy, tx, ty) in [(1, 1, 25, 23), (25, 12, 3, 2), (4, 4, 4, 11), (9, 5, 9, 3)] {
            for leg in planner.legs(Cell::new(fx, fy), Cell::new(tx, ty), 4).unwrap() {
                assert!(leg.mode.validate(leg.from, leg.to).is_ok());
                assert!(leg.from.x == leg.to.x || leg.from.y == leg.to.y);
            }
        }
    }

    #[test]
    fn plan_emits_mode_before_each_move() {
        let topo = GridTopology::reference().unwrap();
        let zone = topo.zone_for_rail(6).unwrap();
        let shuttle = ShuttleId::new("SHUTTLE_1");
        let commands = MovementPlanner::new()
            .plan(&shuttle, Cell::new(4, 4), Cell::new(25, 6), zone)
            .unwrap();
        assert_eq!(
            commands,
            vec![
                Command::SetMode { shuttle: shuttle.clone(), mode: KinematicMode::Aisle },
                Command::Move { shuttle: shuttle.clone(), target: Cell::new(25, 4) },
                Command::SetMode { shuttle: shuttle.clone(), mode: KinematicMode::Rail },
                Command::Move { shuttle, target: Cell::new(25, 6) },
            ]
        );
    }
}
