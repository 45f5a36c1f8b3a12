//! Grid coordinates and the shuttle kinematic model.
//!
//! Axes follow the rack vocabulary: `x` is depth (how far into a rack a
//! slot sits, measured from the aisle), `y` is the rail a shuttle travels
//! along, and `z` is the 1-based storage level.

use serde::{Deserialize, Serialize};

/// A cell on one level of the grid (depth, rail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    /// Depth
    pub x: i32,
    /// Rail
    pub y: i32,
}

impl Cell {
    /// Create a new cell.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The four axis-aligned neighbours.
    pub fn neighbors_4(self) -> [Cell; 4] {
        [
            Cell::new(self.x + 1, self.y),
            Cell::new(self.x - 1, self.y),
            Cell::new(self.x, self.y + 1),
            Cell::new(self.x, self.y - 1),
        ]
    }

    /// Manhattan distance to another cell.
    pub fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Lift this cell onto a level.
    pub const fn at_level(self, z: i32) -> GridCoordinate {
        GridCoordinate { x: self.x, y: self.y, z }
    }

    /// Cells strictly after `self` up to and including `to`, walking one
    /// axis at a time (depth first). Used to expand a straight move into
    /// unit steps.
    pub fn steps_to(self, to: Cell) -> Vec<Cell> {
        let mut steps = Vec::with_capacity(self.manhattan(to) as usize);
        let mut cur = self;
        while cur.x != to.x {
            cur.x += (to.x - cur.x).signum();
            steps.push(cur);
        }
        while cur.y != to.y {
            cur.y += (to.y - cur.y).signum();
            steps.push(cur);
        }
        steps
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// A fully qualified grid position (depth, rail, level).
///
/// Also used as the inventory key: an inventory slot is identified by the
/// cell and level it sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoordinate {
    /// Depth
    pub x: i32,
    /// Rail
    pub y: i32,
    /// Level (1-based)
    pub z: i32,
}

/// Inventory slot key.
pub type SlotKey = GridCoordinate;

impl GridCoordinate {
    /// Create a new coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Drop the level.
    pub const fn cell(self) -> Cell {
        Cell { x: self.x, y: self.y }
    }
}

impl std::fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

/// Wheel configuration of a shuttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KinematicMode {
    /// Moves only along depth (x).
    Aisle,
    /// Moves only along the rail (y).
    Rail,
}

impl KinematicMode {
    /// Check that moving from `from` to `to` only changes the axis this
    /// mode permits.
    pub fn validate(self, from: Cell, to: Cell) -> Result<(), ModeViolation> {
        let violated = match self {
            KinematicMode::Aisle => from.y != to.y,
            KinematicMode::Rail => from.x != to.x,
        };
        if violated {
            Err(ModeViolation { mode: self, from, to })
        } else {
            Ok(())
        }
    }

    /// The mode required to travel between two cells that differ on one
    /// axis only. `None` when the cells are equal or diagonal.
    pub fn for_step(from: Cell, to: Cell) -> Option<Self> {
        match (from.x == to.x, from.y == to.y) {
            (false, true) => Some(KinematicMode::Aisle),
            (true, false) => Some(KinematicMode::Rail),
            _ => None,
        }
    }
}

impl std::fmt::Display for KinematicMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KinematicMode::Aisle => write!(f, "AISLE"),
            KinematicMode::Rail => write!(f, "RAIL"),
        }
    }
}

/// A move changed the axis its kinematic mode forbids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mode violation: {mode} move from {from} to {to} changes a forbidden axis")]
pub struct ModeViolation {
    /// Mode in force
    pub mode: KinematicMode,
    /// Start of the offending move
    pub from: Cell,
    /// End of the offending move
    pub to: Cell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aisle_rejects_rail_change() {
        let err = KinematicMode::Aisle
            .validate(Cell::new(7, 4), Cell::new(7, 5))
            .unwrap_err();
        assert_eq!(err.mode, KinematicMode::Aisle);
    }

    #[test]
    fn rail_rejects_depth_change() {
        assert!(KinematicMode::Rail
            .validate(Cell::new(4, 9), Cell::new(5, 9))
            .is_err());
    }

    #[test]
    fn same_axis_moves_pass() {
        for x in 1..=25 {
            assert!(KinematicMode::Aisle.validate(Cell::new(1, 4), Cell::new(x, 4)).is_ok());
            assert!(KinematicMode::Rail.validate(Cell::new(x, 1), Cell::new(x, 23)).is_ok());
        }
    }

    #[test]
    fn steps_to_walks_depth_then_rail() {
        let steps = Cell::new(2, 4).steps_to(Cell::new(4, 6));
        assert_eq!(
            steps,
            vec![Cell::new(3, 4), Cell::new(4, 4), Cell::new(4, 5), Cell::new(4, 6)]
        );
        assert!(Cell::new(3, 3).steps_to(Cell::new(3, 3)).is_empty());
    }

    #[test]
    fn mode_for_step() {
        assert_eq!(
            KinematicMode::for_step(Cell::new(1, 1), Cell::new(2, 1)),
            Some(KinematicMode::Aisle)
        );
        assert_eq!(
            KinematicMode::for_step(Cell::new(1, 1), Cell::new(1, 0)),
            Some(KinematicMode::Rail)
        );
        assert_eq!(KinematicMode::for_step(Cell::new(1, 1), Cell::new(2, 2)), None);
    }
}
