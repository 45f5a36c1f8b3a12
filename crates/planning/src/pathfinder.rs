//! Grid A* over the highway network.
//!
//! Highways are always walkable. A rack cell is only walkable when it lies
//! on the straight corridor between a rack-interior endpoint and its
//! nearest horizontal highway: the escape corridor out of the start cell,
//! or the entry corridor into the goal cell. Routing therefore never cuts
//! through a second rack on the way.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rackflow_core::{Cell, GridTopology};
use tracing::{debug, trace};

use crate::error::PathNotFound;

/// Cost of stepping onto a highway cell.
pub const HIGHWAY_COST: u32 = 1;
/// Cost of stepping onto one of the columns next to the aisle mouth.
pub const AISLE_MOUTH_COST: u32 = 2;
/// Cost of stepping onto any other rack cell.
pub const RACK_COST: u32 = 3;
/// Number of depth columns, counted from the aisle, priced as aisle mouth.
pub const AISLE_MOUTH_COLUMNS: i32 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Node {
    cell: Cell,
    g: u32,
    f: u32,
    seq: u64,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behaviour; earlier insertions win ties.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.g.cmp(&self.g).reverse())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A straight run of rack cells made walkable for one search.
#[derive(Debug, Clone, Copy)]
struct Corridor {
    x: i32,
    y_lo: i32,
    y_hi: i32,
}

impl Corridor {
    fn toward_highway(topology: &GridTopology, from: Cell) -> Option<Self> {
        if topology.is_highway(from) {
            return None;
        }
        let highway = topology.nearest_horizontal_highway(from.y)?;
        Some(Self {
            x: from.x,
            y_lo: from.y.min(highway),
            y_hi: from.y.max(highway),
        })
    }

    fn contains(&self, cell: Cell) -> bool {
        cell.x == self.x && (self.y_lo..=self.y_hi).contains(&cell.y)
    }
}

/// A* pathfinder over a [`GridTopology`].
pub struct Pathfinder<'a> {
    topology: &'a GridTopology,
    max_expansions: usize,
}

impl<'a> Pathfinder<'a> {
    /// Create a pathfinder. The expansion cap defaults to four times the
    /// number of cells on one level.
    pub fn new(topology: &'a GridTopology) -> Self {
        let dims = topology.dimensions();
        Self {
            topology,
            max_expansions: (dims.x_columns * dims.y_rows).max(1) as usize * 4,
        }
    }

    /// Override the expansion cap.
    pub fn with_max_expansions(mut self, max: usize) -> Self {
        self.max_expansions = max;
        self
    }

    /// Traversal cost of a cell, `None` when it is outside the grid.
    pub fn cost(&self, cell: Cell) -> Option<u32> {
        if !self.topology.in_bounds(cell) {
            return None;
        }
        Some(if self.topology.is_highway(cell) {
            HIGHWAY_COST
        } else if cell.x <= AISLE_MOUTH_COLUMNS {
            AISLE_MOUTH_COST
        } else {
            RACK_COST
        })
    }

    /// Find a 4-connected path from `start` to `goal`, both included.
    pub fn find_path(&self, start: Cell, goal: Cell) -> Result<Vec<Cell>, PathNotFound> {
        let not_found = PathNotFound { from: start, to: goal };
        trace!("[Pathfinder] find_path {} -> {}", start, goal);

        if !self.topology.in_bounds(start) || !self.topology.in_bounds(goal) {
            debug!("[Pathfinder] start or goal outside grid");
            return Err(not_found);
        }
        if start == goal {
            return Ok(vec![start]);
        }

        let escape = Corridor::toward_highway(self.topology, start);
        let entry = Corridor::toward_highway(self.topology, goal);
        let walkable = |cell: Cell| {
            self.topology.in_bounds(cell)
                && (self.topology.is_highway(cell)
                    || escape.is_some_and(|c| c.contains(cell))
                    || entry.is_some_and(|c| c.contains(cell)))
        };

        let mut open = BinaryHeap::new();
        let mut closed = HashSet::new();
        let mut came_from: HashMap<Cell, Cell> = HashMap::new();
        let mut g_scores: HashMap<Cell, u32> = HashMap::new();
        let mut seq = 0u64;

        g_scores.insert(start, 0);
        open.push(Node {
            cell: start,
            g: 0,
            f: start.manhattan(goal),
            seq,
        });

        let mut expanded = 0usize;
        while let Some(current) = open.pop() {
            if current.cell == goal {
                let path = reconstruct(&came_from, goal);
                debug!(
                    "[Pathfinder] {} -> {}: {} cells, cost {}, {} expanded",
                    start,
                    goal,
                    path.len(),
                    current.g,
                    expanded
                );
                return Ok(path);
            }
            if !closed.insert(current.cell) {
                continue;
            }
            expanded += 1;
            if expanded > self.max_expansions {
                debug!("[Pathfinder] expansion cap {} hit", self.max_expansions);
                return Err(not_found);
            }

            for neighbor in current.cell.neighbors_4() {
                if closed.contains(&neighbor) || !walkable(neighbor) {
                    continue;
                }
                let Some(step) = self.cost(neighbor) else {
                    continue;
                };
                let tentative = current.g + step;
                if tentative < g_scores.get(&neighbor).copied().unwrap_or(u32::MAX) {
                    came_from.insert(neighbor, current.cell);
                    g_scores.insert(neighbor, tentative);
                    seq += 1;
                    open.push(Node {
                        cell: neighbor,
                        g: tentative,
                        f: tentative + neighbor.manhattan(goal),
                        seq,
                    });
                }
            }
        }

        debug!("[Pathfinder] no path {} -> {} after {} expansions", start, goal, expanded);
        Err(not_found)
    }
}

fn reconstruct(came_from: &HashMap<Cell, Cell>, goal: Cell) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
