//! Executor timing configuration.

use std::time::Duration;

use rackflow_planning::PlanTimings;
use rackflow_storage::DEFAULT_CAPACITY;

/// Simulated durations and polling cadence of the executor.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// How often suspended commands re-check their completion condition
    pub poll_interval: Duration,
    /// Lift travel between any two levels
    pub lift_move: Duration,
    /// Wheel reconfiguration
    pub mode_switch: Duration,
    /// Deck raise or lower
    pub deck: Duration,
    /// One conveyor cell
    pub conveyor_step: Duration,
    /// Settle time after a pallet appears on the conveyor
    pub spawn_delay: Duration,
    /// Bound on the conveyor to lift hand-off
    pub pallet_arrival_timeout: Duration,
    /// One grid cell of shuttle travel (simulated driver)
    pub cell_travel: Duration,
    /// Retained activity log entries
    pub log_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            lift_move: Duration::from_millis(2000),
            mode_switch: Duration::from_millis(1000),
            deck: Duration::from_millis(1000),
            conveyor_step: Duration::from_millis(2000),
            spawn_delay: Duration::from_millis(500),
            pallet_arrival_timeout: Duration::from_secs(10),
            cell_travel: Duration::from_millis(300),
            log_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ExecutorConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lift travel time.
    pub fn with_lift_move(mut self, duration: Duration) -> Self {
        self.lift_move = duration;
        self
    }

    /// Set the per-cell shuttle travel time.
    pub fn with_cell_travel(mut self, duration: Duration) -> Self {
        self.cell_travel = duration;
        self
    }

    /// Set the conveyor hand-off bound.
    pub fn with_pallet_arrival_timeout(mut self, duration: Duration) -> Self {
        self.pallet_arrival_timeout = duration;
        self
    }

    /// Set the activity log capacity.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Multiply every duration by `factor`. Useful for fast-forwarding the
    /// simulation outside of tests.
    pub fn scaled(self, factor: f64) -> Self {
        let f = |d: Duration| d.mul_f64(factor.max(0.0));
        Self {
            poll_interval: f(self.poll_interval),
            lift_move: f(self.lift_move),
            mode_switch: f(self.mode_switch),
            deck: f(self.deck),
            conveyor_step: f(self.conveyor_step),
            spawn_delay: f(self.spawn_delay),
            pallet_arrival_timeout: f(self.pallet_arrival_timeout),
            cell_travel: f(self.cell_travel),
            log_capacity: self.log_capacity,
        }
    }

    /// Delays the planner bakes into sequences.
    pub fn plan_timings(&self) -> PlanTimings {
        PlanTimings {
            spawn_settle: self.spawn_delay,
            pallet_arrival_timeout: self.pallet_arrival_timeout,
        }
    }
}
