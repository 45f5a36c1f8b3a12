//! The warehouse coordinator.
//!
//! Owns the shared state container and exposes the three request entry
//! points. Each request is planned synchronously against a snapshot of the
//! owning zone, then executed on a background task. One sequence per
//! shuttle may be in flight; further requests for that shuttle are refused.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rackflow_core::{GridTopology, LogEntry, Severity, ShuttleId, TaskSequence, Zone};
use rackflow_planning::{PlanningView, Result as PlanResult, TaskSequencer};
use rackflow_storage::{ActivityLog, MemoryStorage, Storage, WorldSnapshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::driver::{MotionDriver, SimulatedDriver};
use crate::error::{ExecutionError, RequestError};
use crate::executor::SequenceExecutor;

/// Handle to an accepted request. Resolves when its sequence has finished.
pub type RequestHandle = JoinHandle<Result<(), ExecutionError>>;

type BusySet = Arc<Mutex<HashSet<ShuttleId>>>;

/// Clears a shuttle's busy flag when dropped, whichever way the sequence
/// ends.
struct BusyGuard {
    busy: BusySet,
    shuttle: ShuttleId,
}

impl BusyGuard {
    fn acquire(busy: &BusySet, shuttle: &ShuttleId) -> Option<Self> {
        let mut set = busy.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(shuttle.clone()) {
            return None;
        }
        Some(Self {
            busy: busy.clone(),
            shuttle: shuttle.clone(),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.shuttle);
        debug!("{} released", self.shuttle);
    }
}

struct Inner<S: Storage, D: MotionDriver> {
    topology: Arc<GridTopology>,
    storage: Arc<S>,
    log: Arc<ActivityLog>,
    executor: SequenceExecutor<S, D>,
    config: ExecutorConfig,
    busy: BusySet,
}

/// Shuttle warehouse coordinator.
pub struct Warehouse<S: Storage, D: MotionDriver> {
    inner: Arc<Inner<S, D>>,
}

impl<S: Storage, D: MotionDriver> Clone for Warehouse<S, D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// The in-process simulation: memory storage and timed shuttle motion.
pub type SimulatedWarehouse = Warehouse<MemoryStorage, SimulatedDriver<MemoryStorage>>;

impl SimulatedWarehouse {
    /// Build a simulated warehouse with every shuttle parked at home.
    pub fn simulated(topology: GridTopology, config: ExecutorConfig) -> Self {
        let topology = Arc::new(topology);
        let storage = Arc::new(MemoryStorage::for_topology(&topology));
        let driver = Arc::new(SimulatedDriver::new(
            storage.clone(),
            topology.clone(),
            config.cell_travel,
        ));
        Self::new(topology, storage, driver, config)
    }
}

impl<S: Storage + 'static, D: MotionDriver + 'static> Warehouse<S, D> {
    /// Assemble a coordinator from its parts.
    pub fn new(topology: Arc<GridTopology>, storage: Arc<S>, driver: Arc<D>, config: ExecutorConfig) -> Self {
        let log = Arc::new(ActivityLog::new(config.log_capacity));
        let executor = SequenceExecutor::new(
            storage.clone(),
            topology.clone(),
            driver,
            log.clone(),
            config,
        );
        Self {
            inner: Arc::new(Inner {
                topology,
                storage,
                log,
                executor,
                config,
                busy: Arc::new(Mutex::new(HashSet::new())),
            }),
        }
    }

    /// Put a conveyor pallet away on `row`, `level`.
    pub async fn request_inbound(&self, row: i32, level: i32) -> Result<RequestHandle, RequestError> {
        self.submit("Inbound", row, |seq, view| seq.inbound(view, row, level))
            .await
    }

    /// Send the pallet nearest the aisle on `row`, `level` to the conveyor.
    pub async fn request_outbound(&self, row: i32, level: i32) -> Result<RequestHandle, RequestError> {
        self.submit("Outbound", row, |seq, view| seq.outbound(view, row, level))
            .await
    }

    /// Move a pallet between two rails of the same zone.
    pub async fn request_transfer(
        &self,
        from_row: i32,
        from_level: i32,
        to_row: i32,
        to_level: i32,
    ) -> Result<RequestHandle, RequestError> {
        self.submit("Transfer", from_row, |seq, view| {
            seq.transfer(view, from_row, from_level, to_row, to_level)
        })
        .await
    }

    async fn submit<F>(&self, label: &str, row: i32, plan: F) -> Result<RequestHandle, RequestError>
    where
        F: FnOnce(&TaskSequencer<'_>, &PlanningView) -> PlanResult<TaskSequence>,
    {
        let inner = &self.inner;
        let sequencer = TaskSequencer::new(&inner.topology).with_timings(inner.config.plan_timings());
        let zone = match sequencer.zone_for(row) {
            Ok(zone) => zone,
            Err(e) => {
                inner.log.push(Severity::Error, format!("{label} rejected: {e}"));
                return Err(e.into());
            }
        };

        let Some(guard) = BusyGuard::acquire(&inner.busy, &zone.shuttle) else {
            warn!("{} request for rail {} rejected, {} busy", label, row, zone.shuttle);
            inner
                .log
                .push(Severity::Warning, format!("{label} rejected: {} is busy", zone.shuttle));
            return Err(RequestError::ShuttleBusy(zone.shuttle.clone()));
        };

        let view = self.view(zone).await?;
        let sequence = match plan(&sequencer, &view) {
            Ok(sequence) => sequence,
            Err(e) => {
                inner.log.push(Severity::Error, format!("{label} rejected: {e}"));
                return Err(e.into());
            }
        };
        info!("{} accepted: {} ({} commands)", label, sequence.kind, sequence.len());

        let inner = self.inner.clone();
        Ok(tokio::spawn(async move {
            let _guard = guard;
            inner.executor.run(&sequence).await
        }))
    }

    async fn view(&self, zone: &Zone) -> Result<PlanningView, RequestError> {
        let storage = &self.inner.storage;
        Ok(PlanningView {
            shuttle: storage.shuttle(&zone.shuttle).await?,
            lift: storage.lift(&zone.lift).await?,
            inventory: storage.inventory().await,
        })
    }

    /// Whether a shuttle has a sequence in flight.
    pub fn is_busy(&self, shuttle: &ShuttleId) -> bool {
        self.inner
            .busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(shuttle)
    }

    /// Suspend until no shuttle is busy.
    pub async fn wait_until_idle(&self) {
        loop {
            let idle = self
                .inner
                .busy
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .is_empty();
            if idle {
                return;
            }
            tokio::time::sleep(self.inner.config.poll_interval).await;
        }
    }

    /// Consistent copy of shuttles, lifts, inventory and conveyor pallets.
    pub async fn snapshot(&self) -> WorldSnapshot {
        self.inner.storage.snapshot().await
    }

    /// Activity log entries, newest first.
    pub fn activity(&self) -> Vec<LogEntry> {
        self.inner.log.entries()
    }

    /// The activity log.
    pub fn log(&self) -> &ActivityLog {
        &self.inner.log
    }

    /// Shared state.
    pub fn storage(&self) -> &Arc<S> {
        &self.inner.storage
    }

    /// Warehouse geometry.
    pub fn topology(&self) -> &GridTopology {
        &self.inner.topology
    }
}
