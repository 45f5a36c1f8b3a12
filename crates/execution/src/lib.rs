//! Execution layer - sequence interpretation, shuttle motion and request
//! coordination.

#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod warehouse;

pub use config::ExecutorConfig;
pub use driver::{MotionDriver, SimulatedDriver};
pub use error::{ExecutionError, RequestError};
pub use executor::SequenceExecutor;
pub use warehouse::{RequestHandle, SimulatedWarehouse, Warehouse};
