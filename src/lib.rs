//! stoker: an epoch-driven training scheduler for energy-based models.
//!
//! The crate does not implement any model mathematics. It drives the
//! control side of iterative parameter optimization: a [`Scheduler`] whose
//! [`Scheduler::advance`] is called once per update, a progress tracker
//! handling time estimation, objective history and best-so-far parameter
//! retention, a [`CheckpointStore`] for multi-stage (layer-wise)
//! optimization, and a cooperative keyboard cancellation source.
//!
//! ```no_run
//! use stoker::{MemoryDataset, Scheduler};
//! # use stoker::{Batch, ScheduleConfig, TrainableSystem};
//! # struct Rbm { config: ScheduleConfig }
//! # impl TrainableSystem for Rbm {
//! #     type Params = Vec<f64>;
//! #     fn evaluate(&self, _: &Batch, _: &str) -> stoker::error::Result<f64> { Ok(0.0) }
//! #     fn params(&self) -> Vec<f64> { Vec::new() }
//! #     fn set_params(&mut self, _: Vec<f64>) -> stoker::error::Result<()> { Ok(()) }
//! #     fn schedule(&self) -> Option<&ScheduleConfig> { Some(&self.config) }
//! # }
//! # fn update_step(_: &mut Rbm, _: &stoker::Batch) {}
//! # fn main() -> stoker::error::Result<()> {
//! # let mut system = Rbm { config: ScheduleConfig::rbm() };
//! let mut data = MemoryDataset::new(vec![vec![0.0, 1.0]; 256]);
//! let mut scheduler = Scheduler::new();
//! scheduler.attach(&system, &mut data)?;
//!
//! while scheduler.advance(&mut system)? {
//!     let batch = scheduler.minibatch(&mut data)?.clone();
//!     update_step(&mut system, &batch);
//! }
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod keys;
pub mod logger;
pub mod pipeline;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod system;
pub mod tracker;

pub use data::{Batch, Corruption, MemoryDataset, MinibatchProvider, NoiseKind};
pub use error::TrainError;
pub use keys::{CancelSource, KeyListener, NoCancel};
pub use pipeline::{Pipeline, Stage};
pub use registry::{Direction, FunctionRegistry, FunctionSpec};
pub use schedule::ScheduleConfig;
pub use scheduler::{Phase, Scheduler};
pub use store::{CheckpointStore, Slot};
pub use system::TrainableSystem;
pub use tracker::{OptimumRecord, ProgressTracker, StopCause, TrainingState};
