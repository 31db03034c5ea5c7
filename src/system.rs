//! The contract a trainable system exposes to the scheduler.

use crate::{data::Batch, error::Result, schedule::ScheduleConfig};

/// A model whose parameters the loop drives towards an optimum.
///
/// The numeric update step itself is the system's business; the scheduler
/// only evaluates scalar functions on it and snapshots/restores parameters.
pub trait TrainableSystem {
    /// Deep-copyable parameter snapshot. The optimum record owns an
    /// independent copy, never a reference into the live system.
    type Params: Clone;

    /// Evaluate a named scalar function of the system against `data`.
    fn evaluate(&self, data: &Batch, function: &str) -> Result<f64>;

    /// Snapshot the current parameters.
    fn params(&self) -> Self::Params;

    /// Replace the current parameters with a snapshot.
    fn set_params(&mut self, params: Self::Params) -> Result<()>;

    /// The system's optimization configuration, if it carries one.
    fn schedule(&self) -> Option<&ScheduleConfig>;
}
