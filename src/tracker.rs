//! Progress tracking: time estimation, objective history, optimum
//! retention and periodic secondary evaluation.

use std::time::Instant;

use chrono::Local;
use tracing::info;

use crate::{
    data::Batch,
    error::Result,
    logger::seconds_to_hms,
    registry::FunctionRegistry,
    schedule::ScheduleConfig,
    system::TrainableSystem,
};

/// Why a run reached a terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopCause {
    /// The configured update count was exhausted.
    Exhausted,
    /// The user requested an abort.
    Aborted,
}

/// Best objective value seen so far, with the parameters that produced it.
/// Owns an independent parameter copy; the live system keeps mutating its
/// own parameters after the snapshot is taken.
#[derive(Clone, Debug)]
pub struct OptimumRecord<P> {
    pub value: f64,
    pub params: P,
}

/// Mutable per-run state. Created when a system is attached, touched only
/// by the scheduler thread, discarded when the run ends.
pub struct TrainingState<P> {
    pub epoch: usize,
    pub running: bool,
    pub stop_cause: Option<StopCause>,

    /// Current minibatch, reused until the refresh interval elapses.
    pub minibatch: Option<Batch>,
    /// Fixed evaluation data, sampled once at attach.
    pub evaluation_data: Batch,

    /// (progress fraction, objective value) pairs.
    pub objective_history: Vec<(f64, f64)>,
    /// (progress fraction, evaluation value) pairs.
    pub evaluation_history: Vec<(f64, f64)>,
    pub optimum: Option<OptimumRecord<P>>,

    pub estim_started: bool,
    pub estim_finished: bool,
    pub estim_start: Instant,

    /// Runtime toggle; cleared after the final evaluation fires.
    pub eval_enabled: bool,
    pub eval_prev: Instant,

    pub keys_started: bool,
}

impl<P> TrainingState<P> {
    pub fn new(evaluation_data: Batch, config: &ScheduleConfig, now: Instant) -> Self {
        Self {
            epoch: 0,
            running: true,
            stop_cause: None,
            minibatch: None,
            evaluation_data,
            objective_history: Vec::new(),
            evaluation_history: Vec::new(),
            optimum: None,
            estim_started: false,
            estim_finished: false,
            estim_start: now,
            eval_enabled: config.eval_enable,
            eval_prev: now,
            keys_started: false,
        }
    }

    /// Fraction of the configured updates performed so far.
    pub fn progress(&self, updates: usize) -> f64 {
        self.epoch as f64 / updates as f64
    }
}

/// Stateless driver of the per-epoch tracking sub-steps. Holds the
/// function registry used to resolve objective/evaluation metadata.
pub struct ProgressTracker {
    registry: FunctionRegistry,
}

impl ProgressTracker {
    pub fn new(registry: FunctionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    /// One-off run time estimation. The first call only records the start;
    /// once the observation window has passed, a single estimate is logged
    /// and the estimator disables itself for the rest of the run.
    pub fn estimate<P>(
        &self,
        state: &mut TrainingState<P>,
        config: &ScheduleConfig,
        now: Instant,
    ) {
        if state.estim_finished {
            return;
        }

        if !state.estim_started {
            info!("estimating time for calculation of {} updates", config.updates);
            state.estim_started = true;
            state.estim_start = now;
            return;
        }

        if now.duration_since(state.estim_start) > config.estimate_time_wait {
            self.report_estimate(state, config, now);
            state.estim_finished = true;
        }
    }

    /// Log the projected total run time and finishing time of day.
    pub fn report_estimate<P>(
        &self,
        state: &TrainingState<P>,
        config: &ScheduleConfig,
        now: Instant,
    ) {
        let elapsed = now.duration_since(state.estim_start).as_secs_f64();
        let total = elapsed / (state.epoch as f64 + 1.0) * config.updates as f64;
        if !total.is_finite() {
            return;
        }

        let remaining = (total - elapsed).max(0.0);
        let (hours, minutes, seconds) = seconds_to_hms(total.round() as u64);
        let finish = Local::now() + chrono::Duration::milliseconds((remaining * 1000.0) as i64);
        info!(
            "estimation: {hours}h {minutes}m {seconds}s (finishing time: {})",
            finish.format("%H:%M")
        );
    }

    /// Epoch-cadence objective tracking and optimum retention.
    ///
    /// Runs when the epoch hits the update interval, and always once more
    /// on the terminal epoch so a final value is recorded. On the terminal
    /// epoch the retained optimum parameters are written back into the
    /// system.
    pub fn track_objective<S: TrainableSystem>(
        &self,
        state: &mut TrainingState<S::Params>,
        config: &ScheduleConfig,
        system: &mut S,
    ) -> Result<()> {
        if state.running && state.epoch % config.obj_update_interval != 0 {
            return Ok(());
        }

        let spec = self.registry.describe(&config.obj_function)?;
        let value = system.evaluate(&state.evaluation_data, &config.obj_function)?;
        let progress = state.progress(config.updates);
        state.objective_history.push((progress, value));

        if !config.obj_keep_optimum {
            return Ok(());
        }

        match &state.optimum {
            // The very first value seeds the record unconditionally.
            None => {
                state.optimum = Some(OptimumRecord { value, params: system.params() });
            }
            Some(record) => {
                let burn_in = state.running && progress < config.obj_init_wait;
                if !burn_in && spec.direction.improves(value, record.value) {
                    state.optimum = Some(OptimumRecord { value, params: system.params() });
                }
            }
        }

        if !state.running {
            if let Some(record) = &state.optimum {
                system.set_params(record.params.clone())?;
                info!(
                    "restored optimum parameters ({} = {})",
                    spec.display_name,
                    (spec.format)(record.value)
                );
            }
        }

        Ok(())
    }

    /// Wall-clock-cadence secondary evaluation, decoupled from objective
    /// tracking so expensive metrics are not computed every epoch.
    pub fn track_evaluation<S: TrainableSystem>(
        &self,
        state: &mut TrainingState<S::Params>,
        config: &ScheduleConfig,
        system: &S,
        now: Instant,
    ) -> Result<()> {
        if !state.eval_enabled {
            return Ok(());
        }

        let spec = self.registry.describe(&config.eval_function)?;

        if !state.running {
            let value = system.evaluate(&state.evaluation_data, &config.eval_function)?;
            state.eval_enabled = false;
            info!("found optimum with: {} = {}", spec.display_name, (spec.format)(value));
            return Ok(());
        }

        if now.duration_since(state.eval_prev) > config.eval_time_interval {
            let value = system.evaluate(&state.evaluation_data, &config.eval_function)?;
            let progress = state.progress(config.updates);
            state.eval_prev = now;
            state.evaluation_history.push((progress, value));
            info!(
                "finished {:.1}%: {} = {}",
                progress * 100.0,
                spec.display_name,
                (spec.format)(value)
            );
        }

        Ok(())
    }
}
